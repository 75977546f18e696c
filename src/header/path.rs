//! Path resolver for extension field keys.
//!
//! The substring after the namespace colon addresses a location inside that
//! namespace's tree using dot notation for object properties and bracket
//! notation for array indices: `patient.id`, `channels[1].name`,
//! `matrix[1][2]`. There is no escape syntax for property names containing
//! `.` or `[` - an accepted limitation of the format.

use smallvec::SmallVec;
use std::fmt;

/// One step of a path: an object property or an array index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathComponent {
    /// Object property name
    Field(String),
    /// 0-based array index
    Index(usize),
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}

/// Parsed path; paths are short, so components live inline.
pub type Path = SmallVec<[PathComponent; 4]>;

#[inline]
fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Parse a path string into components.
///
/// Grammar: a component is a bare identifier (letters, digits, underscore) or
/// a decimal index in `[ ]`; identifier components separate on `.`, and a
/// bracketed index may directly follow an identifier or another index with no
/// dot. A remainder containing neither `.` nor `[` is a single property name,
/// whatever characters it holds.
///
/// Returns `None` if the string does not match the grammar.
pub fn parse_path(path: &str) -> Option<Path> {
    if path.is_empty() {
        return None;
    }
    if !path.contains('.') && !path.contains('[') {
        let mut components = Path::new();
        components.push(PathComponent::Field(path.to_string()));
        return Some(components);
    }

    let bytes = path.as_bytes();
    let mut components = Path::new();
    let mut i = 0;

    loop {
        // one component: identifier or bracketed index
        if i < bytes.len() && bytes[i] == b'[' {
            let close = path[i..].find(']').map(|p| i + p)?;
            let digits = &path[i + 1..close];
            if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
                return None;
            }
            components.push(PathComponent::Index(digits.parse().ok()?));
            i = close + 1;
        } else {
            let start = i;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            if i == start {
                return None;
            }
            components.push(PathComponent::Field(path[start..i].to_string()));
        }

        if i == bytes.len() {
            return Some(components);
        }
        match bytes[i] {
            // dot separates and must introduce an identifier
            b'.' => {
                i += 1;
                if i == bytes.len() || !is_ident_char(bytes[i]) {
                    return None;
                }
            }
            // bracket attaches directly to the previous component
            b'[' => {}
            _ => return None,
        }
    }
}
