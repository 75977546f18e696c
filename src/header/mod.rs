//! Header model and parsing.
//!
//! A parsed header holds three things: the flat core-field map, one
//! hierarchical metadata tree per declared extension namespace, and the
//! namespace -> URI registry taken from the core `extensions` field. Records
//! route while parsing: a key without a colon is a core field; a key of the
//! form `namespace:path` merges into that namespace's tree, provided the
//! namespace was declared on an earlier line. A namespaced-looking key whose
//! namespace is undeclared, or whose path does not parse, stays in the flat
//! map unchanged - forward compatibility, not an error.
//!
//! After parsing the header is frozen: every downstream consumer (geometry,
//! payload driver, caller) takes it by shared reference.

pub mod merge;
pub mod path;
pub mod reader;
pub mod writer;

pub use path::{parse_path, Path, PathComponent};
pub use reader::{EndReason, HeaderEnd, RecordReader};

use crate::codec::{Encoding, Endian};
use crate::util::{ElementType, Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::BufRead;
use tracing::debug;

/// JNRRD format version written by this library.
pub const FORMAT_VERSION: &str = "0004";

/// Parsed and frozen header: core fields, extension trees, namespace registry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    fields: Map<String, Value>,
    extensions: BTreeMap<String, Value>,
}

impl Header {
    /// Create an empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a header from a byte stream positioned at its first line.
    ///
    /// Consumes records until the header terminates, then validates the
    /// required core fields. EOF is a valid terminator only when the required
    /// fields have been seen; otherwise the header is unterminated.
    pub fn parse<R: BufRead>(input: R) -> Result<(Self, HeaderEnd)> {
        let mut records = RecordReader::new(input);
        let mut header = Header::new();
        while let Some((key, value)) = records.next_record()? {
            header.insert_record(key, value);
        }
        let end = records
            .into_end()
            .ok_or_else(|| Error::other("record reader finished without an end report"))?;

        if end.reason == EndReason::Eof && !header.has_required_fields() {
            return Err(Error::UnterminatedHeader(end.offset));
        }
        header.validate()?;
        debug!(
            fields = header.fields.len(),
            namespaces = header.extensions.len(),
            data_offset = end.data_offset(),
            "header parsed"
        );
        Ok((header, end))
    }

    /// Route one record into the flat map or an extension tree.
    pub fn insert_record(&mut self, key: String, value: Value) {
        if let Some((namespace, remainder)) = key.split_once(':') {
            if self.declares(namespace) {
                if let Some(path) = parse_path(remainder) {
                    let tree = self
                        .extensions
                        .entry(namespace.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    merge::apply(tree, &path, value);
                    return;
                }
            }
        }
        self.fields.insert(key, value);
    }

    // === core fields ===

    /// Look up a flat core field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a flat core field.
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Remove a flat core field, returning its value.
    pub fn remove_field(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Iterate over flat core fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    // === namespaces ===

    /// True if `namespace` appears in the `extensions` declaration map.
    pub fn declares(&self, namespace: &str) -> bool {
        self.fields
            .get("extensions")
            .and_then(Value::as_object)
            .is_some_and(|decl| decl.contains_key(namespace))
    }

    /// Declaring URI for a namespace, if declared.
    pub fn namespace_uri(&self, namespace: &str) -> Option<&str> {
        self.fields
            .get("extensions")?
            .as_object()?
            .get(namespace)?
            .as_str()
    }

    /// Declare a namespace, binding it to its URI.
    pub fn declare_extension(&mut self, namespace: impl Into<String>, uri: impl Into<String>) {
        let decl = self
            .fields
            .entry("extensions".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !decl.is_object() {
            *decl = Value::Object(Map::new());
        }
        if let Some(map) = decl.as_object_mut() {
            map.insert(namespace.into(), Value::String(uri.into()));
        }
    }

    /// Metadata tree for a namespace.
    pub fn extension(&self, namespace: &str) -> Option<&Value> {
        self.extensions.get(namespace)
    }

    /// Replace a namespace's metadata tree wholesale.
    pub fn set_extension(&mut self, namespace: impl Into<String>, tree: Value) {
        self.extensions.insert(namespace.into(), tree);
    }

    /// Iterate over `(namespace, tree)` pairs.
    pub fn extension_trees(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.extensions.iter().map(|(k, v)| (k.as_str(), v))
    }

    // === typed accessors ===

    /// Format version tag from the `jnrrd` magic field.
    pub fn version(&self) -> Option<&str> {
        self.fields.get("jnrrd").and_then(Value::as_str)
    }

    /// Payload element type from the required `type` field.
    pub fn element_type(&self) -> Result<ElementType> {
        let name = self
            .str_field("type")?
            .ok_or(Error::MissingRequiredField("type"))?;
        ElementType::from_name(name).ok_or_else(|| Error::UnsupportedType(name.to_string()))
    }

    /// Axis count from the required `dimension` field.
    pub fn dimension(&self) -> Result<usize> {
        let value = self
            .fields
            .get("dimension")
            .ok_or(Error::MissingRequiredField("dimension"))?;
        usize_value(value, "dimension")
    }

    /// Per-axis extents from the required `sizes` field.
    pub fn sizes(&self) -> Result<Vec<usize>> {
        let value = self
            .fields
            .get("sizes")
            .ok_or(Error::MissingRequiredField("sizes"))?;
        let entries = value
            .as_array()
            .ok_or_else(|| Error::field("sizes", "expected an array of extents"))?;
        entries.iter().map(|v| usize_value(v, "sizes")).collect()
    }

    /// Total number of payload elements: the product of `sizes`.
    pub fn element_count(&self) -> Result<usize> {
        self.sizes()?
            .into_iter()
            .try_fold(1usize, |acc, n| acc.checked_mul(n))
            .ok_or_else(|| Error::field("sizes", "element count overflows usize"))
    }

    /// Payload encoding; defaults to raw when absent.
    pub fn encoding(&self) -> Result<Encoding> {
        match self.str_field("encoding")? {
            None => Ok(Encoding::Raw),
            Some(name) => {
                Encoding::from_name(name).ok_or_else(|| Error::UnsupportedEncoding(name.to_string()))
            }
        }
    }

    /// Declared payload byte order; defaults to the native order when absent.
    pub fn endian(&self) -> Result<Endian> {
        match self.str_field("endian")? {
            None => Ok(Endian::native()),
            Some(name) => Endian::from_name(name)
                .ok_or_else(|| Error::field("endian", format!("unknown byte order '{name}'"))),
        }
    }

    /// Coordinate-space name from the `space` field.
    pub fn space(&self) -> Option<&str> {
        self.fields.get("space").and_then(Value::as_str)
    }

    /// Detached payload locator from the `data_file` field.
    pub fn data_file(&self) -> Option<&str> {
        self.fields.get("data_file").and_then(Value::as_str)
    }

    /// Whole text lines to skip before detached payload bytes.
    pub fn line_skip(&self) -> Result<u64> {
        self.u64_field("line_skip")
    }

    /// Bytes to skip before payload bytes (after any line skip).
    pub fn byte_skip(&self) -> Result<u64> {
        self.u64_field("byte_skip")
    }

    /// True once the fields required at header end are all present.
    pub fn has_required_fields(&self) -> bool {
        ["type", "dimension", "sizes"]
            .iter()
            .all(|k| self.fields.contains_key(*k))
    }

    /// Check required fields and cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        let _ = self.element_type()?;
        let dimension = self.dimension()?;
        let sizes = self.sizes()?;
        if sizes.len() != dimension {
            return Err(Error::DimensionMismatch {
                field: "sizes",
                expected: dimension,
                actual: sizes.len(),
            });
        }
        let _ = self.encoding()?;
        let _ = self.endian()?;

        for field in ["space_directions", "spacings"] {
            if let Some(entries) = self.fields.get(field).and_then(Value::as_array) {
                if entries.len() != dimension {
                    return Err(Error::DimensionMismatch {
                        field: if field == "space_directions" {
                            "space_directions"
                        } else {
                            "spacings"
                        },
                        expected: dimension,
                        actual: entries.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn str_field(&self, key: &'static str) -> Result<Option<&str>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| Error::field(key, "expected a string")),
        }
    }

    fn u64_field(&self, key: &'static str) -> Result<u64> {
        match self.fields.get(key) {
            None => Ok(0),
            Some(value) => value
                .as_u64()
                .ok_or_else(|| Error::field(key, "expected a non-negative integer")),
        }
    }
}

fn usize_value(value: &Value, field: &'static str) -> Result<usize> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| Error::field(field, "expected a non-negative integer"))
}
