//! Payload resolution, decoding and encoding.
//!
//! The driver turns a frozen header plus its termination report into a
//! [`PayloadDescriptor`] - element type, element count, encoding, declared
//! byte order and byte location - then produces a native-endian buffer from
//! it, or writes one out through the mirror path. Compression is dispatched
//! to the codec bank; text encodings (`ascii`, `hex`) are handled here
//! element-by-element.
//!
//! Detached payloads may span several files (`data_files`, or a
//! `data_file_pattern` with a printf-style index). Each file is an
//! independent slab with the same encoding; slabs decode in parallel and
//! concatenate in declared order.

pub mod source;

pub use source::DataSource;

use crate::codec::{self, swap_in_place, Encoding, Endian};
use crate::header::{Header, HeaderEnd};
use crate::util::{ElementType, Error, Result};
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use half::{bf16, f16};
use rayon::prelude::*;
use serde_json::Value;
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Compression level handed to the codec bank on write.
const DEFAULT_COMPRESSION_LEVEL: i32 = 9;

/// Where the payload bytes live.
#[derive(Clone, Debug, PartialEq)]
pub enum PayloadLocation {
    /// Bytes follow the header in the same stream.
    Inline { source: DataSource, offset: u64 },
    /// Bytes live in one or more detached resources.
    Detached {
        sources: Vec<DataSource>,
        line_skip: u64,
        byte_skip: u64,
    },
}

/// Everything needed to decode (or encode) one payload.
#[derive(Clone, Debug, PartialEq)]
pub struct PayloadDescriptor {
    pub element: ElementType,
    pub count: usize,
    pub encoding: Encoding,
    pub endian: Endian,
    pub location: PayloadLocation,
}

impl PayloadDescriptor {
    /// Resolve the payload location from a parsed header.
    ///
    /// `end` is the header termination report (required for inline payloads)
    /// and `header_path` the file the header came from; its directory anchors
    /// relative detached locators.
    pub fn from_header(
        header: &Header,
        end: Option<&HeaderEnd>,
        header_path: Option<&Path>,
    ) -> Result<Self> {
        let element = header.element_type()?;
        let count = header.element_count()?;
        let encoding = header.encoding()?;
        let endian = header.endian()?;
        let base_dir = header_path.and_then(Path::parent);

        let detached = detached_sources(header, base_dir)?;
        let location = match detached {
            Some(sources) => PayloadLocation::Detached {
                sources,
                line_skip: header.line_skip()?,
                byte_skip: header.byte_skip()?,
            },
            None => {
                let end = end.ok_or_else(|| {
                    Error::UnresolvedPayload(
                        "inline payload requires the header termination offset".to_string(),
                    )
                })?;
                let path = header_path.ok_or_else(|| {
                    Error::UnresolvedPayload(
                        "inline payload requires the header stream".to_string(),
                    )
                })?;
                PayloadLocation::Inline {
                    source: DataSource::Local(path.to_path_buf()),
                    offset: end.data_offset() + header.byte_skip()?,
                }
            }
        };

        Ok(Self {
            element,
            count,
            encoding,
            endian,
            location,
        })
    }

    /// Expected decoded payload size in bytes.
    pub fn byte_len(&self) -> Result<usize> {
        self.count
            .checked_mul(self.element.num_bytes())
            .ok_or_else(|| Error::field("sizes", "payload byte length overflows usize"))
    }

    /// Read and decode the payload into a native-endian buffer.
    pub fn read(&self) -> Result<Vec<u8>> {
        let total_bytes = self.byte_len()?;
        debug!(
            encoding = self.encoding.name(),
            element = self.element.name(),
            count = self.count,
            "reading payload"
        );

        let mut bytes = match &self.location {
            PayloadLocation::Inline { source, offset } => {
                let buf = source.read_all()?;
                let start = (*offset as usize).min(buf.len());
                decode_slab(&buf[start..], self.encoding, self.element, self.count)?
            }
            PayloadLocation::Detached {
                sources,
                line_skip,
                byte_skip,
            } => {
                if sources.is_empty() {
                    return Err(Error::UnresolvedPayload(
                        "no detached data files named".to_string(),
                    ));
                }
                if self.count % sources.len() != 0 {
                    return Err(Error::field(
                        "data_files",
                        format!(
                            "{} elements do not divide evenly across {} files",
                            self.count,
                            sources.len()
                        ),
                    ));
                }
                let per_count = self.count / sources.len();
                let slabs = sources
                    .par_iter()
                    .map(|src| {
                        let buf = src.read_all()?;
                        let start = skip_offset(&buf, *line_skip, *byte_skip);
                        decode_slab(&buf[start..], self.encoding, self.element, per_count)
                    })
                    .collect::<Result<Vec<_>>>()?;
                let mut joined = Vec::with_capacity(total_bytes);
                for slab in slabs {
                    joined.extend_from_slice(&slab);
                }
                joined
            }
        };

        // ascii carries no byte order; everything else is declared-endian
        if self.encoding != Encoding::Ascii && self.endian != Endian::native() {
            swap_in_place(&mut bytes, self.element.swap_width());
        }
        Ok(bytes)
    }
}

/// Write `data` (native-endian, already length-checked by the caller) in the
/// given encoding. A working copy is byte-swapped when the declared order
/// differs from native; the caller's buffer is never modified.
pub fn write_payload<W: Write>(
    out: &mut W,
    element: ElementType,
    encoding: Encoding,
    endian: Endian,
    data: &[u8],
) -> Result<()> {
    match encoding {
        Encoding::Ascii => write_ascii(out, element, data),
        Encoding::Hex => write_hex(out, &ordered_bytes(data, element, endian)),
        _ => {
            let bytes = ordered_bytes(data, element, endian);
            let packed = codec::encode(encoding, &bytes, DEFAULT_COMPRESSION_LEVEL)?;
            out.write_all(&packed)?;
            Ok(())
        }
    }
}

fn ordered_bytes<'a>(data: &'a [u8], element: ElementType, endian: Endian) -> Cow<'a, [u8]> {
    if endian == Endian::native() || element.swap_width() <= 1 {
        Cow::Borrowed(data)
    } else {
        let mut copy = data.to_vec();
        swap_in_place(&mut copy, element.swap_width());
        Cow::Owned(copy)
    }
}

fn detached_sources(header: &Header, base_dir: Option<&Path>) -> Result<Option<Vec<DataSource>>> {
    if let Some(locator) = header.data_file() {
        return Ok(Some(vec![DataSource::resolve(locator, base_dir)?]));
    }
    if let Some(value) = header.field("data_files") {
        let entries = value
            .as_array()
            .ok_or_else(|| Error::field("data_files", "expected an array of locators"))?;
        let sources = entries
            .iter()
            .map(|entry| {
                let locator = entry
                    .as_str()
                    .ok_or_else(|| Error::field("data_files", "expected string locators"))?;
                DataSource::resolve(locator, base_dir)
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(Some(sources));
    }
    if let Some(value) = header.field("data_file_pattern") {
        return Ok(Some(pattern_sources(value, base_dir)?));
    }
    Ok(None)
}

/// Expand a `data_file_pattern` object into concrete sources.
///
/// The pattern value is `{"format": "slice%03d.raw", "min": 0, "max": 9}`
/// with an optional `step` (default 1, may be negative when min > max).
fn pattern_sources(value: &Value, base_dir: Option<&Path>) -> Result<Vec<DataSource>> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::field("data_file_pattern", "expected an object"))?;
    let format = obj
        .get("format")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::field("data_file_pattern", "missing 'format' string"))?;
    let min = obj
        .get("min")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::field("data_file_pattern", "missing 'min' integer"))?;
    let max = obj
        .get("max")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::field("data_file_pattern", "missing 'max' integer"))?;
    let step = match obj.get("step") {
        None => 1,
        Some(v) => v
            .as_i64()
            .filter(|&s| s != 0)
            .ok_or_else(|| Error::field("data_file_pattern", "'step' must be a non-zero integer"))?,
    };

    let mut sources = Vec::new();
    let mut index = min;
    while (step > 0 && index <= max) || (step < 0 && index >= max) {
        let name = expand_pattern(format, index)?;
        sources.push(DataSource::resolve(&name, base_dir)?);
        index += step;
    }
    if sources.is_empty() {
        return Err(Error::field(
            "data_file_pattern",
            "pattern expands to no files",
        ));
    }
    Ok(sources)
}

/// Substitute a printf-style `%d` / `%0Nd` specifier with `index`.
fn expand_pattern(format: &str, index: i64) -> Result<String> {
    let percent = format
        .find('%')
        .ok_or_else(|| Error::field("data_file_pattern", "format has no % specifier"))?;
    let rest = &format[percent + 1..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let after = &rest[digits.len()..];
    if !after.starts_with('d') {
        return Err(Error::field(
            "data_file_pattern",
            format!("unsupported format specifier in '{format}'"),
        ));
    }
    let width: usize = if digits.is_empty() {
        0
    } else {
        digits
            .parse()
            .map_err(|_| Error::field("data_file_pattern", "bad field width"))?
    };
    let mut name = String::with_capacity(format.len() + 8);
    name.push_str(&format[..percent]);
    name.push_str(&format!("{index:0width$}"));
    name.push_str(&after[1..]);
    Ok(name)
}

/// Byte offset after skipping whole text lines, then raw bytes.
fn skip_offset(buf: &[u8], line_skip: u64, byte_skip: u64) -> usize {
    let mut pos = 0;
    for _ in 0..line_skip {
        match buf[pos..].iter().position(|&b| b == b'\n') {
            Some(p) => pos += p + 1,
            None => return buf.len(),
        }
    }
    (pos + byte_skip as usize).min(buf.len())
}

/// Decode one slab to exactly `count` elements.
///
/// Binary results stay in the declared byte order (the caller swaps once at
/// the end); ascii parses straight into native-endian bytes.
fn decode_slab(
    body: &[u8],
    encoding: Encoding,
    element: ElementType,
    count: usize,
) -> Result<Vec<u8>> {
    let expected_bytes = count
        .checked_mul(element.num_bytes())
        .ok_or_else(|| Error::field("sizes", "payload byte length overflows usize"))?;
    match encoding {
        Encoding::Ascii => decode_ascii(body, element, count),
        Encoding::Hex => decode_hex(body, expected_bytes),
        _ => codec::decode(encoding, body, expected_bytes),
    }
}

// === hex ===

fn decode_hex(body: &[u8], expected_bytes: usize) -> Result<Vec<u8>> {
    let clean: Vec<u8> = body
        .iter()
        .copied()
        .filter(u8::is_ascii_hexdigit)
        .collect();
    let bytes = hex::decode(&clean)
        .map_err(|e| Error::field("encoding", format!("bad hex payload: {e}")))?;
    if bytes.len() < expected_bytes {
        return Err(Error::PayloadLengthMismatch {
            expected: expected_bytes,
            actual: bytes.len(),
        });
    }
    Ok(bytes[..expected_bytes].to_vec())
}

fn write_hex<W: Write>(out: &mut W, data: &[u8]) -> Result<()> {
    // 64 hex characters per line
    let encoded = hex::encode(data);
    for chunk in encoded.as_bytes().chunks(64) {
        out.write_all(chunk)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

// === ascii ===

fn ascii_error(token: &str) -> Error {
    Error::field("encoding", format!("bad ascii token '{token}'"))
}

fn decode_ascii(body: &[u8], element: ElementType, count: usize) -> Result<Vec<u8>> {
    if element.is_complex() {
        return Err(Error::UnsupportedType(format!(
            "{element} with ascii encoding"
        )));
    }
    let text = std::str::from_utf8(body)
        .map_err(|_| Error::field("encoding", "ascii payload is not valid UTF-8"))?;

    let mut out = Vec::with_capacity(count * element.num_bytes());
    let mut parsed = 0usize;
    for token in text.split_whitespace() {
        if parsed == count {
            break;
        }
        push_ascii_element(&mut out, element, token)?;
        parsed += 1;
    }
    if parsed < count {
        return Err(Error::PayloadLengthMismatch {
            expected: count * element.num_bytes(),
            actual: parsed * element.num_bytes(),
        });
    }
    Ok(out)
}

fn push_ascii_element(out: &mut Vec<u8>, element: ElementType, token: &str) -> Result<()> {
    match element {
        ElementType::Int8 => {
            let v: i8 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_i8(v)?;
        }
        ElementType::Uint8 => {
            let v: u8 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_u8(v)?;
        }
        ElementType::Int16 => {
            let v: i16 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_i16::<NativeEndian>(v)?;
        }
        ElementType::Uint16 => {
            let v: u16 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_u16::<NativeEndian>(v)?;
        }
        ElementType::Int32 => {
            let v: i32 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_i32::<NativeEndian>(v)?;
        }
        ElementType::Uint32 => {
            let v: u32 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_u32::<NativeEndian>(v)?;
        }
        ElementType::Int64 => {
            let v: i64 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_i64::<NativeEndian>(v)?;
        }
        ElementType::Uint64 => {
            let v: u64 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_u64::<NativeEndian>(v)?;
        }
        ElementType::Float16 => {
            let v: f32 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_u16::<NativeEndian>(f16::from_f32(v).to_bits())?;
        }
        ElementType::BFloat16 => {
            let v: f32 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_u16::<NativeEndian>(bf16::from_f32(v).to_bits())?;
        }
        ElementType::Float32 => {
            let v: f32 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_f32::<NativeEndian>(v)?;
        }
        ElementType::Float64 => {
            let v: f64 = token.parse().map_err(|_| ascii_error(token))?;
            out.write_f64::<NativeEndian>(v)?;
        }
        ElementType::Complex64 | ElementType::Complex128 => unreachable!(),
    }
    Ok(())
}

fn write_ascii<W: Write>(out: &mut W, element: ElementType, data: &[u8]) -> Result<()> {
    if element.is_complex() {
        return Err(Error::UnsupportedType(format!(
            "{element} with ascii encoding"
        )));
    }
    // 8 values per line
    let mut cursor = data;
    let mut column = 0;
    while !cursor.is_empty() {
        let token = next_ascii_token(&mut cursor, element)?;
        if column > 0 {
            out.write_all(b" ")?;
        }
        out.write_all(token.as_bytes())?;
        column += 1;
        if column == 8 {
            out.write_all(b"\n")?;
            column = 0;
        }
    }
    if column > 0 {
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn next_ascii_token(cursor: &mut &[u8], element: ElementType) -> Result<String> {
    let token = match element {
        ElementType::Int8 => cursor.read_i8()?.to_string(),
        ElementType::Uint8 => cursor.read_u8()?.to_string(),
        ElementType::Int16 => cursor.read_i16::<NativeEndian>()?.to_string(),
        ElementType::Uint16 => cursor.read_u16::<NativeEndian>()?.to_string(),
        ElementType::Int32 => cursor.read_i32::<NativeEndian>()?.to_string(),
        ElementType::Uint32 => cursor.read_u32::<NativeEndian>()?.to_string(),
        ElementType::Int64 => cursor.read_i64::<NativeEndian>()?.to_string(),
        ElementType::Uint64 => cursor.read_u64::<NativeEndian>()?.to_string(),
        ElementType::Float16 => {
            f16::from_bits(cursor.read_u16::<NativeEndian>()?).to_string()
        }
        ElementType::BFloat16 => {
            bf16::from_bits(cursor.read_u16::<NativeEndian>()?).to_string()
        }
        ElementType::Float32 => cursor.read_f32::<NativeEndian>()?.to_string(),
        ElementType::Float64 => cursor.read_f64::<NativeEndian>()?.to_string(),
        ElementType::Complex64 | ElementType::Complex128 => unreachable!(),
    };
    Ok(token)
}
