//! Header serialization.
//!
//! The write path is the dual of parsing: core fields emit one record per
//! line (the `jnrrd` magic line first), then each namespace tree flattens
//! back into `namespace:path` records. Objects recurse into their properties;
//! an array of plain scalars is written whole, while an array containing
//! objects or arrays flattens element-by-element so the reparse rebuilds the
//! same tree.

use super::Header;
use crate::util::Result;
use serde_json::Value;
use std::io::Write;
use tracing::warn;

/// Serialize `header` as newline-terminated single-key JSON records.
///
/// Does not write the blank separator line; the payload writer owns that.
pub fn write_header<W: Write>(out: &mut W, header: &Header) -> Result<()> {
    if let Some(magic) = header.field("jnrrd") {
        write_record(out, "jnrrd", magic)?;
    }
    for (key, value) in header.fields() {
        if key == "jnrrd" {
            continue;
        }
        write_record(out, key, value)?;
    }
    for (namespace, tree) in header.extension_trees() {
        match tree {
            Value::Object(map) => {
                for (key, value) in map {
                    flatten(out, namespace, key, value)?;
                }
            }
            _ => warn!(namespace, "extension tree is not an object; skipped"),
        }
    }
    Ok(())
}

fn write_record<W: Write>(out: &mut W, key: &str, value: &Value) -> Result<()> {
    let mut record = serde_json::Map::with_capacity(1);
    record.insert(key.to_string(), value.clone());
    let line = serde_json::to_string(&Value::Object(record))?;
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    Ok(())
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn flatten<W: Write>(out: &mut W, namespace: &str, path: &str, value: &Value) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(out, namespace, &format!("{path}.{key}"), child)?;
            }
            Ok(())
        }
        Value::Array(items) if !items.iter().all(is_scalar) => {
            for (i, child) in items.iter().enumerate() {
                flatten(out, namespace, &format!("{path}[{i}]"), child)?;
            }
            Ok(())
        }
        _ => write_record(out, &format!("{namespace}:{path}"), value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderEnd;
    use serde_json::json;
    use std::io::Cursor;

    fn reparse(bytes: &[u8]) -> (Header, HeaderEnd) {
        let mut with_sep = bytes.to_vec();
        with_sep.extend_from_slice(b"\n");
        Header::parse(Cursor::new(with_sep)).unwrap()
    }

    fn base_header() -> Header {
        let mut header = Header::new();
        header.set_field("jnrrd", json!("0004"));
        header.set_field("type", json!("uint8"));
        header.set_field("dimension", json!(1));
        header.set_field("sizes", json!([4]));
        header
    }

    #[test]
    fn test_magic_line_first() {
        let mut out = Vec::new();
        write_header(&mut out, &base_header()).unwrap();
        let first = out.split(|&b| b == b'\n').next().unwrap();
        assert_eq!(first, b"{\"jnrrd\":\"0004\"}");
    }

    #[test]
    fn test_core_field_roundtrip() {
        let mut header = base_header();
        header.set_field("content", json!("test volume"));
        header.set_field("spacings", json!([0.5]));

        let mut out = Vec::new();
        write_header(&mut out, &header).unwrap();
        let (reread, _) = reparse(&out);
        assert_eq!(reread, header);
    }

    #[test]
    fn test_extension_flattening_roundtrip() {
        let mut header = base_header();
        header.declare_extension("dicom", "https://example.org/dicom");
        header.set_extension(
            "dicom",
            json!({
                "patient": {"id": "ANONYMOUS", "sex": "F"},
                "study": {"description": "BRAIN MRI"}
            }),
        );

        let mut out = Vec::new();
        write_header(&mut out, &header).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains("{\"dicom:patient.id\":\"ANONYMOUS\"}"));

        let (reread, _) = reparse(&out);
        assert_eq!(reread.extension("dicom"), header.extension("dicom"));
    }

    #[test]
    fn test_scalar_array_written_whole() {
        let mut header = base_header();
        header.declare_extension("ome", "https://example.org/ome");
        header.set_extension(
            "ome",
            json!({"roi": {"coordinates": [10, 20, 30, 40]}}),
        );

        let mut out = Vec::new();
        write_header(&mut out, &header).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains("{\"ome:roi.coordinates\":[10,20,30,40]}"));

        let (reread, _) = reparse(&out);
        assert_eq!(reread.extension("ome"), header.extension("ome"));
    }

    #[test]
    fn test_container_array_flattened_per_element() {
        let mut header = base_header();
        header.declare_extension("ome", "https://example.org/ome");
        header.set_extension(
            "ome",
            json!({"channels": [
                {"id": "Channel:0", "name": "DAPI"},
                {"id": "Channel:1", "name": "GFP"}
            ]}),
        );

        let mut out = Vec::new();
        write_header(&mut out, &header).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains("{\"ome:channels[0].id\":\"Channel:0\"}"));
        assert!(text.contains("{\"ome:channels[1].name\":\"GFP\"}"));

        let (reread, _) = reparse(&out);
        assert_eq!(reread.extension("ome"), header.extension("ome"));
    }
}
