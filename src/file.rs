//! High-level read and write entry points.
//!
//! A read walks one way through the file: parse the header record-by-record,
//! freeze it at the termination line, resolve the payload location, then
//! decode the buffer. Header and geometry are immutable once parsed and can
//! be shared freely; each payload decode is an independent unit of work.

use crate::array::Array;
use crate::codec::{Encoding, Endian};
use crate::data::{write_payload, PayloadDescriptor};
use crate::header::{writer::write_header, Header, HeaderEnd, FORMAT_VERSION};
use crate::util::{Error, Result};
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

fn parse_file(path: &Path) -> Result<(Header, HeaderEnd)> {
    debug!(path = %path.display(), "opening JNRRD file");
    let file = open(path)?;
    Header::parse(BufReader::new(file))
}

/// Read only the header of a JNRRD file.
pub fn read_header(path: impl AsRef<Path>) -> Result<Header> {
    let (header, _) = parse_file(path.as_ref())?;
    Ok(header)
}

/// Read a JNRRD file, returning the header and the decoded payload.
pub fn read(path: impl AsRef<Path>) -> Result<(Header, Array)> {
    let path = path.as_ref();
    let (header, end) = parse_file(path)?;
    let descriptor = PayloadDescriptor::from_header(&header, Some(&end), Some(path))?;
    let bytes = descriptor.read()?;
    let array = Array::from_parts(descriptor.element, header.sizes()?, bytes)?;
    Ok((header, array))
}

/// Fill in the fields the array itself determines, without clobbering what
/// the caller set: magic, type, dimension, sizes, plus the encoding/endian
/// defaults the reader would assume anyway.
fn prepared_header(header: &Header, array: &Array) -> Result<Header> {
    let mut out = header.clone();
    if out.field("jnrrd").is_none() {
        out.set_field("jnrrd", json!(FORMAT_VERSION));
    }
    if out.field("type").is_none() {
        out.set_field("type", json!(array.element_type().name()));
    }
    if out.field("dimension").is_none() {
        out.set_field("dimension", json!(array.dimension()));
    }
    if out.field("sizes").is_none() {
        out.set_field("sizes", json!(array.sizes()));
    }
    // ascii carries no byte order; everything else (hex included) does
    if out.field("endian").is_none() && out.encoding()? != Encoding::Ascii {
        out.set_field("endian", json!(Endian::native().name()));
    }

    out.validate()?;
    if out.element_type()? != array.element_type() {
        return Err(Error::field(
            "type",
            format!(
                "header declares {}, array holds {}",
                out.element_type()?,
                array.element_type()
            ),
        ));
    }
    if out.sizes()? != array.sizes() {
        return Err(Error::field("sizes", "header sizes disagree with array"));
    }
    Ok(out)
}

/// Write a JNRRD file with an inline payload.
///
/// The header's `encoding` selects the payload encoding (raw when absent).
/// Fields derivable from the array (`type`, `dimension`, `sizes`) are filled
/// in when missing and checked for consistency when present.
pub fn write(path: impl AsRef<Path>, header: &Header, array: &Array) -> Result<()> {
    let path = path.as_ref();
    let mut out = prepared_header(header, array)?;
    // an inline payload follows this very stream
    for stale in ["data_file", "data_files", "data_file_pattern", "line_skip", "byte_skip"] {
        out.remove_field(stale);
    }

    debug!(path = %path.display(), encoding = %out.encoding()?, "writing JNRRD file");
    let mut file = BufWriter::new(File::create(path)?);
    write_header(&mut file, &out)?;
    file.write_all(b"\n")?;
    write_payload(
        &mut file,
        array.element_type(),
        out.encoding()?,
        out.endian()?,
        array.as_bytes(),
    )?;
    file.flush()?;
    Ok(())
}

/// Write a JNRRD header file with its payload in a separate data file.
///
/// When both paths share a directory the header stores the bare file name,
/// keeping the pair relocatable.
pub fn write_detached(
    header_path: impl AsRef<Path>,
    data_path: impl AsRef<Path>,
    header: &Header,
    array: &Array,
) -> Result<()> {
    let header_path = header_path.as_ref();
    let data_path = data_path.as_ref();

    let mut out = prepared_header(header, array)?;
    let locator = if header_path.parent() == data_path.parent() {
        data_path
            .file_name()
            .ok_or_else(|| Error::other("data path has no file name"))?
            .to_string_lossy()
            .into_owned()
    } else {
        data_path.to_string_lossy().into_owned()
    };
    out.set_field("data_file", json!(locator));
    out.remove_field("data_files");
    out.remove_field("data_file_pattern");

    debug!(
        header = %header_path.display(),
        data = %data_path.display(),
        "writing detached JNRRD pair"
    );
    let mut head = BufWriter::new(File::create(header_path)?);
    write_header(&mut head, &out)?;
    head.write_all(b"\n")?;
    head.flush()?;

    let mut data = BufWriter::new(File::create(data_path)?);
    write_payload(
        &mut data,
        array.element_type(),
        out.encoding()?,
        out.endian()?,
        array.as_bytes(),
    )?;
    data.flush()?;
    Ok(())
}
