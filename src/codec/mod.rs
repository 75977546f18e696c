//! Payload encodings and the compression codec bank.
//!
//! Compression backends are selected by the runtime `encoding` tag through a
//! capability table populated once at first use from whichever codecs are
//! compiled into the build. A tag naming a codec this build lacks is a normal,
//! reportable condition ([`Error::UnsupportedEncoding`]), not a crash.

mod endian;

pub use endian::{swap_in_place, Endian};

use crate::util::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use tracing::trace;

/// Payload encoding declared by the header's `encoding` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Uncompressed binary
    Raw,
    /// Whitespace-separated decimal text
    Ascii,
    /// Hexadecimal text
    Hex,
    /// gzip (RFC 1952) compressed binary
    Gzip,
    /// bzip2 compressed binary
    Bzip2,
    /// Zstandard compressed binary
    Zstd,
    /// LZ4 frame compressed binary
    Lz4,
}

impl Encoding {
    /// Canonical header name of this encoding.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Ascii => "ascii",
            Self::Hex => "hex",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Zstd => "zstd",
            Self::Lz4 => "lz4",
        }
    }

    /// Parse an encoding from a header tag, accepting the aliases the
    /// original format allows (`gz`, `bz2`, `text`, `txt`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "raw" => Some(Self::Raw),
            "ascii" | "text" | "txt" => Some(Self::Ascii),
            "hex" => Some(Self::Hex),
            "gzip" | "gz" => Some(Self::Gzip),
            "bzip2" | "bz2" => Some(Self::Bzip2),
            "zstd" => Some(Self::Zstd),
            "lz4" => Some(Self::Lz4),
            _ => None,
        }
    }

    /// Returns true for the text encodings (handled element-by-element by the
    /// payload driver rather than the byte-level codec bank).
    #[inline]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Ascii | Self::Hex)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Encode/decode function pair for one byte-level codec.
struct Codec {
    encode: fn(&[u8], i32) -> Result<Vec<u8>>,
    decode: fn(&[u8], usize) -> Result<Vec<u8>>,
}

/// Capability table, built once on first use.
static CODECS: Lazy<HashMap<Encoding, Codec>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(
        Encoding::Raw,
        Codec {
            encode: raw_encode,
            decode: raw_decode,
        },
    );
    table.insert(
        Encoding::Gzip,
        Codec {
            encode: gzip_encode,
            decode: gzip_decode,
        },
    );
    #[cfg(feature = "bzip2")]
    table.insert(
        Encoding::Bzip2,
        Codec {
            encode: bzip2_encode,
            decode: bzip2_decode,
        },
    );
    #[cfg(feature = "zstd")]
    table.insert(
        Encoding::Zstd,
        Codec {
            encode: zstd_encode,
            decode: zstd_decode,
        },
    );
    #[cfg(feature = "lz4")]
    table.insert(
        Encoding::Lz4,
        Codec {
            encode: lz4_encode,
            decode: lz4_decode,
        },
    );
    table
});

fn lookup(encoding: Encoding) -> Result<&'static Codec> {
    CODECS
        .get(&encoding)
        .ok_or_else(|| Error::UnsupportedEncoding(encoding.name().to_string()))
}

/// Returns true if this build can encode and decode the given encoding.
pub fn is_available(encoding: Encoding) -> bool {
    encoding.is_text() || CODECS.contains_key(&encoding)
}

/// Compress `data` with the named codec.
///
/// `level` follows each backend's own scale; values outside the backend's
/// range are clamped by the backend.
pub fn encode(encoding: Encoding, data: &[u8], level: i32) -> Result<Vec<u8>> {
    trace!(encoding = encoding.name(), len = data.len(), "encode payload");
    (lookup(encoding)?.encode)(data, level)
}

/// Decompress `data`, which must expand to exactly `expected` bytes.
///
/// A shorter result (truncated or corrupt input) or a longer one is a
/// [`Error::PayloadLengthMismatch`], never a silently sized buffer.
pub fn decode(encoding: Encoding, data: &[u8], expected: usize) -> Result<Vec<u8>> {
    trace!(
        encoding = encoding.name(),
        len = data.len(),
        expected,
        "decode payload"
    );
    (lookup(encoding)?.decode)(data, expected)
}

fn check_len(out: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
    if out.len() != expected {
        return Err(Error::PayloadLengthMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Map a mid-stream decoder failure: a short output means truncation.
fn decode_failure(err: std::io::Error, produced: usize, expected: usize) -> Error {
    if produced < expected {
        Error::PayloadLengthMismatch {
            expected,
            actual: produced,
        }
    } else {
        Error::Compression(err.to_string())
    }
}

// === raw ===

fn raw_encode(data: &[u8], _level: i32) -> Result<Vec<u8>> {
    Ok(data.to_vec())
}

fn raw_decode(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    if data.len() < expected {
        return Err(Error::PayloadLengthMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok(data[..expected].to_vec())
}

// === gzip (flate2) ===

fn gzip_encode(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let level = flate2::Compression::new(level.clamp(0, 9) as u32);
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), level);
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn gzip_decode(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::with_capacity(expected);
    match decoder.read_to_end(&mut out) {
        Ok(_) => check_len(out, expected),
        Err(e) => Err(decode_failure(e, out.len(), expected)),
    }
}

// === bzip2 ===

#[cfg(feature = "bzip2")]
fn bzip2_encode(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let level = bzip2::Compression::new(level.clamp(1, 9) as u32);
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), level);
    encoder.write_all(data)?;
    encoder.finish().map_err(|e| Error::Compression(e.to_string()))
}

#[cfg(feature = "bzip2")]
fn bzip2_decode(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut decoder = bzip2::read::BzDecoder::new(data);
    let mut out = Vec::with_capacity(expected);
    match decoder.read_to_end(&mut out) {
        Ok(_) => check_len(out, expected),
        Err(e) => Err(decode_failure(e, out.len(), expected)),
    }
}

// === zstd ===

#[cfg(feature = "zstd")]
fn zstd_encode(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut encoder = zstd::stream::Encoder::new(Vec::new(), level.clamp(1, 22))
        .map_err(|e| Error::Compression(e.to_string()))?;
    encoder.write_all(data)?;
    encoder.finish().map_err(|e| Error::Compression(e.to_string()))
}

#[cfg(feature = "zstd")]
fn zstd_decode(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut decoder =
        zstd::stream::Decoder::new(data).map_err(|e| Error::Compression(e.to_string()))?;
    let mut out = Vec::with_capacity(expected);
    match decoder.read_to_end(&mut out) {
        Ok(_) => check_len(out, expected),
        Err(e) => Err(decode_failure(e, out.len(), expected)),
    }
}

// === lz4 (frame format) ===

#[cfg(feature = "lz4")]
fn lz4_encode(data: &[u8], _level: i32) -> Result<Vec<u8>> {
    let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
    encoder.write_all(data)?;
    encoder.finish().map_err(|e| Error::Compression(e.to_string()))
}

#[cfg(feature = "lz4")]
fn lz4_decode(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut decoder = lz4_flex::frame::FrameDecoder::new(data);
    let mut out = Vec::with_capacity(expected);
    match decoder.read_to_end(&mut out) {
        Ok(_) => check_len(out, expected),
        Err(e) => Err(decode_failure(e, out.len(), expected)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"The quick brown fox jumps over the lazy dog. "
            .repeat(64)
            .to_vec()
    }

    fn roundtrip(encoding: Encoding) {
        let data = sample();
        let packed = encode(encoding, &data, 6).unwrap();
        let unpacked = decode(encoding, &packed, data.len()).unwrap();
        assert_eq!(unpacked, data, "{encoding} round-trip");
    }

    #[test]
    fn test_raw_roundtrip() {
        roundtrip(Encoding::Raw);
    }

    #[test]
    fn test_gzip_roundtrip() {
        roundtrip(Encoding::Gzip);
        let data = sample();
        let packed = encode(Encoding::Gzip, &data, 6).unwrap();
        assert!(packed.len() < data.len());
    }

    #[cfg(feature = "bzip2")]
    #[test]
    fn test_bzip2_roundtrip() {
        roundtrip(Encoding::Bzip2);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_zstd_roundtrip() {
        roundtrip(Encoding::Zstd);
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn test_lz4_roundtrip() {
        roundtrip(Encoding::Lz4);
    }

    #[test]
    fn test_truncated_gzip_is_length_mismatch() {
        let data = sample();
        let packed = encode(Encoding::Gzip, &data, 6).unwrap();
        let truncated = &packed[..packed.len() / 2];
        let err = decode(Encoding::Gzip, truncated, data.len()).unwrap_err();
        assert!(
            matches!(err, Error::PayloadLengthMismatch { .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_raw_short_is_length_mismatch() {
        let err = decode(Encoding::Raw, &[1, 2, 3], 8).unwrap_err();
        assert!(matches!(
            err,
            Error::PayloadLengthMismatch {
                expected: 8,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_wrong_expected_length_rejected() {
        let data = sample();
        let packed = encode(Encoding::Gzip, &data, 6).unwrap();
        let err = decode(Encoding::Gzip, &packed, data.len() - 1).unwrap_err();
        assert!(matches!(err, Error::PayloadLengthMismatch { .. }));
    }

    #[test]
    fn test_encoding_aliases() {
        assert_eq!(Encoding::from_name("gz"), Some(Encoding::Gzip));
        assert_eq!(Encoding::from_name("bz2"), Some(Encoding::Bzip2));
        assert_eq!(Encoding::from_name("text"), Some(Encoding::Ascii));
        assert_eq!(Encoding::from_name("txt"), Some(Encoding::Ascii));
        assert_eq!(Encoding::from_name("deflate"), None);
    }

    #[test]
    fn test_text_encodings_not_in_bank() {
        assert!(is_available(Encoding::Ascii));
        assert!(is_available(Encoding::Hex));
        assert!(lookup(Encoding::Ascii).is_err());
    }
}
