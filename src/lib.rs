//! # JNRRD
//!
//! Rust implementation of the JNRRD (.jnrrd) scientific array format: a
//! line-delimited JSON-record header followed by a raw or compressed binary
//! payload describing an n-dimensional sampled array and its physical
//! coordinate mapping.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (element types, errors)
//! - [`header`] - Header model, record reader, path/merge machinery, writer
//! - [`codec`] - Payload encodings, compression codec bank, byte order
//! - [`geom`] - Voxel-to-physical geometry derivation
//! - [`data`] - Payload resolution and decode/encode driver
//! - [`array`] - Typed payload buffer
//! - [`file`] - High-level read/write entry points
//!
//! ## Example
//!
//! ```ignore
//! let (header, array) = jnrrd::read("volume.jnrrd")?;
//!
//! let voxels: &[f32] = array.as_slice()?;
//! let geometry = jnrrd::Geometry::from_header(&header)?;
//! println!("origin: {:?}", geometry.origin());
//! ```

pub mod array;
pub mod codec;
pub mod data;
pub mod file;
pub mod geom;
pub mod header;
pub mod util;

// Re-export commonly used types
pub use array::Array;
pub use file::{read, read_header, write, write_detached};
pub use geom::{Geometry, ImagingGeometry};
pub use header::Header;
pub use util::{ElementType, Error, JnrrdElement, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::array::Array;
    pub use crate::codec::{Encoding, Endian};
    pub use crate::data::{DataSource, PayloadDescriptor};
    pub use crate::file::{read, read_header, write, write_detached};
    pub use crate::geom::{slice_sort_key, Geometry, ImagingGeometry, SlicePositions};
    pub use crate::header::{Header, HeaderEnd, RecordReader};
    pub use crate::util::{ElementType, Error, JnrrdElement, Result};
}
