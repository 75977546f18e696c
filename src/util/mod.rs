//! Utility types for JNRRD.
//!
//! This module contains fundamental types used throughout the library:
//! - [`ElementType`] / [`JnrrdElement`] - payload scalar types
//! - [`Error`] / [`Result`] - error handling

mod element;
mod error;

pub use element::*;
pub use error::*;
