//! Open Packaging Convention (OPC) layer.
//!
//! Handles the physical package: zip container, part map with dirty
//! tracking, pack URIs, relationships, and the content-type manifest.
//! Format-level semantics (slides, notes, media) live in [`crate::pptx`].

pub mod constants;
pub mod error;
pub mod package;
pub mod packuri;
pub mod rels;

pub use error::{OpcError, Result};
pub use package::Package;
pub use packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
pub use rels::{Relationship, Relationships};
