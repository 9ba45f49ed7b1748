//! YAML data file persistence for the EchoRift zone event.
//!
//! # Modules
//!
//! - [`document`] -- On-disk layout and lenient decoding.
//! - [`file`] -- [`YamlFileStore`], the file-backed persistence boundary.

pub mod document;
pub mod file;

pub use document::DataDocument;
pub use file::YamlFileStore;
