//! Image pipeline for catalog pictures
//!
//! Decodes embedded `data:...;base64,` payloads, resizes them to fit the
//! configured bounding box, and re-encodes them as JPEG for storage.

mod pipeline;

pub use pipeline::{is_remote_url, process_data_uri, ProcessedImage};
