//! Core data models for the geotagged media archive.
//!
//! `ArchiveRecord` is the single persisted entity; `FileEntry` and `Marker`
//! are its read projections for the list and map views. Everything
//! serializes naturally as JSON via `serde`.

pub mod archive;
