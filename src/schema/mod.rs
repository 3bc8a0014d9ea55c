//! Schema ingestion: the snapshot's self-describing field layout.

pub mod layout;
pub mod meta;

pub use layout::{EdgeLayout, NO_TAG, NodeLayout, SampleLayout, SnapshotLayout};
pub use meta::{FieldTypes, SnapshotHeader, SnapshotMeta};
