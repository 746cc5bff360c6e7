pub mod csv_export;
pub mod csv_import;
pub mod envelope;
pub mod file;
pub mod migrate;
pub mod store;

pub use envelope::{apply_import, export_json, parse_import, ImportError, ImportMode, Imported};
pub use store::{FileStore, MemoryStore, ProjectStore, Snapshot, StoreError};
