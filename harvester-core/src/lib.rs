pub mod common;
pub mod domain;
pub mod importer;
pub mod storage;

pub use domain::*;
pub use importer::EventImporter;
