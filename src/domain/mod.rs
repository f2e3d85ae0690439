pub mod compressor;
pub mod records;

pub use compressor::*;
pub use records::{build_observations, validate_records, FieldFailure, RecordValidationError};
