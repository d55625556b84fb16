//! Data Transfer Objects (DTOs) for the file transfer service.
//!
//! Wire messages live in `kadai_shared::protocol`; this module holds the
//! store-side DTOs:
//! - `project`: project records as found in seed files
//! - `conversion`: DTO ↔ domain entity conversions

pub mod conversion;
pub mod project;

pub use conversion::ConversionError;
pub use project::ProjectRecord;
