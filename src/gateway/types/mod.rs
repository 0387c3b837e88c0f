//! Gateway types module
//!
//! ## Submodules
//! - [`response`]: `ApiResponse<T>` envelope and error codes
//! - [`error`]: `ApiError`, the single domain-error → HTTP translator

pub mod error;
pub mod response;

pub use error::{ApiError, ApiResult, accepted, created, ok};
pub use response::{ApiResponse, error_codes};
