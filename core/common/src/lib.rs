//! Common utilities and types shared across CipherKeep modules.
//!
//! Everything here is used by both the client and the server side:
//! the error taxonomy, validation failures, and record identifiers.

pub mod error;
pub mod types;
pub mod validation;

pub use error::{Error, Result};
pub use types::{RecordId, SensitiveBytes, UserId};
pub use validation::ValidationError;
