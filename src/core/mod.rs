//! Core types shared by every rtpm module: the error enum, the user-facing
//! error context and the helpers that classify error chains.

pub mod error;
pub mod error_formatting;

pub use error::{ErrorContext, RtpmError};
pub use error_formatting::{
    find_rtpm_error, is_integrity_error, is_lock_contention, is_permission_denied,
    user_friendly_error,
};
