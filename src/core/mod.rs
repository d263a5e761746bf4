//! Core types and error handling for mdimport.
//!
//! The [`error`] module defines the error taxonomy shared by every stage of
//! the import pipeline, plus [`ErrorContext`] for user-facing display.

pub mod error;

pub use error::{ErrorContext, ImportError, user_friendly_error};
