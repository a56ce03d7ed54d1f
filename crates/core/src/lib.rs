//! Core types and traits for the speech synthesis pipeline
//!
//! This crate defines:
//! - The error taxonomy shared by every stage
//! - Language tags for the supported text front-ends
//! - Request, text, conditioning and audio data types
//! - Collaborator traits at the pipeline boundaries (model execution,
//!   artifact storage, acoustic embedding, linguistic features)

pub mod error;
pub mod language;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, ErrorResponse, Result};
pub use language::LanguageTag;
pub use traits::*;
pub use types::*;
