//! Identity-document field extraction from OCR text.
//!
//! The OCR text is wrapped in an extraction prompt, sent to a chat-completion
//! model, and the JSON object in the reply is normalized into a fixed
//! eight-field [`models::IdentityRecord`]. [`server`] exposes the pipeline
//! over HTTP.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod normalize;
pub mod prompt;
pub mod ratelimit;
pub mod response;
pub mod server;
pub mod service;

pub use config::{Config, LlmConfig, ServerConfig};
pub use error::{ErrorKind, ExtractionError};
pub use gateway::{CompletionGateway, MistralGateway};
pub use models::{ExtractionResult, IdentityRecord};
pub use service::ExtractionService;
