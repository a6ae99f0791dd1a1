//! Core types and service wiring for the sortli recycling assistant.

/// Prompt construction and splitting of generated advice.
pub mod advice;
/// Runtime configuration and API credentials.
pub mod config;
/// Keyword-based bin icon resolution.
pub mod icons;
/// Domain models shared by all providers.
pub mod model;
/// Capture-to-advice pipeline orchestration.
pub mod pipeline;
/// Registry of tools offered to the generator.
pub mod plugin;
/// Traits describing the external service interfaces.
pub mod ports;
/// Recycling rules document loading.
pub mod rules;
/// High-level service facade used by clients.
pub mod service;
/// Tool-augmented nearby-site lookup.
pub mod site_finder;

pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
