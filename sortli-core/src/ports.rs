//! Traits describing the hosted services sortli talks to, plus their shared error type.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;

use crate::model::{
    CapturedImage, ExchangeTurn, ServiceMeta, ToolCall, ToolExchange, ToolPolicy, ToolSpec,
};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to an external service.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Service answered with a non-success status.
    #[error("Service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] SerdeJsonError),
    /// No image data was supplied.
    #[error("Image is empty")]
    EmptyImage,
    /// The service answered without any usable content.
    #[error("Service returned no content")]
    EmptyResponse,
    /// The model requested a tool that is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// Tool arguments did not match the declared schema.
    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),
    /// Internal adapter error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Image-understanding backend listing the items in a photo.
pub trait ImageClassifierPort: Send + Sync {
    /// Service and model behind this port.
    fn service(&self) -> &ServiceMeta;

    /// Identify the recyclable items in the image.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::EmptyImage`] for empty input, or another [`PortError`] when
    /// the request fails.
    async fn identify(&self, image: &CapturedImage) -> Result<String, PortError>;
}

#[async_trait]
/// Chat-completion backend producing disposal advice.
pub trait AdviceGeneratorPort: Send + Sync {
    /// Service and model behind this port.
    fn service(&self) -> &ServiceMeta;

    /// Produce a completion for a system instruction and a user prompt.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the reply is empty.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, PortError>;

    /// Continue a tool-augmented exchange and return the assistant's next turn.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the reply is empty.
    async fn converse(
        &self,
        exchange: &ToolExchange,
        tools: &[ToolSpec],
        policy: ToolPolicy,
    ) -> Result<ExchangeTurn, PortError>;
}

#[async_trait]
/// A tool the generator can ask sortli to run.
pub trait ToolExecutorPort: Send + Sync {
    /// Declaration advertised to the generator.
    fn spec(&self) -> &ToolSpec;

    /// Run the tool for the given call and return its textual result.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the arguments are invalid or the backend fails.
    async fn execute(&self, call: &ToolCall) -> Result<String, PortError>;
}
