//! Advice generator implementation using Groq's OpenAI-compatible chat API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use sortli_core::{
    config::GeneratorSettings,
    model::{ExchangeTurn, Role, ServiceMeta, ToolCall, ToolExchange, ToolPolicy, ToolSpec},
    ports::{AdviceGeneratorPort, PortError},
};

/// Body of POST /chat/completions
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

/// Chat message as sent and received.
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Tool declaration, always of type "function".
#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionSpec,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

/// Response from /chat/completions
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

fn function_type() -> String {
    "function".to_owned()
}

impl From<&ExchangeTurn> for WireMessage {
    fn from(turn: &ExchangeTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
            tool_calls: turn
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: function_type(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: turn.tool_call_id.clone(),
        }
    }
}

impl From<WireMessage> for ExchangeTurn {
    fn from(message: WireMessage) -> Self {
        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();
        ExchangeTurn {
            role: message.role,
            content: message.content,
            tool_calls,
            tool_call_id: message.tool_call_id,
        }
    }
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function",
            function: WireFunctionSpec {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

/// Advice generator talking to Groq.
pub struct GroqAdviceGenerator {
    client: Client,
    api_key: String,
    settings: GeneratorSettings,
    meta: ServiceMeta,
}

impl GroqAdviceGenerator {
    /// Create a generator bound to the given HTTP client and key.
    #[must_use]
    pub fn new(client: Client, api_key: impl Into<String>, settings: GeneratorSettings) -> Self {
        let meta = ServiceMeta {
            name: String::from("groq"),
            model: settings.model.clone(),
        };
        Self {
            client,
            api_key: api_key.into(),
            settings,
            meta,
        }
    }

    fn build_request(
        &self,
        messages: Vec<WireMessage>,
        tools: &[ToolSpec],
        policy: ToolPolicy,
    ) -> ChatRequest {
        let tool_choice = if tools.is_empty() {
            None
        } else {
            Some(match policy {
                ToolPolicy::Auto => "auto",
                ToolPolicy::None => "none",
            })
        };

        ChatRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: tools.iter().map(WireTool::from).collect(),
            tool_choice,
        }
    }

    async fn complete(&self, body: &ChatRequest) -> Result<WireMessage, PortError> {
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        debug!(
            %url,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat completion"
        );

        let req = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body);

        let resp = fetch_json::<ChatResponse>(req).await?;
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or(PortError::EmptyResponse)?;

        if choice.finish_reason.as_deref() == Some("length") {
            info!("Completion hit the token limit and may be truncated");
        }
        Ok(choice.message)
    }
}

#[async_trait]
impl AdviceGeneratorPort for GroqAdviceGenerator {
    fn service(&self) -> &ServiceMeta {
        &self.meta
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, PortError> {
        let messages = vec![
            WireMessage::from(&ExchangeTurn::system(system)),
            WireMessage::from(&ExchangeTurn::user(prompt)),
        ];
        let body = self.build_request(messages, &[], ToolPolicy::None);

        self.complete(&body)
            .await?
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or(PortError::EmptyResponse)
    }

    async fn converse(
        &self,
        exchange: &ToolExchange,
        tools: &[ToolSpec],
        policy: ToolPolicy,
    ) -> Result<ExchangeTurn, PortError> {
        let messages = exchange.turns().iter().map(WireMessage::from).collect();
        let body = self.build_request(messages, tools, policy);

        let turn = ExchangeTurn::from(self.complete(&body).await?);
        if turn.content.is_none() && !turn.requests_tools() {
            return Err(PortError::EmptyResponse);
        }
        Ok(turn)
    }
}

/// Build the generator port for the given client.
#[must_use]
pub fn generator(
    client: Client,
    api_key: impl Into<String>,
    settings: GeneratorSettings,
) -> Arc<dyn AdviceGeneratorPort> {
    Arc::new(GroqAdviceGenerator::new(client, api_key, settings))
}

// Send a request and decode the JSON body, keeping the error body on failure.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    let resp = req.send().await.map_err(PortError::from)?;
    let status = resp.status();
    let text = resp.text().await.map_err(PortError::from)?;

    if !status.is_success() {
        return Err(PortError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text).map_err(PortError::from)
}
