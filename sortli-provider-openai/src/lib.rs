//! Image classifier implementation using the OpenAI chat completions API.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sortli_core::{
    config::ClassifierSettings,
    model::{CapturedImage, ServiceMeta},
    ports::{ImageClassifierPort, PortError},
};

/// Instruction sent alongside the photo.
pub const CLASSIFY_INSTRUCTION: &str = "List the recyclable items you see in this image. Format your response as a comma-separated list of items.";

/// Body of POST /chat/completions
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

/// Multimodal message part, tagged by "type".
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Response from /chat/completions
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    // usage and ids are not needed
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Photo classifier talking to OpenAI.
pub struct OpenAiImageClassifier {
    client: Client,
    api_key: String,
    settings: ClassifierSettings,
    meta: ServiceMeta,
}

impl OpenAiImageClassifier {
    /// Create a classifier bound to the given HTTP client and key.
    #[must_use]
    pub fn new(client: Client, api_key: impl Into<String>, settings: ClassifierSettings) -> Self {
        let meta = ServiceMeta {
            name: String::from("openai"),
            model: settings.model.clone(),
        };
        Self {
            client,
            api_key: api_key.into(),
            settings,
            meta,
        }
    }

    fn build_request(&self, image: &CapturedImage) -> ChatRequest {
        let encoded = general_purpose::STANDARD.encode(image.bytes());
        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: CLASSIFY_INSTRUCTION.to_owned(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{encoded}"),
                        },
                    },
                ],
            }],
            max_tokens: self.settings.max_tokens,
        }
    }
}

#[async_trait]
impl ImageClassifierPort for OpenAiImageClassifier {
    fn service(&self) -> &ServiceMeta {
        &self.meta
    }

    async fn identify(&self, image: &CapturedImage) -> Result<String, PortError> {
        if image.is_empty() {
            return Err(PortError::EmptyImage);
        }

        let body = self.build_request(image);
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        debug!(%url, bytes = image.bytes().len(), "Sending image to classifier");

        let req = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body);

        let resp = fetch_json::<ChatResponse>(req).await?;
        first_text(resp)
    }
}

/// Build the classifier port for the given client.
#[must_use]
pub fn classifier(
    client: Client,
    api_key: impl Into<String>,
    settings: ClassifierSettings,
) -> Arc<dyn ImageClassifierPort> {
    Arc::new(OpenAiImageClassifier::new(client, api_key, settings))
}

fn first_text(resp: ChatResponse) -> Result<String, PortError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(PortError::EmptyResponse)
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

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn classifier_under_test() -> OpenAiImageClassifier {
        OpenAiImageClassifier::new(Client::new(), "sk-test", ClassifierSettings::default())
    }

    #[test]
    fn request_carries_instruction_and_data_url() {
        let classifier = classifier_under_test();
        let image = CapturedImage::new(b"jpeg".to_vec());

        let body: Value = serde_json::to_value(classifier.build_request(&image)).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "gpt-4o-mini",
                "max_tokens": 300,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": CLASSIFY_INSTRUCTION},
                        {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,anBlZw=="}}
                    ]
                }]
            })
        );
    }

    #[test]
    fn first_choice_text_is_returned() {
        let resp: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "plastic bottle, newspaper"}}]
        }))
        .unwrap();

        assert_eq!(first_text(resp).unwrap(), "plastic bottle, newspaper");
    }

    #[test]
    fn missing_content_is_empty_response() {
        let resp: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap();

        assert!(matches!(first_text(resp), Err(PortError::EmptyResponse)));
        assert!(matches!(
            first_text(ChatResponse { choices: Vec::new() }),
            Err(PortError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn empty_image_is_rejected_before_any_request() {
        let classifier = classifier_under_test();

        let result = classifier.identify(&CapturedImage::new(Vec::new())).await;

        assert!(matches!(result, Err(PortError::EmptyImage)));
    }
}
