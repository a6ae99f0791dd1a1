//! Web search tool using the DuckDuckGo Instant Answer API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use sortli_core::{
    model::{ToolCall, ToolSpec},
    ports::{PortError, ToolExecutorPort},
};

const BASE_URL: &str = "https://api.duckduckgo.com/";
const MAX_TOPICS: usize = 5;

/// Function name the generator uses to call this tool.
pub const TOOL_NAME: &str = "web_search";

/// Arguments the generator passes to the tool.
#[derive(Debug, Deserialize)]
struct SearchArguments {
    query: String,
}

/// Response from the Instant Answer endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Related topic entry; grouped entries carry no text and are skipped.
#[derive(Debug, Default, Deserialize)]
struct RelatedTopic {
    #[serde(default, rename = "Text")]
    text: String,
    #[serde(default, rename = "FirstURL")]
    first_url: String,
}

/// `web_search` tool backed by DuckDuckGo.
pub struct WebSearchTool {
    client: Client,
    spec: ToolSpec,
}

impl WebSearchTool {
    /// Create the tool bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            spec: tool_spec(),
        }
    }
}

#[async_trait]
impl ToolExecutorPort for WebSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, PortError> {
        let query = parse_query(&call.arguments)?;
        debug!(%query, "Running web search");

        let answer = self
            .client
            .get(BASE_URL)
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(PortError::from)?
            .error_for_status()
            .map_err(PortError::from)?
            .json::<InstantAnswer>()
            .await
            .map_err(PortError::from)?;

        Ok(summarize(&query, &answer))
    }
}

/// Build the tool port for the given client.
#[must_use]
pub fn tool(client: Client) -> Arc<dyn ToolExecutorPort> {
    Arc::new(WebSearchTool::new(client))
}

fn tool_spec() -> ToolSpec {
    ToolSpec {
        name: TOOL_NAME.to_owned(),
        description: "Search the web for up-to-date information such as recycling centers, collection points and their opening hours.".to_owned(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search terms, including the town or area"
                }
            },
            "required": ["query"]
        }),
    }
}

fn parse_query(arguments: &str) -> Result<String, PortError> {
    let args: SearchArguments = serde_json::from_str(arguments)
        .map_err(|err| PortError::InvalidToolArguments(err.to_string()))?;
    let query = args.query.trim();
    if query.is_empty() {
        return Err(PortError::InvalidToolArguments("query is empty".to_owned()));
    }
    Ok(query.to_owned())
}

/// Flatten an instant answer into plain text for the generator.
fn summarize(query: &str, answer: &InstantAnswer) -> String {
    let mut lines = Vec::new();

    if !answer.heading.is_empty() {
        lines.push(answer.heading.clone());
    }
    if !answer.answer.is_empty() {
        lines.push(answer.answer.clone());
    }
    if !answer.abstract_text.is_empty() {
        lines.push(format!("{} ({})", answer.abstract_text, answer.abstract_url));
    }
    lines.extend(
        answer
            .related_topics
            .iter()
            .filter(|topic| !topic.text.is_empty())
            .take(MAX_TOPICS)
            .map(|topic| format!("- {} ({})", topic.text, topic.first_url)),
    );

    if lines.is_empty() {
        format!("No results found for \"{query}\".")
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_declares_query_argument() {
        let spec = tool_spec();
        assert_eq!(spec.name, TOOL_NAME);
        assert_eq!(spec.parameters["required"], json!(["query"]));
    }

    #[test]
    fn arguments_must_carry_a_query() {
        assert_eq!(
            parse_query(r#"{"query": " eco center Milan "}"#).unwrap(),
            "eco center Milan"
        );
        assert!(matches!(
            parse_query(r#"{"query": ""}"#),
            Err(PortError::InvalidToolArguments(_))
        ));
        assert!(matches!(
            parse_query("not json"),
            Err(PortError::InvalidToolArguments(_))
        ));
    }

    #[test]
    fn summary_lists_abstract_and_topics() {
        let answer: InstantAnswer = serde_json::from_value(json!({
            "Heading": "Recycling in Milan",
            "AbstractText": "AMSA runs the eco-centers.",
            "AbstractURL": "https://example.org/amsa",
            "Answer": "",
            "RelatedTopics": [
                {"Text": "Ecocentro Olgettina", "FirstURL": "https://example.org/olgettina"},
                {"Name": "Group", "Topics": []}
            ]
        }))
        .unwrap();

        assert_eq!(
            summarize("eco center Milan", &answer),
            "Recycling in Milan\nAMSA runs the eco-centers. (https://example.org/amsa)\n- Ecocentro Olgettina (https://example.org/olgettina)"
        );
    }

    #[test]
    fn empty_answer_says_so() {
        assert_eq!(
            summarize("nowhere", &InstantAnswer::default()),
            "No results found for \"nowhere\"."
        );
    }

    #[test]
    fn summary_keeps_answer_and_caps_topics() {
        let topics: Vec<_> = (1..=7)
            .map(|index| json!({"Text": format!("Site {index}"), "FirstURL": format!("https://example.org/{index}")}))
            .collect();
        let answer: InstantAnswer = serde_json::from_value(json!({
            "Answer": "Open daily",
            "RelatedTopics": topics
        }))
        .unwrap();

        let summary = summarize("eco center", &answer);

        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 1 + MAX_TOPICS);
        assert_eq!(lines.first(), Some(&"Open daily"));
        assert_eq!(lines.last(), Some(&"- Site 5 (https://example.org/5)"));
        assert!(!summary.ends_with('\n'));
    }
}
