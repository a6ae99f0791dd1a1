//! Tool-augmented lookup of nearby recycling and collection sites.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::model::{ExchangeTurn, ToolExchange, ToolPolicy};
use crate::plugin::ToolRegistry;
use crate::ports::{AdviceGeneratorPort, PortError};

const SYSTEM_PROMPT: &str = "You are a recycling assistant that helps people find nearby recycling centers, collection points and pharmacies.";

/// Instruction appended before the final round; the generator must answer from the
/// tool results it already has.
pub const NO_MORE_TOOLS_INSTRUCTION: &str = "You now have the tool results. Do not call any more tools. Answer the user's question using only the results above.";

#[derive(thiserror::Error, Debug)]
/// Failures of a site-finder invocation.
pub enum SiteFinderError {
    /// The first request failed.
    #[error("Error searching for nearby sites: {0}")]
    Round1(#[source] PortError),
    /// A requested tool could not be run.
    #[error("Error running search tool: {0}")]
    Tool(#[source] PortError),
    /// The final request failed.
    #[error("Error generating site list: {0}")]
    Round2(#[source] PortError),
    /// The generator kept asking for tools after being told not to.
    #[error("Error generating site list: the assistant requested more tools")]
    ToolsAfterFinalRound,
    /// The generator returned no text.
    #[error("Error generating site list: empty answer")]
    EmptyAnswer,
}

/// Builds the user query for a location.
#[must_use]
pub fn site_query(location: &str) -> String {
    format!(
        "Find recycling centers and waste collection points near {location}. List names, addresses and what they accept."
    )
}

/// Two-round tool exchange with the advice generator.
pub struct SiteFinder {
    generator: Arc<dyn AdviceGeneratorPort>,
    tools: Arc<ToolRegistry>,
}

impl SiteFinder {
    /// Create a site finder using the generator and the registered tools.
    #[must_use]
    pub fn new(generator: Arc<dyn AdviceGeneratorPort>, tools: Arc<ToolRegistry>) -> Self {
        Self { generator, tools }
    }

    /// Ask for collection sites near `location`, running tools if the generator asks.
    ///
    /// # Errors
    ///
    /// Returns a [`SiteFinderError`] if either round or a tool run fails. No partial
    /// answer is returned.
    pub async fn find_nearby(&self, location: &str) -> Result<String, SiteFinderError> {
        let specs = self.tools.specs();
        let mut exchange = ToolExchange::new();
        exchange.push(ExchangeTurn::system(SYSTEM_PROMPT));
        exchange.push(ExchangeTurn::user(site_query(location)));

        debug!(location, tools = specs.len(), "Site finder round 1");
        let reply = self
            .generator
            .converse(&exchange, &specs, ToolPolicy::Auto)
            .await
            .map_err(SiteFinderError::Round1)?;

        if !reply.requests_tools() {
            info!("Site finder answered without tools");
            return final_text(reply);
        }

        let calls = reply.tool_calls.clone();
        exchange.push(reply);
        for call in &calls {
            debug!(tool = %call.name, arguments = %call.arguments, "Running tool");
            let tool = self.tools.tool(&call.name).map_err(SiteFinderError::Tool)?;
            let output = tool.execute(call).await.map_err(SiteFinderError::Tool)?;
            exchange.push(ExchangeTurn::tool_result(call.id.clone(), output));
        }
        exchange.push(ExchangeTurn::system(NO_MORE_TOOLS_INSTRUCTION));

        debug!(turns = exchange.turns().len(), "Site finder round 2");
        let answer = self
            .generator
            .converse(&exchange, &specs, ToolPolicy::None)
            .await
            .map_err(SiteFinderError::Round2)?;

        if answer.requests_tools() {
            warn!("Generator requested tools in the final round");
            return Err(SiteFinderError::ToolsAfterFinalRound);
        }
        info!(tool_runs = calls.len(), "Site finder answered");
        final_text(answer)
    }
}

fn final_text(turn: ExchangeTurn) -> Result<String, SiteFinderError> {
    turn.content
        .filter(|text| !text.trim().is_empty())
        .ok_or(SiteFinderError::EmptyAnswer)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::model::{Role, ServiceMeta, ToolCall, ToolSpec};
    use crate::ports::ToolExecutorPort;

    struct ScriptedGenerator {
        meta: ServiceMeta,
        replies: Mutex<VecDeque<Result<ExchangeTurn, PortError>>>,
        requests: Mutex<Vec<(ToolExchange, ToolPolicy)>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<ExchangeTurn, PortError>>) -> Self {
            Self {
                meta: ServiceMeta {
                    name: "fake".to_owned(),
                    model: "chat".to_owned(),
                },
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AdviceGeneratorPort for ScriptedGenerator {
        fn service(&self) -> &ServiceMeta {
            &self.meta
        }

        async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, PortError> {
            Err(PortError::Internal("not used".to_owned()))
        }

        async fn converse(
            &self,
            exchange: &ToolExchange,
            _tools: &[ToolSpec],
            policy: ToolPolicy,
        ) -> Result<ExchangeTurn, PortError> {
            self.requests
                .lock()
                .unwrap()
                .push((exchange.clone(), policy));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(PortError::EmptyResponse))
        }
    }

    struct CannedSearch {
        spec: ToolSpec,
    }

    #[async_trait]
    impl ToolExecutorPort for CannedSearch {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, _call: &ToolCall) -> Result<String, PortError> {
            Ok("Ecocentro Nord, Via Roma 1".to_owned())
        }
    }

    struct BrokenSearch {
        spec: ToolSpec,
    }

    #[async_trait]
    impl ToolExecutorPort for BrokenSearch {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, _call: &ToolCall) -> Result<String, PortError> {
            Err(PortError::Status {
                status: 503,
                body: "search unavailable".to_owned(),
            })
        }
    }

    fn search_spec() -> ToolSpec {
        ToolSpec {
            name: "web_search".to_owned(),
            description: "Search the web".to_owned(),
            parameters: json!({"type": "object"}),
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new(vec![Arc::new(CannedSearch {
            spec: search_spec(),
        })]))
    }

    fn search_call(name: &str) -> ExchangeTurn {
        ExchangeTurn::assistant(
            None,
            vec![ToolCall {
                id: "call_1".to_owned(),
                name: name.to_owned(),
                arguments: r#"{"query":"recycling centers Milan"}"#.to_owned(),
            }],
        )
    }

    #[tokio::test]
    async fn tool_call_round_trip() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(search_call("web_search")),
            Ok(ExchangeTurn::assistant(
                Some("Ecocentro Nord accepts electronics.".to_owned()),
                Vec::new(),
            )),
        ]));
        let finder = SiteFinder::new(
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
            registry(),
        );

        let answer = finder.find_nearby("Milan, Italy").await.unwrap();

        assert_eq!(answer, "Ecocentro Nord accepts electronics.");
        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);

        let (first, first_policy) = requests.first().unwrap();
        assert_eq!(*first_policy, ToolPolicy::Auto);
        assert_eq!(first.count_role(Role::Tool), 0);

        let (second, second_policy) = requests.get(1).unwrap();
        assert_eq!(*second_policy, ToolPolicy::None);
        assert_eq!(second.count_role(Role::Tool), 1);
        let tool_turn = second
            .turns()
            .iter()
            .find(|turn| turn.role == Role::Tool)
            .unwrap();
        assert_eq!(tool_turn.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(
            tool_turn.content.as_deref(),
            Some("Ecocentro Nord, Via Roma 1")
        );
        let last = second.turns().last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content.as_deref(), Some(NO_MORE_TOOLS_INSTRUCTION));
    }

    #[tokio::test]
    async fn direct_answer_skips_second_round() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(ExchangeTurn::assistant(
            Some("Try the municipal eco-center.".to_owned()),
            Vec::new(),
        ))]));
        let finder = SiteFinder::new(
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
            registry(),
        );

        let answer = finder.find_nearby("Milan, Italy").await.unwrap();

        assert_eq!(answer, "Try the municipal eco-center.");
        assert_eq!(generator.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn round_one_failure_is_reported() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(PortError::Status {
            status: 401,
            body: "invalid key".to_owned(),
        })]));
        let finder = SiteFinder::new(generator, registry());

        let result = finder.find_nearby("Milan, Italy").await;

        assert!(matches!(result, Err(SiteFinderError::Round1(_))));
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_second_round() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(search_call("weather"))]));
        let finder = SiteFinder::new(
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
            registry(),
        );

        let result = finder.find_nearby("Milan, Italy").await;

        assert!(matches!(
            result,
            Err(SiteFinderError::Tool(PortError::UnknownTool(_)))
        ));
        assert_eq!(generator.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tools_in_final_round_are_rejected() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(search_call("web_search")),
            Ok(search_call("web_search")),
        ]));
        let finder = SiteFinder::new(generator, registry());

        let result = finder.find_nearby("Milan, Italy").await;

        assert!(matches!(result, Err(SiteFinderError::ToolsAfterFinalRound)));
    }

    #[tokio::test]
    async fn failing_tool_stops_before_second_round() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(search_call("web_search")),
            Ok(ExchangeTurn::assistant(Some("unused".to_owned()), Vec::new())),
        ]));
        let tools = Arc::new(ToolRegistry::new(vec![Arc::new(BrokenSearch {
            spec: search_spec(),
        })]));
        let finder = SiteFinder::new(
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
            tools,
        );

        let result = finder.find_nearby("Milan, Italy").await;

        assert!(matches!(
            result,
            Err(SiteFinderError::Tool(PortError::Status { status: 503, .. }))
        ));
        assert_eq!(generator.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn round_two_failure_is_reported() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(search_call("web_search")),
            Err(PortError::Status {
                status: 500,
                body: "upstream error".to_owned(),
            }),
        ]));
        let finder = SiteFinder::new(
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
            registry(),
        );

        let result = finder.find_nearby("Milan, Italy").await;

        assert!(matches!(
            result,
            Err(SiteFinderError::Round2(PortError::Status { status: 500, .. }))
        ));
        assert_eq!(generator.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_final_answer_is_rejected() {
        for content in [None, Some("  \n ".to_owned())] {
            let generator = Arc::new(ScriptedGenerator::new(vec![
                Ok(search_call("web_search")),
                Ok(ExchangeTurn::assistant(content, Vec::new())),
            ]));
            let finder = SiteFinder::new(generator, registry());

            let result = finder.find_nearby("Milan, Italy").await;

            assert!(matches!(result, Err(SiteFinderError::EmptyAnswer)));
        }
    }
}
