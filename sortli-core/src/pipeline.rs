//! Orchestrates classifier, generator, and icon resolution for one captured image.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::advice;
use crate::model::{CapturedImage, Session};
use crate::ports::{AdviceGeneratorPort, ImageClassifierPort, PortError};
use crate::rules::RulesStore;

/// Prefix a service uses to report failure inside an otherwise successful reply.
pub const FAILURE_MARKER: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Stage of a pipeline run.
pub enum PipelineState {
    /// Nothing in progress.
    Idle,
    /// Waiting for the user to capture an image.
    AwaitingImage,
    /// Image classifier is running.
    Classifying,
    /// Advice generator is running.
    Generating,
    /// Advice is being split and matched to icons.
    Rendering,
    /// A stage failed; the run stops here.
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineState::Idle => "idle",
            PipelineState::AwaitingImage => "waiting for image",
            PipelineState::Classifying => "analyzing image",
            PipelineState::Generating => "generating advice",
            PipelineState::Rendering => "rendering",
            PipelineState::Failed => "failed",
        };
        write!(formatter, "{label}")
    }
}

#[derive(thiserror::Error, Debug)]
/// Failures that end a pipeline run.
pub enum PipelineError {
    /// The classifier call failed.
    #[error("Error analyzing image: {0}")]
    Classifier(#[source] PortError),
    /// The classifier answered with an in-band error message.
    #[error("{0}")]
    ClassifierReportedError(String),
    /// The generator call failed.
    #[error("Error generating response: {0}")]
    Generator(#[source] PortError),
}

/// Two-stage recognition-to-advice workflow.
pub struct Pipeline {
    rules: Arc<RulesStore>,
    classifier: Arc<dyn ImageClassifierPort>,
    generator: Arc<dyn AdviceGeneratorPort>,
}

impl Pipeline {
    /// Create a pipeline over loaded rules and the two service ports.
    #[must_use]
    pub fn new(
        rules: Arc<RulesStore>,
        classifier: Arc<dyn ImageClassifierPort>,
        generator: Arc<dyn AdviceGeneratorPort>,
    ) -> Self {
        Self {
            rules,
            classifier,
            generator,
        }
    }

    /// Run classifier, generator, and icon resolution for one image.
    ///
    /// `observer` is told about every state the run enters. After a failure it sees
    /// [`PipelineState::Failed`] followed by [`PipelineState::Idle`] and no later stage
    /// is started.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] for the first stage that fails.
    pub async fn analyze<F>(
        &self,
        image: CapturedImage,
        mut observer: F,
    ) -> Result<Session, PipelineError>
    where
        F: FnMut(PipelineState),
    {
        match self.run(image, &mut observer).await {
            Ok(session) => {
                observer(PipelineState::Idle);
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "Pipeline run failed");
                observer(PipelineState::Failed);
                observer(PipelineState::Idle);
                Err(err)
            }
        }
    }

    async fn run<F>(&self, image: CapturedImage, observer: &mut F) -> Result<Session, PipelineError>
    where
        F: FnMut(PipelineState),
    {
        let mut session = Session::new(image);

        observer(PipelineState::Classifying);
        debug!(
            bytes = session.image.bytes().len(),
            model = %self.classifier.service().model,
            "Classifying image"
        );
        let items = self
            .classifier
            .identify(&session.image)
            .await
            .map_err(PipelineError::Classifier)?;
        if items.starts_with(FAILURE_MARKER) {
            return Err(PipelineError::ClassifierReportedError(items));
        }
        info!(items = %items, "Identified items");
        session.identified_items = items;

        observer(PipelineState::Generating);
        let prompt = advice::build_prompt(&session.identified_items, &self.rules.to_context());
        debug!(
            prompt_len = prompt.len(),
            model = %self.generator.service().model,
            "Requesting advice"
        );
        session.advice = self
            .generator
            .generate(advice::SYSTEM_INSTRUCTIONS, &prompt)
            .await
            .map_err(PipelineError::Generator)?;

        observer(PipelineState::Rendering);
        session.blocks = advice::into_blocks(&session.advice);
        info!(blocks = session.blocks.len(), "Advice ready");

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::model::{
        BinIcon, BinType, ExchangeTurn, RecyclingRule, ServiceMeta, ToolExchange, ToolPolicy,
        ToolSpec,
    };

    struct FakeClassifier {
        meta: ServiceMeta,
        reply: Result<String, String>,
    }

    impl FakeClassifier {
        fn new(reply: Result<&str, &str>) -> Self {
            Self {
                meta: ServiceMeta {
                    name: "fake".to_owned(),
                    model: "vision".to_owned(),
                },
                reply: reply.map(str::to_owned).map_err(str::to_owned),
            }
        }
    }

    #[async_trait]
    impl ImageClassifierPort for FakeClassifier {
        fn service(&self) -> &ServiceMeta {
            &self.meta
        }

        async fn identify(&self, image: &CapturedImage) -> Result<String, PortError> {
            if image.is_empty() {
                return Err(PortError::EmptyImage);
            }
            self.reply.clone().map_err(PortError::Internal)
        }
    }

    struct FakeGenerator {
        meta: ServiceMeta,
        reply: Result<String, String>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn new(reply: &str) -> Self {
            Self {
                meta: ServiceMeta {
                    name: "fake".to_owned(),
                    model: "chat".to_owned(),
                },
                reply: Ok(reply.to_owned()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_owned()),
                ..Self::new("")
            }
        }
    }

    #[async_trait]
    impl AdviceGeneratorPort for FakeGenerator {
        fn service(&self) -> &ServiceMeta {
            &self.meta
        }

        async fn generate(&self, _system: &str, prompt: &str) -> Result<String, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_owned());
            self.reply.clone().map_err(PortError::Internal)
        }

        async fn converse(
            &self,
            _exchange: &ToolExchange,
            _tools: &[ToolSpec],
            _policy: ToolPolicy,
        ) -> Result<ExchangeTurn, PortError> {
            Err(PortError::Internal("not used".to_owned()))
        }
    }

    fn rules() -> Arc<RulesStore> {
        Arc::new(RulesStore::from_rules(vec![RecyclingRule::new(
            "plastic bottle",
            BinType::Yellow,
        )]))
    }

    fn jpeg() -> CapturedImage {
        CapturedImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    #[tokio::test]
    async fn plastic_bottle_end_to_end() {
        let generator = Arc::new(FakeGenerator::new(
            "1. Plastic bottle:\n- Correct Bin: Yellow\n...",
        ));
        let pipeline = Pipeline::new(
            rules(),
            Arc::new(FakeClassifier::new(Ok("plastic bottle"))),
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
        );
        let mut states = Vec::new();

        let session = pipeline
            .analyze(jpeg(), |state| states.push(state))
            .await
            .unwrap();

        assert_eq!(session.identified_items, "plastic bottle");
        assert_eq!(session.blocks.len(), 1);
        assert_eq!(
            session.blocks.first().and_then(|block| block.icon),
            Some(BinIcon::YellowBin)
        );
        assert_eq!(
            states,
            vec![
                PipelineState::Classifying,
                PipelineState::Generating,
                PipelineState::Rendering,
                PipelineState::Idle,
            ]
        );
        let prompts = generator.prompts.lock().unwrap();
        let prompt = prompts.first().unwrap();
        assert!(prompt.contains("plastic bottle"));
        assert!(prompt.contains("\"binType\":\"yellow\""));
    }

    #[tokio::test]
    async fn in_band_classifier_error_skips_generator() {
        let generator = Arc::new(FakeGenerator::new("unused"));
        let pipeline = Pipeline::new(
            rules(),
            Arc::new(FakeClassifier::new(Ok("Error analyzing image: quota exceeded"))),
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
        );
        let mut states = Vec::new();

        let result = pipeline.analyze(jpeg(), |state| states.push(state)).await;

        match result {
            Err(PipelineError::ClassifierReportedError(message)) => {
                assert_eq!(message, "Error analyzing image: quota exceeded");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            states,
            vec![
                PipelineState::Classifying,
                PipelineState::Failed,
                PipelineState::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn classifier_failure_skips_generator() {
        let generator = Arc::new(FakeGenerator::new("unused"));
        let pipeline = Pipeline::new(
            rules(),
            Arc::new(FakeClassifier::new(Err("timeout"))),
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
        );

        let result = pipeline.analyze(jpeg(), |_| {}).await;

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Classifier(PortError::Internal(_))));
        assert_eq!(err.to_string(), "Error analyzing image: Internal error: timeout");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generator_failure_stops_before_rendering() {
        let generator = Arc::new(FakeGenerator::failing("rate limited"));
        let pipeline = Pipeline::new(
            rules(),
            Arc::new(FakeClassifier::new(Ok("plastic bottle"))),
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
        );
        let mut states = Vec::new();

        let result = pipeline.analyze(jpeg(), |state| states.push(state)).await;

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Generator(PortError::Internal(_))));
        assert_eq!(
            err.to_string(),
            "Error generating response: Internal error: rate limited"
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            states,
            vec![
                PipelineState::Classifying,
                PipelineState::Generating,
                PipelineState::Failed,
                PipelineState::Idle,
            ]
        );
        assert!(!states.contains(&PipelineState::Rendering));
    }

    #[tokio::test]
    async fn empty_image_fails_in_classifier() {
        let generator = Arc::new(FakeGenerator::new("unused"));
        let pipeline = Pipeline::new(
            rules(),
            Arc::new(FakeClassifier::new(Ok("anything"))),
            Arc::clone(&generator) as Arc<dyn AdviceGeneratorPort>,
        );

        let result = pipeline.analyze(CapturedImage::new(Vec::new()), |_| {}).await;

        assert!(matches!(
            result,
            Err(PipelineError::Classifier(PortError::EmptyImage))
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blocks_keep_generator_order() {
        let generator = Arc::new(FakeGenerator::new(
            "Newspaper: paper bin\n\nBanana peel: organic\n\nGlass jar: rinse it\n\n",
        ));
        let pipeline = Pipeline::new(
            rules(),
            Arc::new(FakeClassifier::new(Ok("newspaper, banana peel, glass jar"))),
            generator,
        );

        let session = pipeline.analyze(jpeg(), |_| {}).await.unwrap();

        let summary: Vec<(&str, Option<BinIcon>)> = session
            .blocks
            .iter()
            .map(|block| (block.text.as_str(), block.icon))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Newspaper: paper bin", Some(BinIcon::BlueBin)),
                ("Banana peel: organic", Some(BinIcon::BrownBin)),
                ("Glass jar: rinse it", None),
            ]
        );
    }
}
