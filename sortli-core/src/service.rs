//! High-level service facade combining the rules, the pipeline, and the site finder.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::model::{CapturedImage, Session};
use crate::pipeline::{Pipeline, PipelineError, PipelineState};
use crate::plugin::ToolRegistry;
use crate::ports::{AdviceGeneratorPort, ImageClassifierPort};
use crate::rules::{RulesError, RulesStore};
use crate::site_finder::{SiteFinder, SiteFinderError};

/// Service ports a sortli session is wired with.
pub struct Providers {
    /// Image classifier backend.
    pub classifier: Arc<dyn ImageClassifierPort>,
    /// Advice generator backend.
    pub generator: Arc<dyn AdviceGeneratorPort>,
    /// Tools offered to the generator by the site finder.
    pub tools: ToolRegistry,
}

/// Public entry point for analyzing images and finding collection sites.
pub struct SortliService {
    rules: Arc<RulesStore>,
    pipeline: Pipeline,
    site_finder: SiteFinder,
    location: String,
}

impl SortliService {
    /// Create a service over already loaded rules.
    #[must_use]
    pub fn new(rules: RulesStore, providers: Providers, location: impl Into<String>) -> Self {
        let rules = Arc::new(rules);
        let pipeline = Pipeline::new(
            Arc::clone(&rules),
            Arc::clone(&providers.classifier),
            Arc::clone(&providers.generator),
        );
        let site_finder = SiteFinder::new(providers.generator, Arc::new(providers.tools));
        Self {
            rules,
            pipeline,
            site_finder,
            location: location.into(),
        }
    }

    /// Load the rules named in `config` and build the service. No provider is
    /// contacted if the rules cannot be loaded.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] when the rules document is missing, malformed, or empty.
    pub async fn load(config: &AppConfig, providers: Providers) -> Result<Self, RulesError> {
        let rules = RulesStore::load(&config.rules_path).await?;
        Ok(Self::new(
            rules,
            providers,
            config.site_finder.location.clone(),
        ))
    }

    /// Rules loaded for this session.
    #[must_use]
    pub fn rules(&self) -> &RulesStore {
        &self.rules
    }

    /// Location used by [`Self::find_nearby_sites`].
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Run the advice pipeline on a captured image.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] when a stage fails.
    pub async fn analyze_image<F>(
        &self,
        image: CapturedImage,
        observer: F,
    ) -> Result<Session, PipelineError>
    where
        F: FnMut(PipelineState),
    {
        self.pipeline.analyze(image, observer).await
    }

    /// Look up collection sites near the configured location.
    ///
    /// # Errors
    ///
    /// Returns a [`SiteFinderError`] when a round or a tool run fails.
    pub async fn find_nearby_sites(&self) -> Result<String, SiteFinderError> {
        self.site_finder.find_nearby(&self.location).await
    }
}
