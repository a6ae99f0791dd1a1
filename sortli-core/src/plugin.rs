//! Registry for the tools the site finder can offer to the generator.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::ToolSpec;
use crate::ports::{PortError, ToolExecutorPort};

/// Registry that resolves tool executors by function name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutorPort>>,
}

impl ToolRegistry {
    /// Build a registry from the provided tool list.
    #[must_use]
    pub fn new(tools: Vec<Arc<dyn ToolExecutorPort>>) -> Self {
        let tools_map = tools
            .into_iter()
            .map(|tool| (tool.spec().name.clone(), tool))
            .collect();
        Self { tools: tools_map }
    }

    /// Declarations of all registered tools, sorted by name.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| tool.spec().clone())
            .collect();
        specs.sort_by(|left, right| left.name.cmp(&right.name));
        specs
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up the executor for a tool name.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownTool`] when no tool is registered under that name.
    pub fn tool(&self, name: &str) -> Result<&Arc<dyn ToolExecutorPort>, PortError> {
        self.tools
            .get(name)
            .ok_or_else(|| PortError::UnknownTool(name.to_owned()))
    }
}
