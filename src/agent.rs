use std::collections::HashMap;

use crate::protocol::ToolDef;
use crate::tools::{ToolDefinition, slide_tools};

pub const DEFAULT_AGENT_SET: &str = "presenter";

const PRESENTER_INSTRUCTIONS: &str = "\
You are a presentation assistant. You talk with the user and build a slide deck with them while you talk.

- When the user asks for a new presentation, call generateOutline first, then add the slides one at a time with addSlide.
- Every slide needs a short unique slug. Use it to change a slide with modifySlide, delete it with removeSlide or show it with navigateSlide.
- A slide has either bullet items (template title_image_bullets) or a paragraph (template title_image_paragraph), never both.
- If a function call returns an error, fix the arguments and call it again.
- Keep spoken answers short; the slides carry the detail.";

/// One assistant persona: its instructions and the functions it may call.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn wire_tools(&self) -> Vec<ToolDef> {
        self.tools.iter().map(ToolDefinition::to_wire).collect()
    }
}

/// Named sets of agents, resolved from a configuration key.
#[derive(Debug, Clone)]
pub struct AgentCatalog {
    sets: HashMap<String, Vec<AgentConfig>>,
    default_key: String,
}

impl AgentCatalog {
    pub fn new(default_key: impl Into<String>) -> Self {
        Self {
            sets: HashMap::new(),
            default_key: default_key.into(),
        }
    }

    pub fn with_set(mut self, key: impl Into<String>, agents: Vec<AgentConfig>) -> Self {
        self.sets.insert(key.into(), agents);
        self
    }

    pub fn builtin() -> Self {
        Self::new(DEFAULT_AGENT_SET).with_set(
            DEFAULT_AGENT_SET,
            vec![AgentConfig::new("presenter", PRESENTER_INSTRUCTIONS).with_tools(slide_tools())],
        )
    }

    /// Resolves `key` to its agent set, falling back to the default key when
    /// `key` is absent or unknown.
    pub fn resolve(&self, key: Option<&str>) -> (&str, &[AgentConfig]) {
        if let Some(key) = key {
            if let Some((key, agents)) = self.sets.get_key_value(key) {
                return (key.as_str(), agents.as_slice());
            }
            tracing::warn!(key, default = %self.default_key, "unknown agent config, using default");
        }
        let agents = self
            .sets
            .get(&self.default_key)
            .map(Vec::as_slice)
            .unwrap_or_default();
        (self.default_key.as_str(), agents)
    }
}

/// The resolved agent set and which agent in it is active.
#[derive(Debug, Clone, Default)]
pub struct AgentSelection {
    agents: Vec<AgentConfig>,
    selected: Option<String>,
}

impl AgentSelection {
    /// Selects the first agent of `agents`.
    pub fn new(agents: Vec<AgentConfig>) -> Self {
        let selected = agents.first().map(|agent| agent.name.clone());
        Self { agents, selected }
    }

    pub fn from_catalog(catalog: &AgentCatalog, key: Option<&str>) -> Self {
        let (_, agents) = catalog.resolve(key);
        Self::new(agents.to_vec())
    }

    pub fn agents(&self) -> &[AgentConfig] {
        &self.agents
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Selects `name` if it is part of the set. Returns whether it was.
    pub fn select(&mut self, name: &str) -> bool {
        if self.agents.iter().any(|agent| agent.name == name) {
            self.selected = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&AgentConfig> {
        let name = self.selected.as_deref()?;
        self.agents.iter().find(|agent| agent.name == name)
    }
}
