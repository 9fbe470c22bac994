use crate::agent::Agent;
use crate::kinds::AgentKind;
use maestro_core::{MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Static description of one agent type, consumed once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Type tag, one of the [`AgentKind`] tags.
    pub agent_type: String,
    /// Display name; instances are named `"<name> <n>"`.
    pub name: String,
    #[serde(default)]
    /// Free-text description.
    pub description: String,
    /// Capabilities every instance holds.
    pub capabilities: BTreeSet<String>,
    /// Concurrency limit per instance; must be at least one.
    pub max_concurrent_tasks: usize,
    /// Reported only; matching does not weigh it.
    #[serde(default = "default_priority_weight")]
    pub priority_weight: f64,
    #[serde(default = "default_instance_count")]
    /// Instances built at startup.
    pub instance_count: usize,
}

fn default_priority_weight() -> f64 {
    1.0
}

fn default_instance_count() -> usize {
    3
}

impl AgentDescriptor {
    /// Descriptor with defaults for weight and instance count.
    pub fn new<I, S>(
        agent_type: &str,
        name: &str,
        capabilities: I,
        max_concurrent_tasks: usize,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agent_type: agent_type.to_string(),
            name: name.to_string(),
            description: String::new(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            max_concurrent_tasks,
            priority_weight: default_priority_weight(),
            instance_count: default_instance_count(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Set the priority weight.
    pub fn with_priority_weight(mut self, weight: f64) -> Self {
        self.priority_weight = weight;
        self
    }

    /// Number of agents built from this descriptor.
    pub fn with_instance_count(mut self, count: usize) -> Self {
        self.instance_count = count;
        self
    }

    fn validate(&self) -> MaestroResult<AgentKind> {
        let kind = AgentKind::from_type_tag(&self.agent_type)?;
        if self.max_concurrent_tasks == 0 {
            return Err(MaestroError::Config(format!(
                "agent type '{}' must allow at least one concurrent task",
                self.agent_type
            )));
        }
        if self.capabilities.is_empty() {
            return Err(MaestroError::Config(format!(
                "agent type '{}' declares no capabilities",
                self.agent_type
            )));
        }
        Ok(kind)
    }
}

/// Agent Descriptor Registry: agent types plus task categories.
///
/// A task category maps a `task_type` tag to the capabilities a submission
/// of that type needs when it names none itself.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    descriptors: Vec<AgentDescriptor>,
    task_categories: BTreeMap<String, BTreeSet<String>>,
}

impl AgentRegistry {
    /// Validated registry over `descriptors`, with no task categories.
    pub fn new(descriptors: Vec<AgentDescriptor>) -> MaestroResult<Self> {
        let mut seen = BTreeSet::new();
        for descriptor in &descriptors {
            descriptor.validate()?;
            if !seen.insert(descriptor.agent_type.as_str()) {
                return Err(MaestroError::Config(format!(
                    "agent type '{}' declared twice",
                    descriptor.agent_type
                )));
            }
        }
        Ok(Self {
            descriptors,
            task_categories: BTreeMap::new(),
        })
    }

    /// Map `task_type` to default capabilities, replacing any earlier entry.
    pub fn with_task_category<I, S>(mut self, task_type: &str, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_categories.insert(
            task_type.to_string(),
            capabilities.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Override the instance count of every descriptor.
    pub fn with_instance_count(mut self, count: usize) -> Self {
        for descriptor in &mut self.descriptors {
            descriptor.instance_count = count;
        }
        self
    }

    /// Descriptors in declaration order.
    pub fn descriptors(&self) -> &[AgentDescriptor] {
        &self.descriptors
    }

    /// Descriptor for a type tag.
    pub fn get(&self, agent_type: &str) -> Option<&AgentDescriptor> {
        self.descriptors.iter().find(|d| d.agent_type == agent_type)
    }

    /// Default capabilities for a task category.
    pub fn category_capabilities(&self, task_type: &str) -> Option<&BTreeSet<String>> {
        self.task_categories.get(task_type)
    }

    /// Instantiate every agent, descriptor by descriptor.
    pub fn build_agents(&self) -> MaestroResult<Vec<Agent>> {
        let mut agents = Vec::new();
        for descriptor in &self.descriptors {
            let kind = descriptor.validate()?;
            for i in 0..descriptor.instance_count {
                agents.push(
                    Agent::new(
                        kind,
                        format!("{} {}", descriptor.name, i + 1),
                        descriptor.capabilities.iter().cloned(),
                        descriptor.max_concurrent_tasks,
                    )
                    .with_priority_weight(descriptor.priority_weight),
                );
            }
        }
        Ok(agents)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self {
            descriptors: default_descriptors(),
            task_categories: default_task_categories(),
        }
    }
}

fn default_descriptors() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new(
            "research",
            "Research Agent",
            [
                "data_analysis",
                "web_research",
                "fact_checking",
                "literature_review",
                "market_research",
            ],
            3,
        )
        .with_description("Specializes in data analysis, research, and information gathering")
        .with_priority_weight(1.0),
        AgentDescriptor::new(
            "code",
            "Code Agent",
            [
                "code_generation",
                "debugging",
                "code_review",
                "architecture_design",
                "testing",
            ],
            2,
        )
        .with_description("Expert in software development, debugging, and code review")
        .with_priority_weight(1.2),
        AgentDescriptor::new(
            "creative",
            "Creative Agent",
            [
                "content_creation",
                "creative_writing",
                "design_thinking",
                "brainstorming",
                "storytelling",
            ],
            4,
        )
        .with_description("Handles content creation, design, and creative problem solving")
        .with_priority_weight(0.8),
        AgentDescriptor::new(
            "analysis",
            "Analysis Agent",
            [
                "statistical_analysis",
                "data_processing",
                "pattern_recognition",
                "forecasting",
                "optimization",
            ],
            3,
        )
        .with_description("Processes data, performs statistical analysis, and generates insights")
        .with_priority_weight(1.1),
        AgentDescriptor::new(
            "communication",
            "Communication Agent",
            [
                "text_summarization",
                "translation",
                "sentiment_analysis",
                "communication_drafting",
                "language_processing",
            ],
            5,
        )
        .with_description("Handles natural language processing, translation, and summarization")
        .with_priority_weight(0.9),
    ]
}

fn default_task_categories() -> BTreeMap<String, BTreeSet<String>> {
    [
        ("research_task", ["data_analysis", "web_research", "fact_checking"]),
        ("development_task", ["code_generation", "debugging", "testing"]),
        (
            "creative_task",
            ["content_creation", "creative_writing", "design_thinking"],
        ),
        (
            "analysis_task",
            [
                "statistical_analysis",
                "data_processing",
                "pattern_recognition",
            ],
        ),
        (
            "communication_task",
            [
                "text_summarization",
                "translation",
                "communication_drafting",
            ],
        ),
    ]
    .into_iter()
    .map(|(name, caps)| {
        (
            name.to_string(),
            caps.into_iter().map(str::to_string).collect(),
        )
    })
    .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_shape() {
        let registry = AgentRegistry::default();
        assert_eq!(registry.descriptors().len(), 5);
        let code = registry.get("code").unwrap();
        assert_eq!(code.max_concurrent_tasks, 2);
        assert_eq!(code.priority_weight, 1.2);
        assert!(code.capabilities.contains("debugging"));
        assert_eq!(code.instance_count, 3);
    }

    #[test]
    fn test_build_agents_names_instances() {
        let registry = AgentRegistry::default().with_instance_count(2);
        let agents = registry.build_agents().unwrap();
        assert_eq!(agents.len(), 10);
        assert_eq!(agents[0].name(), "Research Agent 1");
        assert_eq!(agents[1].name(), "Research Agent 2");
        assert_eq!(agents[2].kind(), AgentKind::Code);
    }

    #[test]
    fn test_category_capabilities() {
        let registry = AgentRegistry::default();
        let caps = registry.category_capabilities("development_task").unwrap();
        assert_eq!(caps.len(), 3);
        assert!(caps.contains("testing"));
        assert!(registry.category_capabilities("complex_task").is_none());
    }

    #[test]
    fn test_rejects_unknown_type_and_zero_capacity() {
        let unknown = AgentDescriptor::new("wizard", "Wizard", ["magic"], 1);
        assert!(AgentRegistry::new(vec![unknown]).is_err());

        let zero = AgentDescriptor::new("code", "Code", ["debugging"], 0);
        assert!(AgentRegistry::new(vec![zero]).is_err());

        let dup = AgentDescriptor::new("code", "Code", ["debugging"], 1);
        assert!(AgentRegistry::new(vec![dup.clone(), dup]).is_err());
    }

    #[test]
    fn test_descriptor_from_toml() {
        #[derive(Deserialize)]
        struct File {
            agents: Vec<AgentDescriptor>,
        }
        let file: File = toml::from_str(
            r#"
            [[agents]]
            agent_type = "analysis"
            name = "Quant"
            capabilities = ["forecasting", "optimization"]
            max_concurrent_tasks = 1
            "#,
        )
        .unwrap();
        let registry = AgentRegistry::new(file.agents).unwrap();
        let quant = registry.get("analysis").unwrap();
        assert_eq!(quant.instance_count, 3);
        assert_eq!(quant.priority_weight, 1.0);
    }
}
