use crate::backends::InferenceBackend;
use maestro_core::{MaestroError, MaestroResult, Task};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of specialised agent behaviours.
///
/// Each kind supplies a system prompt and turns inference output into a
/// kind-specific structured result. Built from a registry type tag via
/// [`AgentKind::from_type_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Information gathering and synthesis.
    Research,
    /// Code generation, review and debugging.
    Code,
    /// Content, copy and ideation.
    Creative,
    /// Statistics, patterns and insights.
    Analysis,
    /// Translation, summaries and drafting.
    Communication,
}

impl AgentKind {
    /// All kinds in registry order.
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Research,
        AgentKind::Code,
        AgentKind::Creative,
        AgentKind::Analysis,
        AgentKind::Communication,
    ];

    /// Factory keyed by the registry type tag.
    pub fn from_type_tag(tag: &str) -> MaestroResult<Self> {
        match tag {
            "research" => Ok(AgentKind::Research),
            "code" => Ok(AgentKind::Code),
            "creative" => Ok(AgentKind::Creative),
            "analysis" => Ok(AgentKind::Analysis),
            "communication" => Ok(AgentKind::Communication),
            other => Err(MaestroError::Config(format!("unknown agent type '{other}'"))),
        }
    }

    /// Registry tag, the inverse of [`AgentKind::from_type_tag`].
    pub fn type_tag(self) -> &'static str {
        match self {
            AgentKind::Research => "research",
            AgentKind::Code => "code",
            AgentKind::Creative => "creative",
            AgentKind::Analysis => "analysis",
            AgentKind::Communication => "communication",
        }
    }

    /// System prompt sent with every task of this kind.
    pub fn system_prompt(self) -> &'static str {
        match self {
            AgentKind::Research => RESEARCH_PROMPT,
            AgentKind::Code => CODE_PROMPT,
            AgentKind::Creative => CREATIVE_PROMPT,
            AgentKind::Analysis => ANALYSIS_PROMPT,
            AgentKind::Communication => COMMUNICATION_PROMPT,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            AgentKind::Research => {
                "Please complete this research task thoroughly and provide detailed findings."
            }
            AgentKind::Code => {
                "Please provide a complete, working solution with code, explanations, and testing notes."
            }
            AgentKind::Creative => {
                "Please produce original, engaging creative output that fulfils the brief."
            }
            AgentKind::Analysis => {
                "Please perform a rigorous analysis and report metrics, trends, and recommendations."
            }
            AgentKind::Communication => {
                "Please produce clear, well-structured communication appropriate for the audience."
            }
        }
    }

    /// User prompt describing `task`.
    pub fn task_prompt(self, task: &Task) -> String {
        let caps: Vec<&str> = task
            .required_capabilities
            .iter()
            .map(String::as_str)
            .collect();
        format!(
            "Task: {}\nDescription: {}\nRequired Capabilities: {}\n\n{}",
            task.title,
            task.description,
            caps.join(", "),
            self.instruction()
        )
    }

    /// Run `task` through inference and wrap the text into this kind's result shape.
    pub async fn process(
        self,
        task: &Task,
        inference: &dyn InferenceBackend,
    ) -> MaestroResult<serde_json::Value> {
        let output = inference
            .infer(Some(self.system_prompt()), &self.task_prompt(task))
            .await?;
        Ok(self.wrap_output(output))
    }

    fn wrap_output(self, output: String) -> serde_json::Value {
        match self {
            AgentKind::Research => serde_json::json!({
                "findings": output,
                "methodology": "AI-powered research and analysis",
                "confidence_score": 0.85,
                "sources": ["AI Knowledge Base"],
                "recommendations": "Further validation recommended for critical decisions",
            }),
            AgentKind::Code => serde_json::json!({
                "code": output,
                "language": "Python",
                "documentation": "Code includes inline comments and documentation",
                "testing_notes": "Unit tests recommended for production use",
                "quality_score": 0.9,
            }),
            AgentKind::Creative => serde_json::json!({
                "creative_output": output,
                "style": "Original and engaging",
                "target_audience": "General audience",
                "creativity_score": 0.88,
                "engagement_potential": "High",
            }),
            AgentKind::Analysis => serde_json::json!({
                "analysis_results": output,
                "key_metrics": "Statistical measures and KPIs identified",
                "trends": "Patterns and trends analyzed",
                "confidence_interval": "95%",
                "recommendations": "Data-driven recommendations provided",
            }),
            AgentKind::Communication => serde_json::json!({
                "communication_output": output,
                "tone": "Professional and clear",
                "readability_score": 0.85,
                "target_audience": "General professional audience",
                "language_quality": "High",
            }),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

const RESEARCH_PROMPT: &str = "\
You are a Research Agent specialized in data analysis, research, and information gathering.

Your capabilities include:
- Data analysis and interpretation
- Web research and fact-checking
- Literature reviews and market research
- Trend identification and pattern recognition

Provide thorough, well-researched responses with evidence. Focus on accuracy, \
completeness, and actionable insights.";

const CODE_PROMPT: &str = "\
You are a Code Agent, an expert in software development, debugging, and code review.

Your capabilities include:
- Code generation in multiple languages
- Debugging and fixing defects
- Code review and architecture design
- Writing tests

Write clean, well-documented code. Explain design decisions and note edge cases.";

const CREATIVE_PROMPT: &str = "\
You are a Creative Agent that handles content creation, design thinking, and \
creative problem solving.

Your capabilities include:
- Content creation and creative writing
- Brainstorming and design thinking
- Storytelling

Produce original, engaging output tailored to the brief and its audience.";

const ANALYSIS_PROMPT: &str = "\
You are an Analysis Agent that processes data, performs statistical analysis, \
and generates insights.

Your capabilities include:
- Statistical analysis and data processing
- Pattern recognition and forecasting
- Optimization

Be rigorous. State assumptions, key metrics, and confidence in your conclusions.";

const COMMUNICATION_PROMPT: &str = "\
You are a Communication Agent that handles natural language processing, \
translation, and summarization.

Your capabilities include:
- Text summarization and translation
- Sentiment analysis
- Drafting professional communication

Write clearly and concisely in a tone appropriate for the target audience.";

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backends::echo::EchoBackend;

    #[test]
    fn test_factory_roundtrip() {
        for kind in AgentKind::ALL {
            assert_eq!(AgentKind::from_type_tag(kind.type_tag()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_tag_is_config_error() {
        assert!(matches!(
            AgentKind::from_type_tag("wizard"),
            Err(MaestroError::Config(_))
        ));
    }

    #[test]
    fn test_task_prompt_mentions_capabilities() {
        let task = Task::new("Fix login", "Users cannot log in")
            .with_capabilities(["debugging", "code_review"]);
        let prompt = AgentKind::Code.task_prompt(&task);
        assert!(prompt.contains("Task: Fix login"));
        assert!(prompt.contains("code_review, debugging"));
    }

    #[tokio::test]
    async fn test_process_wraps_output_per_kind() {
        let task = Task::new("Summarize report", "");
        let backend = EchoBackend::default();

        let research = AgentKind::Research.process(&task, &backend).await.unwrap();
        assert!(research["findings"].as_str().unwrap().starts_with("Echo"));

        let comms = AgentKind::Communication
            .process(&task, &backend)
            .await
            .unwrap();
        assert!(comms.get("communication_output").is_some());
        assert_eq!(comms["readability_score"], 0.85);
    }
}
