//! Sample workload: ten tasks across every agent type, three collaboration
//! scenarios and one conflict resolution.

use maestro_agent::AgentKind;
use maestro_core::{TaskRequest, TaskStatus};
use maestro_orchestrator::{
    CollaborationKind, CollaborationOutcome, CollaborationRequest, Orchestrator,
};
use serde_json::Value;
use uuid::Uuid;

struct SampleTask {
    title: &'static str,
    description: &'static str,
    task_type: &'static str,
    capabilities: &'static [&'static str],
    priority: i32,
}

struct Scenario {
    name: &'static str,
    requester: AgentKind,
    capabilities: &'static [&'static str],
    kind: CollaborationKind,
    message: &'static str,
}

const SAMPLE_TASKS: &[SampleTask] = &[
    SampleTask {
        title: "Market Research for AI Startup",
        description: "Conduct comprehensive market research for a new AI startup focusing on healthcare applications. Include competitor analysis, market size estimation, and growth projections.",
        task_type: "research_task",
        capabilities: &["data_analysis", "web_research", "market_research"],
        priority: 2,
    },
    SampleTask {
        title: "Build Customer Management API",
        description: "Develop a RESTful API for customer management with CRUD operations, authentication, and data validation. Include proper error handling and documentation.",
        task_type: "development_task",
        capabilities: &["code_generation", "architecture_design", "testing"],
        priority: 3,
    },
    SampleTask {
        title: "Create Marketing Campaign Content",
        description: "Design a comprehensive marketing campaign for a sustainable fashion brand. Include social media posts, blog articles, and email newsletter content.",
        task_type: "creative_task",
        capabilities: &["content_creation", "creative_writing", "brainstorming"],
        priority: 1,
    },
    SampleTask {
        title: "Sales Performance Analysis",
        description: "Analyze quarterly sales data to identify trends, patterns, and opportunities. Provide statistical insights and recommendations for improvement.",
        task_type: "analysis_task",
        capabilities: &[
            "statistical_analysis",
            "data_processing",
            "pattern_recognition",
        ],
        priority: 2,
    },
    SampleTask {
        title: "Technical Documentation Translation",
        description: "Translate technical documentation from English to Spanish and French, ensuring technical accuracy and cultural appropriateness.",
        task_type: "communication_task",
        capabilities: &[
            "translation",
            "language_processing",
            "communication_drafting",
        ],
        priority: 1,
    },
    SampleTask {
        title: "E-commerce Platform Development",
        description: "Build a complete e-commerce platform with product catalog, shopping cart, payment integration, user management, and analytics dashboard.",
        task_type: "complex_task",
        capabilities: &[
            "code_generation",
            "architecture_design",
            "data_processing",
            "creative_writing",
            "testing",
        ],
        priority: 5,
    },
    SampleTask {
        title: "Brand Identity Research and Design",
        description: "Research target audience preferences and create a complete brand identity including logo concepts, color schemes, and brand messaging guidelines.",
        task_type: "complex_task",
        capabilities: &[
            "market_research",
            "creative_writing",
            "design_thinking",
            "data_analysis",
        ],
        priority: 4,
    },
    SampleTask {
        title: "AI Model Performance Optimization",
        description: "Analyze machine learning model performance, identify bottlenecks, and implement optimization strategies to improve accuracy and reduce inference time.",
        task_type: "complex_task",
        capabilities: &[
            "statistical_analysis",
            "code_generation",
            "optimization",
            "pattern_recognition",
        ],
        priority: 4,
    },
    SampleTask {
        title: "Customer Feedback Sentiment Analysis",
        description: "Process and analyze customer feedback from multiple channels to understand sentiment trends and extract actionable insights for product improvement.",
        task_type: "analysis_task",
        capabilities: &[
            "sentiment_analysis",
            "data_processing",
            "statistical_analysis",
        ],
        priority: 2,
    },
    SampleTask {
        title: "Interactive Data Visualization Dashboard",
        description: "Create an interactive web dashboard for visualizing business metrics with real-time updates, filtering capabilities, and export functionality.",
        task_type: "development_task",
        capabilities: &["code_generation", "data_processing", "creative_writing"],
        priority: 3,
    },
];

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "Code Review Collaboration",
        requester: AgentKind::Code,
        capabilities: &["statistical_analysis", "optimization"],
        kind: CollaborationKind::Review,
        message: "Please review this algorithm for performance bottlenecks and suggest optimizations",
    },
    Scenario {
        name: "Research Validation",
        requester: AgentKind::Research,
        capabilities: &["communication_drafting", "language_processing"],
        kind: CollaborationKind::Assistance,
        message: "Please help improve the clarity and readability of this research report",
    },
    Scenario {
        name: "Creative Content Analysis",
        requester: AgentKind::Creative,
        capabilities: &["sentiment_analysis", "data_processing"],
        kind: CollaborationKind::Assistance,
        message: "Please analyze the emotional impact and sentiment of this marketing content",
    },
];

pub async fn run(engine: &Orchestrator) -> anyhow::Result<()> {
    println!("Submitting {} sample tasks...", SAMPLE_TASKS.len());
    let mut ids = Vec::with_capacity(SAMPLE_TASKS.len());
    for sample in SAMPLE_TASKS {
        let request = TaskRequest::new(sample.title, sample.description)
            .with_type(sample.task_type)
            .with_capabilities(sample.capabilities.iter().copied())
            .with_priority(sample.priority);
        let id = engine.submit_task(request).await?;
        println!("  + {} ({id})", sample.title);
        ids.push(id);
    }

    engine.wait_idle().await;

    println!("\nResults:");
    let mut results: Vec<Value> = Vec::new();
    for id in &ids {
        let task = engine.get_task(*id).await?;
        println!(
            "  {:<9} {} (subtasks: {})",
            task.status.as_str(),
            task.title,
            task.children.len()
        );
        if task.status == TaskStatus::Completed {
            if let Some(result) = task.result {
                results.push(result);
            }
        }
    }

    println!("\nCollaboration scenarios:");
    for scenario in SCENARIOS {
        run_scenario(engine, scenario).await?;
    }

    if let (Some(first), Some(second)) = (ids.first(), results.get(..2)) {
        let resolution = engine.resolve_conflict(*first, second.to_vec()).await;
        println!(
            "\nConflict resolution: confidence {:.2}, accepted {}",
            resolution.confidence, resolution.accepted
        );
    }

    println!("\nSystem status:");
    println!(
        "{}",
        serde_json::to_string_pretty(&engine.system_status().await)?
    );
    Ok(())
}

async fn run_scenario(engine: &Orchestrator, scenario: &Scenario) -> anyhow::Result<()> {
    let Some(requester) = find_agent(engine, scenario.requester) else {
        println!(
            "  {}: no {} agent registered",
            scenario.name, scenario.requester
        );
        return Ok(());
    };

    let task_id = engine
        .submit_task(
            TaskRequest::new(
                format!("Collaboration Test: {}", scenario.name),
                scenario.message,
            )
            .with_type("collaboration_test")
            .with_capabilities(scenario.capabilities.iter().copied()),
        )
        .await?;

    let request = CollaborationRequest::new(
        requester,
        task_id,
        scenario.capabilities.iter().copied(),
        scenario.kind,
        scenario.message,
    );
    match engine.request_collaboration(request).await? {
        CollaborationOutcome::Opened(session_id) => {
            let participants = engine
                .get_collaboration(session_id)
                .await
                .map(|s| s.participants.len())
                .unwrap_or_default();
            println!(
                "  {}: {} session {session_id} with {participants} participant(s)",
                scenario.name, scenario.kind
            );
            engine.close_collaboration(session_id).await?;
        }
        CollaborationOutcome::NoAgentsAvailable => {
            println!("  {}: no agents available", scenario.name);
        }
    }
    engine.wait_idle().await;
    Ok(())
}

fn find_agent(engine: &Orchestrator, kind: AgentKind) -> Option<Uuid> {
    engine
        .list_agents()
        .into_iter()
        .find(|agent| agent.agent_type == kind)
        .map(|agent| agent.id)
}
