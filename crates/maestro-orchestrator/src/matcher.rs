use crate::pool::AgentPool;
use maestro_agent::Agent;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

const CAPABILITY_WEIGHT: f64 = 0.4;
const PERFORMANCE_WEIGHT: f64 = 0.4;
const LOAD_WEIGHT: f64 = 0.2;

/// Breakdown of how well an agent fits a task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchScore {
    /// Share of required capabilities held.
    pub capability: f64,
    /// The agent's success rate.
    pub performance: f64,
    /// Used share of the concurrency limit; lower scores higher.
    pub load: f64,
    /// Weighted sum of the three.
    pub total: f64,
}

/// Score `agent` against `required`.
pub fn score(agent: &Agent, required: &BTreeSet<String>) -> MatchScore {
    let capability = if required.is_empty() {
        1.0
    } else {
        let held = required.intersection(agent.capabilities()).count();
        held as f64 / required.len() as f64
    };
    let performance = agent.success_rate();
    let load = agent.current_load() as f64 / agent.max_concurrent() as f64;
    MatchScore {
        capability,
        performance,
        load,
        total: CAPABILITY_WEIGHT * capability
            + PERFORMANCE_WEIGHT * performance
            + LOAD_WEIGHT * (1.0 - load),
    }
}

fn is_eligible(agent: &Agent, required: &BTreeSet<String>) -> bool {
    agent.can_handle(required) && agent.status().is_available() && agent.has_capacity()
}

/// Pick the highest scoring eligible agent for `required`.
///
/// Candidates come from the capability index entry with the fewest agents.
/// Ties keep the agent created first. `None` means nobody qualifies right now.
pub fn find_best_agent<'a>(
    pool: &'a AgentPool,
    required: &BTreeSet<String>,
) -> Option<(&'a Arc<Agent>, MatchScore)> {
    let narrowest = required
        .iter()
        .map(|cap| pool.agents_with(cap))
        .min_by_key(|ids| ids.len());

    let candidates: Box<dyn Iterator<Item = &'a Arc<Agent>> + 'a> = match narrowest {
        Some(ids) => Box::new(ids.iter().filter_map(|id| pool.get(*id))),
        None => Box::new(pool.agents().iter()),
    };

    let mut best: Option<(&Arc<Agent>, MatchScore)> = None;
    for agent in candidates {
        if !is_eligible(agent, required) {
            continue;
        }
        let candidate = score(agent, required);
        match &best {
            Some((_, current)) if candidate.total <= current.total => {}
            _ => best = Some((agent, candidate)),
        }
    }
    best
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_agent::{AgentKind, AgentStatus};
    use uuid::Uuid;

    fn caps(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_single_fresh_agent_scores_one() {
        let pool = AgentPool::new(vec![Agent::new(
            AgentKind::Code,
            "Code Agent 1",
            ["code_generation", "debugging", "testing"],
            2,
        )]);
        let (agent, score) =
            find_best_agent(&pool, &caps(&["code_generation", "debugging"])).unwrap();
        assert_eq!(agent.name(), "Code Agent 1");
        assert!((score.total - 1.0).abs() < 1e-12);
        assert_eq!(score.capability, 1.0);
    }

    #[test]
    fn test_never_selects_agent_missing_a_capability() {
        let pool = AgentPool::new(vec![
            Agent::new(AgentKind::Code, "partial", ["debugging"], 5),
            Agent::new(AgentKind::Research, "other", ["web_research"], 5),
        ]);
        assert!(find_best_agent(&pool, &caps(&["debugging", "web_research"])).is_none());
    }

    #[test]
    fn test_prefers_less_loaded_and_keeps_first_on_tie() {
        let pool = AgentPool::new(vec![
            Agent::new(AgentKind::Code, "first", ["debugging"], 2),
            Agent::new(AgentKind::Code, "second", ["debugging"], 2),
        ]);
        let (agent, _) = find_best_agent(&pool, &caps(&["debugging"])).unwrap();
        assert_eq!(agent.name(), "first");

        pool.agents()[0].reserve(Uuid::new_v4());
        let (agent, score) = find_best_agent(&pool, &caps(&["debugging"])).unwrap();
        assert_eq!(agent.name(), "second");
        assert_eq!(score.load, 0.0);
    }

    #[test]
    fn test_skips_offline_and_full_agents() {
        let pool = AgentPool::new(vec![
            Agent::new(AgentKind::Code, "offline", ["debugging"], 2),
            Agent::new(AgentKind::Code, "full", ["debugging"], 1),
        ]);
        pool.agents()[0].set_status(AgentStatus::Offline);
        pool.agents()[1].reserve(Uuid::new_v4());
        assert!(find_best_agent(&pool, &caps(&["debugging"])).is_none());

        pool.agents()[0].set_status(AgentStatus::Idle);
        let (agent, _) = find_best_agent(&pool, &caps(&["debugging"])).unwrap();
        assert_eq!(agent.name(), "offline");
    }

    #[test]
    fn test_empty_requirement_matches_any_agent() {
        let pool = AgentPool::new(vec![Agent::new(
            AgentKind::Creative,
            "writer",
            ["storytelling"],
            1,
        )]);
        let (agent, score) = find_best_agent(&pool, &BTreeSet::new()).unwrap();
        assert_eq!(agent.name(), "writer");
        assert_eq!(score.capability, 1.0);
    }
}
