use maestro_agent::{Agent, AgentRegistry};
use maestro_core::MaestroResult;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// All agents, in creation order, plus a capability index.
///
/// The index maps each capability to the ids of the agents holding it, in
/// creation order. Agents and their capability sets never change after
/// construction, so the index never needs rebuilding.
pub struct AgentPool {
    agents: Vec<Arc<Agent>>,
    by_id: HashMap<Uuid, usize>,
    capability_index: HashMap<String, Vec<Uuid>>,
}

impl AgentPool {
    /// Pool over `agents`, keeping their order.
    pub fn new(agents: Vec<Agent>) -> Self {
        let agents: Vec<Arc<Agent>> = agents.into_iter().map(Arc::new).collect();
        let mut by_id = HashMap::new();
        let mut capability_index: HashMap<String, Vec<Uuid>> = HashMap::new();
        for (pos, agent) in agents.iter().enumerate() {
            by_id.insert(agent.id(), pos);
            for capability in agent.capabilities() {
                capability_index
                    .entry(capability.clone())
                    .or_default()
                    .push(agent.id());
            }
        }
        Self {
            agents,
            by_id,
            capability_index,
        }
    }

    /// Instantiate every agent the registry describes.
    pub fn from_registry(registry: &AgentRegistry) -> MaestroResult<Self> {
        Ok(Self::new(registry.build_agents()?))
    }

    /// Agent by id.
    pub fn get(&self, id: Uuid) -> Option<&Arc<Agent>> {
        self.by_id.get(&id).map(|&pos| &self.agents[pos])
    }

    /// Agents in creation order.
    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    /// Ids of agents holding `capability`, in creation order.
    pub fn agents_with(&self, capability: &str) -> &[Uuid] {
        self.capability_index
            .get(capability)
            .map_or(&[], Vec::as_slice)
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// True for a pool without agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents currently Idle or Busy.
    pub fn active_count(&self) -> usize {
        self.agents
            .iter()
            .filter(|a| a.status().is_available())
            .count()
    }

    /// Total current load over total capacity, in `[0, 1]`.
    pub fn system_load(&self) -> f64 {
        let capacity: usize = self.agents.iter().map(|a| a.max_concurrent()).sum();
        if capacity == 0 {
            return 0.0;
        }
        let load: usize = self.agents.iter().map(|a| a.current_load()).sum();
        load as f64 / capacity as f64
    }
}
