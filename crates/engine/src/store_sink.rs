//! The narrow slice of `Store` the executor needs, injected so this crate
//! never depends on `gcluster-daemon` (which depends on this crate).

/// Everything the executor needs to read/mutate an agent's run state
/// without owning the declarative store itself.
pub trait RunStateSink: Send + Sync + 'static {
    /// Transition `name` to running. Returns `false` if the agent is
    /// unknown to the store.
    fn set_running(&self, name: &str) -> bool;

    fn set_pending(&self, name: &str);

    fn set_stopped(&self, name: &str);

    /// Names of every agent currently in the pending state.
    fn pending_agents(&self) -> Vec<String>;

    fn agent_exists(&self, name: &str) -> bool;

    /// The revision id currently pointed to by this agent, for populating
    /// `AgentRun`/`RunSnapshot`. `None` only if the agent is unknown.
    fn current_revision(&self, name: &str) -> Option<String>;
}
