use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("agent {0} not found")]
    AgentNotFound(String),

    #[error("agent {0} is not running")]
    NotRunning(String),

    #[error("pipeline for agent {agent} references method {method:?} not present in supplied methods")]
    MissingMethod { agent: String, method: String },

    #[error("agent call failed: {0}")]
    Call(String),

    #[error("cancelled")]
    Cancelled,
}
