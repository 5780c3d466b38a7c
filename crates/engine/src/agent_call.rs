//! The injected LLM-call abstraction (spec §4.3, §9 redesign notes).
//!
//! `AgentCall` is a pure function of `(agent name, prompt)` from the
//! executor's point of view: it must be safe under concurrent calls and
//! must honor cancellation. The default implementation shells out to an
//! external tool; tests substitute a deterministic double.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

#[async_trait]
pub trait AgentCall: Send + Sync + 'static {
    async fn call(
        &self,
        agent_name: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError>;
}

/// Spawns an external command, pipes `prompt` to its stdin, and reads its
/// stdout as the result. Cancellation kills the child process.
pub struct ShellAgentCall {
    program: String,
    args: Vec<String>,
}

impl ShellAgentCall {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

#[async_trait]
impl AgentCall for ShellAgentCall {
    async fn call(
        &self,
        agent_name: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Call(format!("spawn failed for {agent_name}: {e}")))?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            EngineError::Call(format!("no stdin handle for {agent_name}"))
        })?;
        let prompt = prompt.to_string();
        let write_task = tokio::spawn(async move {
            let _ = stdin.write_all(prompt.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                write_task.abort();
                Err(EngineError::Cancelled)
            }
            output = child.wait_with_output() => {
                let _ = write_task.await;
                let output = output.map_err(|e| {
                    EngineError::Call(format!("wait failed for {agent_name}: {e}"))
                })?;
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
                } else {
                    Err(EngineError::Call(format!(
                        "{agent_name} exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr)
                    )))
                }
            }
        }
    }
}

/// A deterministic double for tests: returns canned responses in order,
/// falling back to echoing the prompt, and records every prompt it saw.
pub mod fake {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    use super::AgentCall;
    use crate::error::EngineError;

    #[derive(Clone, Default)]
    pub struct FakeAgentCall {
        inner: Arc<Mutex<Inner>>,
    }

    #[derive(Default)]
    struct Inner {
        received: Vec<(String, String)>,
        scripted: std::collections::VecDeque<Result<String, String>>,
    }

    impl FakeAgentCall {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a scripted response, consumed in FIFO order. Once the
        /// script is exhausted, calls echo the prompt back as output.
        pub fn push_response(&self, response: Result<String, String>) {
            self.inner.lock().scripted.push_back(response);
        }

        pub fn received_prompts(&self) -> Vec<(String, String)> {
            self.inner.lock().received.clone()
        }
    }

    #[async_trait]
    impl AgentCall for FakeAgentCall {
        async fn call(
            &self,
            agent_name: &str,
            prompt: &str,
            cancel: &CancellationToken,
        ) -> Result<String, EngineError> {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let scripted = {
                let mut inner = self.inner.lock();
                inner.received.push((agent_name.to_string(), prompt.to_string()));
                inner.scripted.pop_front()
            };
            match scripted {
                Some(Ok(out)) => Ok(out),
                Some(Err(msg)) => Err(EngineError::Call(msg)),
                None => Ok(prompt.to_string()),
            }
        }
    }
}

#[cfg(test)]
#[path = "agent_call_tests.rs"]
mod tests;
