//! Pipeline execution: threading setup steps into a terminal loop (spec §4.3).

use std::collections::HashMap;
use std::sync::Arc;

use gcluster_core::{IterationResult, PipelineDef, StepKind};

use crate::agent_call::AgentCall;
use crate::clock::EpochClock;
use crate::run::AgentRun;
use crate::split::split_items;

const MAP_JOIN_SEPARATOR: &str = "\n\n---\n\n";
const STEERING_HEADER: &str = "[Steering messages from human operator]";
const STEERING_FOOTER: &str = "[End of steering messages]";

pub type OnIteration = Arc<dyn Fn(&str, &IterationResult) + Send + Sync>;

/// Run a full pipeline for one agent: setup steps, then (if present) the
/// terminal loop. Returns once the pipeline is cancelled or, for a
/// loop-less pipeline, once every setup step has completed.
pub async fn run_pipeline(
    agent_name: &str,
    run: &AgentRun,
    pipeline: &PipelineDef,
    methods: &HashMap<String, String>,
    call: &Arc<dyn AgentCall>,
    clock: &dyn EpochClock,
    on_iteration: &OnIteration,
) {
    let mut prev_output = pipeline.initial_input.clone().unwrap_or_default();

    for (idx, step) in pipeline.steps.iter().enumerate() {
        if run.cancel.is_cancelled() {
            return;
        }
        match step.kind {
            StepKind::Simple => {
                let body = methods.get(step.method()).cloned().unwrap_or_default();
                let prompt = assemble_setup_prompt(idx, &prev_output, &body);
                match call.call(agent_name, &prompt, &run.cancel).await {
                    Ok(out) => prev_output = out,
                    Err(_) if run.cancel.is_cancelled() => return,
                    Err(e) => {
                        record_setup_failure(run, clock, idx, &step.label, &e.to_string());
                        return;
                    }
                }
            }
            StepKind::Map => {
                let items = split_items(&prev_output);
                if items.is_empty() {
                    record_setup_failure(run, clock, idx, &step.label, "map produced 0 items");
                    return;
                }
                let body = methods.get(step.method()).cloned().unwrap_or_default();
                match run_map_step(agent_name, run, &body, items, Arc::clone(call)).await {
                    Ok(joined) => prev_output = joined,
                    Err(e) => {
                        if !run.cancel.is_cancelled() {
                            record_setup_failure(run, clock, idx, &step.label, &e);
                        }
                        return;
                    }
                }
            }
            StepKind::Loop => {
                let body = methods.get(step.method()).cloned().unwrap_or_default();
                run.set_current_body(body.clone());
                let initial_prompt = assemble_setup_prompt(idx, &prev_output, &body);
                run_loop(agent_name, run, initial_prompt, call, clock, on_iteration).await;
                return;
            }
        }
    }
}

fn assemble_setup_prompt(step_index: usize, prev_output: &str, body: &str) -> String {
    if step_index == 0 || prev_output.is_empty() {
        body.to_string()
    } else {
        format!("{prev_output}\n\n{body}")
    }
}

fn record_setup_failure(run: &AgentRun, clock: &dyn EpochClock, step_index: usize, label: &str, detail: &str) {
    let now = clock.epoch_ms();
    let message = format!("pipeline step {} ({label}): {detail}", step_index + 1);
    run.push_iteration(IterationResult::failure(1, now, now, message));
}

/// Dispatch one call per item concurrently under a scope derived from the
/// run's cancellation token. The first error cancels the remaining siblings;
/// already-running sibling calls may still finish before observing it.
async fn run_map_step(
    agent_name: &str,
    run: &AgentRun,
    body: &str,
    items: Vec<String>,
    call: Arc<dyn AgentCall>,
) -> Result<String, String> {
    let scope = run.cancel.child_token();
    let item_count = items.len();
    let mut tasks = tokio::task::JoinSet::new();

    for (idx, item) in items.into_iter().enumerate() {
        let prompt = format!("{item}\n\n{body}");
        let agent_name = agent_name.to_string();
        let call = Arc::clone(&call);
        let scope = scope.clone();
        tasks.spawn(async move {
            let result = call.call(&agent_name, &prompt, &scope).await;
            (idx, result)
        });
    }

    let mut outputs: Vec<Option<String>> = vec![None; item_count];
    let mut first_error: Option<String> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, Ok(out))) => outputs[idx] = Some(out),
            Ok((_idx, Err(e))) => {
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                    scope.cancel();
                }
            }
            Err(join_error) => {
                if first_error.is_none() {
                    first_error = Some(join_error.to_string());
                    scope.cancel();
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            let joined: Vec<String> = outputs.into_iter().map(|o| o.unwrap_or_default()).collect();
            Ok(joined.join(MAP_JOIN_SEPARATOR))
        }
    }
}

async fn run_loop(
    agent_name: &str,
    run: &AgentRun,
    initial_prompt: String,
    call: &Arc<dyn AgentCall>,
    clock: &dyn EpochClock,
    on_iteration: &OnIteration,
) {
    let mut next_prompt = Some(initial_prompt);
    loop {
        if run.cancel.is_cancelled() {
            return;
        }

        let steering = run.steering.drain();
        let updates = run.method_updates.drain();
        for (method, new_body) in updates {
            if run.loop_method.as_deref() == Some(method.as_str()) {
                run.set_current_body(new_body);
            }
        }

        let base_body = run.current_body().unwrap_or_default();
        let mut prompt = next_prompt.take().unwrap_or(base_body);
        if !steering.is_empty() {
            let mut block = String::from(STEERING_HEADER);
            block.push('\n');
            for msg in &steering {
                block.push_str("- ");
                block.push_str(msg);
                block.push('\n');
            }
            block.push_str(STEERING_FOOTER);
            block.push_str("\n\n");
            block.push_str(&prompt);
            prompt = block;
        }

        let iteration = run.next_iteration_number();
        let started_at_ms = clock.epoch_ms();
        let result = call.call(agent_name, &prompt, &run.cancel).await;
        let finished_at_ms = clock.epoch_ms();

        let iteration_result = match result {
            Ok(output) => IterationResult::success(iteration, started_at_ms, finished_at_ms, output),
            Err(_) if run.cancel.is_cancelled() => {
                let result =
                    IterationResult::failure(iteration, started_at_ms, finished_at_ms, "cancelled".to_string());
                run.push_iteration(result.clone());
                on_iteration(agent_name, &result);
                return;
            }
            Err(e) => IterationResult::failure(iteration, started_at_ms, finished_at_ms, e.to_string()),
        };

        run.push_iteration(iteration_result.clone());
        on_iteration(agent_name, &iteration_result);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
