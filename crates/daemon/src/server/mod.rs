// SPDX-License-Identifier: MIT

//! Server: TCP listener dispatching apply/steer traffic (spec §4.5).

mod connection;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gcluster_core::{AgentDef, Clock, ClusterObject, PipelineDef};
use gcluster_engine::Executor;
use gcluster_wire::{ApplyResponse, Message, SteerEditPrompt, SteerInject, SteerState};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedSender;

use crate::store::Store;

#[derive(Default)]
struct Caches {
    methods: HashMap<String, HashMap<String, String>>,
    pipelines: HashMap<String, PipelineDef>,
}

/// Holds a reference to the store and executor, the listener, the set of
/// steer subscribers, and the methods/pipelines caches (spec §4.5).
pub struct Server<C: Clock> {
    store: Arc<Store<C>>,
    executor: Arc<Executor>,
    caches: Mutex<Caches>,
    subscribers: Mutex<HashMap<u64, UnboundedSender<Message>>>,
    next_subscriber_id: AtomicU64,
}

impl<C: Clock> Server<C> {
    pub fn new(store: Arc<Store<C>>, executor: Arc<Executor>) -> Arc<Self> {
        Arc::new(Self {
            store,
            executor,
            caches: Mutex::new(Caches::default()),
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
        })
    }

    /// Wire the store's `OnChange` and the executor's `OnIteration` into
    /// this server's broadcast (spec §4.5's "State broadcast"). Call once,
    /// after construction.
    pub fn install_callbacks(self: &Arc<Self>) {
        let server = Arc::clone(self);
        self.store.on_change(move |objects| server.broadcast_state(objects.to_vec()));

        let server = Arc::clone(self);
        let store = Arc::clone(&self.store);
        self.executor.on_iteration(move |_name, _result| {
            server.broadcast_state(store.list_agents());
        });
    }

    /// Accept connections until the listener errors; each connection is
    /// handled in its own task.
    pub async fn listen(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "accepted control connection");
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        connection::handle_connection(stream, server).await;
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                }
            }
        }
    }

    /// Register a new subscriber and return its id plus the initial
    /// `steer_state` payload it should be sent.
    fn register_subscriber(&self, tx: UnboundedSender<Message>) -> (u64, SteerState) {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id, tx);
        (id, self.current_state(self.store.list_agents()))
    }

    fn remove_subscriber(&self, id: u64) {
        self.subscribers.lock().remove(&id);
    }

    fn current_state(&self, objects: Vec<ClusterObject>) -> SteerState {
        let caches = self.caches.lock();
        SteerState {
            objects,
            runs: Some(self.executor.snapshot()),
            methods: Some(caches.methods.clone()),
            pipelines: Some(caches.pipelines.clone()),
        }
    }

    /// Marshal a fresh `steer_state` and push it to every subscriber.
    /// Subscribers whose channel is closed (the connection has ended) are
    /// dropped from the set.
    fn broadcast_state(&self, objects: Vec<ClusterObject>) {
        let state = Message::SteerState(self.current_state(objects));
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|_, tx| tx.send(state.clone()).is_ok());
    }

    fn apply(&self, agents: &[AgentDef]) -> ApplyResponse {
        {
            let mut caches = self.caches.lock();
            for agent in agents {
                if let Some(methods) = &agent.methods {
                    caches.methods.insert(agent.name.clone(), methods.clone());
                }
                if let Some(pipeline) = &agent.pipeline {
                    caches.pipelines.insert(agent.name.clone(), pipeline.clone());
                    self.executor.set_pipeline(&agent.name, pipeline.clone());
                }
            }
        }
        let summary = self.store.apply_definitions(agents);
        let all_methods = self.caches.lock().methods.clone();
        self.executor.start_pending(&all_methods);
        ApplyResponse { summary, error: None }
    }

    fn steer_inject(&self, payload: &SteerInject) {
        if !self.executor.inject_message(&payload.agent_name, &payload.message) {
            tracing::debug!(agent = %payload.agent_name, "steer_inject dropped: agent not running");
        }
    }

    fn steer_edit_prompt(&self, payload: &SteerEditPrompt) {
        self.caches
            .lock()
            .methods
            .entry(payload.agent_name.clone())
            .or_default()
            .insert(payload.method_name.clone(), payload.new_body.clone());
        self.executor.update_method_body(&payload.agent_name, &payload.method_name, &payload.new_body);
        self.broadcast_state(self.store.list_agents());
    }

    /// Notify every subscriber of an impending shutdown, then drop them
    /// (spec §4.5's graceful-stop sequence).
    pub fn notify_shutdown(&self, reason: &str) {
        let notice = Message::ShutdownNotice(gcluster_wire::ShutdownNotice { reason: reason.to_string() });
        let mut subscribers = self.subscribers.lock();
        for (_, tx) in subscribers.drain() {
            let _ = tx.send(notice.clone());
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
