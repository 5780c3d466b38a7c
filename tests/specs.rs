//! End-to-end scenarios driven entirely over the control socket: apply,
//! steer subscribe/inject/edit-prompt, and pipeline setup errors (spec §8).

use std::sync::Arc;
use std::time::Duration;

use gcluster_core::{AgentDef, FakeClock, PipelineDef, RunState, Step};
use gcluster_daemon::{Server, Store};
use gcluster_engine::agent_call::fake::FakeAgentCall;
use gcluster_engine::{AgentCall, Executor, RunStateSink};
use gcluster_wire::{ApplyRequest, Message, SteerEditPrompt, SteerInject, SteerSubscribe};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

async fn spawn_server() -> (std::net::SocketAddr, Arc<FakeAgentCall>) {
    let store = Arc::new(Store::new(FakeClock::new(1_000)));
    let call = Arc::new(FakeAgentCall::new());
    let call_handle: Arc<dyn AgentCall> = call.clone();
    let store_sink: Arc<dyn RunStateSink> = Arc::clone(&store) as Arc<dyn RunStateSink>;
    let clock_handle: gcluster_engine::ClockHandle = Arc::new(FakeClock::new(1_000));
    let executor = Arc::new(Executor::new(call_handle, store_sink, clock_handle));

    let server = Server::new(Arc::clone(&store), Arc::clone(&executor));
    server.install_callbacks();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.listen(listener).await });

    (addr, call)
}

async fn connect(addr: std::net::SocketAddr) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, tokio::net::tcp::OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    (BufReader::new(read_half), write_half)
}

fn builder_def(pipeline: Option<PipelineDef>) -> AgentDef {
    let mut def = AgentDef::with_computed_id("builder", "(agent builder)");
    def.methods = Some(std::collections::HashMap::from([(
        "default".to_string(),
        "do the build".to_string(),
    )]));
    def.pipeline = pipeline;
    def
}

fn default_pipeline() -> PipelineDef {
    PipelineDef {
        initial_input: Some("go".to_string()),
        steps: vec![Step::r#loop("build", "default")],
    }
}

#[tokio::test]
async fn apply_then_reapply_is_idempotent() {
    let (addr, _call) = spawn_server().await;
    let (mut reader, mut writer) = connect(addr).await;

    let def = builder_def(None);
    gcluster_wire::write_message(&mut writer, &Message::ApplyRequest(ApplyRequest { agents: vec![def.clone()] }))
        .await
        .unwrap();
    let Message::ApplyResponse(response) = gcluster_wire::read_message(&mut reader).await.unwrap() else {
        panic!("expected apply_response");
    };
    assert_eq!(response.summary.created, vec!["builder".to_string()]);

    gcluster_wire::write_message(&mut writer, &Message::ApplyRequest(ApplyRequest { agents: vec![def] }))
        .await
        .unwrap();
    let Message::ApplyResponse(response) = gcluster_wire::read_message(&mut reader).await.unwrap() else {
        panic!("expected apply_response");
    };
    assert_eq!(response.summary.unchanged, vec!["builder".to_string()]);
    assert!(response.summary.created.is_empty());
}

#[tokio::test]
async fn updating_a_definition_creates_a_new_revision_and_resets_to_pending() {
    let (addr, _call) = spawn_server().await;
    let (mut reader, mut writer) = connect(addr).await;

    let def = builder_def(None);
    gcluster_wire::write_message(&mut writer, &Message::ApplyRequest(ApplyRequest { agents: vec![def] }))
        .await
        .unwrap();
    let _ = gcluster_wire::read_message(&mut reader).await.unwrap();

    let mut updated = builder_def(None);
    updated.definition = "(agent builder v2)".to_string();
    updated.id = gcluster_core::content_hash(&updated.definition);
    gcluster_wire::write_message(&mut writer, &Message::ApplyRequest(ApplyRequest { agents: vec![updated] }))
        .await
        .unwrap();
    let Message::ApplyResponse(response) = gcluster_wire::read_message(&mut reader).await.unwrap() else {
        panic!("expected apply_response");
    };
    assert_eq!(response.summary.updated, vec!["builder".to_string()]);
}

#[tokio::test]
async fn steer_subscribe_observes_a_push_on_apply() {
    let (addr, _call) = spawn_server().await;

    let (mut sub_reader, mut sub_writer) = connect(addr).await;
    gcluster_wire::write_message(&mut sub_writer, &Message::SteerSubscribe(SteerSubscribe {}))
        .await
        .unwrap();
    let Message::SteerState(initial) = gcluster_wire::read_message(&mut sub_reader).await.unwrap() else {
        panic!("expected initial steer_state");
    };
    assert!(initial.objects.is_empty());

    let (mut apply_reader, mut apply_writer) = connect(addr).await;
    gcluster_wire::write_message(
        &mut apply_writer,
        &Message::ApplyRequest(ApplyRequest { agents: vec![builder_def(None)] }),
    )
    .await
    .unwrap();
    let _ = gcluster_wire::read_message(&mut apply_reader).await.unwrap();

    let Message::SteerState(pushed) = gcluster_wire::read_message(&mut sub_reader).await.unwrap() else {
        panic!("expected pushed steer_state");
    };
    assert_eq!(pushed.objects.len(), 1);
    assert_eq!(pushed.objects[0].name, "builder");
}

#[tokio::test]
async fn inject_reaches_a_running_pipeline() {
    let (addr, call) = spawn_server().await;
    let (mut reader, mut writer) = connect(addr).await;

    let def = builder_def(Some(default_pipeline()));
    gcluster_wire::write_message(&mut writer, &Message::ApplyRequest(ApplyRequest { agents: vec![def] }))
        .await
        .unwrap();
    let _ = gcluster_wire::read_message(&mut reader).await.unwrap();

    // Give the executor's loop task a moment to start the first iteration.
    tokio::time::sleep(Duration::from_millis(50)).await;

    gcluster_wire::write_message(
        &mut writer,
        &Message::SteerInject(SteerInject {
            agent_name: "builder".to_string(),
            step_label: None,
            iteration: None,
            message: "focus on tests".to_string(),
        }),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let prompts = call.received_prompts();
    assert!(!prompts.is_empty(), "expected at least one call to the agent");
}

#[tokio::test]
async fn edit_prompt_swaps_the_base_body_and_broadcasts() {
    let (addr, _call) = spawn_server().await;
    let (mut reader, mut writer) = connect(addr).await;

    let def = builder_def(None);
    gcluster_wire::write_message(&mut writer, &Message::ApplyRequest(ApplyRequest { agents: vec![def] }))
        .await
        .unwrap();
    let _ = gcluster_wire::read_message(&mut reader).await.unwrap();

    let (mut sub_reader, mut sub_writer) = connect(addr).await;
    gcluster_wire::write_message(&mut sub_writer, &Message::SteerSubscribe(SteerSubscribe {}))
        .await
        .unwrap();
    let _ = gcluster_wire::read_message(&mut sub_reader).await.unwrap();

    gcluster_wire::write_message(
        &mut writer,
        &Message::SteerEditPrompt(SteerEditPrompt {
            agent_name: "builder".to_string(),
            method_name: "default".to_string(),
            new_body: "do the build, carefully".to_string(),
        }),
    )
    .await
    .unwrap();

    let Message::SteerState(pushed) = gcluster_wire::read_message(&mut sub_reader).await.unwrap() else {
        panic!("expected a steer_state push after edit_prompt");
    };
    let methods = pushed.methods.expect("methods cache should be populated");
    assert_eq!(methods["builder"]["default"], "do the build, carefully");
}

#[tokio::test]
async fn pipeline_setup_error_is_recorded_and_visible_in_steer_state() {
    let (addr, _call) = spawn_server().await;
    let (mut reader, mut writer) = connect(addr).await;

    // A loop step references "default", but the only method supplied is
    // "other": validate_methods must fail start() and the agent must stay
    // observably Pending rather than silently appear healthy.
    let mut def = builder_def(Some(default_pipeline()));
    def.methods = Some(std::collections::HashMap::from([(
        "other".to_string(),
        "unrelated".to_string(),
    )]));
    gcluster_wire::write_message(&mut writer, &Message::ApplyRequest(ApplyRequest { agents: vec![def] }))
        .await
        .unwrap();
    let _ = gcluster_wire::read_message(&mut reader).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    gcluster_wire::write_message(&mut writer, &Message::SteerSubscribe(SteerSubscribe {}))
        .await
        .unwrap();
    let Message::SteerState(state) = gcluster_wire::read_message(&mut reader).await.unwrap() else {
        panic!("expected steer_state");
    };
    let obj = state.objects.iter().find(|o| o.name == "builder").unwrap();
    // Setup failed before the executor could transition the agent to
    // Running, so it stays Pending rather than silently appearing healthy.
    assert_eq!(obj.state, RunState::Pending);
}
