//! Behavioural tests for legacy connections served end to end.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::bridge::{BridgeBuilder, RunningBridge};
use crate::lifecycle::LifecycleListener;

use super::support::client::{LegacyClient, Received, render};
use super::support::config_loader::test_config;
use super::support::lifecycle::RecordingLifecycle;
use super::support::reporter::RecordingHealthReporter;
use super::support::targets::register_scenario_targets;

struct BridgeWorld {
    bridge: Option<RunningBridge>,
    client: Option<LegacyClient>,
    lifecycle: Arc<RecordingLifecycle>,
}

impl BridgeWorld {
    fn new() -> Self {
        Self {
            bridge: None,
            client: None,
            lifecycle: Arc::new(RecordingLifecycle::default()),
        }
    }

    fn start(&mut self, backpressure: bool, lifecycle: RecordingLifecycle) {
        self.lifecycle = Arc::new(lifecycle);
        let mut builder = BridgeBuilder::new()
            .with_listener(Arc::clone(&self.lifecycle) as Arc<dyn LifecycleListener>);
        register_scenario_targets(builder.symbols());
        let bridge = builder
            .start(
                &test_config(backpressure),
                Arc::new(RecordingHealthReporter::default()),
            )
            .expect("start bridge");
        self.client = Some(LegacyClient::connect(bridge.endpoint()));
        self.bridge = Some(bridge);
    }

    fn client(&mut self) -> &mut LegacyClient {
        self.client.as_mut().expect("bridge should be running")
    }
}

impl Drop for BridgeWorld {
    fn drop(&mut self) {
        self.client = None;
        if let Some(bridge) = self.bridge.take() {
            let _ = bridge.stop();
        }
    }
}

#[fixture]
fn world() -> RefCell<BridgeWorld> {
    RefCell::new(BridgeWorld::new())
}

#[given("a running bridge with backpressure enabled")]
fn given_throttled_bridge(world: &RefCell<BridgeWorld>) {
    world
        .borrow_mut()
        .start(true, RecordingLifecycle::default());
}

#[given("a running bridge with backpressure disabled")]
fn given_eager_bridge(world: &RefCell<BridgeWorld>) {
    world
        .borrow_mut()
        .start(false, RecordingLifecycle::default());
}

#[given("a running bridge whose lifecycle listener rejects \"{name}\"")]
fn given_rejecting_bridge(world: &RefCell<BridgeWorld>, name: String) {
    world
        .borrow_mut()
        .start(true, RecordingLifecycle::rejecting(&name));
}

#[when("the client sends \"{frame}\" one byte at a time")]
fn when_client_sends_bytewise(world: &RefCell<BridgeWorld>, frame: String) {
    world.borrow_mut().client().send_bytewise(frame.as_bytes());
}

#[when("the client sends \"{frame}\"")]
fn when_client_sends(world: &RefCell<BridgeWorld>, frame: String) {
    world.borrow_mut().client().send(frame.as_bytes());
}

#[when("the client pipelines \"{first}\" and \"{second}\"")]
fn when_client_pipelines(world: &RefCell<BridgeWorld>, first: String, second: String) {
    let bytes = [first.as_bytes(), second.as_bytes()].concat();
    world.borrow_mut().client().send(&bytes);
}

#[then("the client receives \"{frame}\"")]
fn then_client_receives(world: &RefCell<BridgeWorld>, frame: String) {
    let response = world.borrow_mut().client().receive_frame();
    assert_eq!(render(&response), frame);
}

#[then("the client receives error content of kind \"{kind}\"")]
fn then_client_receives_error(world: &RefCell<BridgeWorld>, kind: String) {
    let response = world.borrow_mut().client().receive_frame();
    assert_eq!(response.mime().as_str(), "error");
    let body = response.json().expect("error content is JSON");
    assert_eq!(body["kind"], kind.as_str(), "unexpected error body {body}");
}

#[then("the bridge closes the connection")]
fn then_bridge_closes(world: &RefCell<BridgeWorld>) {
    match world.borrow_mut().client().receive() {
        Received::Closed => {}
        Received::Frame(frame) => panic!("expected close, got {}", render(&frame)),
    }
}

#[then("the lifecycle listener records \"{events}\"")]
fn then_lifecycle_records(world: &RefCell<BridgeWorld>, events: String) {
    let expected: Vec<String> = events.split(", ").map(str::to_owned).collect();
    let recorded = world.borrow().lifecycle.wait_for(expected.len());
    assert_eq!(recorded, expected);
}

#[scenario(path = "tests/features/legacy_bridge.feature")]
fn legacy_bridge(#[from(world)] world: RefCell<BridgeWorld>) {
    drop(world);
}
