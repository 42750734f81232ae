use async_trait::async_trait;
use rillcore::{
    require, AdvContext, CodeNode, InputValues, Node, NodeBehavior, NodeError, OutputHandles,
    PinSpec, Value,
};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

const DEFAULT_DELAY_MS: f64 = 1000.0;
const DEFAULT_DEBOUNCE_MS: f64 = 250.0;

fn millis(inputs: &InputValues, default: f64) -> u64 {
    inputs
        .get("ms")
        .and_then(Value::as_f64)
        .unwrap_or(default)
        .max(0.0) as u64
}

/// Re-emits each value after `ms` milliseconds. `ms` is sticky
/// configuration; `value` is the reactive trigger.
pub struct DelayNode;

#[async_trait]
impl NodeBehavior for DelayNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        _adv: AdvContext,
    ) -> Result<(), NodeError> {
        let value = require(&inputs, "value")?.clone();
        sleep(Duration::from_millis(millis(&inputs, DEFAULT_DELAY_MS))).await;
        outputs.next("out", value);
        Ok(())
    }
}

pub fn delay() -> Node {
    Node::Code(
        CodeNode::new("time.delay", Arc::new(DelayNode))
            .with_inputs(vec![
                PinSpec::required("value"),
                PinSpec::required_if_connected("ms"),
            ])
            .with_outputs(["out"])
            .reactive(["value"]),
    )
}

/// Trailing-window debounce: the first value opens a `ms` window, later
/// arrivals inside it only update "latest", and the window closing emits
/// that latest value once. Never self-completes; the pending window is
/// invalidated through the cleanup registry on teardown.
pub struct DebounceNode;

const OPEN: &str = "debounce.open";
const LATEST: &str = "debounce.latest";
const TORN: &str = "debounce.torn";
const GUARD: &str = "debounce.guard";

#[async_trait]
impl NodeBehavior for DebounceNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        adv: AdvContext,
    ) -> Result<(), NodeError> {
        let value = require(&inputs, "value")?.clone();
        adv.state.set(LATEST, value);

        if adv.state.get(GUARD).is_none() {
            adv.state.set(GUARD, true);
            let state = adv.state.clone();
            adv.on_cleanup(move || state.set(TORN, true));
        }

        // atomic test-and-set: firings run as concurrent tasks, so only
        // the arrival that flips the flag may arm the window timer
        let mut already_open = false;
        adv.state.update(OPEN, |v| {
            already_open = v.and_then(Value::as_bool).unwrap_or(false);
            Value::Bool(true)
        });
        if already_open {
            return Ok(());
        }

        let ms = millis(&inputs, DEFAULT_DEBOUNCE_MS);
        let state = adv.state.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(ms)).await;
            state.set(OPEN, false);
            if state.get(TORN).and_then(|v| v.as_bool()).unwrap_or(false) {
                return;
            }
            if let Some(latest) = state.get(LATEST) {
                outputs.next("out", latest);
            }
        });
        Ok(())
    }
}

pub fn debounce() -> Node {
    Node::Code(
        CodeNode::new("time.debounce", Arc::new(DebounceNode))
            .with_inputs(vec![
                PinSpec::required("value"),
                PinSpec::required_if_connected("ms"),
            ])
            .with_outputs(["out"])
            .reactive(["value"]),
    )
}
