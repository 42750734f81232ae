//! Standard node library tests, driven through a real execution session

use futures::future::BoxFuture;
use rillcore::{
    AdvContext, CodeNode, CompositeNode, FnNode, InputValues, Node, NodeError, NodeInstance,
    OutputHandles, PinSpec, RuntimeError, Value, BOUNDARY_INS_ID,
};
use rillnodes::stdlib;
use rillruntime::ExecutionSession;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

fn inputs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(pin, v)| (pin.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn math_add_sums_through_a_graph() {
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("a"), PinSpec::required("b")])
            .with_outputs(["sum"])
            .add_instance(NodeInstance::new("add1", "math.add"))
            .connect(BOUNDARY_INS_ID, "a", "add1", "n1")
            .connect(BOUNDARY_INS_ID, "b", "add1", "n2")
            .connect("add1", "sum", BOUNDARY_INS_ID, "sum"),
    ));

    let session = ExecutionSession::new();
    let handle = session
        .execute(
            root,
            stdlib(),
            inputs(&[("a", Value::Number(2.0)), ("b", Value::Number(3.0))]),
        )
        .expect("starts");
    let outputs = handle.result().await.expect("completes");
    assert_eq!(outputs["sum"], Value::Number(5.0));
}

#[tokio::test]
async fn math_add_rejects_non_numbers() {
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("a"), PinSpec::required("b")])
            .with_outputs(["sum"])
            .add_instance(NodeInstance::new("add1", "math.add"))
            .connect(BOUNDARY_INS_ID, "a", "add1", "n1")
            .connect(BOUNDARY_INS_ID, "b", "add1", "n2")
            .connect("add1", "sum", BOUNDARY_INS_ID, "sum"),
    ));

    let session = ExecutionSession::new();
    let handle = session
        .execute(
            root,
            stdlib(),
            inputs(&[("a", Value::Number(2.0)), ("b", Value::from("three"))]),
        )
        .expect("starts");
    let error = handle.result().await.expect_err("type error bubbles");
    match error {
        RuntimeError::NodeFailed { source, .. } => {
            assert!(matches!(source, NodeError::InvalidInputType { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn delay_reemits_after_the_configured_pause() {
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("value")])
            .with_outputs(["out"])
            .add_instance(NodeInstance::new("d", "time.delay").with_config("ms", 100.0))
            .connect(BOUNDARY_INS_ID, "value", "d", "value")
            .connect("d", "out", BOUNDARY_INS_ID, "out"),
    ));

    let session = ExecutionSession::new();
    let handle = session
        .execute(root, stdlib(), inputs(&[("value", Value::from("hello"))]))
        .expect("starts");
    let outputs = handle.result().await.expect("completes");
    assert_eq!(outputs["out"], Value::from("hello"));
}

#[tokio::test(start_paused = true)]
async fn debounce_emits_the_window_latest_once() {
    // the unconnected "never" output keeps the root streaming
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("value")])
            .with_outputs(["out", "never"])
            .completes_on(["never"])
            .add_instance(NodeInstance::new("d", "time.debounce").with_config("ms", 50.0))
            .connect(BOUNDARY_INS_ID, "value", "d", "value")
            .connect("d", "out", BOUNDARY_INS_ID, "out"),
    ));

    let session = ExecutionSession::new();
    let handle = session.execute(root, stdlib(), HashMap::new()).expect("starts");
    let mut out_rx = handle.watch_outputs();

    handle.push_input("value", Value::Number(1.0));
    sleep(Duration::from_millis(10)).await;
    handle.push_input("value", Value::Number(2.0));

    // one emission per window, carrying the latest value inside it
    let first = timeout(Duration::from_millis(100), out_rx.recv())
        .await
        .expect("window closes")
        .expect("emission");
    assert_eq!(first.value, Value::Number(2.0));

    // a later value opens a fresh window
    handle.push_input("value", Value::Number(3.0));
    let second = timeout(Duration::from_millis(100), out_rx.recv())
        .await
        .expect("second window closes")
        .expect("emission");
    assert_eq!(second.value, Value::Number(3.0));

    // and nothing else is pending
    assert!(timeout(Duration::from_millis(200), out_rx.recv())
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn debounce_rapid_arrivals_open_a_single_window() {
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("value")])
            .with_outputs(["out", "never"])
            .completes_on(["never"])
            .add_instance(NodeInstance::new("d", "time.debounce").with_config("ms", 50.0))
            .connect(BOUNDARY_INS_ID, "value", "d", "value")
            .connect("d", "out", BOUNDARY_INS_ID, "out"),
    ));

    let session = ExecutionSession::new();
    let handle = session.execute(root, stdlib(), HashMap::new()).expect("starts");
    let mut out_rx = handle.watch_outputs();

    // concurrent firings must not each arm a window timer
    for v in 1..=8 {
        handle.push_input("value", Value::Number(v as f64));
    }

    timeout(Duration::from_millis(500), out_rx.recv())
        .await
        .expect("window closes")
        .expect("emission");
    assert!(timeout(Duration::from_millis(150), out_rx.recv())
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn debounce_pending_window_is_cancelled_by_stop() {
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("value")])
            .with_outputs(["out", "never"])
            .completes_on(["never"])
            .add_instance(NodeInstance::new("d", "time.debounce").with_config("ms", 50.0))
            .connect(BOUNDARY_INS_ID, "value", "d", "value")
            .connect("d", "out", BOUNDARY_INS_ID, "out"),
    ));

    let session = ExecutionSession::new();
    let handle = session.execute(root, stdlib(), HashMap::new()).expect("starts");
    let mut out_rx = handle.watch_outputs();

    handle.push_input("value", Value::Number(1.0));
    sleep(Duration::from_millis(10)).await;
    handle.stop();

    assert!(timeout(Duration::from_millis(200), out_rx.recv())
        .await
        .is_err());
    let error = handle.result().await.expect_err("stopped");
    assert!(matches!(error, RuntimeError::Stopped));
}

#[tokio::test]
async fn global_state_is_shared_across_runs_of_one_session() {
    let session = ExecutionSession::new();
    let defs = stdlib();

    let set = session
        .execute(
            defs.resolve("state.set-global").expect("registered"),
            defs.clone(),
            inputs(&[("key", Value::from("answer")), ("value", Value::Number(42.0))]),
        )
        .expect("starts");
    let saved = set.result().await.expect("completes");
    assert_eq!(saved["saved"], Value::Number(42.0));
    assert_eq!(
        session.global_state().get("answer"),
        Some(Value::Number(42.0))
    );

    let get = session
        .execute(
            defs.resolve("state.get-global").expect("registered"),
            defs.clone(),
            inputs(&[("key", Value::from("answer"))]),
        )
        .expect("starts");
    let outputs = get.result().await.expect("completes");
    assert_eq!(outputs["value"], Value::Number(42.0));
}

#[tokio::test]
async fn get_global_yields_null_for_missing_keys() {
    let session = ExecutionSession::new();
    let defs = stdlib();
    let handle = session
        .execute(
            defs.resolve("state.get-global").expect("registered"),
            defs.clone(),
            inputs(&[("key", Value::from("nope"))]),
        )
        .expect("starts");
    let outputs = handle.result().await.expect("completes");
    assert_eq!(outputs["value"], Value::Null);
}

fn double_def() -> Node {
    Node::Code(
        CodeNode::new(
            "double",
            Arc::new(FnNode(
                |inputs: InputValues, outputs: OutputHandles, _: AdvContext| {
                    Box::pin(async move {
                        let n = inputs["n"].as_f64().unwrap_or(0.0);
                        outputs.next("d", Value::Number(n * 2.0));
                        Ok(())
                    }) as BoxFuture<'static, Result<(), NodeError>>
                },
            )),
        )
        .with_inputs(vec![PinSpec::required("n")])
        .with_outputs(["d"]),
    )
}

#[tokio::test]
async fn list_map_preserves_element_order() {
    let defs = stdlib().with(double_def());
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("list")])
            .with_outputs(["out"])
            .add_instance(NodeInstance::new("m", "control.list-map").with_config("item_node", "double"))
            .connect(BOUNDARY_INS_ID, "list", "m", "list")
            .connect("m", "list", BOUNDARY_INS_ID, "out"),
    ));

    let session = ExecutionSession::new();
    let list = Value::Array(vec![
        Value::Number(1.0),
        Value::Number(2.0),
        Value::Number(3.0),
    ]);
    let handle = session
        .execute(root, defs, inputs(&[("list", list)]))
        .expect("starts");
    let outputs = handle.result().await.expect("completes");
    assert_eq!(
        outputs["out"],
        Value::Array(vec![
            Value::Number(2.0),
            Value::Number(4.0),
            Value::Number(6.0),
        ])
    );
}

#[tokio::test]
async fn list_map_handles_the_empty_list() {
    let defs = stdlib().with(double_def());
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("list")])
            .with_outputs(["out"])
            .add_instance(NodeInstance::new("m", "control.list-map").with_config("item_node", "double"))
            .connect(BOUNDARY_INS_ID, "list", "m", "list")
            .connect("m", "list", BOUNDARY_INS_ID, "out"),
    ));

    let session = ExecutionSession::new();
    let handle = session
        .execute(root, defs, inputs(&[("list", Value::Array(Vec::new()))]))
        .expect("starts");
    let outputs = handle.result().await.expect("completes");
    assert_eq!(outputs["out"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn log_passes_its_value_through() {
    let root = Arc::new(Node::Composite(
        CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("value")])
            .with_outputs(["out"])
            .add_instance(NodeInstance::new("l", "debug.log"))
            .connect(BOUNDARY_INS_ID, "value", "l", "value")
            .connect("l", "out", BOUNDARY_INS_ID, "out"),
    ));

    let session = ExecutionSession::new();
    let handle = session
        .execute(root, stdlib(), inputs(&[("value", Value::from("ping"))]))
        .expect("starts");
    let outputs = handle.result().await.expect("completes");
    assert_eq!(outputs["out"], Value::from("ping"));
}
