use anyhow::Result;
use clap::{Parser, Subcommand};
use rillcore::{
    CompositeNode, DebugEvent, Node, NodeInstance, PinDirection, PinSpec, Value, BOUNDARY_INS_ID,
};
use rillnodes::stdlib;
use rillruntime::ExecutionSession;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rill")]
#[command(about = "Rill dataflow runtime CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in demo graph
    Demo {
        /// Input data as JSON object, e.g. '{"a": 2, "b": 3}'
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List available node definitions
    Nodes,
}

/// Convert a serde_json::Value to rillcore::Value
fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                Value::Number(f)
            } else {
                Value::Number(n.as_i64().unwrap_or(0) as f64)
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => {
            Value::Array(arr.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(obj) => {
            let map: HashMap<String, Value> = obj
                .into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect();
            Value::Object(map)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo { input, verbose } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::INFO)
                    .init();
            }

            run_demo(input).await?;
        }

        Commands::Nodes => {
            list_nodes();
        }
    }

    Ok(())
}

/// Demo graph: two boundary inputs summed, logged, and surfaced as the
/// root's single output.
fn demo_graph() -> Arc<Node> {
    Arc::new(Node::Composite(
        CompositeNode::new("demo")
            .with_inputs(vec![PinSpec::required("a"), PinSpec::required("b")])
            .with_outputs(["sum"])
            .add_instance(NodeInstance::new("add1", "math.add"))
            .add_instance(NodeInstance::new("log1", "debug.log"))
            .connect(BOUNDARY_INS_ID, "a", "add1", "n1")
            .connect(BOUNDARY_INS_ID, "b", "add1", "n2")
            .connect("add1", "sum", "log1", "value")
            .connect("log1", "out", BOUNDARY_INS_ID, "sum"),
    ))
}

async fn run_demo(input: Option<String>) -> Result<()> {
    let inputs: HashMap<String, Value> = if let Some(input_str) = input {
        let json: serde_json::Value = serde_json::from_str(&input_str)?;
        if let serde_json::Value::Object(obj) = json {
            obj.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect()
        } else {
            return Err(anyhow::anyhow!("Input must be a JSON object"));
        }
    } else {
        HashMap::from([
            ("a".to_string(), Value::Number(2.0)),
            ("b".to_string(), Value::Number(3.0)),
        ])
    };

    println!("🚀 Running demo graph: a + b, logged, surfaced as `sum`");
    println!();

    let session = ExecutionSession::new();
    let mut events = session.debug_bus().subscribe();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DebugEvent::SessionStarted { root, .. } => {
                    println!("▶️  Session started ({})", root);
                }
                DebugEvent::InstanceFired { path, node_id, .. } => {
                    println!("  ⚡ Firing {} ({})", path, node_id);
                }
                DebugEvent::PinValue {
                    path,
                    pin,
                    direction,
                    preview,
                    ..
                } => {
                    let arrow = match direction {
                        PinDirection::Input => "→",
                        PinDirection::Output => "←",
                    };
                    println!("     {} {}.{} = {}", arrow, path, pin, preview);
                }
                DebugEvent::InstanceCompleted { path, .. } => {
                    println!("  ✅ {} completed", path);
                }
                DebugEvent::ErrorRaised { path, message, .. } => {
                    println!("  ❌ {} failed: {}", path, message);
                }
                DebugEvent::SessionEnded { success, .. } => {
                    if success {
                        println!("✨ Session completed successfully");
                    } else {
                        println!("💥 Session ended with an error");
                    }
                }
            }
        }
    });

    let handle = session.execute(demo_graph(), stdlib(), inputs)?;
    let result = handle.result().await;

    // let the event listener drain before printing the summary
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    match result {
        Ok(outputs) => {
            println!("📤 Outputs:");
            for (pin, value) in &outputs {
                println!("   {}: {:?}", pin, value);
            }
        }
        Err(error) => {
            println!("💥 Execution failed: {}", error);
        }
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Definitions:");
    println!();

    let defs = stdlib();
    for id in defs.ids() {
        if let Some(node) = defs.get(id) {
            let inputs: Vec<&str> = node.inputs().iter().map(|p| p.name.as_str()).collect();
            let outputs: Vec<&str> = node.outputs().iter().map(String::as_str).collect();
            println!("  • {}", id);
            println!("    inputs: [{}]  outputs: [{}]", inputs.join(", "), outputs.join(", "));
        }
    }
}
