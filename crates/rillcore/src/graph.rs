use crate::behavior::NodeBehavior;
use crate::error::GraphError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Reserved instance id for a composite's own boundary pins
pub const BOUNDARY_INS_ID: &str = "__this";

/// How an input pin participates in activation readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinMode {
    Required,
    Optional,
    /// Required only when at least one connection (or a static binding)
    /// feeds the pin; otherwise it never blocks readiness.
    RequiredIfConnected,
}

/// Declared input pin of a node definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinSpec {
    pub name: String,
    pub mode: PinMode,
}

impl PinSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: PinMode::Required,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: PinMode::Optional,
        }
    }

    pub fn required_if_connected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: PinMode::RequiredIfConnected,
        }
    }
}

/// A resolved, immutable node definition.
///
/// Code nodes own a run behavior; composite nodes own an internal graph of
/// instances and connections whose boundary endpoints use [`BOUNDARY_INS_ID`].
#[derive(Clone)]
pub enum Node {
    Code(CodeNode),
    Composite(CompositeNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Code(n) => &n.id,
            Node::Composite(n) => &n.id,
        }
    }

    pub fn inputs(&self) -> &[PinSpec] {
        match self {
            Node::Code(n) => &n.inputs,
            Node::Composite(n) => &n.inputs,
        }
    }

    pub fn outputs(&self) -> &[String] {
        match self {
            Node::Code(n) => &n.outputs,
            Node::Composite(n) => &n.outputs,
        }
    }

    pub fn reactive_inputs(&self) -> &HashSet<String> {
        match self {
            Node::Code(n) => &n.reactive_inputs,
            Node::Composite(n) => &n.reactive_inputs,
        }
    }

    /// Output pins whose emission counts toward completion. Empty means the
    /// node never self-completes (root-like scopes fall back to all outputs).
    pub fn completion_outputs(&self) -> &[String] {
        match self {
            Node::Code(n) => &n.completion_outputs,
            Node::Composite(n) => &n.completion_outputs,
        }
    }

    pub fn input(&self, name: &str) -> Option<&PinSpec> {
        self.inputs().iter().find(|p| p.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs().iter().any(|o| o == name)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Node::Composite(_))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Code(n) => f.debug_struct("Code").field("id", &n.id).finish(),
            Node::Composite(n) => f
                .debug_struct("Composite")
                .field("id", &n.id)
                .field("instances", &n.instances.len())
                .finish(),
        }
    }
}

/// Node definition backed by a run behavior
#[derive(Clone)]
pub struct CodeNode {
    pub id: String,
    pub inputs: Vec<PinSpec>,
    pub outputs: Vec<String>,
    pub reactive_inputs: HashSet<String>,
    pub completion_outputs: Vec<String>,
    pub behavior: Arc<dyn NodeBehavior>,
}

impl CodeNode {
    pub fn new(id: impl Into<String>, behavior: Arc<dyn NodeBehavior>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            reactive_inputs: HashSet::new(),
            completion_outputs: Vec::new(),
            behavior,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<PinSpec>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs<S: Into<String>>(mut self, outputs: impl IntoIterator<Item = S>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn reactive<S: Into<String>>(mut self, pins: impl IntoIterator<Item = S>) -> Self {
        self.reactive_inputs = pins.into_iter().map(Into::into).collect();
        self
    }

    pub fn completes_on<S: Into<String>>(mut self, pins: impl IntoIterator<Item = S>) -> Self {
        self.completion_outputs = pins.into_iter().map(Into::into).collect();
        self
    }
}

/// Node definition whose body is itself a graph of instances
#[derive(Clone)]
pub struct CompositeNode {
    pub id: String,
    pub inputs: Vec<PinSpec>,
    pub outputs: Vec<String>,
    pub reactive_inputs: HashSet<String>,
    pub completion_outputs: Vec<String>,
    pub instances: Vec<NodeInstance>,
    pub connections: Vec<Connection>,
}

impl CompositeNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            reactive_inputs: HashSet::new(),
            completion_outputs: Vec::new(),
            instances: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<PinSpec>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs<S: Into<String>>(mut self, outputs: impl IntoIterator<Item = S>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn completes_on<S: Into<String>>(mut self, pins: impl IntoIterator<Item = S>) -> Self {
        self.completion_outputs = pins.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_instance(mut self, instance: NodeInstance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn connect(
        mut self,
        from_ins: impl Into<String>,
        from_pin: impl Into<String>,
        to_ins: impl Into<String>,
        to_pin: impl Into<String>,
    ) -> Self {
        self.connections
            .push(Connection::new(from_ins, from_pin, to_ins, to_pin));
        self
    }

    pub fn instance(&self, ins_id: &str) -> Option<&NodeInstance> {
        self.instances.iter().find(|i| i.id == ins_id)
    }
}

/// Placement of a node definition inside a composite (or at the root)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    /// Unique within the owning composite
    pub id: String,
    /// Key into the session's [`NodeTable`]
    pub node_id: String,
    /// Constant values pre-bound to input pins, bypassing connections
    pub config: HashMap<String, Value>,
}

impl NodeInstance {
    pub fn new(id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_id: node_id.into(),
            config: HashMap::new(),
        }
    }

    pub fn with_config(mut self, pin: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(pin.into(), value.into());
        self
    }
}

/// One endpoint of a connection; `ins_id` may be [`BOUNDARY_INS_ID`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionEnd {
    pub ins_id: String,
    pub pin_id: String,
}

impl ConnectionEnd {
    pub fn new(ins_id: impl Into<String>, pin_id: impl Into<String>) -> Self {
        Self {
            ins_id: ins_id.into(),
            pin_id: pin_id.into(),
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.ins_id == BOUNDARY_INS_ID
    }
}

/// Directed edge between two pins within one composite scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from: ConnectionEnd,
    pub to: ConnectionEnd,
}

impl Connection {
    pub fn new(
        from_ins: impl Into<String>,
        from_pin: impl Into<String>,
        to_ins: impl Into<String>,
        to_pin: impl Into<String>,
    ) -> Self {
        Self {
            from: ConnectionEnd::new(from_ins, from_pin),
            to: ConnectionEnd::new(to_ins, to_pin),
        }
    }
}

/// Fully-qualified instance identity: dot-joined chain of instance ids
/// from the root. Unique within one execution session at all times.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstancePath(String);

impl InstancePath {
    pub fn root(ins_id: &str) -> Self {
        Self(ins_id.to_string())
    }

    pub fn child(&self, ins_id: &str) -> Self {
        Self(format!("{}.{}", self.0, ins_id))
    }

    /// Child path for a dynamically spawned sub-execution; the suffix keeps
    /// sibling spawns disjoint.
    pub fn spawned(&self, node_id: &str, suffix: &str) -> Self {
        self.child(&format!("{}__{}", node_id, suffix))
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.rsplit_once('.').map(|(p, _)| Self(p.to_string()))
    }

    /// Last path segment: the instance id within its parent
    pub fn leaf(&self) -> &str {
        self.0.rsplit_once('.').map_or(&self.0, |(_, l)| l)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Instance ids of all ancestors, root first, excluding the leaf
    pub fn ancestors_ins_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.segments().map(str::to_string).collect();
        ids.pop();
        ids
    }

    /// True when `self` is `scope` or lies underneath it
    pub fn is_within(&self, scope: &InstancePath) -> bool {
        self == scope || self.0.starts_with(&format!("{}.", scope.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table of all resolved node definitions referenced by a graph,
/// keyed by node id. Supplied by the external resolver.
#[derive(Default, Clone)]
pub struct NodeTable {
    nodes: HashMap<String, Arc<Node>>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition keyed by its id, returning the shared handle
    pub fn insert(&mut self, node: Node) -> Arc<Node> {
        let node = Arc::new(node);
        self.nodes.insert(node.id().to_string(), node.clone());
        node
    }

    pub fn with(mut self, node: Node) -> Self {
        self.insert(node);
        self
    }

    pub fn resolve(&self, node_id: &str) -> std::result::Result<Arc<Node>, GraphError> {
        self.nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))
    }

    pub fn get(&self, node_id: &str) -> Option<Arc<Node>> {
        self.nodes.get(node_id).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_child_parent_leaf() {
        let root = InstancePath::root("main");
        let child = root.child("add1");
        assert_eq!(child.as_str(), "main.add1");
        assert_eq!(child.parent(), Some(root.clone()));
        assert_eq!(child.leaf(), "add1");
        assert_eq!(root.parent(), None);
        assert_eq!(root.leaf(), "main");
    }

    #[test]
    fn path_scope_containment() {
        let scope = InstancePath::root("main").child("sub");
        let inner = scope.child("x").child("y");
        assert!(inner.is_within(&scope));
        assert!(scope.is_within(&scope));
        // "main.subx" is not inside "main.sub"
        let sibling = InstancePath::root("main").child("subx");
        assert!(!sibling.is_within(&scope));
    }

    #[test]
    fn spawned_paths_are_disjoint_per_suffix() {
        let parent = InstancePath::root("main").child("map");
        let a = parent.spawned("double", "0");
        let b = parent.spawned("double", "1");
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "main.map.double__0");
    }

    #[test]
    fn ancestors_exclude_leaf() {
        let path = InstancePath::root("main").child("sub").child("add");
        assert_eq!(path.ancestors_ins_ids(), vec!["main", "sub"]);
    }

    #[test]
    fn boundary_endpoint_detection() {
        assert!(ConnectionEnd::new(BOUNDARY_INS_ID, "a").is_boundary());
        assert!(!ConnectionEnd::new("add", "a").is_boundary());
    }
}
