use rillcore::{CompositeNode, InstancePath};
use std::collections::HashMap;

/// Where a routed value lands
#[derive(Clone, Debug)]
pub(crate) enum RouteTarget {
    /// An instance input pin within the scope
    Input { path: InstancePath, pin: String },
    /// The enclosing composite's own output pin (boundary bridge)
    ScopeOutput { path: InstancePath, pin: String },
}

type RouteKey = (InstancePath, String, String);

/// Connection lookup for every expanded composite scope. Keyed by
/// `(scope, source instance id, source pin)`; the source id is
/// [`BOUNDARY_INS_ID`](rillcore::BOUNDARY_INS_ID) for values entering
/// through the composite's own inputs.
pub(crate) struct ConnectionRouter {
    routes: HashMap<RouteKey, Vec<RouteTarget>>,
}

impl ConnectionRouter {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a composite scope's connections. Fan-out order follows
    /// declaration order of the connection list.
    pub fn wire_scope(&mut self, scope: &InstancePath, composite: &CompositeNode) {
        for conn in &composite.connections {
            let key = (
                scope.clone(),
                conn.from.ins_id.clone(),
                conn.from.pin_id.clone(),
            );
            let target = if conn.to.is_boundary() {
                RouteTarget::ScopeOutput {
                    path: scope.clone(),
                    pin: conn.to.pin_id.clone(),
                }
            } else {
                RouteTarget::Input {
                    path: scope.child(&conn.to.ins_id),
                    pin: conn.to.pin_id.clone(),
                }
            };
            self.routes.entry(key).or_default().push(target);
        }
    }

    /// Targets for one emission, in declaration order. Cloned out so the
    /// caller can mutate records while delivering.
    pub fn targets(&self, scope: &InstancePath, from_ins: &str, from_pin: &str) -> Vec<RouteTarget> {
        self.routes
            .get(&(
                scope.clone(),
                from_ins.to_string(),
                from_pin.to_string(),
            ))
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every route belonging to `scope` or a scope nested inside it
    pub fn remove_scope(&mut self, scope: &InstancePath) {
        self.routes.retain(|(s, _, _), _| !s.is_within(scope));
    }
}
