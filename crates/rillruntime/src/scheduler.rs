//! Activation rule: decides on every input arrival whether an instance
//! fires now, and with which snapshot.
//!
//! One rule covers both shapes of node. Join nodes (no reactive inputs)
//! fire once per complete fresh set of required values, which are all
//! consumed by the firing. Reactive nodes fire per arrival on a reactive
//! pin, consuming only that pin while every other input stays sticky as
//! configuration context.

use crate::record::InstanceRecord;
use rillcore::{InputValues, PinMode};

/// Handle one value arrival at `pin`; the value itself is already in the
/// pin's channel. Returns the input snapshot when the instance should fire.
pub(crate) fn on_arrival(record: &mut InstanceRecord, pin: &str) -> Option<InputValues> {
    let required = required_pins(record);
    let ready = required
        .iter()
        .all(|p| record.inputs.get(p).is_some_and(|ch| ch.has_value()));

    if record.node.reactive_inputs().contains(pin) {
        if !ready {
            return None;
        }
        let snapshot = snapshot(record);
        // reactive pins are consumed; everything else stays sticky
        if let Some(ch) = record.inputs.get_mut(pin) {
            ch.clear();
        }
        Some(snapshot)
    } else if record.node.reactive_inputs().is_empty() {
        if !ready {
            return None;
        }
        let snapshot = snapshot(record);
        // join semantics: every required pin must be freshly supplied again
        for p in &required {
            if let Some(ch) = record.inputs.get_mut(p) {
                ch.clear();
            }
        }
        Some(snapshot)
    } else {
        // non-reactive arrival on a node with reactive pins: the value is
        // now the sticky context for the next reactive firing
        None
    }
}

/// Pins that block readiness: `Required` always, `RequiredIfConnected`
/// only when something actually feeds the pin. An unconnected
/// required-if-connected pin is auto-satisfied.
pub(crate) fn required_pins(record: &InstanceRecord) -> Vec<String> {
    record
        .node
        .inputs()
        .iter()
        .filter(|spec| match spec.mode {
            PinMode::Required => true,
            PinMode::Optional => false,
            PinMode::RequiredIfConnected => record.connected.contains(&spec.name),
        })
        .map(|spec| spec.name.clone())
        .collect()
}

fn snapshot(record: &InstanceRecord) -> InputValues {
    record
        .inputs
        .iter()
        .filter_map(|(pin, ch)| ch.latest().map(|v| (pin.clone(), v.clone())))
        .collect()
}
