use crate::record::InstanceRecord;

/// Note an emission on `pin` for completion purposes. Returns true exactly
/// once, when the instance's satisfied set first covers its completion set.
pub(crate) fn note_emission(record: &mut InstanceRecord, pin: &str) -> bool {
    let Some(set) = &record.completion_set else {
        return false;
    };
    if record.completed || !set.contains(pin) {
        return false;
    }
    record.satisfied.insert(pin.to_string());
    if record.satisfied.len() == set.len() {
        record.completed = true;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rillcore::{CompositeNode, InstancePath, Node};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn root_record(outputs: &[&str], completion: &[&str]) -> InstanceRecord {
        let node = CompositeNode::new("main")
            .with_outputs(outputs.iter().copied())
            .completes_on(completion.iter().copied());
        InstanceRecord::new(
            InstancePath::root("main"),
            Arc::new(Node::Composite(node)),
            HashMap::new(),
            Default::default(),
            true,
        )
    }

    #[test]
    fn root_without_completion_map_needs_every_output() {
        let mut rec = root_record(&["a", "b"], &[]);
        assert!(!note_emission(&mut rec, "a"));
        assert!(!note_emission(&mut rec, "a"));
        assert!(note_emission(&mut rec, "b"));
        // complete is latched
        assert!(!note_emission(&mut rec, "a"));
    }

    #[test]
    fn explicit_completion_subset_wins() {
        let mut rec = root_record(&["a", "b"], &["a"]);
        assert!(!note_emission(&mut rec, "b"));
        assert!(note_emission(&mut rec, "a"));
    }

    #[test]
    fn plain_instance_with_no_completion_outputs_never_completes() {
        let node = CompositeNode::new("inner").with_outputs(["out"]);
        let mut rec = InstanceRecord::new(
            InstancePath::root("main").child("inner"),
            Arc::new(Node::Composite(node)),
            HashMap::new(),
            Default::default(),
            false,
        );
        assert!(!note_emission(&mut rec, "out"));
        assert!(!rec.completed);
    }
}
