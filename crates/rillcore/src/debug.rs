use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Upper bound on value previews carried by debug events
pub const PREVIEW_MAX_LEN: usize = 120;

/// Size-bounded textual preview of a pin value
pub fn preview(value: &Value) -> String {
    let mut s = format!("{:?}", value);
    if s.len() > PREVIEW_MAX_LEN {
        // cut at the nearest char boundary, never inside a multibyte char
        let cut = (0..=PREVIEW_MAX_LEN)
            .rev()
            .find(|&i| s.is_char_boundary(i))
            .unwrap_or(0);
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinDirection {
    Input,
    Output,
}

/// Observability events emitted during execution.
///
/// Consumed by the remote debugger transport; never able to alter the
/// execution outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DebugEvent {
    SessionStarted {
        session_id: Uuid,
        root: String,
        timestamp: DateTime<Utc>,
    },
    PinValue {
        path: String,
        pin: String,
        direction: PinDirection,
        preview: String,
        timestamp: DateTime<Utc>,
    },
    InstanceFired {
        path: String,
        node_id: String,
        timestamp: DateTime<Utc>,
    },
    InstanceCompleted {
        path: String,
        timestamp: DateTime<Utc>,
    },
    ErrorRaised {
        path: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    SessionEnded {
        session_id: Uuid,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

impl DebugEvent {
    pub fn session_started(session_id: Uuid, root: &str) -> Self {
        Self::SessionStarted {
            session_id,
            root: root.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn pin_value(path: &str, pin: &str, direction: PinDirection, value: &Value) -> Self {
        Self::PinValue {
            path: path.to_string(),
            pin: pin.to_string(),
            direction,
            preview: preview(value),
            timestamp: Utc::now(),
        }
    }

    pub fn instance_fired(path: &str, node_id: &str) -> Self {
        Self::InstanceFired {
            path: path.to_string(),
            node_id: node_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn instance_completed(path: &str) -> Self {
        Self::InstanceCompleted {
            path: path.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn error_raised(path: &str, message: &str) -> Self {
        Self::ErrorRaised {
            path: path.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn session_ended(session_id: Uuid, success: bool) -> Self {
        Self::SessionEnded {
            session_id,
            success,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast bus the debugger hook subscribes to; lossy by design, a slow
/// subscriber only affects itself.
#[derive(Clone)]
pub struct DebugBus {
    sender: broadcast::Sender<DebugEvent>,
}

impl DebugBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DebugEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: DebugEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_bounded() {
        let long = Value::String("x".repeat(500));
        let p = preview(&long);
        assert!(p.len() <= PREVIEW_MAX_LEN + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        // shift multibyte chars across every alignment of the cut point
        for pad in 0..4 {
            let value = Value::String(format!("{}{}", "a".repeat(pad), "é".repeat(80)));
            let p = preview(&value);
            assert!(p.len() <= PREVIEW_MAX_LEN + 3);
            assert!(p.ends_with("..."));
        }
    }

    #[test]
    fn short_values_pass_through() {
        let p = preview(&Value::Number(5.0));
        assert_eq!(p, "Number(5.0)");
    }
}
