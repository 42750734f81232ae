use rillcore::Value;

type Subscriber = Box<dyn Fn(&Value) + Send>;

/// Event conduit behind one pin of one live instance.
///
/// Multicasts each emitted value to subscribers and remembers the latest
/// value plus a "has a value" flag. Deliberately not a queue: a rapid
/// re-emission before consumption overwrites "latest", since activation is
/// re-evaluated synchronously on every emit.
pub(crate) struct PinChannel {
    latest: Option<Value>,
    present: bool,
    subscribers: Vec<Subscriber>,
}

impl PinChannel {
    pub fn new() -> Self {
        Self {
            latest: None,
            present: false,
            subscribers: Vec::new(),
        }
    }

    pub fn emit(&mut self, value: Value) {
        for subscriber in &self.subscribers {
            subscriber(&value);
        }
        self.latest = Some(value);
        self.present = true;
    }

    pub fn subscribe(&mut self, f: Subscriber) {
        self.subscribers.push(f);
    }

    /// Last emitted value, retained across [`clear`](Self::clear)
    pub fn latest(&self) -> Option<&Value> {
        self.latest.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.present
    }

    /// Consume the pending value; the sticky latest value stays readable
    pub fn clear(&mut self) {
        self.present = false;
    }
}
