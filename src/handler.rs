//! Push handler registry.
//!
//! Each resource keeps an ordered list of typed push handlers. Dispatch
//! coerces the pushed value to what each handler asked for:
//!
//! | Handler type | Receives |
//! |---|---|
//! | trigger | every push (timestamp only) |
//! | boolean / numeric | pushes of exactly that type |
//! | string | every push, rendered as text |
//! | json | every push, rendered as a JSON document |

use crate::types::{DataSample, DataType};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque reference to a registered push handler.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef(pub u64);

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerRef({})", self.0)
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Global counter for generating unique handler references
static NEXT_HANDLER_REF: AtomicU64 = AtomicU64::new(1);

impl HandlerRef {
    pub fn next() -> Self {
        HandlerRef(NEXT_HANDLER_REF.fetch_add(1, Ordering::Relaxed))
    }
}

/// The value a handler receives, already coerced to the handler's type.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerValue {
    Trigger,
    Boolean(bool),
    Numeric(f64),
    String(String),
    Json(String),
}

impl HandlerValue {
    /// Coerce a pushed value for a handler of `handler_type`.
    ///
    /// Returns `None` when a handler of that type does not receive values
    /// of `data_type`.
    pub fn for_handler(
        handler_type: DataType,
        data_type: DataType,
        sample: &DataSample,
    ) -> Option<HandlerValue> {
        match handler_type {
            DataType::Trigger => Some(HandlerValue::Trigger),
            DataType::String => Some(HandlerValue::String(sample.to_text())),
            DataType::Json => Some(HandlerValue::Json(sample.to_json(data_type))),
            DataType::Boolean if data_type == DataType::Boolean => {
                sample.as_bool().map(HandlerValue::Boolean)
            }
            DataType::Numeric if data_type == DataType::Numeric => {
                sample.as_f64().map(HandlerValue::Numeric)
            }
            _ => None,
        }
    }
}

/// Callback invoked with the sample timestamp and the coerced value.
pub type PushCallback = Box<dyn FnMut(f64, &HandlerValue) + Send>;

pub struct PushHandler {
    pub handler_ref: HandlerRef,
    pub data_type: DataType,
    callback: PushCallback,
}

impl fmt::Debug for PushHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushHandler")
            .field("handler_ref", &self.handler_ref)
            .field("data_type", &self.data_type)
            .finish()
    }
}

impl PushHandler {
    /// Invoke this handler if it accepts `data_type`. Returns whether it ran.
    pub fn call(&mut self, data_type: DataType, sample: &DataSample) -> bool {
        match HandlerValue::for_handler(self.data_type, data_type, sample) {
            Some(value) => {
                (self.callback)(sample.timestamp(), &value);
                true
            }
            None => false,
        }
    }
}

/// Ordered list of push handlers on one resource.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<PushHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Append a handler and return its reference.
    pub fn add(&mut self, data_type: DataType, callback: PushCallback) -> HandlerRef {
        let handler_ref = HandlerRef::next();
        self.handlers.push(PushHandler {
            handler_ref,
            data_type,
            callback,
        });
        handler_ref
    }

    /// Remove a handler. Returns `false` if it was not registered here.
    pub fn remove(&mut self, handler_ref: HandlerRef) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|h| h.handler_ref != handler_ref);
        self.handlers.len() != before
    }

    pub fn contains(&self, handler_ref: HandlerRef) -> bool {
        self.handlers.iter().any(|h| h.handler_ref == handler_ref)
    }

    /// Call one handler only (used to replay the current value to a new subscriber).
    pub fn call_one(&mut self, handler_ref: HandlerRef, data_type: DataType, sample: &DataSample) {
        if let Some(handler) = self
            .handlers
            .iter_mut()
            .find(|h| h.handler_ref == handler_ref)
        {
            handler.call(data_type, sample);
        }
    }

    /// Call every matching handler, in registration order.
    pub fn call_all(&mut self, data_type: DataType, sample: &DataSample) -> usize {
        let mut called = 0;
        for handler in &mut self.handlers {
            if handler.call(data_type, sample) {
                called += 1;
            }
        }
        called
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<HandlerValue>>>, PushCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb: PushCallback = Box::new(move |_ts, v| sink.lock().unwrap().push(v.clone()));
        (seen, cb)
    }

    #[test]
    fn test_dispatch_coerces_for_string_handlers() {
        let mut registry = HandlerRegistry::new();
        let (strings, cb) = recorder();
        registry.add(DataType::String, cb);
        let (numbers, cb) = recorder();
        registry.add(DataType::Numeric, cb);
        let (bools, cb) = recorder();
        registry.add(DataType::Boolean, cb);

        let called = registry.call_all(DataType::Numeric, &DataSample::numeric(1.0, 21.5));
        assert_eq!(called, 2);
        assert_eq!(strings.lock().unwrap()[0], HandlerValue::String("21.5".into()));
        assert_eq!(numbers.lock().unwrap()[0], HandlerValue::Numeric(21.5));
        assert!(bools.lock().unwrap().is_empty());
    }

    #[test]
    fn test_trigger_handler_sees_every_push() {
        let mut registry = HandlerRegistry::new();
        let (seen, cb) = recorder();
        registry.add(DataType::Trigger, cb);
        registry.call_all(DataType::Boolean, &DataSample::boolean(1.0, true));
        registry.call_all(DataType::String, &DataSample::text(2.0, "x"));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_json_handler_quotes_strings() {
        let sample = DataSample::text(1.0, "hi");
        let value = HandlerValue::for_handler(DataType::Json, DataType::String, &sample);
        assert_eq!(value, Some(HandlerValue::Json("\"hi\"".into())));
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut registry = HandlerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut refs = Vec::new();
        for i in 0..3 {
            let order = order.clone();
            refs.push(registry.add(
                DataType::Trigger,
                Box::new(move |_, _| order.lock().unwrap().push(i)),
            ));
        }
        assert!(registry.remove(refs[1]));
        assert!(!registry.remove(refs[1]));
        registry.call_all(DataType::Trigger, &DataSample::trigger(1.0));
        assert_eq!(*order.lock().unwrap(), vec![0, 2]);
    }
}
