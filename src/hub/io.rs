//! API for the owners of Inputs and Outputs.
//!
//! Misuse by an owner (pushing to something that is not its Input, asking
//! for the wrong type from its own Output) is a [`HubError::ClientFault`]:
//! the service layer ends that client's session.

use super::{validate_sample, Hub, TreeChange};
use crate::error::{HubError, Result};
use crate::handler::{HandlerRef, PushCallback};
use crate::resource::TypedSample;
use crate::tree::{EntryId, EntryKind, IoKind, ResourceTree};
use crate::types::{DataSample, DataType};
use tracing::info;

impl Hub {
    /// Create an Input, or confirm an identical one exists.
    pub fn create_input(&mut self, path: &str, data_type: DataType, units: &str) -> Result<EntryId> {
        self.create_io(path, IoKind::Input, data_type, units)
    }

    /// Create an Output, or confirm an identical one exists.
    pub fn create_output(&mut self, path: &str, data_type: DataType, units: &str) -> Result<EntryId> {
        self.create_io(path, IoKind::Output, data_type, units)
    }

    fn create_io(&mut self, path: &str, io_kind: IoKind, data_type: DataType, units: &str) -> Result<EntryId> {
        let (id, created) = self
            .tree
            .get_or_create_io(ResourceTree::ROOT, path, io_kind, data_type, units)?;
        if created {
            let kind = self.tree.kind(id).unwrap_or(EntryKind::Placeholder);
            self.notify_tree_change(id, kind, TreeChange::Added);
        }
        Ok(id)
    }

    /// Delete an Input or Output. Administrative settings survive on a
    /// Placeholder.
    pub fn delete_io(&mut self, path: &str) -> Result<()> {
        let id = self.resource_id(path)?;
        let kind = self.tree.kind(id).unwrap_or(EntryKind::Namespace);
        if !matches!(kind, EntryKind::Input | EntryKind::Output) {
            return Err(HubError::NotFound(format!("no input or output at '{}'", path)));
        }
        self.notify_tree_change(id, kind, TreeChange::Removed);
        if self.tree.delete_resource(id) {
            info!("{} {} kept as placeholder", kind, path);
        } else {
            info!("Deleted {} {}", kind, path);
        }
        Ok(())
    }

    /// Push a value to one of the caller's Inputs.
    ///
    /// A zero timestamp is replaced with the current wall time.
    pub fn io_push(&mut self, path: &str, data_type: DataType, sample: DataSample) -> Result<()> {
        let id = self.owned(path, EntryKind::Input)?;
        validate_sample(data_type, &sample).map_err(client_fault)?;
        let sample = self.stamp(sample);
        let units = self.tree.resource(id).map(|r| r.core.units.clone()).unwrap_or_default();
        self.push_to(id, data_type, &units, sample);
        Ok(())
    }

    /// Register a push handler on one of the caller's Inputs or Outputs.
    ///
    /// Trigger, string and JSON handlers fit any point; boolean and numeric
    /// handlers must match the point's type.
    pub fn io_add_push_handler(
        &mut self,
        path: &str,
        data_type: DataType,
        callback: PushCallback,
    ) -> Result<HandlerRef> {
        let id = self.resource_id(path)?;
        let fixed = self
            .tree
            .resource(id)
            .and_then(|r| r.fixed_type())
            .ok_or_else(|| HubError::ClientFault(format!("'{}' is not an input or output", path)))?;
        let fits = matches!(data_type, DataType::Trigger | DataType::String | DataType::Json)
            || data_type == fixed;
        if !fits {
            return Err(HubError::ClientFault(format!(
                "{} handler on {} point '{}'",
                data_type, fixed, path
            )));
        }
        Ok(self.register_handler(id, data_type, callback))
    }

    /// Current value of one of the caller's Outputs.
    pub fn io_get(&self, path: &str, data_type: DataType) -> Result<DataSample> {
        let id = self.owned(path, EntryKind::Output)?;
        let res = self.tree.resource(id).ok_or_else(|| HubError::NotFound(path.to_string()))?;
        if res.fixed_type() != Some(data_type) {
            return Err(HubError::ClientFault(format!(
                "read {} from {} output '{}'",
                data_type,
                res.fixed_type().unwrap_or_default(),
                path
            )));
        }
        current_of(res.core.current.as_ref(), path).map(|c| c.sample.clone())
    }

    pub fn io_get_boolean(&self, path: &str) -> Result<bool> {
        let sample = self.io_get(path, DataType::Boolean)?;
        sample.as_bool().ok_or_else(|| unavailable(path))
    }

    pub fn io_get_numeric(&self, path: &str) -> Result<f64> {
        let sample = self.io_get(path, DataType::Numeric)?;
        sample.as_f64().ok_or_else(|| unavailable(path))
    }

    pub fn io_get_string(&self, path: &str) -> Result<String> {
        let sample = self.io_get(path, DataType::String)?;
        sample.as_text().map(str::to_string).ok_or_else(|| unavailable(path))
    }

    pub fn io_get_json(&self, path: &str) -> Result<String> {
        let sample = self.io_get(path, DataType::Json)?;
        sample.as_text().map(str::to_string).ok_or_else(|| unavailable(path))
    }

    /// Timestamp of an Output's current value, whatever its type.
    pub fn io_get_timestamp(&self, path: &str) -> Result<f64> {
        let id = self.owned(path, EntryKind::Output)?;
        let res = self.tree.resource(id).ok_or_else(|| HubError::NotFound(path.to_string()))?;
        current_of(res.core.current.as_ref(), path).map(|c| c.sample.timestamp())
    }

    /// Mark an Output as optional.
    pub fn mark_optional(&mut self, path: &str) -> Result<()> {
        let id = self.owned(path, EntryKind::Output)?;
        if let Some(io) = self.tree.resource_mut(id).and_then(|r| r.io_point_mut()) {
            io.mandatory = false;
        }
        Ok(())
    }

    pub fn is_mandatory(&self, path: &str) -> Result<bool> {
        let id = self.owned(path, EntryKind::Output)?;
        Ok(self
            .tree
            .resource(id)
            .and_then(|r| r.io_point())
            .is_some_and(|io| io.mandatory))
    }

    /// Set the example document of a JSON Input and carry it down its routes.
    pub fn set_json_example(&mut self, path: &str, example: &str) -> Result<()> {
        let id = self.owned(path, EntryKind::Input)?;
        if self.tree.resource(id).and_then(|r| r.fixed_type()) != Some(DataType::Json) {
            return Err(HubError::ClientFault(format!("'{}' is not a JSON input", path)));
        }
        let sample = self.stamp(DataSample::text(crate::types::NOW, example));
        validate_sample(DataType::Json, &sample)?;
        self.propagate_json_example(id, &sample);
        Ok(())
    }

    /// The entry at `path` if it is of `kind`; otherwise the caller is
    /// misusing something it does not own.
    fn owned(&self, path: &str, kind: EntryKind) -> Result<EntryId> {
        let id = self.resource_id(path)?;
        match self.tree.kind(id) {
            Some(actual) if actual == kind => Ok(id),
            Some(actual) => Err(HubError::ClientFault(format!(
                "'{}' is an {}, not an {}",
                path, actual, kind
            ))),
            None => Err(HubError::NotFound(path.to_string())),
        }
    }
}

pub(super) fn current_of<'a>(current: Option<&'a TypedSample>, path: &str) -> Result<&'a TypedSample> {
    current.ok_or_else(|| unavailable(path))
}

pub(super) fn unavailable(path: &str) -> HubError {
    HubError::Unavailable(format!("'{}' has no value", path))
}

fn client_fault(err: HubError) -> HubError {
    HubError::ClientFault(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::MemoryBackupStore;
    use crate::clock::ManualClock;
    use crate::handler::HandlerValue;
    use crate::types::NOW;
    use std::sync::{Arc, Mutex};

    fn hub() -> (Hub, ManualClock) {
        let clock = ManualClock::new(1_700_000_000.0);
        (
            Hub::new(Box::new(clock.clone()), Box::new(MemoryBackupStore::new())),
            clock,
        )
    }

    #[test]
    fn test_push_stamps_now() {
        let (mut hub, _) = hub();
        hub.create_input("/app/in", DataType::Numeric, "").unwrap();
        hub.io_push("/app/in", DataType::Numeric, DataSample::numeric(NOW, 3.0)).unwrap();
        assert_eq!(hub.get_timestamp("/app/in").unwrap(), 1_700_000_000.0);

        hub.io_push("/app/in", DataType::Numeric, DataSample::numeric(42.0, 4.0)).unwrap();
        assert_eq!(hub.get_timestamp("/app/in").unwrap(), 42.0);
    }

    #[test]
    fn test_push_coerces_to_input_type() {
        let (mut hub, _) = hub();
        hub.create_input("/app/in", DataType::String, "").unwrap();
        hub.io_push("/app/in", DataType::Numeric, DataSample::numeric(NOW, 1.5)).unwrap();
        assert_eq!(hub.get_string("/app/in").unwrap(), "1.5");
    }

    #[test]
    fn test_push_to_output_is_client_fault() {
        let (mut hub, _) = hub();
        hub.create_output("/app/out", DataType::Numeric, "").unwrap();
        let err = hub
            .io_push("/app/out", DataType::Numeric, DataSample::numeric(NOW, 1.0))
            .unwrap_err();
        assert!(err.is_client_fault());
        assert!(hub
            .io_push("/app/missing", DataType::Numeric, DataSample::numeric(NOW, 1.0))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_output_reads() {
        let (mut hub, _) = hub();
        hub.create_output("/app/out", DataType::Numeric, "").unwrap();
        assert!(matches!(hub.io_get_numeric("/app/out"), Err(HubError::Unavailable(_))));
        hub.admin_push("/app/out", DataType::Numeric, DataSample::numeric(5.0, 9.0)).unwrap();
        assert_eq!(hub.io_get_numeric("/app/out").unwrap(), 9.0);
        assert_eq!(hub.io_get_timestamp("/app/out").unwrap(), 5.0);
        assert!(hub.io_get_boolean("/app/out").unwrap_err().is_client_fault());
    }

    #[test]
    fn test_handler_type_rules() {
        let (mut hub, _) = hub();
        hub.create_input("/app/in", DataType::Numeric, "").unwrap();
        assert!(hub
            .io_add_push_handler("/app/in", DataType::Boolean, Box::new(|_, _| {}))
            .unwrap_err()
            .is_client_fault());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hub.io_add_push_handler(
            "/app/in",
            DataType::String,
            Box::new(move |_, v| sink.lock().unwrap().push(v.clone())),
        )
        .unwrap();
        hub.io_push("/app/in", DataType::Numeric, DataSample::numeric(NOW, 2.0)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![HandlerValue::String("2".into())]);
    }

    #[test]
    fn test_optional_outputs() {
        let (mut hub, _) = hub();
        hub.create_output("/app/out", DataType::Boolean, "").unwrap();
        assert!(hub.is_mandatory("/app/out").unwrap());
        hub.mark_optional("/app/out").unwrap();
        assert!(!hub.is_mandatory("/app/out").unwrap());
        hub.create_input("/app/in", DataType::Boolean, "").unwrap();
        assert!(hub.mark_optional("/app/in").unwrap_err().is_client_fault());
    }

    #[test]
    fn test_json_example_propagates() {
        let (mut hub, _) = hub();
        hub.create_input("/app/j", DataType::Json, "").unwrap();
        hub.set_source("/obs/x", Some("/app/j")).unwrap();
        hub.set_json_example("/app/j", r#"{"a":1}"#).unwrap();
        assert_eq!(hub.json_example("/obs/x").unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert!(matches!(
            hub.set_json_example("/app/j", "{bad"),
            Err(HubError::Malformed(_))
        ));

        hub.create_input("/app/n", DataType::Numeric, "").unwrap();
        assert!(hub.set_json_example("/app/n", "1").unwrap_err().is_client_fault());
    }

    #[test]
    fn test_units_mismatch_dropped() {
        let (mut hub, _) = hub();
        hub.create_input("/app/in", DataType::Numeric, "degC").unwrap();
        hub.create_output("/app/out", DataType::Numeric, "degF").unwrap();
        hub.set_source("/app/out", Some("/app/in")).unwrap();
        hub.io_push("/app/in", DataType::Numeric, DataSample::numeric(NOW, 20.0)).unwrap();
        assert!(matches!(hub.io_get_numeric("/app/out"), Err(HubError::Unavailable(_))));
    }
}
