//! Test data builders for creating hubs and Observations

use super::T0;
use datahub_rs::backup::{BackupStore, MemoryBackupStore};
use datahub_rs::clock::ManualClock;
use datahub_rs::{DataType, Hub, Transform};

/// Builder for a hub on a manual clock
pub struct HubBuilder {
    clock: ManualClock,
    store: Box<dyn BackupStore>,
    inputs: Vec<(String, DataType, String)>,
    outputs: Vec<(String, DataType, String)>,
    routes: Vec<(String, String)>,
}

impl HubBuilder {
    pub fn new() -> Self {
        Self {
            clock: ManualClock::new(T0),
            store: Box::new(MemoryBackupStore::new()),
            inputs: Vec::new(),
            outputs: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn clock(mut self, clock: ManualClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(mut self, store: impl BackupStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn input(mut self, path: &str, data_type: DataType, units: &str) -> Self {
        self.inputs.push((path.to_string(), data_type, units.to_string()));
        self
    }

    pub fn output(mut self, path: &str, data_type: DataType, units: &str) -> Self {
        self.outputs.push((path.to_string(), data_type, units.to_string()));
        self
    }

    pub fn route(mut self, source: &str, dest: &str) -> Self {
        self.routes.push((source.to_string(), dest.to_string()));
        self
    }

    /// Build the hub; the returned clock shares state with the hub's.
    pub fn build(self) -> (Hub, ManualClock) {
        let mut hub = Hub::new(Box::new(self.clock.clone()), self.store);
        for (path, data_type, units) in &self.inputs {
            hub.create_input(path, *data_type, units).unwrap();
        }
        for (path, data_type, units) in &self.outputs {
            hub.create_output(path, *data_type, units).unwrap();
        }
        for (source, dest) in &self.routes {
            hub.set_source(dest, Some(source)).unwrap();
        }
        (hub, self.clock)
    }
}

impl Default for HubBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for an Observation's settings, applied to an existing hub
pub struct ObservationBuilder {
    name: String,
    source: Option<String>,
    max_count: usize,
    backup_period: f64,
    min_period: f64,
    low_limit: f64,
    high_limit: f64,
    change_by: f64,
    transform: Transform,
    extraction: Option<String>,
}

impl ObservationBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: None,
            max_count: 0,
            backup_period: 0.0,
            min_period: 0.0,
            low_limit: f64::NAN,
            high_limit: f64::NAN,
            change_by: 0.0,
            transform: Transform::None,
            extraction: None,
        }
    }

    pub fn source(mut self, path: &str) -> Self {
        self.source = Some(path.to_string());
        self
    }

    pub fn max_count(mut self, count: usize) -> Self {
        self.max_count = count;
        self
    }

    pub fn backup_period(mut self, seconds: f64) -> Self {
        self.backup_period = seconds;
        self
    }

    pub fn min_period(mut self, seconds: f64) -> Self {
        self.min_period = seconds;
        self
    }

    pub fn limits(mut self, low: f64, high: f64) -> Self {
        self.low_limit = low;
        self.high_limit = high;
        self
    }

    pub fn change_by(mut self, change: f64) -> Self {
        self.change_by = change;
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn extraction(mut self, spec: &str) -> Self {
        self.extraction = Some(spec.to_string());
        self
    }

    /// Create the Observation and apply every setting. Returns `/obs/<name>`.
    pub fn create(self, hub: &mut Hub) -> String {
        let name = self.name.as_str();
        hub.create_observation(name).unwrap();
        hub.set_buffer_max_count(name, self.max_count).unwrap();
        hub.set_backup_period(name, self.backup_period).unwrap();
        hub.set_min_period(name, self.min_period).unwrap();
        hub.set_low_limit(name, self.low_limit).unwrap();
        hub.set_high_limit(name, self.high_limit).unwrap();
        hub.set_change_by(name, self.change_by).unwrap();
        hub.set_transform(name, self.transform, &[]).unwrap();
        hub.set_json_extraction(name, self.extraction.as_deref()).unwrap();
        let abs = format!("/obs/{}", name);
        if let Some(source) = &self.source {
            hub.set_source(&abs, Some(source)).unwrap();
        }
        abs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_builder() {
        let (hub, _) = HubBuilder::new()
            .input("/app/in", DataType::Numeric, "")
            .output("/app/out", DataType::Numeric, "")
            .route("/app/in", "/app/out")
            .build();
        assert_eq!(hub.get_source("/app/out").unwrap().as_deref(), Some("/app/in"));
    }

    #[test]
    fn test_observation_builder() {
        let (mut hub, _) = HubBuilder::new().build();
        let path = ObservationBuilder::new("o").max_count(5).limits(0.0, 10.0).create(&mut hub);
        assert_eq!(path, "/obs/o");
        assert_eq!(hub.get_buffer_max_count("o").unwrap(), 5);
        assert_eq!(hub.get_high_limit("o").unwrap(), 10.0);
    }
}
