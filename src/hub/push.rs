//! The push pipeline.
//!
//! ```text
//! offer(R, type, units, sample)
//!   1. Observation: extract -> buffer/backup -> transform -> filter
//!   2. record as last pushed
//!   3. drop if R's configuration is changing
//!   4. substitute the override (keeping the timestamp)
//!   5. Input/Output: units check, coerce to the fixed type
//!   6. Observation/Placeholder: adopt the units
//!   7. store as current, fan out to destinations, call handlers
//! ```
//!
//! Drops are not errors; they are logged at debug level.

use super::Hub;
use crate::backup::codec;
use crate::json;
use crate::resource::coerce::coerce;
use crate::resource::{BackupAction, IoPoint, ResourceKind, TypedSample};
use crate::tree::EntryId;
use crate::types::{DataSample, DataType, JsonKind};
use tracing::{debug, error, info, warn};

impl Hub {
    /// Offer a value to a resource and run it through the pipeline.
    pub(crate) fn push_to(&mut self, id: EntryId, data_type: DataType, units: &str, sample: DataSample) {
        let now = self.clock.monotonic();
        let Some(res) = self.tree.resource_mut(id) else {
            panic!("push reached entry {} which carries no resource", id);
        };

        let overridden = res.is_overridden();
        let current = res.core.current.clone();
        let (data_type, sample) = match res.observation_mut() {
            Some(obs) => {
                let (data_type, sample) = match obs.json_extraction() {
                    Some(spec) => match extract(spec, data_type, &sample) {
                        Some(extracted) => extracted,
                        None => {
                            debug!("Dropped value at {}: extraction '{}' did not match", id, spec);
                            return;
                        }
                    },
                    None => (data_type, sample),
                };

                let action = obs.process_accepted(data_type, &sample, now);
                let (data_type, sample) = obs.apply_transform(data_type, &sample);
                let accepted = obs.should_accept(data_type, &sample, current.as_ref(), overridden, now);

                self.handle_backup_action(id, action);
                if !accepted {
                    debug!("Filter rejected value at {}", self.tree.display_path(id));
                    return;
                }
                (data_type, sample)
            }
            None => (data_type, sample),
        };

        let Some(res) = self.tree.resource_mut(id) else {
            panic!("resource at {} vanished during push", id);
        };
        res.core.pushed = Some(TypedSample::new(data_type, sample.clone()));

        if res.core.config_changing {
            debug!("Dropped value at {}: configuration is changing", id);
            return;
        }

        let (data_type, sample) = match res.core.override_value.as_ref() {
            Some(o) if res.is_overridden() => (o.data_type, o.sample.with_timestamp(sample.timestamp())),
            _ => (data_type, sample),
        };

        let (data_type, sample) = match &res.kind {
            ResourceKind::Input(io) | ResourceKind::Output(io) => {
                if !IoPoint::units_match(&res.core.units, units) {
                    debug!(
                        "Dropped value at {}: units '{}' do not match '{}'",
                        id, units, res.core.units
                    );
                    return;
                }
                (io.data_type, coerce(data_type, &sample, io.data_type))
            }
            ResourceKind::Observation(_) | ResourceKind::Placeholder => {
                if !units.is_empty() {
                    res.core.units = units.to_string();
                }
                (data_type, sample)
            }
        };

        res.core.current = Some(TypedSample::new(data_type, sample));
        if data_type == DataType::Json {
            res.core.json_example = res.core.current.as_ref().map(|c| c.sample.clone());
        }
        self.publish_current(id);
    }

    /// Send the current value of `id` to every destination, then to its handlers.
    pub(crate) fn publish_current(&mut self, id: EntryId) {
        let Some(res) = self.tree.resource(id) else {
            return;
        };
        let Some(current) = res.core.current.clone() else {
            return;
        };
        let units = res.core.units.clone();
        let destinations = res.core.destinations.clone();

        for dest in destinations {
            self.push_to(dest, current.data_type, &units, current.sample.clone());
        }

        if let Some(res) = self.tree.resource_mut(id) {
            res.core.handlers.call_all(current.data_type, &current.sample);
        }
    }

    /// Copy a JSON example down every route leaving `id`.
    pub(crate) fn propagate_json_example(&mut self, id: EntryId, example: &DataSample) {
        let destinations = match self.tree.resource_mut(id) {
            Some(res) => {
                res.core.json_example = Some(example.clone());
                res.core.destinations.clone()
            }
            None => return,
        };
        for dest in destinations {
            self.propagate_json_example(dest, example);
        }
    }

    fn handle_backup_action(&mut self, id: EntryId, action: BackupAction) {
        match action {
            BackupAction::None => {}
            BackupAction::BackupNow => {
                self.cancel_timer(id);
                self.backup_now(id);
            }
            BackupAction::Arm(after) => self.arm_timer(id, after),
        }
    }

    /// Serialize an Observation's buffer to the store.
    pub(crate) fn backup_now(&mut self, id: EntryId) {
        let Some(name) = self.backup_name(id) else {
            return;
        };
        let now = self.clock.monotonic();
        let Some(obs) = self.tree.resource_mut(id).and_then(|r| r.observation_mut()) else {
            return;
        };
        let bytes = codec::encode(obs.buffered_type(), obs.buffer().iter());
        obs.mark_backed_up(now);

        if let Err(e) = self.store.write(&name, &bytes) {
            warn!("Backup of {} failed: {}", name, e);
        }
    }

    /// Load a stored buffer into a freshly created Observation.
    ///
    /// The newest sample becomes the current value without being published.
    pub(crate) fn restore_backup(&mut self, id: EntryId) {
        let Some(name) = self.backup_name(id) else {
            return;
        };
        let bytes = match self.store.read(&name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not read backup {}: {}", name, e);
                return;
            }
        };
        let (data_type, samples) = match codec::decode(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("Discarding backup {}: {}", name, e);
                return;
            }
        };

        let Some(res) = self.tree.resource_mut(id) else {
            return;
        };
        let newest = samples.last().cloned();
        let count = samples.len();
        if let Some(obs) = res.observation_mut() {
            obs.restore(data_type, samples);
        }
        if let Some(newest) = newest {
            let newest = TypedSample::new(data_type, newest);
            res.core.pushed = Some(newest.clone());
            if !res.is_overridden() {
                res.core.current = Some(newest);
            }
        }
        info!("Restored {} samples for {}", count, name);
    }
}

/// Apply a JSON extraction spec to an offered value.
///
/// Non-JSON values and documents the spec does not match yield `None`.
fn extract(spec: &str, data_type: DataType, sample: &DataSample) -> Option<(DataType, DataSample)> {
    if data_type != DataType::Json {
        return None;
    }
    let (text, kind) = json::extract(sample.as_text()?, spec).ok()?;
    let ts = sample.timestamp();
    let extracted = match kind {
        JsonKind::Null => DataSample::trigger(ts),
        JsonKind::Boolean => DataSample::boolean(ts, text == "true"),
        JsonKind::Number => DataSample::numeric(ts, text.parse().ok()?),
        JsonKind::String | JsonKind::Object | JsonKind::Array => DataSample::text(ts, text),
    };
    Some((kind.data_type(), extracted))
}
