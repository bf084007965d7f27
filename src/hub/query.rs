//! Safe typed reads, buffer dumps and buffer statistics.
//!
//! Unlike the IO reads, asking for the wrong type here is a soft
//! [`HubError::TypeMismatch`] and never faults the caller.

use super::io::{current_of, unavailable};
use super::Hub;
use crate::error::{HubError, Result};
use crate::resource::{stats, Observation, TypedSample};
use crate::types::{format_timestamp, DataType, ABSOLUTE_TIME_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Reducers available over an Observation's numeric buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStat {
    Min,
    Max,
    Mean,
    StdDev,
}

impl BufferStat {
    fn apply(self, values: &[f64]) -> f64 {
        match self {
            BufferStat::Min => stats::min(values),
            BufferStat::Max => stats::max(values),
            BufferStat::Mean => stats::mean(values),
            BufferStat::StdDev => stats::std_dev(values),
        }
    }
}

impl Hub {
    // ========================================================================
    // Typed reads
    // ========================================================================

    /// Current value of any resource, with its type.
    pub fn get_current(&self, path: &str) -> Result<TypedSample> {
        let id = self.resource_id(path)?;
        let current = self.tree.resource(id).and_then(|r| r.core.current.as_ref());
        current_of(current, path).cloned()
    }

    pub fn get_timestamp(&self, path: &str) -> Result<f64> {
        Ok(self.get_current(path)?.sample.timestamp())
    }

    pub fn get_data_type(&self, path: &str) -> Result<DataType> {
        Ok(self.get_current(path)?.data_type)
    }

    /// Units of a resource; empty when unspecified.
    pub fn get_units(&self, path: &str) -> Result<String> {
        let id = self.resource_id(path)?;
        Ok(self
            .tree
            .resource(id)
            .map(|r| r.core.units.clone())
            .unwrap_or_default())
    }

    /// Current value, which must be of `data_type`.
    fn get_typed(&self, path: &str, data_type: DataType) -> Result<TypedSample> {
        let current = self.get_current(path)?;
        if current.data_type != data_type {
            return Err(HubError::TypeMismatch {
                expected: data_type,
                actual: current.data_type,
            });
        }
        Ok(current)
    }

    /// Timestamp of the current trigger.
    pub fn get_trigger(&self, path: &str) -> Result<f64> {
        Ok(self.get_typed(path, DataType::Trigger)?.sample.timestamp())
    }

    pub fn get_boolean(&self, path: &str) -> Result<bool> {
        let current = self.get_typed(path, DataType::Boolean)?;
        current.sample.as_bool().ok_or_else(|| unavailable(path))
    }

    pub fn get_numeric(&self, path: &str) -> Result<f64> {
        let current = self.get_typed(path, DataType::Numeric)?;
        current.sample.as_f64().ok_or_else(|| unavailable(path))
    }

    pub fn get_string(&self, path: &str) -> Result<String> {
        let current = self.get_typed(path, DataType::String)?;
        current
            .sample
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| unavailable(path))
    }

    /// Current value of any type, rendered as JSON.
    pub fn get_json(&self, path: &str) -> Result<String> {
        let current = self.get_current(path)?;
        Ok(current.sample.to_json(current.data_type))
    }

    /// Last JSON example seen by a resource, if any.
    pub fn json_example(&self, path: &str) -> Result<Option<String>> {
        let id = self.resource_id(path)?;
        Ok(self
            .tree
            .resource(id)
            .and_then(|r| r.core.json_example.as_ref())
            .and_then(|s| s.as_text())
            .map(str::to_string))
    }

    // ========================================================================
    // Buffers
    // ========================================================================

    /// Turn a query start time into a cutoff timestamp.
    ///
    /// NaN means the whole buffer; values at or above
    /// [`ABSOLUTE_TIME_THRESHOLD`] are epoch seconds; anything smaller is a
    /// number of seconds before now.
    fn cutoff(&self, start: f64) -> Option<f64> {
        if start.is_nan() {
            None
        } else if start >= ABSOLUTE_TIME_THRESHOLD {
            Some(start)
        } else {
            Some(self.clock.wall_time() - start)
        }
    }

    fn buffered_observation(&self, obs_path: &str) -> Result<&Observation> {
        let id = self.observation_id(obs_path)?;
        self.tree
            .resource(id)
            .and_then(|r| r.observation())
            .ok_or_else(|| HubError::NotFound(obs_path.to_string()))
    }

    /// Render the buffer as `[{"t":<ts>,"v":<value>},...]`, oldest first.
    pub fn read_buffer_json(&self, obs_path: &str, start: f64) -> Result<String> {
        let obs = self.buffered_observation(obs_path)?;
        let data_type = obs.buffered_type();
        let records: Vec<String> = obs
            .samples_after(self.cutoff(start))
            .map(|s| {
                format!(
                    "{{\"t\":{},\"v\":{}}}",
                    format_timestamp(s.timestamp()),
                    s.to_json(data_type)
                )
            })
            .collect();
        Ok(format!("[{}]", records.join(",")))
    }

    /// Write the buffer JSON to `sink` on a worker thread.
    ///
    /// The buffer is snapshotted before this returns. `on_complete` is
    /// called exactly once, on the worker thread, with the outcome.
    pub fn stream_buffer_json(
        &self,
        obs_path: &str,
        start: f64,
        mut sink: Box<dyn Write + Send>,
        on_complete: Box<dyn FnOnce(Result<()>) + Send>,
    ) -> JoinHandle<()> {
        let snapshot = self.read_buffer_json(obs_path, start);
        let name = obs_path.to_string();

        std::thread::spawn(move || {
            let outcome = snapshot.and_then(|json| {
                sink.write_all(json.as_bytes())?;
                sink.flush()?;
                Ok(())
            });
            match &outcome {
                Ok(()) => debug!("Streamed buffer of {}", name),
                Err(e) => warn!("Streaming buffer of {} failed: {}", name, e),
            }
            on_complete(outcome);
        })
    }

    /// Reduce the numeric samples buffered after `start` (see
    /// [`Hub::read_buffer_json`] for how `start` is read). NaN when no
    /// sample qualifies.
    pub fn buffer_stat(&self, obs_path: &str, stat: BufferStat, start: f64) -> Result<f64> {
        let obs = self.buffered_observation(obs_path)?;
        let values = obs.numeric_values(self.cutoff(start));
        Ok(stat.apply(&values))
    }
}
