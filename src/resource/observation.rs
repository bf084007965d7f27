//! Observation state: filters, sample buffer, transform and backup schedule.
//!
//! An Observation sees every value offered to it. The pipeline is:
//!
//! ```text
//! offered ──> [json extraction] ──> buffer (+ backup) ──> transform ──> filter ──> accepted
//! ```
//!
//! Buffering runs before the filter, so the buffer keeps every extracted
//! sample even when the filter rejects it.

use super::stats;
use super::TypedSample;
use crate::error::{HubError, Result};
use crate::types::{DataSample, DataType, SampleValue};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Reducer applied to the buffered numeric samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Pass the offered sample through unchanged
    #[default]
    None,
    Mean,
    StdDev,
    Max,
    Min,
}

impl Transform {
    fn reduce(self, values: &[f64]) -> f64 {
        match self {
            Transform::None => f64::NAN,
            Transform::Mean => stats::mean(values),
            Transform::StdDev => stats::std_dev(values),
            Transform::Max => stats::max(values),
            Transform::Min => stats::min(values),
        }
    }
}

/// What the hub must do about backups after a sample was buffered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackupAction {
    None,
    /// The backup deadline has passed: write now
    BackupNow,
    /// Arm the backup timer for the remaining interval (unless already armed)
    Arm(Duration),
}

/// True if `value` is set (not NaN).
#[inline]
fn is_set(value: f64) -> bool {
    !value.is_nan()
}

/// True if `value` enables a filter (not NaN, not zero).
#[inline]
fn is_enabled(value: f64) -> bool {
    is_set(value) && value != 0.0
}

#[derive(Debug, Clone)]
pub struct Observation {
    /// Minimum seconds between accepted values (0/NaN = disabled)
    pub min_period: f64,
    /// NaN = no lower limit
    pub low_limit: f64,
    /// NaN = no upper limit
    pub high_limit: f64,
    /// Minimum change between accepted values (0/NaN = disabled)
    pub change_by: f64,
    transform: Transform,
    transform_params: Vec<f64>,
    buffered_type: DataType,
    buffer: VecDeque<DataSample>,
    max_count: usize,
    /// Seconds between backups (0 = disabled)
    backup_period: f64,
    last_backup: Option<Duration>,
    last_accept: Option<Duration>,
    json_extraction: Option<String>,
}

impl Default for Observation {
    fn default() -> Self {
        Self::new()
    }
}

impl Observation {
    pub fn new() -> Self {
        Self {
            min_period: 0.0,
            low_limit: f64::NAN,
            high_limit: f64::NAN,
            change_by: 0.0,
            transform: Transform::None,
            transform_params: Vec::new(),
            buffered_type: DataType::Trigger,
            buffer: VecDeque::new(),
            max_count: 0,
            backup_period: 0.0,
            last_backup: None,
            last_accept: None,
            json_extraction: None,
        }
    }

    // ========================================================================
    // Filter
    // ========================================================================

    /// Run the range, change and rate filters.
    ///
    /// `current` is the resource's current value and `overridden` whether
    /// an applicable override is set. Records the acceptance time on success.
    pub fn should_accept(
        &mut self,
        data_type: DataType,
        sample: &DataSample,
        current: Option<&TypedSample>,
        overridden: bool,
        now: Duration,
    ) -> bool {
        if let SampleValue::Numeric(value) = sample.value() {
            if !self.in_range(*value) {
                return false;
            }
        }

        if let Some(previous) = current {
            // An overridden value never changes, so nothing counts as a change.
            if overridden {
                return false;
            }
            if is_enabled(self.change_by)
                && data_type == previous.data_type
                && !self.changed_enough(&previous.sample, sample)
            {
                return false;
            }
            if is_enabled(self.min_period) {
                if let Some(last) = self.last_accept {
                    let elapsed = now.saturating_sub(last).as_secs_f64();
                    if elapsed < self.min_period {
                        return false;
                    }
                }
            }
        }

        self.last_accept = Some(now);
        true
    }

    fn in_range(&self, value: f64) -> bool {
        let (low, high) = (self.low_limit, self.high_limit);
        if is_set(low) && is_set(high) && low > high {
            // Deadband: keep out of (high, low).
            return !(value > high && value < low);
        }
        !(is_set(low) && value < low) && !(is_set(high) && value > high)
    }

    fn changed_enough(&self, old: &DataSample, new: &DataSample) -> bool {
        match (old.value(), new.value()) {
            (SampleValue::Numeric(a), SampleValue::Numeric(b)) => (b - a).abs() >= self.change_by,
            (SampleValue::Boolean(a), SampleValue::Boolean(b)) => a != b,
            (SampleValue::Text(a), SampleValue::Text(b)) => a != b,
            _ => true,
        }
    }

    // ========================================================================
    // Buffer and backup
    // ========================================================================

    /// Buffer an offered sample and decide whether a backup is due.
    pub fn process_accepted(
        &mut self,
        data_type: DataType,
        sample: &DataSample,
        now: Duration,
    ) -> BackupAction {
        if self.max_count > 0 {
            if data_type != self.buffered_type {
                self.buffer.clear();
                self.buffered_type = data_type;
            }
            self.buffer.push_back(sample.clone());
            self.truncate();
        }

        if self.backup_period <= 0.0 {
            return BackupAction::None;
        }
        let period = Duration::try_from_secs_f64(self.backup_period).unwrap_or(Duration::MAX);
        match self.last_backup {
            None => BackupAction::BackupNow,
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                if elapsed >= period {
                    BackupAction::BackupNow
                } else {
                    BackupAction::Arm(period - elapsed)
                }
            }
        }
    }

    /// Record that the buffer was just written out.
    pub fn mark_backed_up(&mut self, now: Duration) {
        self.last_backup = Some(now);
    }

    /// Apply the transform to the buffered samples.
    ///
    /// Returns the offered sample unchanged when no transform is selected
    /// or the buffer holds no numeric samples.
    pub fn apply_transform(&self, data_type: DataType, sample: &DataSample) -> (DataType, DataSample) {
        if self.transform == Transform::None
            || self.buffered_type != DataType::Numeric
            || self.buffer.is_empty()
        {
            return (data_type, sample.clone());
        }
        let values = self.numeric_values(None);
        let reduced = self.transform.reduce(&values);
        (DataType::Numeric, DataSample::numeric(sample.timestamp(), reduced))
    }

    fn truncate(&mut self) {
        while self.buffer.len() > self.max_count {
            self.buffer.pop_front();
        }
    }

    /// Replace the buffer with samples restored from a backup.
    pub fn restore(&mut self, data_type: DataType, samples: Vec<DataSample>) {
        self.buffered_type = data_type;
        self.buffer = samples.into();
        if self.max_count > 0 {
            self.truncate();
        }
    }

    pub fn buffer(&self) -> &VecDeque<DataSample> {
        &self.buffer
    }

    pub fn buffered_type(&self) -> DataType {
        self.buffered_type
    }

    /// Buffered samples with a timestamp strictly after `after` (all if `None`).
    pub fn samples_after(&self, after: Option<f64>) -> impl Iterator<Item = &DataSample> {
        self.buffer
            .iter()
            .filter(move |s| after.map_or(true, |t| s.timestamp() > t))
    }

    /// Numeric buffered values after `after`. Empty for a non-numeric buffer.
    pub fn numeric_values(&self, after: Option<f64>) -> Vec<f64> {
        self.samples_after(after).filter_map(DataSample::as_f64).collect()
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Set the buffer bound, dropping the oldest samples if it shrank.
    pub fn set_max_count(&mut self, max_count: usize) {
        self.max_count = max_count;
        self.truncate();
    }

    pub fn backup_period(&self) -> f64 {
        self.backup_period
    }

    /// Set the backup period in seconds. Negative and NaN mean disabled.
    ///
    /// A period too long to express as a `Duration` is `Malformed`.
    pub fn set_backup_period(&mut self, seconds: f64) -> Result<()> {
        if seconds.is_nan() || seconds <= 0.0 {
            self.backup_period = 0.0;
            return Ok(());
        }
        if Duration::try_from_secs_f64(seconds).is_err() {
            return Err(HubError::Malformed(format!(
                "backup period of {} seconds is out of range",
                seconds
            )));
        }
        self.backup_period = seconds;
        Ok(())
    }

    pub fn transform(&self) -> (Transform, &[f64]) {
        (self.transform, &self.transform_params)
    }

    /// Select a transform. Changing it flushes the buffer.
    pub fn set_transform(&mut self, transform: Transform, params: &[f64]) {
        if transform != self.transform {
            self.buffer.clear();
        }
        self.transform = transform;
        self.transform_params = params.to_vec();
    }

    pub fn json_extraction(&self) -> Option<&str> {
        self.json_extraction.as_deref()
    }

    pub fn set_json_extraction(&mut self, spec: Option<String>) {
        self.json_extraction = spec.filter(|s| !s.is_empty());
    }
}
