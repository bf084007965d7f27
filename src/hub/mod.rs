//! The hub: single logical owner of the resource tree and the value-flow graph.
//!
//! Every mutation runs to completion on whichever thread owns the `Hub`
//! (normally the bridge thread, see [`crate::bridge`]). There is no locking
//! inside: a push, a route change or a tree mutation finishes before the next
//! command or timer is looked at.
//!
//! The API is split by caller:
//!
//! - `io`: owners of Inputs and Outputs (create, push, read back, subscribe)
//! - `admin`: routes, overrides, defaults, Observation settings, listing
//! - `query`: safe typed reads, buffer dumps and statistics
//!
//! Backup timers are deadlines on the monotonic clock, at most one per
//! Observation. The owner calls [`Hub::service_timers`] when
//! [`Hub::next_timer_deadline`] passes.

mod admin;
mod io;
mod push;
mod query;
mod transaction;

pub use query::BufferStat;
pub use transaction::TransactionState;

use crate::backup::{BackupStore, FileBackupStore};
use crate::clock::{Clock, SystemClock};
use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::handler::HandlerRef;
use crate::tree::{path, EntryId, EntryKind, ResourceTree};
use crate::types::{DataSample, DataType, SampleValue, MAX_STRING_BYTES, NOW};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether a resource appeared or went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeChange {
    Added,
    Removed,
}

/// Called with the absolute path, the kind and the change.
pub type TreeChangeCallback = Box<dyn FnMut(&str, EntryKind, TreeChange) + Send>;

/// Called with `true` when an admin transaction starts and `false` when it ends.
pub type UpdateCallback = Box<dyn FnMut(bool) + Send>;

pub struct Hub {
    tree: ResourceTree,
    clock: Box<dyn Clock>,
    store: Box<dyn BackupStore>,
    transaction: TransactionState,
    /// Pending backup deadlines on the monotonic clock
    timers: HashMap<EntryId, Duration>,
    tree_handlers: Vec<(HandlerRef, TreeChangeCallback)>,
    update_handlers: Vec<(HandlerRef, UpdateCallback)>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("entries", &self.tree.len())
            .field("transaction", &self.transaction)
            .field("timers", &self.timers.len())
            .finish()
    }
}

impl Hub {
    pub fn new(clock: Box<dyn Clock>, store: Box<dyn BackupStore>) -> Self {
        Self {
            tree: ResourceTree::new(),
            clock,
            store,
            transaction: TransactionState::default(),
            timers: HashMap::new(),
            tree_handlers: Vec::new(),
            update_handlers: Vec::new(),
        }
    }

    /// A hub on the system clock, backing up to the configured directory.
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        let dir = config.resolved_backup_dir()?;
        let store = FileBackupStore::new(&dir)?;
        info!("Backups stored in {}", dir.display());
        Ok(Self::new(Box::new(SystemClock::new()), Box::new(store)))
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    pub fn transaction(&self) -> TransactionState {
        self.transaction
    }

    // ========================================================================
    // Tree-change and update handlers
    // ========================================================================

    pub fn add_tree_change_handler(&mut self, callback: TreeChangeCallback) -> HandlerRef {
        let handler_ref = HandlerRef::next();
        self.tree_handlers.push((handler_ref, callback));
        handler_ref
    }

    pub fn remove_tree_change_handler(&mut self, handler_ref: HandlerRef) -> bool {
        let before = self.tree_handlers.len();
        self.tree_handlers.retain(|(r, _)| *r != handler_ref);
        self.tree_handlers.len() != before
    }

    pub fn add_update_handler(&mut self, callback: UpdateCallback) -> HandlerRef {
        let handler_ref = HandlerRef::next();
        self.update_handlers.push((handler_ref, callback));
        handler_ref
    }

    pub fn remove_update_handler(&mut self, handler_ref: HandlerRef) -> bool {
        let before = self.update_handlers.len();
        self.update_handlers.retain(|(r, _)| *r != handler_ref);
        self.update_handlers.len() != before
    }

    fn notify_tree_change(&mut self, id: EntryId, kind: EntryKind, change: TreeChange) {
        let path = self.tree.display_path(id);
        for (_, callback) in &mut self.tree_handlers {
            callback(&path, kind, change);
        }
    }

    fn notify_update(&mut self, started: bool) {
        for (_, callback) in &mut self.update_handlers {
            callback(started);
        }
    }

    // ========================================================================
    // Backup timers
    // ========================================================================

    /// Earliest pending backup deadline, on the hub's monotonic clock.
    pub fn next_timer_deadline(&self) -> Option<Duration> {
        self.timers.values().min().copied()
    }

    /// Time left until the earliest pending backup, zero if overdue.
    pub fn time_until_next_timer(&self) -> Option<Duration> {
        let now = self.clock.monotonic();
        self.next_timer_deadline()
            .map(|deadline| deadline.saturating_sub(now))
    }

    /// Fire every backup timer whose deadline has passed. Returns how many fired.
    pub fn service_timers(&mut self) -> usize {
        let now = self.clock.monotonic();
        let mut due: Vec<EntryId> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        due.sort();
        for id in &due {
            self.timers.remove(id);
            self.backup_now(*id);
        }
        due.len()
    }

    /// Write every Observation with a pending backup timer. Used at shutdown.
    pub fn flush_backups(&mut self) -> usize {
        let mut pending: Vec<EntryId> = self.timers.drain().map(|(id, _)| id).collect();
        pending.sort();
        for id in &pending {
            self.backup_now(*id);
        }
        if !pending.is_empty() {
            info!("Flushed {} pending backups", pending.len());
        }
        pending.len()
    }

    fn cancel_timer(&mut self, id: EntryId) {
        if self.timers.remove(&id).is_some() {
            debug!("Cancelled backup timer for {}", id);
        }
    }

    /// Arm the backup timer unless one is already pending.
    fn arm_timer(&mut self, id: EntryId, after: Duration) {
        let Some(deadline) = self.clock.monotonic().checked_add(after) else {
            debug!("Backup timer for {} is beyond the clock range; not armed", id);
            return;
        };
        self.timers.entry(id).or_insert(deadline);
    }

    // ========================================================================
    // Lookup helpers
    // ========================================================================

    /// The entry at `path` if it carries a resource.
    fn resource_id(&self, path: &str) -> Result<EntryId> {
        let id = self.tree.lookup(ResourceTree::ROOT, path)?;
        if self.tree.resource(id).is_none() {
            return Err(HubError::NotFound(format!("no resource at '{}'", path)));
        }
        Ok(id)
    }

    /// The Observation at an Observation path (`/obs/x` or bare `x`).
    fn observation_id(&self, obs_path: &str) -> Result<EntryId> {
        let rel = path::obs_relative(obs_path)?;
        let id = self.tree.lookup(ResourceTree::ROOT, &path::obs_absolute(rel))?;
        match self.tree.kind(id) {
            Some(EntryKind::Observation) => Ok(id),
            _ => Err(HubError::NotFound(format!("no observation at '{}'", obs_path))),
        }
    }

    /// Backup name of an Observation entry, if it lives under `/obs`.
    fn backup_name(&self, id: EntryId) -> Option<String> {
        let abs = self.tree.path(ResourceTree::ROOT, id).ok()?;
        let rel = abs.strip_prefix(path::OBS_ROOT)?.strip_prefix('/')?;
        Some(path::backup_name(rel))
    }

    /// Replace the "now" timestamp sentinel with the current wall time.
    fn stamp(&self, sample: DataSample) -> DataSample {
        if sample.timestamp() == NOW {
            sample.with_timestamp(self.clock.wall_time())
        } else {
            sample
        }
    }

    /// Release a Placeholder left without settings.
    fn release_if_unused(&mut self, id: EntryId) {
        if self.tree.release_placeholder(id) {
            debug!("Released unused placeholder {}", id);
        }
    }
}

/// Check that a sample's value matches its declared type and fits the limits.
fn validate_sample(data_type: DataType, sample: &DataSample) -> Result<()> {
    let matches = match (data_type, sample.value()) {
        (DataType::Trigger, SampleValue::Trigger)
        | (DataType::Boolean, SampleValue::Boolean(_))
        | (DataType::Numeric, SampleValue::Numeric(_)) => true,
        (ty, SampleValue::Text(text)) if ty.is_text() => {
            if text.len() > MAX_STRING_BYTES {
                return Err(HubError::Overflow(format!(
                    "{} bytes exceeds the {} byte limit",
                    text.len(),
                    MAX_STRING_BYTES
                )));
            }
            if ty == DataType::Json && !crate::json::is_valid(text) {
                return Err(HubError::Malformed(format!("invalid JSON value '{}'", text)));
            }
            true
        }
        _ => false,
    };
    if !matches {
        return Err(HubError::TypeMismatch {
            expected: data_type,
            actual: sample.value().natural_type(),
        });
    }
    Ok(())
}

/// Log an incompatible override or default.
fn warn_incompatible(what: &str, path: &str, data_type: DataType, fixed: Option<DataType>) {
    if let Some(fixed) = fixed {
        if fixed != data_type {
            warn!(
                "{} of type {} on {} ({}) has no effect until the types match",
                what, data_type, path, fixed
            );
        }
    }
}
