//! Admin transactions.
//!
//! Between `start_update` and `end_update`, any route, filter or transform
//! change marks the affected resource as configuration-changing, and that
//! resource drops pushes until the transaction ends.

use super::Hub;
use crate::tree::{path, EntryId, EntryKind};
use std::collections::HashSet;
use tracing::{info, warn};

/// Whether an admin transaction is in progress.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransactionState {
    active: bool,
}

impl TransactionState {
    pub fn is_active(self) -> bool {
        self.active
    }

    /// Returns false if a transaction was already active.
    fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.active, true)
    }

    /// Returns false if no transaction was active.
    fn end(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }
}

impl Hub {
    /// Begin an admin transaction.
    pub fn start_update(&mut self) {
        if !self.transaction.begin() {
            return;
        }
        info!("Admin update started");
        self.notify_update(true);
    }

    /// End the admin transaction: resume every suspended resource and remove
    /// backups whose Observation no longer exists.
    pub fn end_update(&mut self) {
        let was_active = self.transaction.end();

        for id in self.tree.resource_ids() {
            if let Some(res) = self.tree.resource_mut(id) {
                res.core.config_changing = false;
            }
        }
        self.collect_backup_garbage();

        if was_active {
            info!("Admin update ended");
            self.notify_update(false);
        }
    }

    /// Flag a resource as mid-reconfiguration if a transaction is active.
    pub(crate) fn mark_config_changing(&mut self, id: EntryId) {
        if !self.transaction.is_active() {
            return;
        }
        if let Some(res) = self.tree.resource_mut(id) {
            res.core.config_changing = true;
        }
    }

    /// Delete stored backups that belong to no live Observation.
    fn collect_backup_garbage(&mut self) {
        let live: HashSet<String> = self
            .tree
            .resource_ids()
            .into_iter()
            .filter(|id| self.tree.kind(*id) == Some(EntryKind::Observation))
            .filter_map(|id| self.backup_name(id))
            .collect();

        let stored = match self.store.list() {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not list backups: {}", e);
                return;
            }
        };
        for name in stored.into_iter().filter(|n| !live.contains(n)) {
            info!(
                "Removing backup of deleted observation {}",
                path::obs_absolute(&path::backup_name_to_rel(&name))
            );
            if let Err(e) = self.store.remove(&name) {
                warn!("Could not remove backup {}: {}", name, e);
            }
        }
    }
}
