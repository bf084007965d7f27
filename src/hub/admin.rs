//! Administrative API: routes, overrides, defaults, Observation settings,
//! handlers and tree listing.
//!
//! Admin calls that name a path with no resource create a Placeholder there,
//! so settings can be made before the Input, Output or Observation exists.

use super::{validate_sample, warn_incompatible, Hub, TreeChange};
use crate::error::{HubError, Result};
use crate::handler::{HandlerRef, PushCallback};
use crate::json;
use crate::resource::{Observation, Transform, TypedSample};
use crate::tree::{path, EntryId, EntryKind, ResourceTree};
use crate::types::{DataSample, DataType};
use tracing::{debug, info};

impl Hub {
    // ========================================================================
    // Routes
    // ========================================================================

    /// Route `source` into `dest`, replacing any previous source.
    /// `None` removes the route.
    ///
    /// A route that would close a cycle is rejected with `Duplicate`.
    pub fn set_source(&mut self, dest: &str, source: Option<&str>) -> Result<()> {
        let dest_id = self.tree.get_or_create_resource(ResourceTree::ROOT, dest)?;
        let source_id = match source {
            Some(src) => match self.tree.get_or_create_resource(ResourceTree::ROOT, src) {
                Ok(id) => Some(id),
                Err(e) => {
                    self.release_if_unused(dest_id);
                    return Err(e);
                }
            },
            None => None,
        };

        if let Err(e) = self.link(dest_id, source_id) {
            self.release_if_unused(dest_id);
            if let Some(src) = source_id {
                self.release_if_unused(src);
            }
            return Err(e);
        }
        if source_id.is_none() {
            self.release_if_unused(dest_id);
        }
        Ok(())
    }

    fn link(&mut self, dest: EntryId, source: Option<EntryId>) -> Result<()> {
        let current = self.tree.resource(dest).and_then(|r| r.core.source);
        if current == source {
            return Ok(());
        }
        if let Some(src) = source {
            if src == dest || self.reaches(dest, src) {
                return Err(HubError::Duplicate(format!(
                    "{} -> {} would create a cycle",
                    self.tree.display_path(src),
                    self.tree.display_path(dest)
                )));
            }
        }

        self.mark_config_changing(dest);
        if let Some(old) = current {
            if let Some(res) = self.tree.resource_mut(old) {
                res.core.destinations.retain(|d| *d != dest);
            }
            self.release_if_unused(old);
        }

        match source {
            Some(src) => {
                if let Some(res) = self.tree.resource_mut(src) {
                    res.core.destinations.push(dest);
                }
                if let Some(res) = self.tree.resource_mut(dest) {
                    res.core.source = Some(src);
                }
                info!(
                    "Route {} -> {}",
                    self.tree.display_path(src),
                    self.tree.display_path(dest)
                );
            }
            None => {
                if let Some(res) = self.tree.resource_mut(dest) {
                    res.core.source = None;
                    if res.fixed_type().is_none() {
                        res.core.units.clear();
                    }
                }
                info!("Removed source of {}", self.tree.display_path(dest));
            }
        }
        Ok(())
    }

    /// True if `to` can be reached from `from` along destination edges.
    fn reaches(&self, from: EntryId, to: EntryId) -> bool {
        let mut visited = std::collections::HashSet::new();
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(res) = self.tree.resource(current) {
                stack.extend(res.core.destinations.iter().copied());
            }
        }
        false
    }

    /// Absolute path of the resource feeding `dest`.
    pub fn get_source(&self, dest: &str) -> Result<Option<String>> {
        let id = self.resource_id(dest)?;
        let source = self.tree.resource(id).and_then(|r| r.core.source);
        source.map(|src| self.tree.path(ResourceTree::ROOT, src)).transpose()
    }

    /// Absolute paths of every resource fed by `source`.
    pub fn get_destinations(&self, source: &str) -> Result<Vec<String>> {
        let id = self.resource_id(source)?;
        let dests = self
            .tree
            .resource(id)
            .map(|r| r.core.destinations.clone())
            .unwrap_or_default();
        dests
            .into_iter()
            .map(|d| self.tree.path(ResourceTree::ROOT, d))
            .collect()
    }

    // ========================================================================
    // Overrides and defaults
    // ========================================================================

    /// Force the value of a resource. An override of the wrong type for an
    /// Input/Output is kept but has no effect.
    pub fn set_override(&mut self, path: &str, data_type: DataType, sample: DataSample) -> Result<()> {
        validate_sample(data_type, &sample)?;
        let id = self.tree.get_or_create_resource(ResourceTree::ROOT, path)?;
        let sample = self.stamp(sample);
        let Some(res) = self.tree.resource_mut(id) else {
            return Err(HubError::NotFound(path.to_string()));
        };
        res.core.override_value = Some(TypedSample::new(data_type, sample));
        if !res.is_compatible(data_type) {
            warn_incompatible("Override", path, data_type, res.fixed_type());
            return Ok(());
        }
        if res.recompute_current() {
            self.publish_current(id);
        }
        Ok(())
    }

    pub fn get_override(&self, path: &str) -> Result<Option<TypedSample>> {
        let id = self.resource_id(path)?;
        Ok(self.tree.resource(id).and_then(|r| r.core.override_value.clone()))
    }

    /// Remove the override: the current value falls back to the last pushed
    /// value, then the default, then nothing.
    pub fn remove_override(&mut self, path: &str) -> Result<()> {
        let id = self.resource_id(path)?;
        let Some(res) = self.tree.resource_mut(id) else {
            return Err(HubError::NotFound(path.to_string()));
        };
        if res.core.override_value.take().is_none() {
            return Ok(());
        }
        if res.recompute_current() {
            self.publish_current(id);
        }
        self.release_if_unused(id);
        Ok(())
    }

    /// Set the value used while nothing has been pushed. Replacing a
    /// default that is currently in effect publishes the new one.
    pub fn set_default(&mut self, path: &str, data_type: DataType, sample: DataSample) -> Result<()> {
        validate_sample(data_type, &sample)?;
        let id = self.tree.get_or_create_resource(ResourceTree::ROOT, path)?;
        let sample = self.stamp(sample);
        let Some(res) = self.tree.resource_mut(id) else {
            return Err(HubError::NotFound(path.to_string()));
        };
        res.core.default_value = Some(TypedSample::new(data_type, sample));
        if !res.is_compatible(data_type) {
            warn_incompatible("Default", path, data_type, res.fixed_type());
            return Ok(());
        }
        if res.recompute_current() {
            self.publish_current(id);
        }
        Ok(())
    }

    pub fn get_default(&self, path: &str) -> Result<Option<TypedSample>> {
        let id = self.resource_id(path)?;
        Ok(self.tree.resource(id).and_then(|r| r.core.default_value.clone()))
    }

    pub fn remove_default(&mut self, path: &str) -> Result<()> {
        let id = self.resource_id(path)?;
        if let Some(res) = self.tree.resource_mut(id) {
            res.core.default_value = None;
        }
        self.release_if_unused(id);
        Ok(())
    }

    // ========================================================================
    // Values and handlers
    // ========================================================================

    /// Push a value to any existing resource, as if it came from upstream.
    pub fn admin_push(&mut self, path: &str, data_type: DataType, sample: DataSample) -> Result<()> {
        validate_sample(data_type, &sample)?;
        let id = self.resource_id(path)?;
        let sample = self.stamp(sample);
        self.push_to(id, data_type, "", sample);
        Ok(())
    }

    /// Register a push handler, creating a Placeholder if nothing is at `path`.
    pub fn add_push_handler(
        &mut self,
        path: &str,
        data_type: DataType,
        callback: PushCallback,
    ) -> Result<HandlerRef> {
        let id = self.tree.get_or_create_resource(ResourceTree::ROOT, path)?;
        Ok(self.register_handler(id, data_type, callback))
    }

    /// Add a handler and replay the current value to it.
    pub(crate) fn register_handler(
        &mut self,
        id: EntryId,
        data_type: DataType,
        callback: PushCallback,
    ) -> HandlerRef {
        let Some(res) = self.tree.resource_mut(id) else {
            panic!("handler registered on entry {} without a resource", id);
        };
        let handler_ref = res.core.handlers.add(data_type, callback);
        if let Some(current) = res.core.current.clone() {
            res.core.handlers.call_one(handler_ref, current.data_type, &current.sample);
        }
        debug!("Registered {} handler {} on {}", data_type, handler_ref, id);
        handler_ref
    }

    /// Remove a push handler wherever it is registered.
    pub fn remove_push_handler(&mut self, handler_ref: HandlerRef) -> Result<()> {
        let owner = self.tree.resource_ids().into_iter().find(|id| {
            self.tree
                .resource(*id)
                .is_some_and(|r| r.core.handlers.contains(handler_ref))
        });
        let Some(id) = owner else {
            return Err(HubError::NotFound(format!("{}", handler_ref)));
        };
        if let Some(res) = self.tree.resource_mut(id) {
            res.core.handlers.remove(handler_ref);
        }
        self.release_if_unused(id);
        Ok(())
    }

    // ========================================================================
    // Observations
    // ========================================================================

    /// Create an Observation at `/obs/<path>` (or confirm it exists) and
    /// restore its buffer from backup.
    pub fn create_observation(&mut self, obs_path: &str) -> Result<EntryId> {
        let rel = path::obs_relative(obs_path)?;
        let (id, created) = self
            .tree
            .get_or_create_observation(ResourceTree::ROOT, &path::obs_absolute(rel))?;
        if created {
            self.restore_backup(id);
            self.notify_tree_change(id, EntryKind::Observation, TreeChange::Added);
        }
        Ok(id)
    }

    /// Delete an Observation. Its backup stays until the next `end_update`.
    pub fn delete_observation(&mut self, obs_path: &str) -> Result<()> {
        let id = self.observation_id(obs_path)?;
        self.cancel_timer(id);
        self.notify_tree_change(id, EntryKind::Observation, TreeChange::Removed);
        self.tree.delete_resource(id);
        info!("Deleted observation {}", obs_path);
        Ok(())
    }

    fn with_observation<R>(&self, obs_path: &str, f: impl FnOnce(&Observation) -> R) -> Result<R> {
        let id = self.observation_id(obs_path)?;
        self.tree
            .resource(id)
            .and_then(|r| r.observation())
            .map(f)
            .ok_or_else(|| HubError::NotFound(obs_path.to_string()))
    }

    /// Change an Observation setting. Filter and transform changes suspend
    /// the Observation for the rest of an admin transaction.
    fn update_observation<R>(
        &mut self,
        obs_path: &str,
        suspends: bool,
        f: impl FnOnce(&mut Observation) -> R,
    ) -> Result<R> {
        let id = self.observation_id(obs_path)?;
        if suspends {
            self.mark_config_changing(id);
        }
        self.tree
            .resource_mut(id)
            .and_then(|r| r.observation_mut())
            .map(f)
            .ok_or_else(|| HubError::NotFound(obs_path.to_string()))
    }

    pub fn set_min_period(&mut self, obs_path: &str, seconds: f64) -> Result<()> {
        self.update_observation(obs_path, true, |o| o.min_period = seconds)
    }

    pub fn get_min_period(&self, obs_path: &str) -> Result<f64> {
        self.with_observation(obs_path, |o| o.min_period)
    }

    pub fn set_low_limit(&mut self, obs_path: &str, limit: f64) -> Result<()> {
        self.update_observation(obs_path, true, |o| o.low_limit = limit)
    }

    pub fn get_low_limit(&self, obs_path: &str) -> Result<f64> {
        self.with_observation(obs_path, |o| o.low_limit)
    }

    pub fn set_high_limit(&mut self, obs_path: &str, limit: f64) -> Result<()> {
        self.update_observation(obs_path, true, |o| o.high_limit = limit)
    }

    pub fn get_high_limit(&self, obs_path: &str) -> Result<f64> {
        self.with_observation(obs_path, |o| o.high_limit)
    }

    pub fn set_change_by(&mut self, obs_path: &str, change: f64) -> Result<()> {
        self.update_observation(obs_path, true, |o| o.change_by = change)
    }

    pub fn get_change_by(&self, obs_path: &str) -> Result<f64> {
        self.with_observation(obs_path, |o| o.change_by)
    }

    pub fn set_transform(&mut self, obs_path: &str, transform: Transform, params: &[f64]) -> Result<()> {
        self.update_observation(obs_path, true, |o| o.set_transform(transform, params))
    }

    pub fn get_transform(&self, obs_path: &str) -> Result<(Transform, Vec<f64>)> {
        self.with_observation(obs_path, |o| {
            let (transform, params) = o.transform();
            (transform, params.to_vec())
        })
    }

    pub fn set_buffer_max_count(&mut self, obs_path: &str, count: usize) -> Result<()> {
        self.update_observation(obs_path, false, |o| o.set_max_count(count))
    }

    pub fn get_buffer_max_count(&self, obs_path: &str) -> Result<usize> {
        self.with_observation(obs_path, Observation::max_count)
    }

    /// Set the backup period in seconds; zero disables backups and cancels
    /// any pending backup.
    pub fn set_backup_period(&mut self, obs_path: &str, seconds: f64) -> Result<()> {
        let id = self.observation_id(obs_path)?;
        let enabled = self.update_observation(obs_path, false, |o| {
            o.set_backup_period(seconds).map(|()| o.backup_period() > 0.0)
        })??;
        if !enabled {
            self.cancel_timer(id);
        }
        Ok(())
    }

    pub fn get_backup_period(&self, obs_path: &str) -> Result<f64> {
        self.with_observation(obs_path, Observation::backup_period)
    }

    /// Set (or with `None`/empty, clear) the JSON extraction spec.
    pub fn set_json_extraction(&mut self, obs_path: &str, spec: Option<&str>) -> Result<()> {
        if let Some(spec) = spec.filter(|s| !s.is_empty()) {
            json::validate_spec(spec)?;
        }
        self.update_observation(obs_path, true, |o| {
            o.set_json_extraction(spec.map(str::to_string))
        })
    }

    pub fn get_json_extraction(&self, obs_path: &str) -> Result<Option<String>> {
        self.with_observation(obs_path, |o| o.json_extraction().map(str::to_string))
    }

    // ========================================================================
    // Listing
    // ========================================================================

    pub fn entry_kind(&self, path: &str) -> Result<EntryKind> {
        let id = self.tree.lookup(ResourceTree::ROOT, path)?;
        self.tree
            .kind(id)
            .ok_or_else(|| HubError::NotFound(path.to_string()))
    }

    /// Absolute path of the first child of `path`, if any.
    pub fn first_child(&self, path: &str) -> Result<Option<String>> {
        let id = self.tree.lookup(ResourceTree::ROOT, path)?;
        self.tree
            .first_child(id)
            .map(|child| self.tree.path(ResourceTree::ROOT, child))
            .transpose()
    }

    /// Absolute path of the next sibling of `path`, if any.
    pub fn next_sibling(&self, path: &str) -> Result<Option<String>> {
        let id = self.tree.lookup(ResourceTree::ROOT, path)?;
        self.tree
            .next_sibling(id)
            .map(|sibling| self.tree.path(ResourceTree::ROOT, sibling))
            .transpose()
    }
}
