//! Resources: the state attached to every non-namespace tree entry.
//!
//! A [`Resource`] is a [`ResourceCore`] (state common to every kind) plus a
//! [`ResourceKind`] carrying the kind-specific part. Changing kind replaces
//! only the [`ResourceKind`], so routes, overrides, defaults and handlers
//! survive Placeholder ↔ Input/Output/Observation transitions.

pub mod coerce;
pub mod io_point;
pub mod observation;
pub mod stats;

pub use io_point::IoPoint;
pub use observation::{BackupAction, Observation, Transform};

use crate::handler::HandlerRegistry;
use crate::tree::{EntryId, EntryKind};
use crate::types::{DataSample, DataType};

/// A sample together with its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedSample {
    pub data_type: DataType,
    pub sample: DataSample,
}

impl TypedSample {
    pub fn new(data_type: DataType, sample: DataSample) -> Self {
        Self { data_type, sample }
    }
}

/// State shared by every resource kind.
#[derive(Debug, Default)]
pub struct ResourceCore {
    /// "" = unspecified
    pub units: String,
    /// Last accepted value
    pub current: Option<TypedSample>,
    /// Last value offered, accepted or not
    pub pushed: Option<TypedSample>,
    pub source: Option<EntryId>,
    pub destinations: Vec<EntryId>,
    pub override_value: Option<TypedSample>,
    pub default_value: Option<TypedSample>,
    /// Set while an admin transaction is changing this resource's configuration
    pub config_changing: bool,
    pub handlers: HandlerRegistry,
    pub json_example: Option<DataSample>,
}

#[derive(Debug)]
pub enum ResourceKind {
    Input(IoPoint),
    Output(IoPoint),
    Observation(Box<Observation>),
    Placeholder,
}

#[derive(Debug)]
pub struct Resource {
    pub core: ResourceCore,
    pub kind: ResourceKind,
}

impl Resource {
    pub fn placeholder() -> Self {
        Self {
            core: ResourceCore::default(),
            kind: ResourceKind::Placeholder,
        }
    }

    pub fn entry_kind(&self) -> EntryKind {
        match self.kind {
            ResourceKind::Input(_) => EntryKind::Input,
            ResourceKind::Output(_) => EntryKind::Output,
            ResourceKind::Observation(_) => EntryKind::Observation,
            ResourceKind::Placeholder => EntryKind::Placeholder,
        }
    }

    pub fn io_point(&self) -> Option<&IoPoint> {
        match &self.kind {
            ResourceKind::Input(io) | ResourceKind::Output(io) => Some(io),
            _ => None,
        }
    }

    pub fn io_point_mut(&mut self) -> Option<&mut IoPoint> {
        match &mut self.kind {
            ResourceKind::Input(io) | ResourceKind::Output(io) => Some(io),
            _ => None,
        }
    }

    pub fn observation(&self) -> Option<&Observation> {
        match &self.kind {
            ResourceKind::Observation(obs) => Some(obs),
            _ => None,
        }
    }

    pub fn observation_mut(&mut self) -> Option<&mut Observation> {
        match &mut self.kind {
            ResourceKind::Observation(obs) => Some(obs),
            _ => None,
        }
    }

    /// The fixed data type of an Input or Output.
    pub fn fixed_type(&self) -> Option<DataType> {
        self.io_point().map(|io| io.data_type)
    }

    /// True if a value of `data_type` can become this resource's current value
    /// without coercion.
    pub fn is_compatible(&self, data_type: DataType) -> bool {
        self.fixed_type().map_or(true, |fixed| fixed == data_type)
    }

    /// True if an override is set and applicable to this resource.
    pub fn is_overridden(&self) -> bool {
        self.core
            .override_value
            .as_ref()
            .is_some_and(|o| self.is_compatible(o.data_type))
    }

    /// True if anything an administrator configured is attached.
    pub fn has_admin_settings(&self) -> bool {
        let core = &self.core;
        core.override_value.is_some()
            || core.default_value.is_some()
            || core.source.is_some()
            || !core.destinations.is_empty()
            || !core.handlers.is_empty()
    }

    /// Replace the kind-specific part, keeping the shared core.
    ///
    /// The last pushed value belonged to the old kind and is dropped; the
    /// current value is recomputed from the override and default.
    pub fn change_kind(&mut self, kind: ResourceKind) {
        self.kind = kind;
        self.core.pushed = None;
        self.core.current = None;
        self.recompute_current();
    }

    /// Recompute the current value: the override if applicable, else the
    /// last pushed value if compatible, else the default if compatible.
    ///
    /// Returns true if the current value changed.
    pub fn recompute_current(&mut self) -> bool {
        let core = &self.core;
        let compatible = |slot: &Option<TypedSample>| {
            slot.as_ref()
                .filter(|v| self.is_compatible(v.data_type))
                .cloned()
        };
        let next = compatible(&core.override_value)
            .or_else(|| compatible(&core.pushed))
            .or_else(|| compatible(&core.default_value));

        if next == self.core.current {
            return false;
        }
        self.core.current = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(ts: f64, v: f64) -> TypedSample {
        TypedSample::new(DataType::Numeric, DataSample::numeric(ts, v))
    }

    #[test]
    fn test_override_precedence() {
        let mut res = Resource::placeholder();
        res.core.default_value = Some(num(1.0, 1.0));
        res.core.pushed = Some(num(2.0, 2.0));
        res.recompute_current();
        assert_eq!(res.core.current, Some(num(2.0, 2.0)));

        res.core.override_value = Some(num(3.0, 3.0));
        assert!(res.is_overridden());
        assert!(res.recompute_current());
        assert_eq!(res.core.current, Some(num(3.0, 3.0)));

        res.core.override_value = None;
        res.recompute_current();
        assert_eq!(res.core.current, Some(num(2.0, 2.0)));

        res.core.pushed = None;
        res.recompute_current();
        assert_eq!(res.core.current, Some(num(1.0, 1.0)));
    }

    #[test]
    fn test_incompatible_override_is_inert() {
        let mut res = Resource {
            core: ResourceCore::default(),
            kind: ResourceKind::Input(IoPoint::new(DataType::Boolean)),
        };
        res.core.override_value = Some(num(1.0, 5.0));
        assert!(!res.is_overridden());
        assert!(!res.recompute_current());
        assert!(res.core.current.is_none());
    }

    #[test]
    fn test_admin_settings() {
        let mut res = Resource::placeholder();
        assert!(!res.has_admin_settings());
        res.core.destinations.push(EntryId(4));
        assert!(res.has_admin_settings());
    }

    #[test]
    fn test_change_kind_keeps_core() {
        let mut res = Resource::placeholder();
        res.core.default_value = Some(num(1.0, 7.0));
        res.core.source = Some(EntryId(2));
        res.change_kind(ResourceKind::Output(IoPoint::new(DataType::Numeric)));
        assert_eq!(res.entry_kind(), EntryKind::Output);
        assert_eq!(res.core.source, Some(EntryId(2)));
        assert_eq!(res.core.current, Some(num(1.0, 7.0)));

        res.change_kind(ResourceKind::Input(IoPoint::new(DataType::String)));
        assert!(res.core.current.is_none());
    }
}
