//! # datahub-rs: resource-graph data hub
//!
//! Producers ("Inputs"), consumers ("Outputs") and stateful aggregators
//! ("Observations") live in a hierarchical namespace. Values flow between
//! them along routes, subject to per-node filtering, buffering,
//! transformation and administrative overrides.
//!
//! ## Architecture
//!
//! - **Tree**: arena of named entries addressed by `/`-separated paths
//! - **Resources**: current/pushed/override/default values, units, routes and
//!   push handlers, plus Observation filters, buffers and transforms
//! - **Hub**: single owner of the tree; runs the push pipeline, admin
//!   transactions and backup timers
//! - **Backup**: binary snapshots of Observation buffers, rate-limited and
//!   restored when an Observation is created
//! - **Bridge**: crossbeam channels moving the hub onto its own thread
//!
//! ## Example
//!
//! ```ignore
//! use datahub_rs::{Hub, DataSample, DataType, NOW};
//! use datahub_rs::backup::MemoryBackupStore;
//! use datahub_rs::clock::SystemClock;
//!
//! let mut hub = Hub::new(Box::new(SystemClock::new()), Box::new(MemoryBackupStore::new()));
//! hub.create_input("/sensor/temp", DataType::Numeric, "degC")?;
//! hub.create_observation("temp")?;
//! hub.set_source("/obs/temp", Some("/sensor/temp"))?;
//! hub.set_buffer_max_count("temp", 100)?;
//!
//! hub.io_push("/sensor/temp", DataType::Numeric, DataSample::numeric(NOW, 21.5))?;
//! assert_eq!(hub.get_numeric("/obs/temp")?, 21.5);
//! ```

pub mod backup;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod json;
pub mod logging;
pub mod resource;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use bridge::{HubBridge, HubCommand, HubEvent};
pub use config::HubConfig;
pub use error::{HubError, Result};
pub use handler::{HandlerRef, HandlerValue};
pub use hub::{BufferStat, Hub, TreeChange};
pub use resource::{Transform, TypedSample};
pub use tree::{EntryId, EntryKind};
pub use types::{DataSample, DataType, NOW};
