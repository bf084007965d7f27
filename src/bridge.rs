//! Thread boundary between the hub and everything else.
//!
//! [`HubBridge::spawn`] moves a [`Hub`] onto its own thread. Callers send
//! [`HubCommand`]s over a bounded crossbeam channel; the hub thread runs each
//! one to completion, then fires any backup timers that came due, so all
//! mutation stays single-threaded. Push handlers registered through
//! [`HubBridge::subscribe`] are delivered back as [`HubEvent::Pushed`].
//!
//! # Example
//!
//! ```ignore
//! use datahub_rs::{bridge::HubBridge, config::HubConfig, hub::Hub};
//!
//! let config = HubConfig::default();
//! let bridge = HubBridge::spawn(Hub::from_config(&config)?, &config);
//!
//! bridge.call(|hub| hub.create_input("/app/temp", DataType::Numeric, "degC"))??;
//! let handler = bridge.subscribe("/app/temp", DataType::Numeric)?;
//!
//! for event in bridge.drain() {
//!     if let HubEvent::Pushed { path, value, .. } = event {
//!         println!("{} = {:?}", path, value);
//!     }
//! }
//! let hub = bridge.shutdown()?;
//! ```

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::handler::{HandlerRef, HandlerValue};
use crate::hub::Hub;
use crate::types::DataType;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::fmt;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// A closure run on the hub thread with exclusive access to the hub.
pub type HubJob = Box<dyn FnOnce(&mut Hub) + Send>;

/// Commands sent to the hub thread.
pub enum HubCommand {
    /// Run an arbitrary closure against the hub.
    Execute(HubJob),
    /// Register a push handler whose values arrive as events.
    Subscribe {
        path: String,
        data_type: DataType,
        reply: Sender<Result<HandlerRef>>,
    },
    /// Remove a handler registered with `Subscribe`.
    Unsubscribe {
        handler: HandlerRef,
        reply: Sender<Result<()>>,
    },
    StartUpdate,
    EndUpdate,
    /// Dump an Observation's buffer as JSON.
    ReadBufferJson {
        path: String,
        start: f64,
        reply: Sender<Result<String>>,
    },
    /// Flush pending backups and stop the hub thread.
    Shutdown,
}

impl fmt::Debug for HubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubCommand::Execute(_) => f.write_str("Execute(..)"),
            HubCommand::Subscribe { path, data_type, .. } => f
                .debug_struct("Subscribe")
                .field("path", path)
                .field("data_type", data_type)
                .finish(),
            HubCommand::Unsubscribe { handler, .. } => {
                f.debug_struct("Unsubscribe").field("handler", handler).finish()
            }
            HubCommand::StartUpdate => f.write_str("StartUpdate"),
            HubCommand::EndUpdate => f.write_str("EndUpdate"),
            HubCommand::ReadBufferJson { path, start, .. } => f
                .debug_struct("ReadBufferJson")
                .field("path", path)
                .field("start", start)
                .finish(),
            HubCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Messages sent from the hub thread.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// A subscribed resource accepted a value.
    Pushed {
        path: String,
        timestamp: f64,
        value: HandlerValue,
    },
    /// The hub thread is exiting.
    Shutdown,
}

/// Caller-side handle to a hub running on its own thread.
pub struct HubBridge {
    cmd_tx: Sender<HubCommand>,
    event_rx: Receiver<HubEvent>,
    handle: Option<JoinHandle<Hub>>,
}

impl HubBridge {
    /// Start the hub thread.
    pub fn spawn(hub: Hub, config: &HubConfig) -> Self {
        let (cmd_tx, cmd_rx) = bounded(config.command_queue_depth.max(1));
        let (event_tx, event_rx) = bounded(config.event_queue_depth.max(1));
        let worker = HubWorker {
            hub,
            cmd_rx,
            event_tx,
        };
        let handle = std::thread::spawn(move || worker.run());
        Self {
            cmd_tx,
            event_rx,
            handle: Some(handle),
        }
    }

    pub fn send_command(&self, cmd: HubCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| HubError::Channel("hub thread has stopped".to_string()))
    }

    /// Run `f` on the hub thread and wait for its result.
    pub fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Hub) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded(1);
        self.send_command(HubCommand::Execute(Box::new(move |hub| {
            let _ = reply_tx.send(f(hub));
        })))?;
        wait(reply_rx)
    }

    /// Subscribe to a resource's values. The current value, if any, is
    /// delivered immediately.
    pub fn subscribe(&self, path: &str, data_type: DataType) -> Result<HandlerRef> {
        let (reply, reply_rx) = bounded(1);
        self.send_command(HubCommand::Subscribe {
            path: path.to_string(),
            data_type,
            reply,
        })?;
        wait(reply_rx)?
    }

    pub fn unsubscribe(&self, handler: HandlerRef) -> Result<()> {
        let (reply, reply_rx) = bounded(1);
        self.send_command(HubCommand::Unsubscribe { handler, reply })?;
        wait(reply_rx)?
    }

    pub fn start_update(&self) -> Result<()> {
        self.send_command(HubCommand::StartUpdate)
    }

    pub fn end_update(&self) -> Result<()> {
        self.send_command(HubCommand::EndUpdate)
    }

    pub fn read_buffer_json(&self, path: &str, start: f64) -> Result<String> {
        let (reply, reply_rx) = bounded(1);
        self.send_command(HubCommand::ReadBufferJson {
            path: path.to_string(),
            start,
            reply,
        })?;
        wait(reply_rx)?
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<HubEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Try to receive a single event without blocking.
    pub fn try_recv(&self) -> Option<HubEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Event receiver, for callers that want to block or `select!`.
    pub fn events(&self) -> &Receiver<HubEvent> {
        &self.event_rx
    }

    /// Stop the hub thread, flushing pending backups, and get the hub back.
    pub fn shutdown(mut self) -> Result<Hub> {
        let _ = self.cmd_tx.send(HubCommand::Shutdown);
        self.join()
    }

    fn join(&mut self) -> Result<Hub> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| HubError::Channel("hub thread already joined".to_string()))?;
        handle
            .join()
            .map_err(|_| HubError::Channel("hub thread panicked".to_string()))
    }
}

impl Drop for HubBridge {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.cmd_tx.send(HubCommand::Shutdown);
            if let Err(e) = self.join() {
                warn!("Hub thread did not stop cleanly: {}", e);
            }
        }
    }
}

fn wait<T>(reply_rx: Receiver<T>) -> Result<T> {
    reply_rx
        .recv()
        .map_err(|_| HubError::Channel("hub thread dropped the reply".to_string()))
}

/// Owns the hub on its thread.
struct HubWorker {
    hub: Hub,
    cmd_rx: Receiver<HubCommand>,
    event_tx: Sender<HubEvent>,
}

impl HubWorker {
    fn run(mut self) -> Hub {
        info!("Hub thread started");

        loop {
            let next = match self.hub.time_until_next_timer() {
                Some(timeout) => match self.cmd_rx.recv_timeout(timeout) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.cmd_rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };

            if let Some(cmd) = next {
                if !self.handle(cmd) {
                    break;
                }
            }
            self.hub.service_timers();
        }

        self.hub.flush_backups();
        let _ = self.event_tx.try_send(HubEvent::Shutdown);
        info!("Hub thread exiting");
        self.hub
    }

    /// Returns false on shutdown.
    fn handle(&mut self, cmd: HubCommand) -> bool {
        debug!("Hub command {:?}", cmd);
        match cmd {
            HubCommand::Execute(job) => job(&mut self.hub),
            HubCommand::Subscribe {
                path,
                data_type,
                reply,
            } => {
                let _ = reply.send(self.subscribe(path, data_type));
            }
            HubCommand::Unsubscribe { handler, reply } => {
                let _ = reply.send(self.hub.remove_push_handler(handler));
            }
            HubCommand::StartUpdate => self.hub.start_update(),
            HubCommand::EndUpdate => self.hub.end_update(),
            HubCommand::ReadBufferJson { path, start, reply } => {
                let _ = reply.send(self.hub.read_buffer_json(&path, start));
            }
            HubCommand::Shutdown => return false,
        }
        true
    }

    fn subscribe(&mut self, path: String, data_type: DataType) -> Result<HandlerRef> {
        let event_tx = self.event_tx.clone();
        let event_path = path.clone();
        self.hub.add_push_handler(
            &path,
            data_type,
            Box::new(move |timestamp, value| {
                let event = HubEvent::Pushed {
                    path: event_path.clone(),
                    timestamp,
                    value: value.clone(),
                };
                if let Err(TrySendError::Full(_)) = event_tx.try_send(event) {
                    debug!("Event queue full, dropped value for {}", event_path);
                }
            }),
        )
    }
}
