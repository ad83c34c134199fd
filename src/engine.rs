//! Single-writer event loop hosting a [`ProgressTracker`]
//!
//! Commands arrive on a bounded channel and are applied strictly one at a
//! time in arrival order. After each applied change the new snapshot is
//! published on a watch channel so observers can react to it.

use crate::error::{ProgressError, ProgressResult};
use crate::events::ProgressEvent;
use crate::metrics;
use crate::steps::StepDescriptor;
use crate::tracker::{ProgressSnapshot, ProgressTracker};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

type Reply = oneshot::Sender<ProgressResult<ProgressSnapshot>>;

/// Commands accepted by the engine
#[derive(Debug)]
pub enum TrackerCommand {
    Event(ProgressEvent),
    Seed(Vec<StepDescriptor>),
    Reset,
}

struct Envelope {
    command: TrackerCommand,
    reply: Option<Reply>,
}

/// Owns the tracker and applies commands to it
pub struct ProgressEngine {
    tracker: ProgressTracker,
    command_rx: mpsc::Receiver<Envelope>,
    snapshot_tx: watch::Sender<ProgressSnapshot>,
}

/// Cloneable handle for feeding and observing an engine
#[derive(Clone)]
pub struct ProgressHandle {
    command_tx: mpsc::Sender<Envelope>,
    snapshot_rx: watch::Receiver<ProgressSnapshot>,
}

impl ProgressEngine {
    /// Create an engine and its handle
    pub fn new(tracker: ProgressTracker, capacity: usize) -> (Self, ProgressHandle) {
        let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(tracker.snapshot());

        let engine = Self {
            tracker,
            command_rx,
            snapshot_tx,
        };
        let handle = ProgressHandle {
            command_tx,
            snapshot_rx,
        };
        (engine, handle)
    }

    /// Main loop; returns once every handle has been dropped
    pub async fn run(mut self) -> ProgressResult<()> {
        info!(tracker = %self.tracker.id(), "Progress engine started");

        while let Some(Envelope { command, reply }) = self.command_rx.recv().await {
            let result = self.handle(command);
            if let Some(reply) = reply {
                // Caller may have given up waiting
                let _ = reply.send(result);
            }
        }

        info!(tracker = %self.tracker.id(), "Progress engine stopped");
        Ok(())
    }

    fn handle(&mut self, command: TrackerCommand) -> ProgressResult<ProgressSnapshot> {
        let before = self.tracker.revision();

        match command {
            TrackerCommand::Event(event) => {
                metrics::record_event(&event);
                debug!("Handling {} event with {} steps", event.name(), event.step_count());
                self.apply_event(event).map_err(|e| {
                    warn!("Rejected step event: {}", e);
                    metrics::record_rejected(&e);
                    e
                })?;
            }
            TrackerCommand::Seed(expected) => self.tracker.seed(&expected),
            TrackerCommand::Reset => {
                self.tracker.reset();
                metrics::record_reset();
            }
        }

        let snapshot = self.tracker.snapshot();
        if snapshot.revision != before {
            metrics::record_progress(snapshot.total, snapshot.completed_count, snapshot.all_completed);
            self.snapshot_tx.send_replace(snapshot.clone());
        }
        Ok(snapshot)
    }

    fn apply_event(&mut self, event: ProgressEvent) -> ProgressResult<()> {
        match event {
            ProgressEvent::StepsList { steps } => {
                let outcome = self.tracker.on_steps_list(&steps)?;
                metrics::record_list_outcome(outcome);
            }
            ProgressEvent::StepComplete { step } => {
                self.tracker.on_step_complete(step)?;
                metrics::record_step_completed();
            }
        }
        Ok(())
    }
}

impl ProgressHandle {
    /// Feed a full-plan observation
    pub async fn steps_list(&self, steps: Vec<StepDescriptor>) -> ProgressResult<ProgressSnapshot> {
        self.request(TrackerCommand::Event(ProgressEvent::StepsList { steps }))
            .await
    }

    /// Feed one phase completion
    pub async fn step_complete(&self, step: StepDescriptor) -> ProgressResult<ProgressSnapshot> {
        self.request(TrackerCommand::Event(ProgressEvent::StepComplete { step }))
            .await
    }

    pub async fn apply(&self, event: ProgressEvent) -> ProgressResult<ProgressSnapshot> {
        self.request(TrackerCommand::Event(event)).await
    }

    pub async fn seed(&self, expected: Vec<StepDescriptor>) -> ProgressResult<ProgressSnapshot> {
        self.request(TrackerCommand::Seed(expected)).await
    }

    pub async fn reset(&self) -> ProgressResult<ProgressSnapshot> {
        self.request(TrackerCommand::Reset).await
    }

    /// Enqueue a command without waiting for the result
    pub async fn send(&self, command: TrackerCommand) -> ProgressResult<()> {
        self.command_tx
            .send(Envelope {
                command,
                reply: None,
            })
            .await
            .map_err(|_| ProgressError::EngineClosed)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified on every published change
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn request(&self, command: TrackerCommand) -> ProgressResult<ProgressSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Envelope {
                command,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| ProgressError::EngineClosed)?;

        reply_rx.await.map_err(|_| ProgressError::EngineClosed)?
    }
}
