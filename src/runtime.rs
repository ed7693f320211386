//! Runtime driving the flow state machine
//!
//! `FlowRuntime` is the sole owner and writer of the flow phase. It
//! receives user intents and network completions over one mpsc channel,
//! applies the pure transition function, executes the resulting effects
//! by spawning `FlowService` calls, and publishes a `ViewState` snapshot
//! over a watch channel for the renderer.
//!
//! There is no cancellation primitive for in-flight requests. Every
//! spawned call is tagged with the runtime's epoch at spawn time; restart
//! bumps the epoch, so a late completion for a superseded session is
//! discarded on arrival instead of being cancelled.

#[cfg(test)]
pub mod testing;

use crate::client::FlowService;
use crate::state_machine::{transition, Effect, Event, FlowConfig, FlowPhase, ViewState};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// An event plus the epoch it was produced under. User intents carry no
/// epoch and always target the current session.
#[derive(Debug)]
struct Inbound {
    epoch: Option<u64>,
    event: Event,
}

/// Handle the renderer uses to emit intents and observe snapshots.
#[derive(Clone)]
pub struct FlowHandle {
    tx: mpsc::Sender<Inbound>,
    view_rx: watch::Receiver<ViewState>,
}

impl FlowHandle {
    pub async fn start_flow(&self) {
        self.send(Event::StartFlow).await;
    }

    pub async fn submit_answer(&self, answer: serde_json::Value) {
        self.send(Event::SubmitAnswer { answer }).await;
    }

    pub async fn restart(&self) {
        self.send(Event::Restart).await;
    }

    async fn send(&self, event: Event) {
        if self.tx.send(Inbound { epoch: None, event }).await.is_err() {
            tracing::warn!("flow runtime is gone; intent dropped");
        }
    }

    /// Receiver for snapshot change notifications.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view_rx.clone()
    }
}

pub struct FlowRuntime<S: FlowService + 'static> {
    config: FlowConfig,
    service: Arc<S>,
    phase: FlowPhase,
    context: Option<serde_json::Value>,
    epoch: u64,
    event_tx: mpsc::Sender<Inbound>,
    event_rx: mpsc::Receiver<Inbound>,
    view_tx: watch::Sender<ViewState>,
}

impl<S: FlowService + 'static> FlowRuntime<S> {
    /// Spawn the runtime loop and return the renderer-facing handle.
    pub fn spawn(config: FlowConfig, service: Arc<S>) -> FlowHandle {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (view_tx, view_rx) = watch::channel(ViewState::default());

        let runtime = FlowRuntime {
            config,
            service,
            phase: FlowPhase::Idle,
            context: None,
            epoch: 0,
            event_tx: event_tx.clone(),
            event_rx,
            view_tx,
        };

        tokio::spawn(runtime.run());

        FlowHandle {
            tx: event_tx,
            view_rx,
        }
    }

    async fn run(mut self) {
        while let Some(Inbound { epoch, event }) = self.event_rx.recv().await {
            if let Some(event_epoch) = epoch {
                if event_epoch != self.epoch {
                    tracing::debug!(
                        event = event.name(),
                        event_epoch,
                        current_epoch = self.epoch,
                        "discarding stale completion"
                    );
                    continue;
                }
            }

            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: Event) {
        // Context bookkeeping happens outside the pure transition: an
        // accepted answer response replaces the context wholesale, and a
        // restart or fresh start discards it.
        let context_update = match &event {
            Event::AnswerCompleted { outcome, .. } => Some(outcome.context.clone()),
            _ => None,
        };
        let supersedes_session = matches!(event, Event::Restart | Event::StartFlow);
        let event_name = event.name();

        match transition(&self.phase, &self.config, event) {
            Ok(result) => {
                if supersedes_session {
                    self.epoch += 1;
                    self.context = None;
                }
                if let Some(context) = context_update {
                    self.context = context;
                }

                tracing::debug!(
                    from = self.phase.name(),
                    to = result.new_phase.name(),
                    event = event_name,
                    "transition"
                );
                self.phase = result.new_phase;

                for effect in result.effects {
                    self.execute(effect);
                }

                self.publish();
            }
            Err(err) => {
                tracing::debug!(event = event_name, %err, "event rejected");
            }
        }
    }

    fn execute(&self, effect: Effect) {
        let service = self.service.clone();
        let tx = self.event_tx.clone();
        let epoch = self.epoch;

        match effect {
            Effect::CallStart { flow_id } => {
                tokio::spawn(async move {
                    let event = match service.start(&flow_id).await {
                        Ok(outcome) => Event::StartCompleted { outcome },
                        Err(error) => Event::StartFailed { error },
                    };
                    let _ = tx
                        .send(Inbound {
                            epoch: Some(epoch),
                            event,
                        })
                        .await;
                });
            }
            Effect::CallAnswer {
                session_id,
                node_id,
                answer,
            } => {
                tokio::spawn(async move {
                    let event = match service.submit_answer(&session_id, &node_id, &answer).await {
                        Ok(outcome) => Event::AnswerCompleted {
                            session_id,
                            node_id,
                            outcome,
                        },
                        Err(error) => Event::AnswerFailed {
                            session_id,
                            node_id,
                            error,
                        },
                    };
                    let _ = tx
                        .send(Inbound {
                            epoch: Some(epoch),
                            event,
                        })
                        .await;
                });
            }
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(ViewState {
            phase: self.phase.clone(),
            context: self.context.clone(),
        });
    }
}
