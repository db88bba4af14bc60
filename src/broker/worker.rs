//! Subscriber worker
//!
//! One worker serves one receive call. It moves through
//! `Created -> Active -> Deactivating -> Terminated`:
//!
//! - on start it registers its inbox with every topic it was created with and
//!   arms the disconnect-check timer;
//! - every delivered message is written to the caller's stream, and a failed
//!   write deactivates the worker (no retry);
//! - every timer tick checks the call's cancellation flag, which is how idle
//!   subscribers notice a client that went away;
//! - a broker shutdown deactivates it as well.
//!
//! Cancellation and shutdown are also watched while a write is pending, so a
//! client that stops reading cannot pin its worker.
//!
//! Deactivation stops the timer and drops the topic registrations. The
//! coordinator then reports the `Completion` to the blocked subscribe call.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::broker::message::Message;
use crate::broker::registry::{Mailbox, SubscriberId};
use crate::utils::error::WriteError;

/// Outbound half of a receive call.
pub trait ResponseWriter: Send + 'static {
    fn write(&mut self, message: &Message) -> impl Future<Output = Result<(), WriteError>> + Send;
}

/// Cancellation flag of one call, shared between the transport and the worker.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancelled: Arc<AtomicBool>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    Created,
    Active,
    Deactivating,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    WriteFailed,
    Cancelled,
    Shutdown,
}

/// What a terminated worker reports back to its subscribe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: SubscriberId,
    pub reason: TerminationReason,
    pub delivered: u64,
}

/// Registrations of one worker. Dropping it unsubscribes from every topic.
#[derive(Debug)]
struct Subscriptions {
    id: SubscriberId,
    mailboxes: Vec<Arc<Mailbox>>,
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        for mailbox in &self.mailboxes {
            mailbox.unsubscribe(&self.id);
        }
    }
}

pub(crate) struct SubscriberWorker<W> {
    id: SubscriberId,
    mailboxes: Vec<Arc<Mailbox>>,
    writer: W,
    context: CallContext,
    check_interval: Duration,
    state: WorkerState,
    delivered: u64,
}

impl<W: ResponseWriter> SubscriberWorker<W> {
    pub(crate) fn new(
        id: SubscriberId,
        mailboxes: Vec<Arc<Mailbox>>,
        writer: W,
        context: CallContext,
        check_interval: Duration,
    ) -> Self {
        Self {
            id,
            mailboxes,
            writer,
            context,
            check_interval,
            state: WorkerState::Created,
            delivered: 0,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker = %self.id, from = ?self.state, to = ?next, "worker state change");
        self.state = next;
    }

    /// Drive the worker until it terminates.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Completion {
        let (inbox, mut deliveries) = mpsc::unbounded_channel();
        let subscriptions = Subscriptions {
            id: self.id,
            mailboxes: std::mem::take(&mut self.mailboxes),
        };
        for mailbox in &subscriptions.mailboxes {
            mailbox.subscribe(self.id, inbox.clone());
        }
        // Only the mailboxes hold senders now; with no topics `recv` yields `None` at once.
        drop(inbox);
        self.transition(WorkerState::Active);

        let period = self.check_interval;
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shut_down_already = *shutdown.borrow_and_update();
        let reason = if shut_down_already {
            TerminationReason::Shutdown
        } else {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => break TerminationReason::Shutdown,
                    Some(message) = deliveries.recv() => {
                        // A client that stops reading can stall the write indefinitely.
                        tokio::select! {
                            biased;
                            _ = shutdown_requested(&mut shutdown) => break TerminationReason::Shutdown,
                            _ = cancelled(&mut timer, &self.context) => {
                                debug!(worker = %self.id, topic = %message.topic, "client cancelled during a pending write");
                                break TerminationReason::Cancelled;
                            }
                            written = self.writer.write(&message) => {
                                if let Err(e) = written {
                                    debug!(worker = %self.id, topic = %message.topic, error = %e, "write failed, client gone");
                                    break TerminationReason::WriteFailed;
                                }
                                self.delivered += 1;
                            }
                        }
                    }
                    _ = cancelled(&mut timer, &self.context) => {
                        debug!(worker = %self.id, "client cancelled the call");
                        break TerminationReason::Cancelled;
                    }
                }
            }
        };

        self.transition(WorkerState::Deactivating);
        drop(timer);
        drop(subscriptions);
        self.transition(WorkerState::Terminated);

        Completion {
            id: self.id,
            reason,
            delivered: self.delivered,
        }
    }
}

/// Resolves once the broker asks its workers to stop, or the broker is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if shutdown.changed().await.is_err() {
            return;
        }
        if *shutdown.borrow_and_update() {
            return;
        }
    }
}

/// Resolves on the first timer tick that finds the call cancelled.
async fn cancelled(timer: &mut Interval, context: &CallContext) {
    loop {
        timer.tick().await;
        if context.is_cancelled() {
            return;
        }
    }
}
