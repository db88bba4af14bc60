//! Broker coordinator
//!
//! `Broker` is what the transport talks to. It owns the topic registry, the
//! execution pool and the table of live subscriber workers.
//!
//! - `publish` resolves each topic and hands the content to its mailbox.
//! - `subscribe` creates a worker, records it in the worker table, dispatches
//!   it to the pool and then waits on a one-shot channel until the worker has
//!   terminated. The calling task stays parked for the whole subscription;
//!   that is what keeps the streaming call open.
//! - `shutdown` stops new subscriptions, tells every worker to deactivate and
//!   joins them all.
//!
//! The public API takes `&self` and is meant to be shared as `Arc<Broker>`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::message::Message;
use crate::broker::pool::ExecutionPool;
use crate::broker::registry::{SubscriberId, TopicRegistry};
use crate::broker::worker::{CallContext, Completion, ResponseWriter, SubscriberWorker};
use crate::config::BrokerSettings;
use crate::utils::error::{BrokerError, Result};

#[derive(Debug)]
struct WorkerEntry {
    topics: Vec<String>,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct WorkerTable {
    closed: bool,
    entries: HashMap<SubscriberId, WorkerEntry>,
}

type SharedTable = Arc<Mutex<WorkerTable>>;

fn lock_table(table: &Mutex<WorkerTable>) -> std::sync::MutexGuard<'_, WorkerTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct Broker {
    registry: Arc<TopicRegistry>,
    workers: SharedTable,
    shutdown: watch::Sender<bool>,
    check_interval: Duration,
    pool: ExecutionPool,
}

impl Broker {
    pub fn new(settings: &BrokerSettings) -> Result<Self> {
        let pool = ExecutionPool::new(settings.pool_size)?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            registry: Arc::new(TopicRegistry::new()),
            workers: Arc::new(Mutex::new(WorkerTable::default())),
            shutdown,
            check_interval: settings.disconnect_check_interval(),
            pool,
        })
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Publish every message. Fire-and-forget: topics without subscribers drop the message.
    pub fn publish(&self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            let mailbox = self.registry.resolve(&message.topic);
            let delivered = mailbox.publish(&message.content);
            debug!(topic = %message.topic, delivered, "published message");
        }
    }

    /// Serve one receive call until its worker terminates.
    ///
    /// Fails with [`BrokerError::ShuttingDown`] when the broker no longer
    /// accepts subscriptions, in which case nothing was registered.
    pub async fn subscribe<W: ResponseWriter>(
        &self,
        topics: Vec<String>,
        writer: W,
        context: CallContext,
    ) -> Result<Completion> {
        let topics = dedup_topics(topics);
        let mailboxes: Vec<_> = topics
            .iter()
            .map(|topic| self.registry.resolve(topic))
            .collect();
        let id = Uuid::new_v4();
        let (done_tx, done_rx) = oneshot::channel();

        {
            let mut table = lock_table(&self.workers);
            if table.closed {
                debug!(worker = %id, "rejecting subscription, broker is shutting down");
                return Err(BrokerError::ShuttingDown);
            }

            let worker = SubscriberWorker::new(id, mailboxes, writer, context, self.check_interval);
            let shutdown = self.shutdown.subscribe();
            let workers = Arc::clone(&self.workers);
            // The task can only remove its entry after this block releases the lock.
            let task = self.pool.spawn(async move {
                let completion = worker.run(shutdown).await;
                lock_table(&workers).entries.remove(&completion.id);
                debug!(worker = %completion.id, reason = ?completion.reason, delivered = completion.delivered, "worker released");
                let _ = done_tx.send(completion);
            });
            debug!(worker = %id, ?topics, "subscriber worker registered");
            table.entries.insert(id, WorkerEntry { topics, task });
        }

        match done_rx.await {
            Ok(completion) => Ok(completion),
            Err(_) => {
                lock_table(&self.workers).entries.remove(&id);
                warn!(worker = %id, "worker exited without reporting completion");
                Err(BrokerError::WorkerLost(id))
            }
        }
    }

    /// Stop accepting subscriptions and wait for every live worker to terminate.
    pub async fn shutdown(&self) {
        for (id, topics) in self.subscriptions() {
            debug!(worker = %id, ?topics, "stopping subscriber worker");
        }
        let tasks: Vec<JoinHandle<()>> = {
            let mut table = lock_table(&self.workers);
            table.closed = true;
            table.entries.drain().map(|(_, entry)| entry.task).collect()
        };
        self.shutdown.send_replace(true);
        debug!(workers = tasks.len(), "waiting for subscriber workers to terminate");

        for result in join_all(tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "subscriber worker task failed during shutdown");
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        lock_table(&self.workers).closed
    }

    /// Number of workers that have not terminated yet.
    pub fn active_subscribers(&self) -> usize {
        lock_table(&self.workers).entries.len()
    }

    /// Snapshot of live workers and the topics each one subscribed to.
    pub(crate) fn subscriptions(&self) -> Vec<(SubscriberId, Vec<String>)> {
        lock_table(&self.workers)
            .entries
            .iter()
            .map(|(id, entry)| (*id, entry.topics.clone()))
            .collect()
    }

    /// Subscribers currently registered to `topic`. Does not create the topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .get(topic)
            .map_or(0, |mailbox| mailbox.subscriber_count())
    }

    pub fn topic_count(&self) -> usize {
        self.registry.len()
    }
}

/// Drop repeated topic names, keeping first-seen order.
pub(crate) fn dedup_topics(topics: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(topics.len());
    for topic in topics {
        if !unique.contains(&topic) {
            unique.push(topic);
        }
    }
    unique
}
