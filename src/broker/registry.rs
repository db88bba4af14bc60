//! Topic management
//!
//! A `Mailbox` backs one topic and holds the inbox of every worker currently
//! subscribed to it. The `TopicRegistry` maps topic names to mailboxes,
//! creating them on first use and never removing them.
//!
//! Concurrency note: both the registry map and each mailbox's subscriber map
//! sit behind their own mutex. Fan-out keeps the subscriber map locked while it
//! hands the message to every inbox, so two publishes to the same topic reach
//! all subscribers in the same order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use crate::broker::message::Message;

pub type SubscriberId = Uuid;

/// Delivery channel of one subscriber worker.
pub type Inbox = UnboundedSender<Message>;

#[derive(Debug)]
pub struct Mailbox {
    name: String,
    subscribers: Mutex<HashMap<SubscriberId, Inbox>>,
}

impl Mailbox {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand `content` to every subscriber registered right now.
    ///
    /// Never blocks on a subscriber. Returns how many inboxes accepted the
    /// message; an inbox whose worker already went away is skipped.
    pub fn publish(&self, content: &str) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        for (id, inbox) in subscribers.iter() {
            match inbox.send(Message::new(self.name.as_str(), content)) {
                Ok(()) => delivered += 1,
                Err(_) => debug!(topic = %self.name, worker = %id, "inbox closed, skipping"),
            }
        }
        delivered
    }

    /// Register `inbox` under `id`. Registering the same id twice keeps the latest inbox.
    pub fn subscribe(&self, id: SubscriberId, inbox: Inbox) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, inbox);
    }

    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: Mutex<HashMap<String, Arc<Mailbox>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the mailbox for `name`, creating it if this is the first reference.
    pub fn resolve(&self, name: &str) -> Arc<Mailbox> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mailbox) = topics.get(name) {
            return Arc::clone(mailbox);
        }
        debug!(topic = %name, "creating topic");
        let mailbox = Arc::new(Mailbox::new(name));
        topics.insert(name.to_string(), Arc::clone(&mailbox));
        mailbox
    }

    /// Look up a topic without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Mailbox>> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
