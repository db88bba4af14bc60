//! Serving status reported to health probes.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::transport::message::ServingStatus;

/// Name under which the broker service reports its health.
pub const SERVICE_NAME: &str = "MessageBroker";

#[derive(Debug, Default)]
pub struct HealthReporter {
    serving: AtomicBool,
}

impl HealthReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_serving(&self, serving: bool) {
        self.serving.store(serving, Ordering::SeqCst);
    }

    /// Status of `service`; `None` or an empty name means the server as a whole.
    pub fn status(&self, service: Option<&str>) -> ServingStatus {
        match service {
            None | Some("") | Some(SERVICE_NAME) => {
                if self.serving.load(Ordering::SeqCst) {
                    ServingStatus::Serving
                } else {
                    ServingStatus::NotServing
                }
            }
            Some(_) => ServingStatus::ServiceUnknown,
        }
    }
}
