//! [`ReplayTransport`]: plays back a recorded run as if a server pushed it.
//!
//! On `subscribe` every recorded message is handed to the listener, in
//! order, before the subscription is returned.  The listener is then
//! dropped since a recording has nothing more to push.  `call` is not
//! supported.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{EventCallback, Subscription, Transport, TransportError};

/// In-memory transport that replays a fixed list of messages.
pub struct ReplayTransport {
    messages: Vec<Value>,
    subscribed: Mutex<Vec<Value>>,
    unsubscribes: Arc<AtomicUsize>,
}

impl ReplayTransport {
    pub fn new(messages: Vec<Value>) -> Self {
        Self {
            messages,
            subscribed: Mutex::new(Vec::new()),
            unsubscribes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Payloads of every `subscribe` call so far.
    pub fn subscribe_payloads(&self) -> Vec<Value> {
        match self.subscribed.lock() {
            Ok(payloads) => payloads.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// How many times a subscription was unsubscribed.
    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    async fn subscribe(
        &self,
        payload: Value,
        mut on_event: EventCallback,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        match self.subscribed.lock() {
            Ok(mut payloads) => payloads.push(payload),
            Err(poisoned) => poisoned.into_inner().push(payload),
        }

        log::debug!("replay: delivering {} recorded messages", self.messages.len());
        for message in &self.messages {
            on_event(message.clone());
        }

        Ok(Box::new(ReplaySubscription {
            unsubscribes: Arc::clone(&self.unsubscribes),
        }))
    }

    async fn call(&self, payload: Value) -> Result<Value, TransportError> {
        let message_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("<untyped>")
            .to_string();
        Err(TransportError::Unsupported(message_type))
    }
}

struct ReplaySubscription {
    unsubscribes: Arc<AtomicUsize>,
}

#[async_trait]
impl Subscription for ReplaySubscription {
    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
