//! Scriptable transport for unit tests.
//!
//! [`MockTransport`] keeps the listener handed to `subscribe` so a test can
//! push messages one at a time, records every payload it was given, counts
//! unsubscribes and answers `call`s from a queue of canned responses.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{EventCallback, Subscription, Transport, TransportError};

#[derive(Default)]
struct MockState {
    subscribe_payloads: Vec<Value>,
    listener: Option<EventCallback>,
    unsubscribes: usize,
    /// Keep delivering after unsubscribe, like a misbehaving server.
    keep_listener: bool,
    subscribe_error: Option<TransportError>,
    unsubscribe_error: Option<TransportError>,
    calls: Vec<Value>,
    responses: VecDeque<Result<Value, TransportError>>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one message to the current listener.  Returns `false` when
    /// there is no listener.
    pub fn push(&self, message: Value) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.listener.as_mut() {
            Some(listener) => {
                listener(message);
                true
            }
            None => false,
        }
    }

    pub fn keep_listener_after_unsubscribe(&self) {
        self.state.lock().unwrap().keep_listener = true;
    }

    pub fn fail_subscribe(&self, error: TransportError) {
        self.state.lock().unwrap().subscribe_error = Some(error);
    }

    pub fn fail_unsubscribe(&self, error: TransportError) {
        self.state.lock().unwrap().unsubscribe_error = Some(error);
    }

    pub fn respond(&self, response: Result<Value, TransportError>) {
        self.state.lock().unwrap().responses.push_back(response);
    }

    pub fn subscribe_payloads(&self) -> Vec<Value> {
        self.state.lock().unwrap().subscribe_payloads.clone()
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.state.lock().unwrap().unsubscribes
    }

    pub fn has_listener(&self) -> bool {
        self.state.lock().unwrap().listener.is_some()
    }

    pub fn calls(&self) -> Vec<Value> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn subscribe(
        &self,
        payload: Value,
        on_event: EventCallback,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.subscribe_payloads.push(payload);
        if let Some(error) = state.subscribe_error.take() {
            return Err(error);
        }
        state.listener = Some(on_event);
        Ok(Box::new(MockSubscription {
            state: Arc::clone(&self.state),
        }))
    }

    async fn call(&self, payload: Value) -> Result<Value, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(payload);
        state
            .responses
            .pop_front()
            .unwrap_or(Err(TransportError::Closed))
    }
}

struct MockSubscription {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Subscription for MockSubscription {
    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.unsubscribes += 1;
        if !state.keep_listener {
            state.listener = None;
        }
        match state.unsubscribe_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
