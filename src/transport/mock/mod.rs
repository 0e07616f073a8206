//! Mock transport implementation for testing.
//!
//! Records every publish, lets the test flip usability or force publish
//! failures, and can answer publishes through a responder closure the way
//! a remote peer would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use super::{dispatch_to_handlers, Message, MessageHandler, Result, Transport, TransportError};

/// Produces the inbound replies for one outbound message.
pub type Responder = dyn Fn(&Message) -> Vec<Message> + Send + Sync;

/// Mock transport for testing.
pub struct MockTransport {
    published: RwLock<Vec<Message>>,
    fail_on_publish: RwLock<bool>,
    stall_after: RwLock<Option<usize>>,
    usable: AtomicBool,
    handlers: Arc<RwLock<Vec<Box<dyn MessageHandler>>>>,
    responder: RwLock<Option<Arc<Responder>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            fail_on_publish: RwLock::new(false),
            stall_after: RwLock::new(None),
            usable: AtomicBool::new(true),
            handlers: Arc::new(RwLock::new(Vec::new())),
            responder: RwLock::new(None),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_usable(&self, usable: bool) {
        self.usable.store(usable, Ordering::SeqCst);
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    /// Let the first `completed` publishes through; every later publish
    /// never completes, like a client whose outbound queue is full.
    pub async fn set_stall_after(&self, completed: usize) {
        *self.stall_after.write().await = Some(completed);
    }

    /// Answer every successful publish with the messages `responder` returns.
    ///
    /// Replies are delivered from a spawned task, after `publish` returns,
    /// the way a broker round-trip would.
    pub async fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Message) -> Vec<Message> + Send + Sync + 'static,
    {
        *self.responder.write().await = Some(Arc::new(responder));
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    pub async fn published(&self) -> Vec<Message> {
        self.published.read().await.clone()
    }

    pub async fn take_published(&self) -> Vec<Message> {
        std::mem::take(&mut *self.published.write().await)
    }

    /// Wait until at least `count` messages were published, or `within` elapses.
    pub async fn wait_for_published(&self, count: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.published_count().await >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Deliver an inbound message to the registered handlers.
    pub async fn deliver(&self, topic: &str, payload: impl Into<Bytes>) -> bool {
        let message = Arc::new(Message::new(topic, payload));
        dispatch_to_handlers(&self.handlers, &message).await
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        if *self.fail_on_publish.read().await {
            return Err(TransportError::Publish("Mock publish failure".to_string()));
        }
        if let Some(completed) = *self.stall_after.read().await {
            if self.published_count().await >= completed {
                debug!(%topic, "Mock publish stalled");
                futures::future::pending::<()>().await;
            }
        }
        let message = Message::new(topic, payload);
        self.published.write().await.push(message.clone());

        let responder = self.responder.read().await.clone();
        if let Some(responder) = responder {
            let replies = responder(&message);
            debug!(topic = %topic, replies = replies.len(), "Mock responder answering");
            let handlers = self.handlers.clone();
            tokio::spawn(async move {
                for reply in replies {
                    dispatch_to_handlers(&handlers, &Arc::new(reply)).await;
                }
            });
        }
        Ok(())
    }

    async fn subscribe(&self, handler: Box<dyn MessageHandler>) -> Result<()> {
        self.handlers.write().await.push(handler);
        Ok(())
    }

    fn is_usable(&self) -> bool {
        self.usable.load(Ordering::SeqCst)
    }
}
