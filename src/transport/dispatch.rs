//! Handler dispatch utilities.
//!
//! Common pattern for handing an inbound message to every registered handler.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::error;

use super::{Message, MessageHandler};

/// Dispatch a message to all registered handlers.
///
/// Calls each handler in sequence, logging errors but continuing to subsequent
/// handlers. Returns `true` if all handlers succeeded, `false` if any failed.
pub async fn dispatch_to_handlers(
    handlers: &Arc<RwLock<Vec<Box<dyn MessageHandler>>>>,
    message: &Arc<Message>,
) -> bool {
    let handlers_guard = handlers.read().await;
    let mut all_succeeded = true;

    for handler in handlers_guard.iter() {
        if let Err(e) = handler.handle(Arc::clone(message)).await {
            error!(topic = %message.topic, error = %e, "Handler failed");
            all_succeeded = false;
        }
    }

    all_succeeded
}
