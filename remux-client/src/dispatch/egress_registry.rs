//! Round-robin fairness dispatcher over live outgoing send capabilities.

use crate::handler::OutgoingHandler;
use crate::message::{ConnectionId, Message};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::Mutex;

struct RegistryInner {
    handlers: BTreeMap<ConnectionId, Arc<dyn OutgoingHandler>>,
    /// Key of the last dispatched entry. `None` means past-end: the next
    /// dispatch restarts the rotation at the first entry. Valid only while
    /// the map is unchanged since the last advance; removal resets it.
    cursor: Option<ConnectionId>,
}

/// Ordered registry of send capabilities keyed by connection identity, with
/// a rotating cursor for fair dispatch across redundant links.
pub(crate) struct EgressRegistry {
    inner: Mutex<RegistryInner>,
}

impl EgressRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                handlers: BTreeMap::new(),
                cursor: None,
            }),
        }
    }

    /// Registers or overwrites the send capability for `conn_id`.
    pub(crate) async fn set(&self, conn_id: ConnectionId, handler: Arc<dyn OutgoingHandler>) {
        let mut inner = self.inner.lock().await;
        inner.handlers.insert(conn_id, handler);
    }

    pub(crate) async fn contains(&self, conn_id: ConnectionId) -> bool {
        let inner = self.inner.lock().await;
        inner.handlers.contains_key(&conn_id)
    }

    pub(crate) async fn get(&self, conn_id: ConnectionId) -> Option<Arc<dyn OutgoingHandler>> {
        let inner = self.inner.lock().await;
        inner.handlers.get(&conn_id).cloned()
    }

    /// Removes the capability for `conn_id` and restarts the rotation.
    /// Idempotent.
    pub(crate) async fn remove(&self, conn_id: ConnectionId) {
        let mut inner = self.inner.lock().await;
        inner.handlers.remove(&conn_id);
        inner.cursor = None;
    }

    pub(crate) async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.handlers.len()
    }

    /// Dispatches `message` to the next capability in rotation.
    ///
    /// Returns the message when no live capability exists. The chosen
    /// handler is invoked with the registry lock released, so handlers may
    /// re-enter the registry without deadlocking.
    pub(crate) async fn dispatch(&self, message: Message) -> Result<(), Message> {
        let picked = {
            let mut inner = self.inner.lock().await;
            let next = match inner.cursor {
                Some(cursor) => inner
                    .handlers
                    .range((Bound::Excluded(cursor), Bound::Unbounded))
                    .next(),
                None => None,
            }
            .or_else(|| inner.handlers.iter().next())
            .map(|(conn_id, handler)| (*conn_id, Arc::clone(handler)));

            if let Some((conn_id, _)) = &next {
                inner.cursor = Some(*conn_id);
            }
            next
        };

        match picked {
            Some((_, handler)) => {
                handler.handle(message).await;
                Ok(())
            }
            None => Err(message),
        }
    }
}
