use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use shared::domain::{CartEventKind, CartItem, CartNotification};

pub mod config;
pub mod error;
pub mod reconnect;
pub mod remote;
pub mod synthetic;

pub use config::{load_settings, provider_from_settings, ProviderKind, Settings};
pub use error::{CartError, CartResult};
pub use reconnect::ReconnectPolicy;
pub use remote::{CartEndpoints, PushChannelConnector, RemoteCartProvider, WebSocketConnector};
pub use synthetic::{SyntheticCartProvider, SyntheticSettings};

/// Callback invoked with the item carried by an add or remove notification.
pub type ItemHandler = Arc<dyn Fn(CartItem) + Send + Sync>;

pub fn item_handler<F>(handler: F) -> ItemHandler
where
    F: Fn(CartItem) + Send + Sync + 'static,
{
    Arc::new(handler)
}

/// Source of cart contents consumed by the view layer.
///
/// Handlers may fire before or after the first `list_cart_items` resolves. A view
/// treats every notification as a cue to call `list_cart_items` again.
#[async_trait]
pub trait CartProvider: Send + Sync {
    /// Fetches the full cart snapshot. One attempt, no retry.
    async fn list_cart_items(&self) -> CartResult<Vec<CartItem>>;

    /// Replaces the add handler. Only the most recent registration is invoked.
    fn on_add_product(&self, handler: ItemHandler);

    /// Replaces the remove handler. Only the most recent registration is invoked.
    fn on_remove_product(&self, handler: ItemHandler);

    /// Finalizes and clears the cart.
    async fn checkout(&self) -> CartResult<()>;
}

/// One handler slot per notification kind; a registration overwrites the slot.
#[derive(Default)]
pub struct HandlerSlots {
    added: RwLock<Option<ItemHandler>>,
    removed: RwLock<Option<ItemHandler>>,
}

impl HandlerSlots {
    pub fn set(&self, kind: CartEventKind, handler: ItemHandler) {
        let mut slot = self
            .slot(kind)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(handler);
    }

    pub fn get(&self, kind: CartEventKind) -> Option<ItemHandler> {
        self.slot(kind)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Hands the notification to the registered handler. Returns `false` when the
    /// slot is empty and the notification was dropped.
    pub fn dispatch(&self, notification: CartNotification) -> bool {
        // Clone out of the lock so a handler may re-register without deadlocking.
        let Some(handler) = self.get(notification.kind) else {
            return false;
        };
        handler(notification.item);
        true
    }

    fn slot(&self, kind: CartEventKind) -> &RwLock<Option<ItemHandler>> {
        match kind {
            CartEventKind::Added => &self.added,
            CartEventKind::Removed => &self.removed,
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
