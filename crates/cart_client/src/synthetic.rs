//! Backend-free provider for demos and local development.
//!
//! The cart is generated once at construction. A background ticker then emits
//! random add/remove notifications that never touch the generated cart; only
//! `add_item`, `remove_item` and `checkout` change what `list_cart_items` returns.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use shared::domain::{Cart, CartEventKind, CartItem, CartNotification, Product};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{error::CartResult, CartProvider, HandlerSlots, ItemHandler};

pub const IMAGE_BASE_URL: &str = "https://zcart-test-images.s3.amazonaws.com";
/// Upper bound for quantities of generated lines and of lines added by `add_item`.
pub const MAX_LINE_QUANTITY: u32 = 9;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(60_000);
pub const DEFAULT_MAX_QUANTITY: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticSettings {
    /// Artificial latency of every `list_cart_items` call.
    pub delay: Duration,
    /// Period between synthesized notifications. Zero disables them.
    pub interval: Duration,
    /// Largest quantity carried by a synthesized notification.
    pub max_quantity: u32,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            interval: DEFAULT_INTERVAL,
            max_quantity: DEFAULT_MAX_QUANTITY,
        }
    }
}

fn sample(title: &str, price: f64, image: &str) -> Product {
    Product {
        title: title.to_string(),
        price,
        description: None,
        image_url: Some(format!("{IMAGE_BASE_URL}/{image}")),
    }
}

pub fn sample_catalog() -> Vec<Product> {
    vec![
        sample("Coca-Cola 2L", 9.00, "coca2l.png"),
        sample("Batata Ruffles", 7.00, "ruffles.png"),
        sample("Chamyto", 5.99, "chamyto.png"),
        sample("Bombril", 2.99, "bombril.png"),
        sample("Café", 9.99, "cafe.png"),
        sample("Nissin Lámen", 3.99, "lamen.png"),
        sample("Leite Longa Vida 1L", 3.99, "leite.png"),
        sample("Nuggets", 7.99, "nuggets.png"),
        sample("Pão de Alho", 4.99, "paodealho.png"),
        sample("Tang", 1.99, "tang.png"),
    ]
}

/// Shuffles the catalog and keeps a random non-empty prefix, each line with a
/// quantity in `1..=MAX_LINE_QUANTITY`. An empty catalog yields an empty cart.
pub fn generate_cart<R: Rng>(catalog: &[Product], rng: &mut R) -> Cart {
    if catalog.is_empty() {
        return Cart::new();
    }
    let mut shuffled = catalog.to_vec();
    shuffled.shuffle(rng);
    let len = rng.random_range(1..=shuffled.len());
    Cart::from_items(shuffled.into_iter().take(len).map(|product| CartItem {
        product,
        quantity: rng.random_range(1..=MAX_LINE_QUANTITY),
    }))
}

struct SyntheticState {
    cart: Cart,
    rng: StdRng,
}

pub struct SyntheticCartProvider {
    catalog: Arc<[Product]>,
    delay: Duration,
    state: Arc<Mutex<SyntheticState>>,
    handlers: Arc<HandlerSlots>,
    ticker: JoinHandle<()>,
}

impl SyntheticCartProvider {
    /// Must be called inside a Tokio runtime; the notification ticker is spawned
    /// here and stopped when the provider is dropped.
    pub fn new(settings: SyntheticSettings) -> Self {
        Self::with_rng(settings, sample_catalog(), StdRng::from_os_rng())
    }

    pub fn with_rng(settings: SyntheticSettings, catalog: Vec<Product>, mut rng: StdRng) -> Self {
        let cart = generate_cart(&catalog, &mut rng);
        info!(
            lines = cart.len(),
            delay_ms = settings.delay.as_millis() as u64,
            interval_ms = settings.interval.as_millis() as u64,
            "synthetic: generated cart"
        );

        let catalog: Arc<[Product]> = catalog.into();
        let state = Arc::new(Mutex::new(SyntheticState { cart, rng }));
        let handlers = Arc::new(HandlerSlots::default());
        let ticker = tokio::spawn(run_ticker(
            Arc::clone(&catalog),
            Arc::clone(&state),
            Arc::clone(&handlers),
            settings.interval,
            settings.max_quantity,
        ));

        Self {
            catalog,
            delay: settings.delay,
            state,
            handlers,
            ticker,
        }
    }

    pub fn catalog(&self) -> &[Product] {
        &self.catalog
    }

    /// Adds one unit of `product`, or a new line with a random quantity when the
    /// product is not in the cart yet. Returns the resulting line.
    pub async fn add_item(&self, product: &Product) -> CartItem {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let initial_quantity = state.rng.random_range(1..=MAX_LINE_QUANTITY);
        state.cart.add(product, initial_quantity).clone()
    }

    /// Removes one unit; the line disappears at zero. `false` when absent.
    pub async fn remove_item(&self, title: &str) -> bool {
        self.state.lock().await.cart.remove(title)
    }

    /// Stops synthesizing notifications.
    pub fn shutdown(&self) {
        self.ticker.abort();
    }
}

impl Drop for SyntheticCartProvider {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[async_trait]
impl CartProvider for SyntheticCartProvider {
    async fn list_cart_items(&self) -> CartResult<Vec<CartItem>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.state.lock().await.cart.items().to_vec())
    }

    fn on_add_product(&self, handler: ItemHandler) {
        self.handlers.set(CartEventKind::Added, handler);
    }

    fn on_remove_product(&self, handler: ItemHandler) {
        self.handlers.set(CartEventKind::Removed, handler);
    }

    /// There is no backend to finalize against; the generated cart is emptied.
    async fn checkout(&self) -> CartResult<()> {
        self.state.lock().await.cart.clear();
        info!("synthetic: cart checked out");
        Ok(())
    }
}

async fn run_ticker(
    catalog: Arc<[Product]>,
    state: Arc<Mutex<SyntheticState>>,
    handlers: Arc<HandlerSlots>,
    period: Duration,
    max_quantity: u32,
) {
    if catalog.is_empty() || period.is_zero() {
        return;
    }
    let max_quantity = max_quantity.max(1);
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        let notification = {
            let mut guard = state.lock().await;
            let rng = &mut guard.rng;
            let product = catalog[rng.random_range(0..catalog.len())].clone();
            let kind = if rng.random_bool(0.5) {
                CartEventKind::Added
            } else {
                CartEventKind::Removed
            };
            let quantity = rng.random_range(1..=max_quantity);
            CartNotification {
                kind,
                item: CartItem { product, quantity },
            }
        };
        let title = notification.item.product.title.clone();
        let quantity = notification.item.quantity;
        let kind = notification.kind;
        let delivered = handlers.dispatch(notification);
        debug!(?kind, title = %title, quantity, delivered, "synthetic: notification");
    }
}

#[cfg(test)]
#[path = "tests/synthetic_tests.rs"]
mod tests;
