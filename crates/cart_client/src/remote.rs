use std::sync::Arc;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use futures::{stream::BoxStream, StreamExt};
use reqwest::Client;
use shared::{
    domain::{CartEventKind, CartItem, CartNotification},
    protocol::{CartEventNotification, CartResponse},
};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    error::{CartError, CartResult},
    reconnect::ReconnectPolicy,
    CartProvider, HandlerSlots, ItemHandler,
};

pub const DEFAULT_CART_ID: &str = "2";

/// URLs for one cart on one cart service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEndpoints {
    cart_id: String,
    cart: Url,
    checkout: Url,
    push_channel: Url,
}

impl CartEndpoints {
    /// `base_url` must be `http://` or `https://`; the push channel uses the
    /// matching `ws://` or `wss://` scheme.
    pub fn new(base_url: &str, cart_id: impl Into<String>) -> CartResult<Self> {
        let cart_id = cart_id.into();
        let base = Url::parse(base_url.trim())
            .map_err(|err| CartError::InvalidEndpoint(format!("{base_url}: {err}")))?;
        let push_scheme = match base.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(CartError::InvalidEndpoint(format!(
                    "{base_url}: unsupported scheme {other:?}, expected http or https"
                )))
            }
        };

        let cart = with_segments(&base, &["cart", cart_id.as_str()])?;
        let checkout = with_segments(&base, &["cart", cart_id.as_str(), "checkout"])?;
        let mut push_channel = with_segments(&base, &["cart", cart_id.as_str(), "ws"])?;
        push_channel.set_scheme(push_scheme).map_err(|()| {
            CartError::InvalidEndpoint(format!("{base_url}: cannot switch to {push_scheme}"))
        })?;

        Ok(Self {
            cart_id,
            cart,
            checkout,
            push_channel,
        })
    }

    pub fn cart_id(&self) -> &str {
        &self.cart_id
    }

    pub fn cart_url(&self) -> &Url {
        &self.cart
    }

    pub fn checkout_url(&self) -> &Url {
        &self.checkout
    }

    pub fn push_channel_url(&self) -> &Url {
        &self.push_channel
    }
}

fn with_segments(base: &Url, segments: &[&str]) -> CartResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| CartError::InvalidEndpoint(format!("{base}: cannot be a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Text frames from one push-channel connection. The stream ends on close.
pub type PushFrames = BoxStream<'static, CartResult<String>>;

#[async_trait]
pub trait PushChannelConnector: Send + Sync {
    async fn connect(&self, url: &Url) -> CartResult<PushFrames>;
}

pub struct WebSocketConnector;

#[async_trait]
impl PushChannelConnector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> CartResult<PushFrames> {
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| CartError::Channel(format!("failed to connect websocket {url}: {err}")))?;
        // The channel is receive-only.
        let (_, ws_reader) = ws_stream.split();
        let frames = ws_reader.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(_)) => {
                    warn!("push: ignoring binary frame");
                    None
                }
                Ok(_) => None,
                Err(err) => Some(Err(CartError::from(err))),
            }
        });
        Ok(frames.boxed())
    }
}

/// Cart service adapter: HTTP for reads and checkout, a websocket for
/// add/remove notifications.
///
/// Construction spawns the push-channel task, so it must happen inside a Tokio
/// runtime. Dropping the provider stops the task.
pub struct RemoteCartProvider {
    http: Client,
    endpoints: CartEndpoints,
    handlers: Arc<HandlerSlots>,
    push_task: JoinHandle<()>,
}

impl RemoteCartProvider {
    pub fn new(endpoints: CartEndpoints, policy: ReconnectPolicy) -> Self {
        Self::with_connector(endpoints, policy, Arc::new(WebSocketConnector))
    }

    pub fn with_connector(
        endpoints: CartEndpoints,
        policy: ReconnectPolicy,
        connector: Arc<dyn PushChannelConnector>,
    ) -> Self {
        let handlers = Arc::new(HandlerSlots::default());
        let push_task = tokio::spawn(run_push_channel(
            connector,
            endpoints.clone(),
            Arc::clone(&handlers),
            policy,
        ));
        Self {
            http: Client::new(),
            endpoints,
            handlers,
            push_task,
        }
    }

    /// Tears down the push channel and cancels any pending reconnect.
    pub fn shutdown(&self) {
        self.push_task.abort();
    }
}

impl Drop for RemoteCartProvider {
    fn drop(&mut self) {
        self.push_task.abort();
    }
}

#[async_trait]
impl CartProvider for RemoteCartProvider {
    async fn list_cart_items(&self) -> CartResult<Vec<CartItem>> {
        let body: CartResponse = self
            .http
            .get(self.endpoints.cart_url().as_str())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(adapt_cart_response(body))
    }

    fn on_add_product(&self, handler: ItemHandler) {
        self.handlers.set(CartEventKind::Added, handler);
    }

    fn on_remove_product(&self, handler: ItemHandler) {
        self.handlers.set(CartEventKind::Removed, handler);
    }

    async fn checkout(&self) -> CartResult<()> {
        self.http
            .post(self.endpoints.checkout_url().as_str())
            .send()
            .await?
            .error_for_status()?;
        info!(cart_id = self.endpoints.cart_id(), "cart checked out");
        Ok(())
    }
}

/// Lines that break a domain invariant are skipped so one bad row does not hide
/// the rest of the cart.
fn adapt_cart_response(response: CartResponse) -> Vec<CartItem> {
    response
        .products
        .into_iter()
        .filter_map(|record| {
            let product_id = record.product_id.clone();
            match CartItem::try_from(record) {
                Ok(item) => Some(item),
                Err(err) => {
                    warn!(cart_id = %response.id, product_id = %product_id, error = %err, "skipping invalid cart line");
                    None
                }
            }
        })
        .collect()
}

pub fn decode_notification(frame: &str) -> CartResult<CartNotification> {
    let wire: CartEventNotification = serde_json::from_str(frame)?;
    Ok(CartNotification::try_from(wire)?)
}

async fn run_push_channel(
    connector: Arc<dyn PushChannelConnector>,
    endpoints: CartEndpoints,
    handlers: Arc<HandlerSlots>,
    policy: ReconnectPolicy,
) {
    let url = endpoints.push_channel_url();
    let cart_id = endpoints.cart_id();
    let mut backoff = policy.backoff();
    let mut attempt: u32 = 0;

    loop {
        match connector.connect(url).await {
            Ok(frames) => {
                info!(cart_id, %url, "push: channel opened");
                backoff.reset();
                attempt = 0;
                match pump_frames(frames, &handlers).await {
                    Ok(()) => info!(cart_id, "push: channel closed"),
                    Err(err) => warn!(cart_id, error = %err, "push: channel failed"),
                }
            }
            Err(err) => warn!(cart_id, %url, error = %err, "push: connect failed"),
        }

        attempt = attempt.saturating_add(1);
        if !policy.allows(attempt) {
            error!(cart_id, attempt, "push: reconnect attempts exhausted, giving up");
            return;
        }
        let Some(delay) = backoff.next_backoff() else {
            error!(cart_id, attempt, "push: backoff exhausted, giving up");
            return;
        };
        debug!(
            cart_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "push: reconnect scheduled"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Delivers frames until the connection closes. Malformed frames are dropped
/// without closing the channel; a receive error ends it.
async fn pump_frames(mut frames: PushFrames, handlers: &HandlerSlots) -> CartResult<()> {
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        let notification = match decode_notification(&frame) {
            Ok(notification) => notification,
            Err(err) => {
                warn!(error = %err, "push: dropping malformed frame");
                continue;
            }
        };
        let kind = notification.kind;
        let title = notification.item.product.title.clone();
        if handlers.dispatch(notification) {
            debug!(?kind, title = %title, "push: notification delivered");
        } else {
            debug!(?kind, title = %title, "push: no handler registered, notification dropped");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
