//! Topic-prefix method router

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use wstd_core::types::{ClientId, ClientInfo};
use wstd_protocol::Value;

use crate::api::AutoResponse;
use crate::broker::Broker;
use crate::hooks::{BrokerHooks, InboundMessage};

/// Future returned by a method handler
pub type MethodFuture = BoxFuture<'static, Option<AutoResponse>>;

type MethodHandler = Arc<dyn Fn(MethodCall) -> MethodFuture + Send + Sync>;
type ClientListener = Arc<dyn Fn(Broker, ClientId) -> BoxFuture<'static, ()> + Send + Sync>;
type AuthorizedListener = Arc<dyn Fn(Broker, ClientInfo) -> BoxFuture<'static, ()> + Send + Sync>;

/// Arguments passed to a method handler
#[derive(Clone)]
pub struct MethodCall {
    /// Broker handle, for explicit sends
    pub broker: Broker,
    /// Sender
    pub client_id: ClientId,
    /// Full inbound topic
    pub topic: String,
    /// Inbound payload, `null` when absent
    pub data: Value,
}

/// Routes inbound messages to handlers by topic prefix
///
/// Prefixes are tried in registration order and every match runs.
#[derive(Default)]
pub struct ApiRouter {
    methods: Vec<(String, MethodHandler)>,
    unhandled: Option<MethodHandler>,
    client_connected: Option<ClientListener>,
    client_authorized: Option<AuthorizedListener>,
    client_disconnected: Option<ClientListener>,
    controller_connected: Option<ClientListener>,
    controller_disconnected: Option<ClientListener>,
}

fn method_handler<F, Fut>(handler: F) -> MethodHandler
where
    F: Fn(MethodCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<AutoResponse>> + Send + 'static,
{
    Arc::new(move |call: MethodCall| handler(call).boxed())
}

fn client_listener<F, Fut>(listener: F) -> ClientListener
where
    F: Fn(Broker, ClientId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |broker: Broker, client_id: ClientId| {
        listener(broker, client_id).boxed()
    })
}

impl ApiRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every topic starting with `prefix`
    ///
    /// Registering the same prefix again replaces the handler in place.
    pub fn method<F, Fut>(&mut self, prefix: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(MethodCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<AutoResponse>> + Send + 'static,
    {
        let prefix = prefix.into();
        let handler = method_handler(handler);
        match self.methods.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = handler,
            None => self.methods.push((prefix, handler)),
        }
        self
    }

    /// Registered prefixes, in match order
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|(prefix, _)| prefix.as_str())
    }

    /// Handler for messages no prefix matched
    pub fn on_unhandled<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(MethodCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<AutoResponse>> + Send + 'static,
    {
        self.unhandled = Some(method_handler(handler));
        self
    }

    /// Listener for a regular client's first authorization
    pub fn on_client_connected<F, Fut>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(Broker, ClientId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.client_connected = Some(client_listener(listener));
        self
    }

    /// Listener for a client that is new or changed its intent or info
    pub fn on_client_authorized<F, Fut>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(Broker, ClientInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.client_authorized = Some(Arc::new(move |broker: Broker, client: ClientInfo| {
            listener(broker, client).boxed()
        }));
        self
    }

    /// Listener for a regular client's removal
    pub fn on_client_disconnected<F, Fut>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(Broker, ClientId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.client_disconnected = Some(client_listener(listener));
        self
    }

    /// Listener for a tunnel controller's first authorization
    pub fn on_tunnel_controller_connected<F, Fut>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(Broker, ClientId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.controller_connected = Some(client_listener(listener));
        self
    }

    /// Listener for a tunnel controller's removal
    pub fn on_tunnel_controller_disconnected<F, Fut>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(Broker, ClientId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.controller_disconnected = Some(client_listener(listener));
        self
    }

    async fn call(
        handler: &MethodHandler,
        broker: &Broker,
        client_id: &ClientId,
        topic: &str,
        data: &Value,
    ) {
        let call = MethodCall {
            broker: broker.clone(),
            client_id: client_id.clone(),
            topic: topic.to_string(),
            data: data.clone(),
        };
        if let Some(response) = handler(call).await {
            response.deliver(broker, client_id, topic).await;
        }
    }
}

async fn notify(listener: &Option<ClientListener>, broker: &Broker, client_id: &ClientId) {
    if let Some(listener) = listener {
        listener(broker.clone(), client_id.clone()).await;
    }
}

#[async_trait]
impl BrokerHooks for ApiRouter {
    async fn on_client_connected(&self, broker: &Broker, client_id: &ClientId) {
        notify(&self.client_connected, broker, client_id).await;
    }

    async fn on_client_authorized(&self, broker: &Broker, client: &ClientInfo) {
        if let Some(listener) = &self.client_authorized {
            listener(broker.clone(), client.clone()).await;
        }
    }

    async fn on_client_disconnected(&self, broker: &Broker, client_id: &ClientId) {
        notify(&self.client_disconnected, broker, client_id).await;
    }

    async fn on_tunnel_controller_connected(&self, broker: &Broker, client_id: &ClientId) {
        notify(&self.controller_connected, broker, client_id).await;
    }

    async fn on_tunnel_controller_disconnected(&self, broker: &Broker, client_id: &ClientId) {
        notify(&self.controller_disconnected, broker, client_id).await;
    }

    async fn on_message(&self, broker: &Broker, message: InboundMessage) {
        let topic = message.topic();
        let data = message.data();

        let mut handled = false;
        for (prefix, handler) in &self.methods {
            if topic.starts_with(prefix.as_str()) {
                handled = true;
                Self::call(handler, broker, &message.client_id, topic, data).await;
            }
        }

        if handled {
            return;
        }
        match &self.unhandled {
            Some(handler) => Self::call(handler, broker, &message.client_id, topic, data).await,
            None => tracing::debug!("No method for {} from {}", topic, message.client_id),
        }
    }
}
