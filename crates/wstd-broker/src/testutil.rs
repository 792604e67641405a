//! Test doubles shared by the broker's unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use wstd_core::error::ConnectionError;
use wstd_core::traits::FrameSink;
use wstd_core::types::{ClientId, ClientInfo, ConnectionId};
use wstd_protocol::{Frame, JsonCodec, Message, Value, WireCodec};

use crate::broker::Broker;
use crate::hooks::{BrokerHooks, InboundMessage};

/// Frames captured by a [`RecordingSink`]
#[derive(Clone, Default)]
pub(crate) struct Frames(Arc<Mutex<Vec<Frame>>>);

impl Frames {
    /// Number of frames written so far
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Decode every captured frame as JSON
    pub fn messages(&self) -> Vec<Message> {
        self.messages_as(&JsonCodec)
    }

    /// Decode every captured frame with the given codec
    pub fn messages_as(&self, codec: &dyn WireCodec) -> Vec<Message> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|frame| codec.decode(frame).unwrap())
            .collect()
    }
}

/// Sink that records every frame instead of writing to a socket
pub(crate) struct RecordingSink {
    frames: Frames,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, Frames) {
        let frames = Frames::default();
        let sink = Arc::new(Self {
            frames: frames.clone(),
            closed: AtomicBool::new(false),
        });
        (sink, frames)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_frame(&self, frame: Frame) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.frames.0.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink whose writes always fail
pub(crate) struct BrokenSink;

#[async_trait]
impl FrameSink for BrokenSink {
    async fn send_frame(&self, _frame: Frame) -> Result<(), ConnectionError> {
        Err(ConnectionError::SendFailed("broken pipe".to_string()))
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

/// Hook invocation captured by [`RecordingHooks`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Start,
    Connected(ClientId),
    Authorized(ClientInfo),
    Disconnected(ClientId),
    ControllerConnected(ClientId),
    ControllerDisconnected(ClientId),
    Message {
        client_id: ClientId,
        topic: String,
        data: Value,
        is_tunnel_controller: bool,
    },
    Shutdown,
}

/// Hooks that record every invocation
#[derive(Default)]
pub(crate) struct RecordingHooks {
    events: Mutex<Vec<Event>>,
    message_delay: Option<Duration>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hooks whose message handler sleeps before recording
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::default(),
            message_delay: Some(delay),
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl BrokerHooks for RecordingHooks {
    async fn on_start(&self, _broker: &Broker) {
        self.record(Event::Start);
    }

    async fn on_client_connected(&self, _broker: &Broker, client_id: &ClientId) {
        self.record(Event::Connected(client_id.clone()));
    }

    async fn on_client_authorized(&self, _broker: &Broker, client: &ClientInfo) {
        self.record(Event::Authorized(client.clone()));
    }

    async fn on_client_disconnected(&self, _broker: &Broker, client_id: &ClientId) {
        self.record(Event::Disconnected(client_id.clone()));
    }

    async fn on_tunnel_controller_connected(&self, _broker: &Broker, client_id: &ClientId) {
        self.record(Event::ControllerConnected(client_id.clone()));
    }

    async fn on_tunnel_controller_disconnected(&self, _broker: &Broker, client_id: &ClientId) {
        self.record(Event::ControllerDisconnected(client_id.clone()));
    }

    async fn on_message(&self, _broker: &Broker, message: InboundMessage) {
        if let Some(delay) = self.message_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(Event::Message {
            client_id: message.client_id.clone(),
            topic: message.topic().to_string(),
            data: message.data().clone(),
            is_tunnel_controller: message.is_tunnel_controller,
        });
    }

    async fn on_shutdown(&self, _broker: &Broker) {
        self.record(Event::Shutdown);
    }
}

/// Wait until every dispatch unit of a connection has finished
pub(crate) async fn settle(broker: &Broker, connection_id: &ConnectionId) {
    let Some(connection) = broker.coordinator().connections.get(connection_id) else {
        return;
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while connection.pending_tasks() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
