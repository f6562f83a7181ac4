//! The narrow pub/sub interfaces C9 (publication) and C8 (control ingress)
//! sit behind, and the concrete MQTT adapter implementing them.
//!
//! `spec.md` §1 scopes the publish/subscribe client library itself out —
//! "external collaborators via narrow interfaces." Grounded on the
//! teacher's `uplink.rs` for the shape of an external-session client
//! (connect, send, receive), generalized to a trait so tests can swap in an
//! in-memory double instead of a real broker. `rumqttc` is the concrete
//! adapter, chosen as the ecosystem-default tokio-native MQTT client since
//! no crate in the retrieved corpus covers this narrow external surface
//! (see `DESIGN.md`).

use futures_util::future::BoxFuture;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::warn;

/// Publishes state updates to the pub/sub bus (the C9 side of the trait).
pub trait Publisher: Send + Sync {
    fn publish<'a>(&'a self, topic: &'a str, payload: String) -> BoxFuture<'a, Result<(), PubSubError>>;
}

/// A single inbound write command observed on a `.../set` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    pub variable: String,
    pub text: String,
}

/// A stream of inbound control commands (the C8 side of the trait).
pub trait ControlSource: Send {
    fn next_command(&mut self) -> BoxFuture<'_, Option<ControlCommand>>;
}

#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("mqtt connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
}

// ---------------------------------------------------------------------------
// MQTT adapter
// ---------------------------------------------------------------------------

pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        MqttPublisher { client }
    }
}

impl Publisher for MqttPublisher {
    fn publish<'a>(&'a self, topic: &'a str, payload: String) -> BoxFuture<'a, Result<(), PubSubError>> {
        Box::pin(async move {
            self.client
                .publish(topic, QoS::AtLeastOnce, false, payload)
                .await
                .map_err(PubSubError::from)
        })
    }
}

/// Drives the broker event loop, surfacing only `.../set` publishes that
/// match `<prefix>/entity/<raw_name>/set` as `ControlCommand`s; everything
/// else (acks, pings, unrelated topics) is consumed and discarded.
pub struct MqttControlSource {
    eventloop: rumqttc::EventLoop,
    set_topic_prefix: String,
}

impl MqttControlSource {
    pub fn new(eventloop: rumqttc::EventLoop, topic_prefix: &str) -> Self {
        MqttControlSource {
            eventloop,
            set_topic_prefix: format!("{topic_prefix}/entity/"),
        }
    }
}

impl ControlSource for MqttControlSource {
    fn next_command(&mut self) -> BoxFuture<'_, Option<ControlCommand>> {
        Box::pin(async move {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if let Some(variable) = parse_set_topic(&self.set_topic_prefix, &publish.topic) {
                            let text = String::from_utf8_lossy(&publish.payload).into_owned();
                            return Some(ControlCommand { variable, text });
                        }
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "mqtt event loop error; control ingress stalled");
                        return None;
                    }
                }
            }
        })
    }
}

fn parse_set_topic(set_topic_prefix: &str, topic: &str) -> Option<String> {
    topic
        .strip_prefix(set_topic_prefix)?
        .strip_suffix("/set")
        .map(str::to_owned)
}

/// Build MQTT client + event loop + a subscription to every `.../set` topic
/// under `prefix`, ready to be wrapped in `MqttPublisher`/`MqttControlSource`.
pub async fn connect(
    client_id: &str,
    host: &str,
    port: u16,
    prefix: &str,
) -> Result<(AsyncClient, rumqttc::EventLoop), PubSubError> {
    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(std::time::Duration::from_secs(30));
    let (client, eventloop) = AsyncClient::new(options, 64);
    client
        .subscribe(format!("{prefix}/entity/+/set"), QoS::AtLeastOnce)
        .await?;
    Ok((client, eventloop))
}
