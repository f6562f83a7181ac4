//! End-to-end coverage of the wire-to-publication path: a raw temperature
//! frame arrives on a mocked device bus, the framer delimits it, the
//! repository decodes it, and publication renders both topic shapes.
//!
//! Matches the worked example in `spec.md` §8 scenario 1 (0x00EB -> 23.5).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bus_core::{AddressClass, DataType, Endpoint, Frame, FieldKind, Message, PacketType};
use futures_util::future::BoxFuture;
use gateway::publish::{AggregateInputNames, Publication};
use gateway::pubsub::{Publisher, PubSubError};
use test_support::fixtures::sample_repository;
use tokio::sync::mpsc;
use transport::FrameEvent;

#[derive(Clone, Default)]
struct RecordingPublisher {
    published: Arc<Mutex<Vec<(String, String)>>>,
}

impl Publisher for RecordingPublisher {
    fn publish<'a>(&'a self, topic: &'a str, payload: String) -> BoxFuture<'a, Result<(), PubSubError>> {
        self.published.lock().unwrap().push((topic.to_owned(), payload));
        Box::pin(async { Ok(()) })
    }
}

fn reading_frame() -> Frame {
    Frame {
        source: Endpoint {
            class: AddressClass::Outdoor,
            channel: 0,
            address: 0,
        },
        destination: Endpoint {
            class: AddressClass::JIGTester,
            channel: 255,
            address: 0,
        },
        information: false,
        version: 2,
        retry_count: 0,
        packet_type: PacketType::Normal,
        data_type: DataType::Notification,
        packet_number: bus_core::DEFAULT_PACKET_NUMBER,
        messages: vec![Message::new(0x4203, FieldKind::I16, vec![0x00, 0xEB])],
    }
}

#[tokio::test]
async fn temperature_frame_decodes_and_publishes_both_topics() {
    let mut mock = test_support::mock_transport_pair(4096);
    let (event_tx, mut event_rx) = mpsc::channel::<FrameEvent>(4);

    let frame_bytes = reading_frame().serialize();
    mock.push_from_device(&frame_bytes).await;

    let (mut read_half, _write_half) = mock.transport.split();
    let reader = transport::framer::run(&mut read_half, event_tx, None);
    tokio::spawn(reader);

    let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
        .await
        .expect("framer should deliver an event before the timeout")
        .expect("event channel should not close");

    let bytes = match event {
        FrameEvent::Candidate(bytes) => bytes,
        FrameEvent::Invalid => panic!("well-formed frame misclassified as invalid"),
    };

    let parsed = Frame::parse(&bytes).expect("frame must parse");
    let repo = sample_repository();
    let entry = repo.by_address(parsed.messages[0].address).expect("known address");
    let value = repository::decode_value(&repo, &parsed.messages[0]);

    let recorder = RecordingPublisher::default();
    let published_log = recorder.published.clone();
    let publication = Publication::new(
        recorder,
        "ehsgateway".to_owned(),
        "homeassistant".to_owned(),
        "sensor".to_owned(),
        "ehs".to_owned(),
        AggregateInputNames::default(),
    );
    publication.publish_reading(&entry.name, &value).await;

    let published = published_log.lock().unwrap();
    assert!(published
        .iter()
        .any(|(t, p)| t == "ehsgateway/entity/outdoorTw1Temp" && p == "23.5"));
    assert!(published
        .iter()
        .any(|(t, _)| t == "homeassistant/sensor/ehs_outdoorTw1Temp/state"));
}
