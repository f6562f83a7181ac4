//! End-to-end coverage of `spec.md` §8 scenario 5: three primary readings
//! arriving as separate frames on the bus accumulate into a derived heat
//! output and instantaneous COP publication, without any aggregate-specific
//! wiring beyond the three named inputs.

use std::sync::{Arc, Mutex};

use bus_core::{AddressClass, DataType, Endpoint, Frame, FieldKind, Message, PacketType};
use futures_util::future::BoxFuture;
use gateway::publish::{AggregateInputNames, Publication};
use gateway::pubsub::{Publisher, PubSubError};
use test_support::fixtures::sample_repository;
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

fn notification(address: u16, raw: i16) -> Frame {
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
        messages: vec![Message::new(address, FieldKind::I16, raw.to_be_bytes().to_vec())],
    }
}

async fn decode_and_publish(repo: &repository::Repository, publication: &Publication<RecordingPublisher>, frame: &Frame) {
    let mut mock = test_support::mock_transport_pair(4096);
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<FrameEvent>(4);
    mock.push_from_device(&frame.serialize()).await;
    let (mut read_half, _write_half) = mock.transport.split();
    tokio::spawn(async move {
        let _ = transport::framer::run(&mut read_half, event_tx, None).await;
    });

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), event_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let bytes = match event {
        FrameEvent::Candidate(b) => b,
        FrameEvent::Invalid => panic!("well-formed frame misclassified as invalid"),
    };
    let parsed = Frame::parse(&bytes).unwrap();
    let entry = repo.by_address(parsed.messages[0].address).unwrap();
    let value = repository::decode_value(repo, &parsed.messages[0]);
    publication.publish_reading(&entry.name, &value).await;
}

#[tokio::test]
async fn three_readings_over_the_bus_derive_heat_output_and_cop() {
    let repo = sample_repository();
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

    // inlet 30.0C, outlet 35.0C, flow 20.0 L/min -> matches spec.md's worked
    // example: heat output 6983.333W.
    decode_and_publish(&repo, &publication, &notification(0x4210, 300)).await;
    decode_and_publish(&repo, &publication, &notification(0x4211, 350)).await;
    decode_and_publish(&repo, &publication, &notification(0x4212, 200)).await;

    {
        let published = published_log.lock().unwrap();
        assert!(published
            .iter()
            .any(|(t, p)| t.ends_with("heatOutput") && p == "6983.333"));
    }

    // power consumption 2000W -> instantaneous COP 3.492.
    let power_frame = Frame {
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
        messages: vec![Message::new(0x4220, FieldKind::I32, 2000i32.to_be_bytes().to_vec())],
    };
    decode_and_publish(&repo, &publication, &power_frame).await;

    let published = published_log.lock().unwrap();
    assert!(published.iter().any(|(t, p)| t.ends_with("cop") && p == "3.492"));
}
