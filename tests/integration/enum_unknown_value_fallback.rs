//! End-to-end coverage of `spec.md` §8 scenario 2: a device reports an enum
//! value with no matching label, and the gateway still publishes something
//! useful (the raw id) rather than dropping the reading.

use bus_core::{AddressClass, DataType, Endpoint, Frame, FieldKind, Message, PacketType};
use test_support::fixtures::sample_repository;
use transport::FrameEvent;

fn status_frame(raw_value: i16) -> Frame {
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
        messages: vec![Message::new(0x4000, FieldKind::I16, raw_value.to_be_bytes().to_vec())],
    }
}

#[tokio::test]
async fn unknown_enum_value_decodes_to_raw_id_not_a_dropped_reading() {
    let mut mock = test_support::mock_transport_pair(4096);
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<FrameEvent>(4);

    mock.push_from_device(&status_frame(2).serialize()).await;
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
    let repo = sample_repository();
    let value = repository::decode_value(&repo, &parsed.messages[0]);

    assert_eq!(value, repository::Value::UnknownEnum(2));
    assert_eq!(value.to_payload_string(), "2");
}

#[tokio::test]
async fn known_enum_value_decodes_to_its_label() {
    let mut mock = test_support::mock_transport_pair(4096);
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<FrameEvent>(4);

    mock.push_from_device(&status_frame(1).serialize()).await;
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
    let repo = sample_repository();
    let value = repository::decode_value(&repo, &parsed.messages[0]);

    assert_eq!(
        value,
        repository::Value::Enum {
            id: 1,
            label: "ON".to_owned()
        }
    );
}
