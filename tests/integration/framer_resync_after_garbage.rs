//! End-to-end coverage of `spec.md` §8 scenario 4: noise and a malformed
//! frame on the bus don't wedge the framer — it resynchronizes and the next
//! well-formed frame is still classified and decoded correctly.

use bus_core::{AddressClass, DataType, Endpoint, Frame, FieldKind, Message, PacketType};
use test_support::fixtures::sample_repository;
use transport::FrameEvent;

fn temp_frame(raw: i16) -> Frame {
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
        messages: vec![Message::new(0x4203, FieldKind::I16, raw.to_be_bytes().to_vec())],
    }
}

#[tokio::test]
async fn garbage_and_a_bad_end_marker_dont_prevent_the_next_frame_from_decoding() {
    let mut mock = test_support::mock_transport_pair(4096);
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<FrameEvent>(8);

    let mut stream = vec![0xFF, 0x00, 0x01, 0x32]; // noise, plus a dangling start marker
    let mut corrupt = temp_frame(235).serialize();
    let last = corrupt.len() - 1;
    corrupt[last] = 0x00; // wrong end marker
    stream.extend(&corrupt);
    stream.extend(temp_frame(250).serialize());

    mock.push_from_device(&stream).await;
    let (mut read_half, _write_half) = mock.transport.split();
    tokio::spawn(async move {
        let _ = transport::framer::run(&mut read_half, event_tx, None).await;
    });

    let first = tokio::time::timeout(std::time::Duration::from_secs(1), event_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, FrameEvent::Invalid);

    let second = tokio::time::timeout(std::time::Duration::from_secs(1), event_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let bytes = match second {
        FrameEvent::Candidate(b) => b,
        FrameEvent::Invalid => panic!("the resynchronized frame should classify as valid"),
    };

    let parsed = Frame::parse(&bytes).unwrap();
    let repo = sample_repository();
    let value = repository::decode_value(&repo, &parsed.messages[0]);
    assert_eq!(value, repository::Value::Numeric(25.0));
}
