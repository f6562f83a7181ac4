//! End-to-end coverage of `spec.md` §8 scenario 3: a control write reaches
//! the device bus as a Write frame, and once the read-back delay elapses a
//! follow-up Read frame is issued for the same variable.

use std::sync::Arc;
use std::time::Duration;

use bus_core::{DataType, Frame};
use gateway::control::ControlIngress;
use test_support::fixtures::sample_repository;
use test_support::FixedClock;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

#[tokio::test]
async fn write_then_read_back_round_trips_over_the_mock_bus() {
    let repository = Arc::new(sample_repository());
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(8);
    let mut mock = test_support::mock_transport_pair(4096);

    let now = chrono::Utc::now();
    let clock = Arc::new(FixedClock::at(now));
    let mut ingress = ControlIngress::new(repository, outbound_tx, Duration::from_secs(30), clock.clone());

    ingress.write("VAR_IN_FSV_1031", "55", true).await.unwrap();

    let write_frame = outbound_rx.recv().await.expect("write frame must be sent");
    assert_eq!(write_frame.data_type, DataType::Write);
    assert_eq!(write_frame.messages[0].payload, vec![0x02, 0x26]);

    let wire_bytes = write_frame.serialize();
    let (mut _read_half, mut write_half) = mock.transport.split();
    write_half.write_all(&wire_bytes).await.unwrap();
    let mut on_bus = vec![0u8; wire_bytes.len()];
    mock.device_end.read_exact(&mut on_bus).await.unwrap();
    assert_eq!(on_bus, wire_bytes);

    assert!(ingress.due_read_backs().is_empty(), "read-back fires too early");

    clock.advance(chrono::Duration::seconds(2));
    let read_backs = ingress.due_read_backs();
    assert_eq!(read_backs.len(), 1);
    assert_eq!(read_backs[0].data_type, DataType::Read);
    assert_eq!(read_backs[0].messages[0].address, write_frame.messages[0].address);
}
