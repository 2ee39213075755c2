//! RTP reader payload streaming and per-source sequence tracking
//!
//! A plain UDP socket plays the remote sender so tests control SSRC,
//! sequence numbers and payload types exactly.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sipmedia_media_core::{Error, MediaSession, ReaderStats, RtpReader};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use common::*;

struct Harness {
    session: Arc<MediaSession>,
    reader: RtpReader,
    sender: UdpSocket,
}

impl Harness {
    async fn new() -> Self {
        let session = session().await;
        let reader = RtpReader::new(session.clone()).unwrap();
        let sender = raw_sender().await;
        Self {
            session,
            reader,
            sender,
        }
    }

    async fn send(&self, payload_type: u8, seq: u16, ssrc: u32, payload: &[u8]) {
        let data = rtp_bytes(payload_type, seq, seq as u32 * 160, ssrc, payload);
        self.sender
            .send_to(&data, self.session.local_addr())
            .await
            .unwrap();
    }

    async fn read(&mut self, buf: &mut [u8]) -> sipmedia_media_core::Result<usize> {
        timeout(Duration::from_secs(1), self.reader.read(buf))
            .await
            .expect("read timed out")
    }

    async fn feed(&mut self, ssrc: u32, seqs: &[u16]) {
        let mut buf = [0u8; 160];
        for &seq in seqs {
            self.send(0, seq, ssrc, &[0xff; 160]).await;
            assert_eq!(self.read(&mut buf).await.unwrap(), 160);
        }
    }
}

#[tokio::test]
async fn test_in_order_stream() {
    init_logging();
    let mut h = Harness::new().await;

    h.feed(0xaaaa, &[100, 101, 102, 103]).await;

    let stats = h.reader.stats();
    assert_eq!(
        stats,
        ReaderStats {
            packets: 4,
            bytes: 640,
            out_of_order: 0,
            regressions: 0,
            ssrc_changes: 0,
        }
    );
    assert_eq!(h.reader.sequence().extended(), 103);
    assert_eq!(h.reader.last_ssrc(), Some(0xaaaa));
    assert_eq!(h.reader.packet_header().unwrap().sequence_number, 103);
}

#[tokio::test]
async fn test_partial_reads_drain_pending() {
    init_logging();
    println!("🧪 Testing partial payload reads");

    let mut h = Harness::new().await;
    h.send(0, 1, 0x1234, b"0123456789").await;

    let mut buf = [0u8; 4];
    assert_eq!(h.read(&mut buf).await.unwrap(), 4);
    assert_eq!(&buf, b"0123");
    assert_eq!(h.reader.pending_len(), 6);

    // No datagram is queued: these must be served from the leftover payload
    assert_eq!(h.read(&mut buf).await.unwrap(), 4);
    assert_eq!(&buf, b"4567");
    assert_eq!(h.read(&mut buf).await.unwrap(), 2);
    assert_eq!(&buf[..2], b"89");
    assert_eq!(h.reader.pending_len(), 0);
    assert_eq!(h.reader.stats().packets, 1);

    println!("✅ Partial read test PASSED!");
}

#[tokio::test]
async fn test_ssrc_switch_resets_tracking() {
    init_logging();
    println!("🧪 Testing SSRC switch resets sequence tracking");

    let mut h = Harness::new().await;
    h.feed(0xaaaa, &[100, 101]).await;
    h.feed(0xbbbb, &[50000, 50001]).await;

    let stats = h.reader.stats();
    assert_eq!(stats.out_of_order, 0);
    assert_eq!(stats.regressions, 0);
    assert_eq!(stats.ssrc_changes, 1);
    assert_eq!(h.reader.sequence().extended(), 50001);
    assert_eq!(h.reader.sequence().cycles(), 0);
    assert_eq!(h.reader.last_ssrc(), Some(0xbbbb));

    println!("✅ SSRC switch test PASSED!");
}

#[tokio::test]
async fn test_wraparound_is_in_order() {
    let mut h = Harness::new().await;
    h.feed(0x77, &[65534, 65535, 0, 1]).await;

    assert_eq!(h.reader.stats().out_of_order, 0);
    assert_eq!(h.reader.sequence().extended(), 65537);
    assert_eq!(h.reader.sequence().cycles(), 1);
}

#[tokio::test]
async fn test_gap_and_reorder_are_counted() {
    let mut h = Harness::new().await;

    // 11 is late: gap at 12, then a step back to 11
    h.feed(0x42, &[10, 12, 11]).await;

    let stats = h.reader.stats();
    assert_eq!(stats.out_of_order, 2);
    assert_eq!(stats.regressions, 0);
    assert_eq!(stats.packets, 3);
}

#[tokio::test]
async fn test_regression_across_wrap() {
    let mut h = Harness::new().await;

    h.feed(0x42, &[65535, 2]).await;
    let before = *h.reader.sequence();

    // Late packet from before the wrap is still delivered
    h.feed(0x42, &[65534]).await;

    let stats = h.reader.stats();
    assert_eq!(stats.regressions, 1);
    assert_eq!(*h.reader.sequence(), before);
    assert_eq!(stats.packets, 3);
}

#[tokio::test]
async fn test_payload_type_mismatch() {
    let mut h = Harness::new().await;
    assert_eq!(h.reader.payload_type(), 0);

    h.send(8, 1, 0x1, &[0xd5; 160]).await;
    let mut buf = [0u8; 160];
    let err = h.read(&mut buf).await.unwrap_err();
    assert!(matches!(
        err,
        Error::PayloadTypeMismatch {
            expected: 0,
            actual: 8
        }
    ));
    assert_eq!(h.reader.stats().packets, 0);

    h.reader.set_payload_type(8);
    h.send(8, 2, 0x1, &[0xd5; 160]).await;
    assert_eq!(h.read(&mut buf).await.unwrap(), 160);
}

#[tokio::test]
async fn test_invalid_datagram() {
    let mut h = Harness::new().await;
    h.sender
        .send_to(&[0x00, 0x01, 0x02], h.session.local_addr())
        .await
        .unwrap();

    let mut buf = [0u8; 160];
    assert!(matches!(h.read(&mut buf).await, Err(Error::Packet(_))));
}

#[tokio::test]
async fn test_on_rtp_callback() {
    let mut h = Harness::new().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    h.reader.on_rtp(move |packet| {
        seen_clone
            .lock()
            .unwrap()
            .push((packet.header.ssrc, packet.header.sequence_number));
    });

    h.feed(0x99, &[7, 8]).await;
    assert_eq!(*seen.lock().unwrap(), vec![(0x99, 7), (0x99, 8)]);
}

#[tokio::test]
async fn test_close_ends_stream() {
    init_logging();
    println!("🧪 Testing reader end of stream on close");

    let session = session().await;
    let mut reader = RtpReader::new(session.clone()).unwrap();

    let task = tokio::spawn(async move {
        let mut buf = [0u8; 160];
        reader.read(&mut buf).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    session.close();

    let result = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    assert!(matches!(result, Err(Error::EndOfStream)));

    println!("✅ Reader end of stream test PASSED!");
}

#[tokio::test]
async fn test_writer_to_reader() {
    let (a, b) = session_pair().await;
    let mut writer = sipmedia_media_core::RtpWriter::new(a).unwrap();
    let mut reader = RtpReader::new(b).unwrap();

    for i in 0..3u8 {
        writer.write(&[i; 160]).await.unwrap();
    }

    let mut buf = [0u8; 160];
    for i in 0..3u8 {
        let n = timeout(Duration::from_secs(1), reader.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 160);
        assert!(buf.iter().all(|b| *b == i));
    }

    assert_eq!(reader.last_ssrc(), Some(writer.ssrc()));
    assert_eq!(reader.stats().out_of_order, 0);
}
