//! Helpers shared by the media integration tests

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use sipmedia_infra_common::logging::{try_setup_logging, LoggingConfig};
use sipmedia_media_core::{MediaConfig, MediaSession, RtpHeader, RtpPacket};
use tokio::net::UdpSocket;
use tracing::Level;

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub fn init_logging() {
    try_setup_logging(&LoggingConfig::new(Level::DEBUG, "media-tests"));
}

pub fn any_local() -> SocketAddr {
    SocketAddr::new(LOCALHOST, 0)
}

pub async fn session() -> Arc<MediaSession> {
    Arc::new(MediaSession::new(any_local()).await.unwrap())
}

pub async fn session_with(config: MediaConfig) -> Arc<MediaSession> {
    Arc::new(MediaSession::with_config(any_local(), config).await.unwrap())
}

/// Two sessions negotiated against each other's local description
pub async fn session_pair() -> (Arc<MediaSession>, Arc<MediaSession>) {
    let a = session().await;
    let b = session().await;
    a.negotiate_remote(&b.local_description()).unwrap();
    b.negotiate_remote(&a.local_description()).unwrap();
    (a, b)
}

/// Plain UDP sender aimed at a session's RTP port
pub async fn raw_sender() -> UdpSocket {
    UdpSocket::bind(any_local()).await.unwrap()
}

pub fn rtp_bytes(payload_type: u8, seq: u16, timestamp: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
    let header = RtpHeader::new(payload_type, seq, timestamp, ssrc);
    RtpPacket::new(header, Bytes::copy_from_slice(payload))
        .serialize()
        .unwrap()
        .to_vec()
}
