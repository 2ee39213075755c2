//! Media session: paired RTP/RTCP sockets and negotiated stream state
//!
//! A session is created against a local address, negotiated against the
//! remote answer, then shared (`Arc<MediaSession>`) between one
//! [`RtpWriter`](crate::RtpWriter) task and one [`RtpReader`](crate::RtpReader)
//! task. Negotiation calls are expected to be serialized by the caller with
//! respect to in-flight I/O; the lock only keeps each call atomic.

mod allocator;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use sipmedia_rtp_core::{RtcpPacket, RtpPacket, DEFAULT_MAX_PACKET_SIZE};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use crate::config::MediaConfig;
use crate::error::{Error, Result};
use crate::format::{negotiate_formats, MediaDescription, Mode};

pub use allocator::{BoundPair, PortAllocator};

#[derive(Debug, Clone)]
struct Sockets {
    rtp: Arc<UdpSocket>,
    rtcp: Option<Arc<UdpSocket>>,
}

#[derive(Debug, Clone)]
struct NegotiatedState {
    remote_addr: Option<SocketAddr>,
    remote_rtcp_addr: Option<SocketAddr>,
    formats: Vec<String>,
    mode: Mode,
}

impl NegotiatedState {
    fn set_remote(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
        // No RTCP mux: RTCP always goes to the next port
        self.remote_rtcp_addr = allocator::rtcp_addr_for(addr).ok();
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Read,
    Write,
}

impl Direction {
    fn closed(self) -> Error {
        match self {
            Direction::Read => Error::EndOfStream,
            Direction::Write => Error::SessionClosed,
        }
    }
}

/// Active RTP/RTCP media session
#[derive(Debug)]
pub struct MediaSession {
    local_addr: SocketAddr,
    config: MediaConfig,
    sockets: RwLock<Option<Sockets>>,
    state: RwLock<NegotiatedState>,
    closed: watch::Sender<bool>,
}

impl MediaSession {
    /// Bind a session with the default configuration
    pub async fn new(local_addr: SocketAddr) -> Result<Self> {
        Self::with_config(local_addr, MediaConfig::default()).await
    }

    /// Bind a session using the process-wide port allocator
    pub async fn with_config(local_addr: SocketAddr, config: MediaConfig) -> Result<Self> {
        Self::with_allocator(local_addr, config, PortAllocator::global()).await
    }

    /// Bind a session, scanning any configured port range with `allocator`
    pub async fn with_allocator(
        local_addr: SocketAddr,
        config: MediaConfig,
        allocator: &PortAllocator,
    ) -> Result<Self> {
        config.validate()?;

        let pair = allocator.bind_pair(local_addr, &config).await?;
        debug!(
            "Media session listening on {} (rtcp: {})",
            pair.local_addr,
            pair.rtcp.is_some()
        );

        let state = NegotiatedState {
            remote_addr: None,
            remote_rtcp_addr: None,
            formats: config.formats.clone(),
            mode: config.mode,
        };
        let (closed, _) = watch::channel(false);

        Ok(Self {
            local_addr: pair.local_addr,
            sockets: RwLock::new(Some(Sockets {
                rtp: Arc::new(pair.rtp),
                rtcp: pair.rtcp.map(Arc::new),
            })),
            state: RwLock::new(state),
            config,
            closed,
        })
    }

    /// Concrete local RTP address; RTCP is bound on the next port
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Negotiated remote RTP address
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.state.read().remote_addr
    }

    /// Remote RTCP address, RTP port + 1
    pub fn remote_rtcp_addr(&self) -> Option<SocketAddr> {
        self.state.read().remote_rtcp_addr
    }

    /// Current format list
    pub fn formats(&self) -> Vec<String> {
        self.state.read().formats.clone()
    }

    /// Current stream direction
    pub fn mode(&self) -> Mode {
        self.state.read().mode
    }

    /// Change the direction advertised in the local description
    pub fn set_mode(&self, mode: Mode) {
        self.state.write().mode = mode;
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Whether an RTCP socket is bound
    pub fn rtcp_enabled(&self) -> bool {
        self.sockets
            .read()
            .as_ref()
            .map(|s| s.rtcp.is_some())
            .unwrap_or(self.config.rtcp_enabled)
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Set the remote RTP address and derive the RTCP address from it
    pub fn set_remote_addr(&self, addr: SocketAddr) {
        self.state.write().set_remote(addr);
        debug!("Media remote address set to {}", addr);
    }

    /// Apply the remote answer
    ///
    /// Formats become the intersection with the answer, in the answer's
    /// order. On [`Error::NoCommonFormat`] nothing is changed.
    pub fn negotiate_remote(&self, answer: &MediaDescription) -> Result<()> {
        self.apply_remote(answer, false)
    }

    /// Apply an updated remote description mid-call (re-INVITE, hold)
    ///
    /// Same as [`negotiate_remote`](Self::negotiate_remote) and also takes
    /// the reverse of the answer's direction: a `sendonly` remote makes the
    /// local side `recvonly`.
    pub fn update_remote(&self, answer: &MediaDescription) -> Result<()> {
        self.apply_remote(answer, true)
    }

    fn apply_remote(&self, answer: &MediaDescription, adopt_mode: bool) -> Result<()> {
        let mut state = self.state.write();
        let formats = negotiate_formats(&state.formats, &answer.formats)?;
        let remote = SocketAddr::new(answer.ip, answer.port);

        state.set_remote(remote);
        state.formats = formats;
        if adopt_mode {
            state.mode = answer.mode.reverse();
        }

        debug!(
            "Media negotiated with {}: formats={:?} mode={}",
            remote, state.formats, state.mode
        );
        Ok(())
    }

    /// Local description to offer or answer with
    pub fn local_description(&self) -> MediaDescription {
        let state = self.state.read();
        MediaDescription {
            ip: self.local_addr.ip(),
            port: self.local_addr.port(),
            mode: state.mode,
            formats: state.formats.clone(),
        }
    }

    /// Close both sockets
    ///
    /// Idempotent. Pending reads return [`Error::EndOfStream`], later writes
    /// [`Error::SessionClosed`].
    pub fn close(&self) {
        let sockets = self.sockets.write().take();
        self.closed.send_replace(true);
        if sockets.is_some() {
            debug!("Media session {} closed", self.local_addr);
        }
    }

    fn rtp_socket(&self, direction: Direction) -> Result<Arc<UdpSocket>> {
        self.sockets
            .read()
            .as_ref()
            .map(|s| s.rtp.clone())
            .ok_or_else(|| direction.closed())
    }

    fn rtcp_socket(&self, direction: Direction) -> Result<Arc<UdpSocket>> {
        if !self.config.rtcp_enabled {
            return Err(Error::RtcpDisabled);
        }
        let sockets = self.sockets.read();
        let sockets = sockets.as_ref().ok_or_else(|| direction.closed())?;
        sockets.rtcp.clone().ok_or(Error::RtcpDisabled)
    }

    async fn recv(&self, socket: &UdpSocket, buf: &mut [u8]) -> Result<usize> {
        let closed = self.closed.subscribe();
        tokio::select! {
            res = socket.recv_from(buf) => {
                let (n, _) = res?;
                Ok(n)
            }
            _ = wait_closed(closed) => Err(Error::EndOfStream),
        }
    }

    async fn send(&self, socket: &UdpSocket, data: &[u8], remote: SocketAddr) -> Result<usize> {
        let written = socket.send_to(data, remote).await?;
        if written != data.len() {
            return Err(Error::ShortWrite {
                written,
                expected: data.len(),
            });
        }
        Ok(written)
    }

    /// Read one RTP datagram into `buf`
    pub async fn read_rtp_raw(&self, buf: &mut [u8]) -> Result<usize> {
        let socket = self.rtp_socket(Direction::Read)?;
        self.recv(&socket, buf).await
    }

    /// [`read_rtp_raw`](Self::read_rtp_raw) bounded by `deadline`
    pub async fn read_rtp_raw_deadline(&self, buf: &mut [u8], deadline: Instant) -> Result<usize> {
        timeout_at(deadline, self.read_rtp_raw(buf))
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Read and parse one RTP packet
    pub async fn read_rtp(&self) -> Result<RtpPacket> {
        let mut buf = vec![0u8; DEFAULT_MAX_PACKET_SIZE];
        let n = self.read_rtp_raw(&mut buf).await?;
        buf.truncate(n);

        let packet = RtpPacket::from_bytes(Bytes::from(buf))?;
        if self.config.rtp_debug {
            trace!("Recv RTP\n{}", packet);
        }
        Ok(packet)
    }

    /// [`read_rtp`](Self::read_rtp) bounded by `deadline`
    pub async fn read_rtp_deadline(&self, deadline: Instant) -> Result<RtpPacket> {
        timeout_at(deadline, self.read_rtp())
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Send one datagram to the remote RTP address
    pub async fn write_rtp_raw(&self, data: &[u8]) -> Result<usize> {
        let socket = self.rtp_socket(Direction::Write)?;
        let remote = self.remote_addr().ok_or(Error::RemoteNotSet)?;
        self.send(&socket, data, remote).await
    }

    /// Serialize and send one RTP packet
    pub async fn write_rtp(&self, packet: &RtpPacket) -> Result<()> {
        if self.config.rtp_debug {
            trace!("RTP write:\n{}", packet);
        }
        let data = packet.serialize()?;
        self.write_rtp_raw(&data).await?;
        Ok(())
    }

    /// Read one RTCP datagram into `buf`
    pub async fn read_rtcp_raw(&self, buf: &mut [u8]) -> Result<usize> {
        let socket = self.rtcp_socket(Direction::Read)?;
        self.recv(&socket, buf).await
    }

    /// Read one RTCP datagram and split it into packets
    pub async fn read_rtcp(&self) -> Result<Vec<RtcpPacket>> {
        let mut buf = vec![0u8; DEFAULT_MAX_PACKET_SIZE];
        let n = self.read_rtcp_raw(&mut buf).await?;

        let packets = RtcpPacket::parse_compound(&buf[..n])?;
        if self.config.rtcp_debug {
            for packet in &packets {
                trace!("RTCP read:\n{}", packet);
            }
        }
        Ok(packets)
    }

    /// [`read_rtcp`](Self::read_rtcp) bounded by `deadline`
    pub async fn read_rtcp_deadline(&self, deadline: Instant) -> Result<Vec<RtcpPacket>> {
        timeout_at(deadline, self.read_rtcp())
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Send one datagram to the remote RTCP address
    pub async fn write_rtcp_raw(&self, data: &[u8]) -> Result<usize> {
        let socket = self.rtcp_socket(Direction::Write)?;
        let remote = self.remote_rtcp_addr().ok_or(Error::RemoteNotSet)?;
        self.send(&socket, data, remote).await
    }

    /// Serialize and send one RTCP packet
    pub async fn write_rtcp(&self, packet: &RtcpPacket) -> Result<()> {
        if self.config.rtcp_debug {
            trace!("RTCP write:\n{}", packet);
        }
        let data = packet.serialize()?;
        self.write_rtcp_raw(&data).await?;
        Ok(())
    }

    /// [`write_rtcp`](Self::write_rtcp) bounded by `deadline`
    pub async fn write_rtcp_deadline(&self, packet: &RtcpPacket, deadline: Instant) -> Result<()> {
        timeout_at(deadline, self.write_rtcp(packet))
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Send several RTCP packets as one compound datagram
    ///
    /// The caller keeps the result within the path MTU.
    pub async fn write_rtcps(&self, packets: &[RtcpPacket]) -> Result<()> {
        if self.config.rtcp_debug {
            for packet in packets {
                trace!("RTCP write:\n{}", packet);
            }
        }
        let data = RtcpPacket::serialize_compound(packets)?;
        self.write_rtcp_raw(&data).await?;
        Ok(())
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    // Sender lives in the session, so an error here only means it is gone too
    let _ = closed.wait_for(|closed| *closed).await;
}
