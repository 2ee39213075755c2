//! Local RTP/RTCP port pair allocation
//!
//! RTP goes on the requested (or found) port and RTCP on the port right
//! after it. When a range is configured, successive sessions start scanning
//! at a rotating pair offset so the whole range gets used instead of every
//! session racing for the first few ports.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::config::{MediaConfig, PortRange};
use crate::error::{Error, Result};

/// Bound RTP socket and, when enabled, its RTCP companion
#[derive(Debug)]
pub struct BoundPair {
    /// RTP socket
    pub rtp: UdpSocket,
    /// RTCP socket on RTP port + 1
    pub rtcp: Option<UdpSocket>,
    /// Concrete local RTP address
    pub local_addr: SocketAddr,
}

/// Rotating start offset for port range scans
#[derive(Debug, Default)]
pub struct PortAllocator {
    next_pair: AtomicUsize,
}

static GLOBAL_ALLOCATOR: PortAllocator = PortAllocator::new();

impl PortAllocator {
    /// Allocator starting at the first pair of any range
    pub const fn new() -> Self {
        Self {
            next_pair: AtomicUsize::new(0),
        }
    }

    /// Process-wide allocator used by sessions that are not given one
    pub fn global() -> &'static PortAllocator {
        &GLOBAL_ALLOCATOR
    }

    /// Pair index the next range scan starts at
    pub fn next_pair(&self) -> usize {
        self.next_pair.load(Ordering::Relaxed)
    }

    /// Bind RTP (and RTCP unless disabled) for `local`
    ///
    /// - non-zero port: exactly that port and port + 1
    /// - port 0 with a configured range: first free pair in the range
    /// - port 0 without a range: ephemeral port, retried a few times because
    ///   port + 1 may already be taken
    pub async fn bind_pair(&self, local: SocketAddr, config: &MediaConfig) -> Result<BoundPair> {
        let rtcp = config.rtcp_enabled;

        if local.port() != 0 {
            return bind_exact(local.ip(), local.port(), rtcp).await;
        }

        match config.port_range {
            Some(range) => self.bind_in_range(local.ip(), range, rtcp).await,
            None => bind_ephemeral(local.ip(), rtcp, config.ephemeral_bind_retries).await,
        }
    }

    async fn bind_in_range(&self, ip: IpAddr, range: PortRange, rtcp: bool) -> Result<BoundPair> {
        let pairs = range.pairs();
        if pairs == 0 {
            return Err(Error::PortExhaustion(format!(
                "range {}..{} holds no port pair",
                range.start, range.end
            )));
        }

        let offset = self.next_pair.load(Ordering::Relaxed) % pairs;
        for step in 0..pairs {
            let index = (offset + step) % pairs;
            let port = range.pair_port(index);

            match try_bind_pair(ip, port, rtcp).await {
                Ok(pair) => {
                    self.next_pair.store((index + 1) % pairs, Ordering::Relaxed);
                    debug!("Bound media ports {} in range {}..{}", port, range.start, range.end);
                    return Ok(pair);
                }
                Err(e) => debug!("Port pair {} unavailable: {}", port, e),
            }
        }

        Err(Error::PortExhaustion(format!(
            "no available ports in range {}..{}",
            range.start, range.end
        )))
    }
}

async fn bind_exact(ip: IpAddr, port: u16, rtcp: bool) -> Result<BoundPair> {
    let rtp_addr = SocketAddr::new(ip, port);
    let rtp = UdpSocket::bind(rtp_addr)
        .await
        .map_err(|source| Error::Bind {
            addr: rtp_addr,
            source,
        })?;
    let local_addr = rtp.local_addr()?;

    let rtcp = if rtcp {
        let rtcp_addr = rtcp_addr_for(local_addr)?;
        let socket = UdpSocket::bind(rtcp_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: rtcp_addr,
                source,
            })?;
        Some(socket)
    } else {
        None
    };

    Ok(BoundPair {
        rtp,
        rtcp,
        local_addr,
    })
}

async fn bind_ephemeral(ip: IpAddr, rtcp: bool, retries: usize) -> Result<BoundPair> {
    let any = SocketAddr::new(ip, 0);

    for attempt in 1..=retries {
        let rtp = match UdpSocket::bind(any).await {
            Ok(socket) => socket,
            Err(e) => {
                debug!("Ephemeral RTP bind on {} failed: {}", any, e);
                continue;
            }
        };
        let local_addr = rtp.local_addr()?;

        if !rtcp {
            return Ok(BoundPair {
                rtp,
                rtcp: None,
                local_addr,
            });
        }

        // The OS picked RTP; RTCP has to take whatever is at port + 1
        let rtcp_addr = match rtcp_addr_for(local_addr) {
            Ok(addr) => addr,
            Err(_) => continue,
        };
        match UdpSocket::bind(rtcp_addr).await {
            Ok(socket) => {
                debug!("Bound ephemeral media ports {} after {} attempt(s)", local_addr, attempt);
                return Ok(BoundPair {
                    rtp,
                    rtcp: Some(socket),
                    local_addr,
                });
            }
            Err(e) => debug!("RTCP port {} unavailable: {}", rtcp_addr, e),
        }
    }

    Err(Error::PortExhaustion(format!(
        "no ephemeral RTP/RTCP pair after {} attempts",
        retries
    )))
}

async fn try_bind_pair(ip: IpAddr, port: u16, rtcp: bool) -> std::io::Result<BoundPair> {
    let rtp = UdpSocket::bind(SocketAddr::new(ip, port)).await?;
    let local_addr = rtp.local_addr()?;
    let rtcp = if rtcp {
        Some(UdpSocket::bind(SocketAddr::new(ip, port + 1)).await?)
    } else {
        None
    };
    Ok(BoundPair {
        rtp,
        rtcp,
        local_addr,
    })
}

/// RTCP address paired with an RTP address
pub(crate) fn rtcp_addr_for(rtp: SocketAddr) -> Result<SocketAddr> {
    let port = rtp
        .port()
        .checked_add(1)
        .ok_or_else(|| Error::PortExhaustion(format!("no RTCP port above {}", rtp)))?;
    Ok(SocketAddr::new(rtp.ip(), port))
}
