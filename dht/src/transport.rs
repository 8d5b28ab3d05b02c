//! UDP transport abstraction for DHT peer RPCs.
//!
//! Trimmed from `lib-storage/src/dht/transport.rs`'s multi-protocol
//! `DhtTransport` trait (the teacher also has Bluetooth/WiFi-Direct/LoRaWAN
//! variants for mesh networking — this system only ever talks DHT RPC over
//! UDP, so the trait here drops every `PeerId` variant but one).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::net::UdpSocket;

#[async_trait]
pub trait DhtTransport: Send + Sync {
    async fn send(&self, data: &[u8], peer: SocketAddr) -> Result<()>;
    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)>;
    fn local_addr(&self) -> SocketAddr;
}

pub struct UdpDhtTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpDhtTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket: Arc::new(socket), local_addr })
    }
}

#[async_trait]
impl DhtTransport for UdpDhtTransport {
    async fn send(&self, data: &[u8], peer: SocketAddr) -> Result<()> {
        self.socket.send_to(data, peer).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; 65536];
        let (len, addr) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, addr))
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
