//! Raw link-layer frame transport.
//!
//! The mesh core hands finished link frames to a [`RawLink`]. Frames carry
//! their own link addressing, so a transport only has to get the bytes to
//! every peer in radio range.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;

/// Send primitive for raw link frames. Must not block.
pub trait RawLink {
    fn send_raw_frame(&self, frame: &[u8]) -> io::Result<()>;
}

/// Link frames over UDP datagrams, all sent to one broadcast address.
#[derive(Debug, Clone)]
pub struct UdpLink {
    socket: Arc<UdpSocket>,
    broadcast: SocketAddr,
}

impl UdpLink {
    pub async fn bind(bind: SocketAddr, broadcast: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind).await?;
        socket.set_broadcast(true)?;
        tracing::info!(local = %socket.local_addr()?, %broadcast, "udp link bound");
        Ok(Self {
            socket: Arc::new(socket),
            broadcast,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive one frame into `buf`, returning its length.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let (len, from) = self.socket.recv_from(buf).await?;
        tracing::trace!(%from, len, "udp frame received");
        Ok(len)
    }
}

impl RawLink for UdpLink {
    fn send_raw_frame(&self, frame: &[u8]) -> io::Result<()> {
        match self.socket.try_send_to(frame, self.broadcast) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                // a busy radio drops frames too
                tracing::warn!(len = frame.len(), "udp link busy, frame dropped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Captures sent frames in memory. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    sent: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every frame sent so far.
    pub fn take_frames(&self) -> Vec<Vec<u8>> {
        match self.sent.lock() {
            Ok(mut sent) => sent.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

impl RawLink for MemoryLink {
    fn send_raw_frame(&self, frame: &[u8]) -> io::Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| io::Error::other("memory link poisoned"))?;
        sent.push_back(frame.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_link_collects_frames() {
        let link = MemoryLink::new();
        let tap = link.clone();
        link.send_raw_frame(&[1, 2, 3]).unwrap();
        link.send_raw_frame(&[4]).unwrap();
        assert_eq!(tap.take_frames(), vec![vec![1, 2, 3], vec![4]]);
        assert!(tap.take_frames().is_empty());
    }

    #[tokio::test]
    async fn test_udp_link_loopback() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = rx.local_addr().unwrap();
        let link = UdpLink::bind("127.0.0.1:0".parse().unwrap(), target)
            .await
            .unwrap();

        link.send_raw_frame(&[0xaa; 40]).unwrap();

        let mut buf = [0u8; 64];
        let len = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv(&mut buf))
            .await
            .expect("datagram should arrive")
            .unwrap();
        assert_eq!(&buf[..len], &[0xaa; 40]);
    }
}
