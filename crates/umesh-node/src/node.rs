//! Node runtime and async event loop.
//!
//! The node binds a UDP socket as its raw link, runs one [`MeshContext`] and
//! multiplexes inbound frames, beacon timer expiries and shutdown.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use umesh_core::constants::{FRAME_HEADER_SIZE, MTU};

use crate::clock::MonotonicClock;
use crate::config::{NodeConfig, parse_path, parse_socket_addr};
use crate::error::NodeError;
use crate::link::UdpLink;
use crate::mesh::{DEFAULT_RSSI, MeshContext};
use crate::storage::FileKvStore;
use crate::timer::{DelayedScheduler, MeshTimer};

/// The mesh context as the node runs it.
pub type UdpMesh = MeshContext<UdpLink, FileKvStore, MonotonicClock>;

/// Events delivered to the event loop by timers.
#[derive(Debug)]
enum NodeEvent {
    Beacon,
}

/// Requests shutdown of a running node from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// A umesh node on a UDP link.
pub struct Node {
    mesh: UdpMesh,
    link: UdpLink,
    beacon_interval_ms: u32,
    scheduler: DelayedScheduler,
    beacon_timer: MeshTimer,
    event_tx: mpsc::Sender<NodeEvent>,
    event_rx: mpsc::Receiver<NodeEvent>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Node {
    /// Bind the link and open storage. Must be called inside a tokio runtime.
    pub async fn new(config: &NodeConfig) -> Result<Self, NodeError> {
        let mesh_config = config.mesh_config()?;
        let bind = parse_socket_addr(&config.link.bind)?;
        let broadcast = parse_socket_addr(&config.link.broadcast)?;

        let store = match &config.node.storage_path {
            Some(path) => FileKvStore::new(parse_path(path))?,
            None => FileKvStore::default_path()?,
        };
        tracing::debug!(path = %store.base_dir().display(), "config store opened");

        let link = UdpLink::bind(bind, broadcast).await?;
        let mesh = MeshContext::new(mesh_config, link.clone(), store, MonotonicClock::new())?;

        let (event_tx, event_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            mesh,
            link,
            beacon_interval_ms: config.link.beacon_interval_ms,
            scheduler: DelayedScheduler::new(),
            beacon_timer: MeshTimer::new(),
            event_tx,
            event_rx,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    pub fn mesh(&self) -> &UdpMesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut UdpMesh {
        &mut self.mesh
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.link.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Signal the node to shut down.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Start the mesh and process events until shutdown is signalled.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        self.mesh.start()?;
        self.on_beacon();

        let mut buf = vec![0u8; FRAME_HEADER_SIZE + MTU];
        tracing::info!("entering event loop");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    tracing::info!("shutdown signal received");
                    break;
                }

                event = self.event_rx.recv() => {
                    match event {
                        Some(NodeEvent::Beacon) => self.on_beacon(),
                        None => break,
                    }
                }

                result = self.link.recv(&mut buf) => {
                    match result {
                        Ok(len) => self.on_frame(&buf[..len]),
                        Err(e) => tracing::warn!("link receive error: {e}"),
                    }
                }
            }
        }

        self.beacon_timer.stop(&mut self.scheduler);
        self.mesh.stop();
        tracing::info!("node stopped");
        Ok(())
    }

    fn on_beacon(&mut self) {
        if let Err(e) = self.mesh.beacon() {
            tracing::warn!("failed to send beacon: {e}");
        }
        if self.beacon_interval_ms == 0 {
            return;
        }
        let tx = self.event_tx.clone();
        self.beacon_timer
            .start(&mut self.scheduler, self.beacon_interval_ms, move || {
                let _ = tx.try_send(NodeEvent::Beacon);
            });
    }

    fn on_frame(&mut self, raw: &[u8]) {
        match self.mesh.handle_frame(raw, DEFAULT_RSSI) {
            Ok(Some(delivery)) => {
                tracing::info!(
                    src = %delivery.src,
                    len = delivery.payload.len(),
                    "data received"
                );
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("frame not processed: {e}"),
        }
    }
}
