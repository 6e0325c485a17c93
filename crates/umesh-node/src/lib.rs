//! Mesh instance runtime for umesh.
//!
//! This crate wires the addressing and forwarding core into a running node:
//! the mesh-instance context and its control flow, persistent configuration,
//! clocks, timers, the raw link, and TOML configuration.

pub mod clock;
pub mod config;
pub mod error;
pub mod link;
pub mod logging;
pub mod mesh;
pub mod message;
pub mod node;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::NodeConfig;
pub use error::NodeError;
pub use link::{MemoryLink, RawLink, UdpLink};
pub use mesh::{Delivery, MeshConfig, MeshContext};
pub use message::MeshMessage;
pub use node::{Node, ShutdownHandle};
pub use storage::{ConfigRecord, FileKvStore, KvStore, MemoryKvStore};
pub use timer::{DelayedScheduler, MeshTimer};
