//! Peer registry for zsync nodes.
//!
//! Tracks every known remote node by its durable [`NodeId`](zsync_primitives::NodeId)
//! together with the last state recorded for it, and maps the transient
//! [`SessionId`](zsync_primitives::SessionId)s handed out by the messaging
//! fabric onto those durable ids for as long as the sessions are live.

pub mod registry;
pub mod state;

pub use registry::{LinkResult, PeerRegistry};
pub use state::{ConnectionStatus, Peer};
