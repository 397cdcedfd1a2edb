//! Group messaging for zsync nodes.
//!
//! A node talks to the messaging fabric through a [`GroupEndpoint`]: it sends
//! [`GroupCommand`]s (join, leave, whisper, shout, stop) and receives
//! [`GroupEvent`]s describing what other members did. Members are addressed by
//! their transient [`SessionId`](zsync_primitives::SessionId), which changes on
//! every reconnect.
//!
//! [`LocalFabric`] implements the contract in-process: every endpoint it hands
//! out is a member of the same fabric, so several nodes can run in one
//! process (tests, embedded deployments).

mod events;
mod fabric;

pub use events::{GroupCommand, GroupEndpoint, GroupEvent};
pub use fabric::LocalFabric;
