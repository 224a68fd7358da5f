//! # reel-core
//!
//! Shared types for the reel live-update layer.
//!
//! - [`ids`]: `ProjectId` and `ClientId` newtypes
//! - [`events`]: the immutable [`Event`] envelope, the closed payload catalog,
//!   and the SSE wire format
//! - [`errors`]: core error type
//! - [`logging`]: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;

pub use errors::{CoreError, Result};
pub use events::{Event, EventPayload, EventType, HEARTBEAT_FRAME};
pub use ids::{ClientId, ProjectId};
