//! Forwarding daemon core for ndnd.
//!
//! The daemon receives Interests on faces, consults the forwarding tables,
//! forwards toward producers under a pluggable per-prefix strategy, and
//! routes matching Data back along the reverse path while caching
//! opportunistically. Everything runs on a single-threaded event loop; the
//! [`runtime::Runtime`] handle carries the scheduler and cross-loop posts.

pub mod face;
pub mod fw;
pub mod mgmt;
pub mod runtime;
pub mod signal;
pub mod tables;

pub use face::{Face, FaceId, FaceTable};
pub use fw::{Forwarder, StrategyRegistry};
pub use runtime::{Runtime, Scheduler};
