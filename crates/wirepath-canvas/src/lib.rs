//! Canvas-facing runtime for the wirepath link router.
//!
//! Owns one [`state::RouteState`] per link and decides when to invalidate,
//! debounce, and recompute routes, driving `wirepath-core` cooperatively on
//! the host's tokio event loop. Callers always get a renderable polyline
//! back immediately; fresh paths arrive through the update channel.

pub mod error;
pub mod scheduler;
pub mod signature;
pub mod sources;
pub mod state;

pub use error::RouteError;
pub use scheduler::{LinkRouter, RouteUpdate};
pub use signature::RouteSignature;
pub use sources::{
    CanvasSnapshot, CommittedRoute, CoordinateAdapter, EndSide, IdentityAdapter, LinkEnd, LinkId,
};
pub use state::{Effect, RouteEvent, RoutePhase, RouteState, SolveOutcome};
