//! Per-link route lifecycle as a pure state machine.
//!
//! The scheduler owns timers, tasks, and locks; everything about *what may
//! happen next* lives here, so the lifecycle can be tested without an
//! event loop. Stale timers and solves are rejected by comparing the
//! generation carried in the event against the link's current generation.

use wirepath_core::geometry::Polyline;

use crate::signature::RouteSignature;

/// Where a link is in its recompute lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePhase {
    /// Committed path (if any) is current.
    Idle,
    /// Endpoints moved; no timer armed yet.
    Invalidated,
    /// Debounce timer running.
    Debouncing,
    /// A solve task is working on this link.
    Solving,
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    Committed,
    Failed,
}

/// Inputs to the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteEvent {
    /// A pin moved far enough to change the route signature.
    EndpointsMoved,
    /// The scheduler spawned the debounce timer.
    DebounceArmed,
    /// A debounce timer elapsed.
    DebounceFired { generation: u64 },
    /// A solve task finished.
    SolveFinished { generation: u64, outcome: SolveOutcome },
}

/// What the scheduler must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Spawn a debounce timer carrying the current generation.
    ArmDebounce,
    /// Kick off a solve for the current generation.
    StartSolve,
    /// Store the solve result as the committed path and notify.
    Commit,
    /// Drop the event's result; it is stale or the solve failed.
    Discard,
}

/// Advance one link's phase. `generation` is the link's current
/// generation; events carrying an older one are discarded without
/// changing phase.
pub fn transition(
    phase: RoutePhase,
    event: RouteEvent,
    generation: u64,
) -> (RoutePhase, Option<Effect>) {
    match event {
        // Movement always restarts the cycle, cancelling any in-flight
        // timer or solve by having bumped the generation first.
        RouteEvent::EndpointsMoved => (RoutePhase::Invalidated, Some(Effect::ArmDebounce)),
        RouteEvent::DebounceArmed => match phase {
            RoutePhase::Invalidated => (RoutePhase::Debouncing, None),
            other => (other, None),
        },
        RouteEvent::DebounceFired { generation: fired } => {
            if fired != generation {
                return (phase, Some(Effect::Discard));
            }
            match phase {
                RoutePhase::Debouncing => (RoutePhase::Solving, Some(Effect::StartSolve)),
                other => (other, Some(Effect::Discard)),
            }
        }
        RouteEvent::SolveFinished {
            generation: finished,
            outcome,
        } => {
            if finished != generation || phase != RoutePhase::Solving {
                return (phase, Some(Effect::Discard));
            }
            match outcome {
                SolveOutcome::Committed => (RoutePhase::Idle, Some(Effect::Commit)),
                SolveOutcome::Failed => (RoutePhase::Idle, Some(Effect::Discard)),
            }
        }
    }
}

/// Everything the scheduler tracks per link.
#[derive(Debug, Clone)]
pub struct RouteState {
    /// Signature of the endpoints the committed path was solved for.
    pub signature: RouteSignature,
    /// Last successfully solved path, kept through invalidation so the
    /// canvas never loses its line mid-drag.
    pub committed: Option<Polyline>,
    pub phase: RoutePhase,
    /// Bumped on every invalidation; timers and solves carry the value
    /// they were spawned with.
    pub generation: u64,
}

impl RouteState {
    pub fn new(signature: RouteSignature) -> Self {
        Self {
            signature,
            committed: None,
            phase: RoutePhase::Idle,
            generation: 0,
        }
    }
}
