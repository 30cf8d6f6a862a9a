//! Diagnostics emitted while inserting bogus control flow.
//!
//! The transform never prints; it reports through an injected [`Observer`]. The default
//! [`NoopObserver`] drops everything, [`TracingObserver`] forwards to `tracing`, and
//! [`EventLog`] does both, keeping the events for reports.

use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::eligibility::Eligibility;

/// Why a whole procedure was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Declaration,
    Disabled,
    NotRequested,
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    ProcedureSkipped {
        procedure: String,
        reason: SkipReason,
    },
    ProcedureDisqualified {
        procedure: String,
        block: String,
    },
    BlockSkipped {
        procedure: String,
        block: String,
        reason: Eligibility,
    },
    BlockTransformed {
        procedure: String,
        block: String,
        original: String,
        clone: String,
        join: Option<String>,
    },
    PhiSynthesized {
        procedure: String,
        block: String,
        value: String,
    },
    GuardInstalled {
        procedure: String,
        block: String,
        predicate: String,
    },
}

pub trait Observer: Send + Sync {
    fn record(&self, event: TraceEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record(&self, _event: TraceEvent) {}
}

/// Forwards every event to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record(&self, event: TraceEvent) {
        match event {
            TraceEvent::ProcedureSkipped { procedure, reason } => {
                debug!("bcf: `{}` skipped ({:?})", procedure, reason);
            }
            TraceEvent::ProcedureDisqualified { procedure, block } => {
                debug!(
                    "bcf: `{}` disqualified by unsupported terminator in {}",
                    procedure, block
                );
            }
            TraceEvent::BlockSkipped {
                procedure,
                block,
                reason,
            } => debug!("bcf: `{}` block {} skipped ({:?})", procedure, block, reason),
            TraceEvent::BlockTransformed {
                procedure,
                block,
                original,
                clone,
                join,
            } => debug!(
                "bcf: `{}` block {} -> {} / {} join {:?}",
                procedure, block, original, clone, join
            ),
            TraceEvent::PhiSynthesized {
                procedure,
                block,
                value,
            } => debug!("bcf: `{}` merged {} in {}", procedure, value, block),
            TraceEvent::GuardInstalled {
                procedure,
                block,
                predicate,
            } => debug!("bcf: `{}` guard `{}` in {}", procedure, predicate, block),
        }
    }
}

/// Collects events in arrival order, also forwarding each to [`TracingObserver`].
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<TraceEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Observer for EventLog {
    fn record(&self, event: TraceEvent) {
        TracingObserver.record(event.clone());
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
