//! Turns one operator's activity events into state intervals.

use proftrace_core::{Activity, ActivityEvent, Nanos, StateInterval, StateKind};

/// Builds the contiguous state intervals of one operator.
///
/// `events` must be sorted by timestamp. Each consecutive pair yields one
/// interval whose kind is decided by the earlier event: `live`/`wake` start
/// computing, `wait` starts waiting on a child, `hang` starts sleeping. A
/// compute interval ending in a `hang` carries that event's thread pool slot.
/// Bounds are made relative to `origin`.
pub fn build_states(events: &[ActivityEvent], origin: Nanos) -> Vec<StateInterval> {
    events
        .windows(2)
        .map(|pair| {
            let (prev, next) = (pair[0], pair[1]);
            let kind = match prev.activity {
                Activity::Live | Activity::Wake => StateKind::Compute,
                Activity::Wait => StateKind::Wait,
                Activity::Hang => StateKind::Sleep,
            };
            let slot = match (kind, next.activity) {
                (StateKind::Compute, Activity::Hang) => next.slot,
                _ => None,
            };
            StateInterval::new(prev.timestamp - origin, next.timestamp - origin, kind).with_slot(slot)
        })
        .collect()
}
