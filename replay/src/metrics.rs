//! Derived summary views over a trace.

#[cfg(test)]
#[path = "metrics_test.rs"]
mod metrics_test;

use std::collections::BTreeMap;

use crate::event::Mutation;
use crate::trace::Trace;

/// One-walk summary of a trace, for inspector displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceMetrics {
    pub events: usize,
    pub mutations: usize,
    pub entities_created: usize,
    /// Creation counts keyed by entity-kind name.
    pub creates_by_kind: BTreeMap<String, usize>,
}

#[must_use]
pub fn compute_metrics(trace: &Trace) -> TraceMetrics {
    let mut mutations = 0usize;
    let mut entities_created = 0usize;
    let mut creates_by_kind = BTreeMap::<String, usize>::new();

    for event in trace.events() {
        mutations += event.forward.len() + event.inverse.len();
        for mutation in &event.forward {
            if let Mutation::CreateEntity { kind, .. } = mutation {
                entities_created += 1;
                *creates_by_kind.entry(kind.as_str().to_owned()).or_insert(0) += 1;
            }
        }
    }

    TraceMetrics {
        events: trace.len(),
        mutations,
        entities_created,
        creates_by_kind,
    }
}
