use crate::discovery::NodeDescriptor;
use rand::seq::SliceRandom;
use std::cmp::Ordering;

/// Picks the endpoint to connect to from a filtered candidate set.
///
/// The ranking formula is deliberately pluggable; swap the policy on the
/// resolver to change it without touching discovery or caching.
pub trait SelectionPolicy: Send + Sync {
    fn select(&self, candidates: Vec<NodeDescriptor>) -> Option<NodeDescriptor>;
}

/// Default policy: prefer the lowest observed latency, then the highest
/// advertised capacity. Candidates are shuffled before the (stable) sort
/// so that equal candidates spread load across callers, while candidates
/// with metrics always rank ahead of those without.
pub struct LatencyCapacityPolicy;

impl SelectionPolicy for LatencyCapacityPolicy {
    fn select(&self, mut candidates: Vec<NodeDescriptor>) -> Option<NodeDescriptor> {
        candidates.shuffle(&mut rand::rng());
        candidates.sort_by(|a, b| {
            cmp_latency(a.latency_ms, b.latency_ms)
                .then_with(|| cmp_capacity(a.capacity, b.capacity))
        });
        candidates.into_iter().next()
    }
}

/// Ascending, with missing measurements ranked last.
fn cmp_latency(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Descending, with missing advertisements ranked last.
fn cmp_capacity(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
