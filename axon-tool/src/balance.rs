//! Provider load-balancing strategies.

use crate::breaker::CircuitState;
use axon_core::ProviderId;
use serde::{Deserialize, Serialize};

/// How the registry picks among providers serving the same tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// Rotate through providers in registration order.
    #[default]
    RoundRobin,
    /// Prefer the provider with the fewest calls in flight.
    LeastInflight,
    /// Prefer closed circuits, then half-open, then open; ties broken by
    /// fewest recent failures.
    HealthWeighted,
}

/// Per-provider facts the strategies rank on.
#[derive(Debug, Clone)]
pub struct ProviderLoad {
    /// The provider.
    pub provider_id: ProviderId,
    /// Calls currently in flight to this provider.
    pub inflight: usize,
    /// Breaker state right now.
    pub circuit: CircuitState,
    /// Failures inside the breaker's window.
    pub recent_failures: usize,
}

fn circuit_rank(state: CircuitState) -> u8 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::HalfOpen => 1,
        CircuitState::Open => 2,
    }
}

/// Order candidate providers for an invocation. The first entry is the
/// selected provider; the rest is the failover order.
///
/// `rotation` feeds round-robin; callers bump it once per selection.
pub fn order_candidates(
    strategy: LoadBalanceStrategy,
    candidates: Vec<ProviderLoad>,
    rotation: usize,
) -> Vec<ProviderId> {
    let mut candidates = candidates;
    match strategy {
        LoadBalanceStrategy::RoundRobin => {
            let len = candidates.len();
            if len > 0 {
                candidates.rotate_left(rotation % len);
            }
        }
        LoadBalanceStrategy::LeastInflight => {
            candidates.sort_by_key(|c| c.inflight);
        }
        LoadBalanceStrategy::HealthWeighted => {
            candidates.sort_by_key(|c| (circuit_rank(c.circuit), c.recent_failures));
        }
    }
    candidates.into_iter().map(|c| c.provider_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(id: &str, inflight: usize, circuit: CircuitState, failures: usize) -> ProviderLoad {
        ProviderLoad {
            provider_id: ProviderId::from(id),
            inflight,
            circuit,
            recent_failures: failures,
        }
    }

    #[test]
    fn round_robin_rotates() {
        let candidates = || {
            vec![
                load("a", 0, CircuitState::Closed, 0),
                load("b", 0, CircuitState::Closed, 0),
                load("c", 0, CircuitState::Closed, 0),
            ]
        };
        let first = order_candidates(LoadBalanceStrategy::RoundRobin, candidates(), 0);
        let second = order_candidates(LoadBalanceStrategy::RoundRobin, candidates(), 1);
        assert_eq!(first[0].as_str(), "a");
        assert_eq!(second[0].as_str(), "b");
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn least_inflight_prefers_idle() {
        let ordered = order_candidates(
            LoadBalanceStrategy::LeastInflight,
            vec![
                load("busy", 7, CircuitState::Closed, 0),
                load("idle", 0, CircuitState::Closed, 0),
                load("mid", 3, CircuitState::Closed, 0),
            ],
            0,
        );
        let names: Vec<&str> = ordered.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["idle", "mid", "busy"]);
    }

    #[test]
    fn health_weighted_prefers_closed_circuits() {
        let ordered = order_candidates(
            LoadBalanceStrategy::HealthWeighted,
            vec![
                load("open", 0, CircuitState::Open, 9),
                load("flaky", 0, CircuitState::Closed, 3),
                load("healthy", 0, CircuitState::Closed, 0),
                load("probing", 0, CircuitState::HalfOpen, 5),
            ],
            0,
        );
        let names: Vec<&str> = ordered.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["healthy", "flaky", "probing", "open"]);
    }
}
