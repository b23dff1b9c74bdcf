//! The dependency graph recorded during construction, and the topological
//! sort derived from it for start/stop ordering.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::key::ServiceKey;

/// `consumer -> dependency` edges observed while resolving services.
///
/// Writes happen only during resolution (inside factory bodies); reads
/// happen at `build` (to order Start) and are otherwise a deep-copy
/// snapshot via [`DependencyGraph::snapshot`].
#[derive(Default)]
pub(crate) struct DependencyGraph {
    edges: Mutex<HashMap<ServiceKey, HashSet<ServiceKey>>>,
}

impl DependencyGraph {
    pub(crate) fn record_edge(&self, consumer: ServiceKey, dependency: ServiceKey) {
        if consumer == dependency {
            return;
        }
        self.edges.lock().entry(consumer).or_default().insert(dependency);
    }

    /// A deep copy of every recorded edge, per `Container::graph()`.
    pub(crate) fn snapshot(&self) -> HashMap<ServiceKey, HashSet<ServiceKey>> {
        self.edges.lock().clone()
    }

    /// Topologically sorts `keys` so that for every recorded edge
    /// `a -> b` with both endpoints in `keys`, `b` appears before `a`
    /// (dependencies before consumers). Ties are broken by the order
    /// `keys` was given in, which callers pass in registration order.
    ///
    /// Cycles among `keys` are not expected here (they are caught earlier,
    /// at resolution time) — if one is nonetheless present, the offending
    /// keys are appended in their given order rather than panicking, since
    /// ordering is a best-effort diagnostic concern at this stage.
    pub(crate) fn start_order(&self, keys: &[ServiceKey]) -> Vec<ServiceKey> {
        let edges = self.edges.lock();
        let index_of: HashMap<ServiceKey, usize> =
            keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        let mut in_degree: HashMap<ServiceKey, usize> = keys.iter().map(|k| (*k, 0)).collect();
        let mut dependents: HashMap<ServiceKey, Vec<ServiceKey>> = HashMap::new();

        for consumer in keys {
            if let Some(deps) = edges.get(consumer) {
                for dep in deps {
                    if !index_of.contains_key(dep) {
                        continue;
                    }
                    *in_degree.get_mut(consumer).unwrap() += 1;
                    dependents.entry(*dep).or_default().push(*consumer);
                }
            }
        }

        // A min-heap keyed by registration index would also work; a sorted
        // Vec used as a priority queue is simpler and the key counts here
        // are small (service counts, not request counts).
        let mut ready: Vec<ServiceKey> = keys
            .iter()
            .filter(|k| in_degree[*k] == 0)
            .copied()
            .collect();
        ready.sort_by_key(|k| index_of[k]);

        let mut order = Vec::with_capacity(keys.len());
        let mut visited: HashSet<ServiceKey> = HashSet::new();

        while !ready.is_empty() {
            ready.sort_by_key(|k| index_of[k]);
            let next = ready.remove(0);
            if !visited.insert(next) {
                continue;
            }
            order.push(next);
            if let Some(consumers) = dependents.get(&next) {
                for consumer in consumers {
                    let degree = in_degree.get_mut(consumer).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(*consumer);
                    }
                }
            }
        }

        // Anything left (should only happen on an undetected cycle) is
        // appended in registration order so every key is still accounted
        // for in the returned order.
        for key in keys {
            if !visited.contains(key) {
                order.push(*key);
            }
        }

        order
    }

    /// The reverse of `start_order`, used for stop ordering.
    pub(crate) fn stop_order(&self, keys: &[ServiceKey]) -> Vec<ServiceKey> {
        let mut order = self.start_order(keys);
        order.reverse();
        order
    }
}
