// src/resolve.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use crate::error::ResolveError;

/// Maps every node to the nodes it depends on
pub type Graph<K = String> = BTreeMap<K, Vec<K>>;

/// Orders the nodes of `graph` so that every dependency comes before its
/// dependents.
///
/// Depth-first, driven by an explicit stack. A node is `seen` from the
/// moment it is pushed and `resolved` once all of its dependencies have
/// been emitted; reaching a node that is seen but not resolved means it is
/// on the current path, i.e. the graph has a cycle. Independent nodes come
/// out in key order of the map.
pub fn resolve_graph<K>(graph: &Graph<K>) -> Result<Vec<K>, ResolveError>
where
    K: Ord + Clone + Debug,
{
    let mut seen: BTreeSet<&K> = BTreeSet::new();
    let mut resolved: BTreeSet<&K> = BTreeSet::new();
    let mut result = Vec::with_capacity(graph.len());
    let mut stack: Vec<(&K, &[K], usize)> = Vec::new();

    for (start, deps) in graph {
        if seen.contains(start) {
            continue;
        }
        seen.insert(start);
        stack.push((start, deps.as_slice(), 0));

        while let Some(top) = stack.last_mut() {
            let (node, deps, pos) = *top;
            let Some(dep) = deps.get(pos) else {
                resolved.insert(node);
                result.push(node.clone());
                stack.pop();
                continue;
            };
            top.2 += 1;

            if seen.contains(dep) {
                if !resolved.contains(dep) {
                    return Err(ResolveError::Cyclic);
                }
                continue;
            }
            let dep_deps = graph
                .get(dep)
                .ok_or_else(|| ResolveError::UnknownNode(format!("{dep:?}")))?;
            seen.insert(dep);
            stack.push((dep, dep_deps.as_slice(), 0));
        }
    }

    Ok(result)
}
