//! Exact feasibility check for a rematch-free round.

use petgraph::algo::maximum_matching;
use petgraph::graph::UnGraph;

/// A perfect matching of `pool` over pairs for which `allowed` holds, or
/// `None` when every way of pairing the pool breaks the constraint.
///
/// Pairs come back as `(higher, lower)` pool entries, sorted by the first.
pub(crate) fn perfect_matching<F>(pool: &[usize], allowed: F) -> Option<Vec<(usize, usize)>>
where
    F: Fn(usize, usize) -> bool,
{
    if pool.len() % 2 == 1 {
        return None;
    }
    if pool.is_empty() {
        return Some(Vec::new());
    }

    let mut graph = UnGraph::<(), ()>::with_capacity(pool.len(), 0);
    let nodes: Vec<_> = pool.iter().map(|_| graph.add_node(())).collect();
    for (i, &a) in pool.iter().enumerate() {
        for (j, &b) in pool.iter().enumerate().skip(i + 1) {
            if allowed(a, b) {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }

    let matching = maximum_matching(&graph);
    if !matching.is_perfect() {
        return None;
    }

    let mut pairs: Vec<(usize, usize)> = matching
        .edges()
        .map(|(a, b)| {
            let (a, b) = (pool[a.index()], pool[b.index()]);
            (a.min(b), a.max(b))
        })
        .collect();
    pairs.sort_unstable();
    pairs.dedup();
    Some(pairs)
}
