use std::cmp::Ordering;

fn descending(scores: &[f64], a: usize, b: usize) -> Ordering {
    scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal)
}

/// All indices, best score first. Ties keep population order.
pub fn rank_by_score(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| descending(scores, a, b));
    order
}

/// Best member of each provenance group, best group first.
///
/// `sources[i]` is the parent index of member `i`. Only one representative per
/// group is returned, so the result can be shorter than the population.
pub fn prioritized_by_parent(scores: &[f64], sources: &[usize]) -> Vec<usize> {
    let mut groups: Vec<usize> = sources.to_vec();
    groups.sort_unstable();
    groups.dedup();

    let mut best: Vec<usize> = groups
        .into_iter()
        .filter_map(|group| {
            (0..scores.len())
                .filter(|&i| sources[i] == group)
                .max_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal))
        })
        .collect();
    best.sort_by(|&a, &b| descending(scores, a, b));
    best
}
