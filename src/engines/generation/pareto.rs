//! NSGA-II style multi-objective ranking over per-sequence metrics.
//!
//! Auxiliary to the score-ranked truncation used by the population loop;
//! useful when comparing candidates on several raw metrics at once.

use crate::types::ScoreRecord;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationDirection {
    Maximize,
    Minimize,
}

/// One objective: a metric (or, failing that, a score) name and its direction
#[derive(Debug, Clone)]
pub struct ObjectiveConfig {
    pub metric_name: String,
    pub direction: OptimizationDirection,
}

/// A no worse than B everywhere and strictly better somewhere
pub fn dominates(a: &[f64], b: &[f64], directions: &[OptimizationDirection]) -> bool {
    if a.len() != b.len() || a.len() != directions.len() {
        return false;
    }

    let mut strictly_better = false;
    for ((&x, &y), direction) in a.iter().zip(b).zip(directions) {
        let (a_better, b_better) = match direction {
            OptimizationDirection::Maximize => (x > y, y > x),
            OptimizationDirection::Minimize => (x < y, y < x),
        };
        if b_better {
            return false;
        }
        strictly_better |= a_better;
    }
    strictly_better
}

/// Fronts of indices, best first, and the front rank of every point
pub fn fast_non_dominated_sort(
    points: &[Vec<f64>],
    directions: &[OptimizationDirection],
) -> (Vec<Vec<usize>>, Vec<usize>) {
    let n = points.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut ranks = vec![0usize; n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(&points[i], &points[j], directions) {
                dominated[i].push(j);
            } else if dominates(&points[j], &points[i], directions) {
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    ranks[j] = fronts.len() + 1;
                    next.push(j);
                }
            }
        }
        fronts.push(current);
        current = next;
    }

    (fronts, ranks)
}

/// Crowding distance of each member of `front`, aligned with it.
/// Boundary points get infinity.
pub fn crowding_distances(points: &[Vec<f64>], front: &[usize]) -> Vec<f64> {
    let size = front.len();
    if size <= 2 {
        return vec![f64::INFINITY; size];
    }

    let mut distance = vec![0.0; size];
    let objectives = points[front[0]].len();
    for obj in 0..objectives {
        let mut order: Vec<usize> = (0..size).collect();
        order.sort_by(|&a, &b| {
            points[front[a]][obj]
                .partial_cmp(&points[front[b]][obj])
                .unwrap_or(Ordering::Equal)
        });

        distance[order[0]] = f64::INFINITY;
        distance[order[size - 1]] = f64::INFINITY;

        let min = points[front[order[0]]][obj];
        let range = points[front[order[size - 1]]][obj] - min;
        if range.abs() < 1e-10 {
            continue;
        }
        for k in 1..size - 1 {
            let prev = points[front[order[k - 1]]][obj];
            let next = points[front[order[k + 1]]][obj];
            distance[order[k]] += (next - prev) / range;
        }
    }
    distance
}

/// Objective vector of one record. Missing names count as 0.
pub fn extract_objectives(record: &ScoreRecord, objectives: &[ObjectiveConfig]) -> Vec<f64> {
    objectives
        .iter()
        .map(|o| {
            record
                .metrics
                .get(&o.metric_name)
                .or_else(|| record.scores.get(&o.metric_name))
                .copied()
                .unwrap_or(0.0)
        })
        .collect()
}

/// Pick `count` records front by front, breaking the last front by crowding
pub fn nsga2_select(records: &[ScoreRecord], objectives: &[ObjectiveConfig], count: usize) -> Vec<usize> {
    let points: Vec<Vec<f64>> = records.iter().map(|r| extract_objectives(r, objectives)).collect();
    let directions: Vec<OptimizationDirection> = objectives.iter().map(|o| o.direction).collect();
    let (fronts, _) = fast_non_dominated_sort(&points, &directions);

    let mut picked = Vec::with_capacity(count);
    for front in fronts {
        if picked.len() + front.len() <= count {
            picked.extend(front);
            continue;
        }
        let distance = crowding_distances(&points, &front);
        let mut order: Vec<usize> = (0..front.len()).collect();
        order.sort_by(|&a, &b| distance[b].partial_cmp(&distance[a]).unwrap_or(Ordering::Equal));
        picked.extend(order.into_iter().take(count - picked.len()).map(|k| front[k]));
        break;
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use OptimizationDirection::{Maximize, Minimize};

    #[test]
    fn test_dominance() {
        assert!(dominates(&[10.0, 20.0], &[10.0, 10.0], &[Maximize, Maximize]));
        assert!(!dominates(&[10.0, 5.0], &[5.0, 10.0], &[Maximize, Maximize]));
        assert!(!dominates(&[1.0, 1.0], &[1.0, 1.0], &[Maximize, Maximize]));
        assert!(dominates(&[10.0, 5.0], &[5.0, 10.0], &[Maximize, Minimize]));
    }

    #[test]
    fn test_fronts_and_ranks() {
        let points = vec![
            vec![1.0, 5.0],
            vec![3.0, 3.0],
            vec![5.0, 1.0],
            vec![2.0, 2.0],
            vec![1.0, 1.0],
        ];
        let (fronts, ranks) = fast_non_dominated_sort(&points, &[Maximize, Maximize]);
        assert_eq!(fronts.len(), 3);
        assert_eq!(fronts[0], vec![0, 1, 2]);
        assert_eq!(ranks, vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_crowding_prefers_boundaries() {
        let points = vec![vec![1.0, 5.0], vec![3.0, 3.0], vec![5.0, 1.0]];
        let distance = crowding_distances(&points, &[0, 1, 2]);
        assert!(distance[0].is_infinite() && distance[2].is_infinite());
        assert!((distance[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_nsga2_select_on_metrics() {
        let record = |mfe: f64, aup: f64| ScoreRecord {
            scores: BTreeMap::new(),
            metrics: BTreeMap::from([("mfe".to_string(), mfe), ("aup".to_string(), aup)]),
            region_penalty: 0.0,
        };
        // Lower MFE and higher AUP are both better
        let records = vec![record(-10.0, 0.2), record(-5.0, 0.5), record(-4.0, 0.1), record(-12.0, 0.1)];
        let objectives = vec![
            ObjectiveConfig { metric_name: "mfe".to_string(), direction: Minimize },
            ObjectiveConfig { metric_name: "aup".to_string(), direction: Maximize },
        ];

        let picked = nsga2_select(&records, &objectives, 2);
        assert_eq!(picked.len(), 2);
        assert!(!picked.contains(&2));
    }
}
