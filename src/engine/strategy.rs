//! The three interchangeable allocation strategies (spec §4.5).
//!
//! Each strategy takes the current per-tracker buckets of managed
//! torrents and produces `hash -> proposed_limit`. `-1` means unlimited.

use std::collections::HashMap;

/// Bytes/sec floor for any finite per-torrent share.
pub const FLOOR_BYTES: i64 = 10 * 1024;

#[derive(Debug, Clone)]
pub struct ScoredTorrent {
    pub hash: String,
    pub up_speed: i64,
    pub num_leechs: i64,
}

impl ScoredTorrent {
    /// `score = 0.6 · min(1, leechs/20) + 0.4 · min(1, up_speed/1MiB)`.
    pub fn score(&self) -> f64 {
        let leech_term = (self.num_leechs as f64 / 20.0).min(1.0);
        let speed_term = (self.up_speed as f64 / 1_048_576.0).min(1.0);
        0.6 * leech_term + 0.4 * speed_term
    }
}

#[derive(Debug, Clone)]
pub struct TrackerBucket {
    pub tracker_id: String,
    /// `-1` means unlimited.
    pub base_cap: i64,
    pub priority: i64,
    pub torrents: Vec<ScoredTorrent>,
}

pub type Proposal = HashMap<String, i64>;

pub fn compute_equal(buckets: &[TrackerBucket]) -> Proposal {
    let mut out = Proposal::new();
    for bucket in buckets {
        if bucket.torrents.is_empty() {
            continue;
        }
        if bucket.base_cap < 0 {
            for t in &bucket.torrents {
                out.insert(t.hash.clone(), -1);
            }
            continue;
        }
        let n = bucket.torrents.len() as i64;
        let share = (bucket.base_cap / n).max(FLOOR_BYTES);
        for t in &bucket.torrents {
            out.insert(t.hash.clone(), share);
        }
    }
    out
}

pub fn compute_weighted(buckets: &[TrackerBucket]) -> Proposal {
    let mut out = Proposal::new();
    for bucket in buckets {
        if bucket.torrents.is_empty() {
            continue;
        }
        if bucket.base_cap < 0 {
            for t in &bucket.torrents {
                out.insert(t.hash.clone(), -1);
            }
            continue;
        }
        let distributed = distribute_weighted_single(&bucket.torrents, bucket.base_cap);
        out.extend(distributed);
    }
    out
}

/// Weighted distribution of `cap` bytes/sec among `torrents`, bounded per
/// torrent to `[FLOOR_BYTES, 0.6·cap]`, with up to two redistribution
/// passes for excess trimmed from over-the-bound torrents.
fn distribute_weighted_single(torrents: &[ScoredTorrent], cap: i64) -> HashMap<String, i64> {
    let n = torrents.len();
    let cap_f = cap as f64;
    let low = FLOOR_BYTES as f64;
    let high = 0.6 * cap_f;

    let scores: Vec<f64> = torrents.iter().map(|t| t.score()).collect();
    let sum_scores: f64 = scores.iter().sum();

    let mut raw: Vec<f64> = if sum_scores > 0.0 {
        scores.iter().map(|s| cap_f * s / sum_scores).collect()
    } else {
        vec![cap_f / n as f64; n]
    };

    for _pass in 0..2 {
        let mut excess = 0.0;
        let mut capped = vec![false; n];
        for (i, value) in raw.iter_mut().enumerate() {
            if *value > high {
                excess += *value - high;
                *value = high;
                capped[i] = true;
            } else if *value < low {
                *value = low;
            }
        }
        if excess <= f64::EPSILON {
            break;
        }
        let redistributable_weight: f64 = scores
            .iter()
            .zip(capped.iter())
            .filter(|(_, &c)| !c)
            .map(|(s, _)| *s)
            .sum();
        if redistributable_weight <= 0.0 {
            break;
        }
        for ((value, score), is_capped) in raw.iter_mut().zip(scores.iter()).zip(capped.iter()) {
            if !is_capped {
                *value += excess * score / redistributable_weight;
            }
        }
    }

    torrents
        .iter()
        .zip(raw.iter())
        .map(|(t, v)| (t.hash.clone(), v.round() as i64))
        .collect()
}

/// Per-tracker state needed by the soft strategy, threaded across cycles
/// by [`super::Engine`].
pub struct SoftParams {
    pub borrow_threshold_ratio: f64,
    pub max_borrow_fraction: f64,
    pub smoothing_alpha: f64,
    pub min_effective_delta: f64,
}

/// `smoothing_state` persists EMA values across cycles, keyed by tracker
/// id (spec §3 `AllocationState`).
pub fn compute_soft(
    buckets: &[TrackerBucket],
    smoothing_state: &mut HashMap<String, f64>,
    params: &SoftParams,
) -> Proposal {
    let mut out = Proposal::new();

    let finite: Vec<&TrackerBucket> = buckets.iter().filter(|b| b.base_cap >= 0).collect();

    for bucket in buckets {
        if bucket.base_cap < 0 {
            for t in &bucket.torrents {
                out.insert(t.hash.clone(), -1);
            }
        }
    }

    let used: HashMap<&str, i64> = finite
        .iter()
        .map(|b| {
            (
                b.tracker_id.as_str(),
                b.torrents.iter().map(|t| t.up_speed).sum(),
            )
        })
        .collect();

    let pool: f64 = finite
        .iter()
        .map(|b| {
            let u = used[b.tracker_id.as_str()] as f64;
            (b.base_cap as f64 - u).max(0.0)
        })
        .sum();

    let mut qualifying: Vec<&TrackerBucket> = finite
        .iter()
        .copied()
        .filter(|b| {
            let u = used[b.tracker_id.as_str()] as f64;
            u >= params.borrow_threshold_ratio * b.base_cap as f64
        })
        .collect();
    qualifying.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.tracker_id.cmp(&b.tracker_id))
    });

    let mut remaining_pool = pool;
    let mut borrow: HashMap<&str, f64> = HashMap::new();
    for bucket in &qualifying {
        let u = used[bucket.tracker_id.as_str()] as f64;
        let excess = (u - params.borrow_threshold_ratio * bucket.base_cap as f64).max(0.0);
        let weight = bucket.priority as f64 * excess;
        let amount = weight
            .min(params.max_borrow_fraction * bucket.base_cap as f64)
            .min(remaining_pool);
        if amount > 0.0 {
            borrow.insert(bucket.tracker_id.as_str(), amount);
            remaining_pool -= amount;
        }
    }

    for bucket in &finite {
        if bucket.torrents.is_empty() {
            continue;
        }
        let raw_effective = bucket.base_cap as f64 + borrow.get(bucket.tracker_id.as_str()).copied().unwrap_or(0.0);
        let previous = smoothing_state
            .get(bucket.tracker_id.as_str())
            .copied()
            .unwrap_or(bucket.base_cap as f64);
        let smoothed = params.smoothing_alpha * raw_effective + (1.0 - params.smoothing_alpha) * previous;

        let committed = if previous <= 0.0 {
            smoothed
        } else if ((smoothed - previous).abs() / previous) >= params.min_effective_delta {
            smoothed
        } else {
            previous
        };
        smoothing_state.insert(bucket.tracker_id.clone(), committed);

        let effective_cap = committed.round() as i64;
        let distributed = distribute_weighted_single(&bucket.torrents, effective_cap);
        out.extend(distributed);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torrent(hash: &str, up_speed: i64, num_leechs: i64) -> ScoredTorrent {
        ScoredTorrent {
            hash: hash.to_string(),
            up_speed,
            num_leechs,
        }
    }

    #[test]
    fn s1_equal_two_trackers() {
        let buckets = vec![
            TrackerBucket {
                tracker_id: "a".to_string(),
                base_cap: 4 * 1_048_576,
                priority: 0,
                torrents: vec![
                    torrent("h1", 500 * 1024, 0),
                    torrent("h2", 500 * 1024, 0),
                    torrent("h3", 500 * 1024, 0),
                    torrent("h4", 500 * 1024, 0),
                ],
            },
            TrackerBucket {
                tracker_id: "b".to_string(),
                base_cap: -1,
                priority: 0,
                torrents: vec![torrent("h5", 0, 0), torrent("h6", 0, 0)],
            },
        ];
        let proposal = compute_equal(&buckets);
        assert_eq!(proposal["h1"], 1_048_576);
        assert_eq!(proposal["h4"], 1_048_576);
        assert_eq!(proposal["h5"], -1);
        assert_eq!(proposal["h6"], -1);
    }

    #[test]
    fn s2_weighted_bounds_and_redistribution() {
        let buckets = vec![TrackerBucket {
            tracker_id: "t".to_string(),
            base_cap: 6 * 1_048_576,
            priority: 0,
            torrents: vec![torrent("x", 800 * 1024, 40), torrent("y", 200 * 1024, 5)],
        }];
        let proposal = compute_weighted(&buckets);
        let cap = 6 * 1_048_576;
        let bound_high = (0.6 * cap as f64).round() as i64;
        assert_eq!(proposal["x"], bound_high);
        assert_eq!(proposal["x"] + proposal["y"], cap);
    }

    #[test]
    fn s3_soft_borrow() {
        let buckets = vec![
            TrackerBucket {
                tracker_id: "a".to_string(),
                base_cap: 4 * 1_048_576,
                priority: 0,
                torrents: vec![torrent("h1", 1 * 1_048_576, 0)],
            },
            TrackerBucket {
                tracker_id: "b".to_string(),
                base_cap: 2 * 1_048_576,
                priority: 10,
                torrents: vec![torrent("h2", 2 * 1_048_576, 0)],
            },
        ];
        let params = SoftParams {
            borrow_threshold_ratio: 0.9,
            max_borrow_fraction: 0.5,
            smoothing_alpha: 1.0,
            min_effective_delta: 0.0,
        };
        let mut smoothing = HashMap::new();
        let proposal = compute_soft(&buckets, &mut smoothing, &params);
        assert_eq!(smoothing["b"].round() as i64, 3 * 1_048_576);
        assert_eq!(proposal["h2"], 3 * 1_048_576);
        assert_eq!(smoothing["a"].round() as i64, 4 * 1_048_576);
    }

    #[test]
    fn s4_smoothing_gate_holds_below_threshold() {
        let buckets = vec![TrackerBucket {
            tracker_id: "t".to_string(),
            base_cap: 3_100_000,
            priority: 0,
            torrents: vec![torrent("h1", 0, 0)],
        }];
        let params = SoftParams {
            borrow_threshold_ratio: 0.9,
            max_borrow_fraction: 0.5,
            smoothing_alpha: 0.4,
            min_effective_delta: 0.1,
        };
        let mut smoothing = HashMap::new();
        smoothing.insert("t".to_string(), 3_000_000.0);
        compute_soft(&buckets, &mut smoothing, &params);
        assert_eq!(smoothing["t"], 3_000_000.0);
    }
}
