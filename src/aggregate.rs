// Shakewatch - Classification Aggregator
//
// Buffers per-inference label->score maps and folds everything inside the
// trailing window into one best-score-per-label snapshot.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{Category, ClassificationSnapshot};

/// Latest merged snapshot, shared between the aggregation tick and readers.
pub type LatestSnapshot = Arc<RwLock<Option<ClassificationSnapshot>>>;

/// Keep categories scoring above `min_score`, best first.
pub fn rank(categories: Vec<Category>, min_score: f32) -> Vec<Category> {
    let mut kept: Vec<Category> = categories
        .into_iter()
        .filter(|c| c.score > min_score)
        .collect();
    kept.sort_by(|a, b| b.score.total_cmp(&a.score));
    kept
}

#[derive(Debug)]
pub struct ClassificationAggregator {
    window_ms: u64,
    buffered: VecDeque<(u64, ClassificationSnapshot)>,
}

impl ClassificationAggregator {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            buffered: VecDeque::new(),
        }
    }

    /// Buffer one inference result observed at `at_ms`.
    pub fn push(&mut self, at_ms: u64, scores: ClassificationSnapshot) {
        self.buffered.push_back((at_ms, scores));
    }

    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }

    /// Drop results older than the window, then reduce what is left.
    pub fn merge(&mut self, now_ms: u64) -> ClassificationSnapshot {
        while let Some((at, _)) = self.buffered.front() {
            if now_ms.saturating_sub(*at) > self.window_ms {
                self.buffered.pop_front();
            } else {
                break;
            }
        }

        let mut merged = ClassificationSnapshot::new();
        for (_, scores) in &self.buffered {
            for (label, score) in scores.iter() {
                merged.keep_max(label, score);
            }
        }
        merged
    }
}
