// Shakewatch - Classification Task
//
// Two periodic tasks per session:
//   inference   - every `classificationIntervalMs`, classify the latest audio
//                 and queue the ranked label->score map (drop-oldest queue)
//   aggregation - every `aggregationWindowMs`, drain the queue, merge the
//                 trailing window and publish the snapshot
//
// A slow inference only delays the next inference; the sample path never
// waits on either task.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::RwLock;

use crate::aggregate::{rank, ClassificationAggregator, LatestSnapshot};
use crate::config::DetectorConfig;
use crate::drivers::audio::SharedClassifier;
use crate::error::Result;
use crate::events::ClassificationSnapshot;
use crate::queue::{drop_oldest, DropOldestSender};
use crate::timer::{PeriodicTask, SessionClock};

type ScoredAt = (u64, ClassificationSnapshot);

pub struct ClassifierPipeline {
    classifier: SharedClassifier,
    inference: Option<PeriodicTask>,
    aggregation: Option<PeriodicTask>,
    latest: LatestSnapshot,
    dropped: Arc<AtomicU64>,
    recording: bool,
}

impl ClassifierPipeline {
    /// Open the microphone and start both tasks. On failure nothing is left
    /// running and the microphone is released again.
    pub fn start(
        classifier: SharedClassifier,
        config: &DetectorConfig,
        clock: SessionClock,
    ) -> Result<Self> {
        classifier.lock().start_recording()?;
        log::info!("Audio classifier recording");

        let (queue, results) = drop_oldest(config.classification_queue_capacity, "classification");
        let mut pipeline = Self {
            classifier,
            inference: None,
            aggregation: None,
            latest: Arc::new(RwLock::new(None)),
            dropped: queue.drop_counter(),
            recording: true,
        };

        let classifier = Arc::clone(&pipeline.classifier);
        let min_score = config.min_classification_score;
        pipeline.inference = Some(PeriodicTask::spawn(
            "shake-classify",
            Duration::from_millis(config.classification_interval_ms),
            move || run_inference(&classifier, min_score, &queue, &clock),
        )?);

        let mut aggregator = ClassificationAggregator::new(config.aggregation_window_ms);
        let latest = Arc::clone(&pipeline.latest);
        pipeline.aggregation = Some(PeriodicTask::spawn(
            "shake-aggregate",
            Duration::from_millis(config.aggregation_window_ms),
            move || publish_snapshot(&results, &mut aggregator, &latest, &clock),
        )?);

        Ok(pipeline)
    }

    pub fn latest(&self) -> LatestSnapshot {
        Arc::clone(&self.latest)
    }

    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    /// Halt both tasks, then release the microphone. Release errors are only
    /// logged. Safe to call twice.
    pub fn stop(&mut self) {
        if let Some(mut task) = self.inference.take() {
            task.cancel();
        }
        if let Some(mut task) = self.aggregation.take() {
            task.cancel();
        }
        if std::mem::replace(&mut self.recording, false) {
            match self.classifier.lock().stop_recording() {
                Ok(()) => log::info!("Audio classifier stopped"),
                Err(e) => log::warn!("Audio classifier release failed: {}", e),
            }
        }
    }
}

impl Drop for ClassifierPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_inference(
    classifier: &SharedClassifier,
    min_score: f32,
    queue: &DropOldestSender<ScoredAt>,
    clock: &SessionClock,
) {
    let started = Instant::now();
    let output = classifier.lock().classify();
    let categories = match output {
        Ok(categories) => categories,
        Err(e) => {
            log::warn!("Audio classification failed: {}", e);
            return;
        }
    };

    let ranked = rank(categories, min_score);
    log::debug!("Inference latency = {:?}", started.elapsed());
    for category in &ranked {
        log::debug!("{} = {:.1}%", category.label, category.score * 100.0);
    }

    let scores: ClassificationSnapshot = ranked.into_iter().map(|c| (c.label, c.score)).collect();
    queue.push((clock.now_ms(), scores));
}

fn publish_snapshot(
    results: &Receiver<ScoredAt>,
    aggregator: &mut ClassificationAggregator,
    latest: &LatestSnapshot,
    clock: &SessionClock,
) {
    for (at_ms, scores) in results.try_iter() {
        aggregator.push(at_ms, scores);
    }
    let merged = aggregator.merge(clock.now_ms());
    log::debug!("Classification snapshot: {} labels", merged.len());
    *latest.write() = Some(merged);
}
