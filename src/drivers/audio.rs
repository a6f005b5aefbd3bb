// Shakewatch - Audio Classifier Interface
//
// The ambient-sound model is an opaque service: it records audio on its own
// and, when asked, classifies the most recent ~1 second of it into ranked
// label/score pairs. Inference costs tens of milliseconds, so it is only ever
// called from the classification task, never from the sample path.
//
// `ScriptedClassifier` stands in for the real model. It cycles through
// prepared outputs so the rest of the pipeline can run end-to-end without a
// model file or microphone.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, ShakeError};
use crate::events::Category;

pub trait AudioClassifier: Send {
    /// Open the microphone. Reports a missing recording permission as
    /// `ShakeError::PermissionDenied`.
    fn start_recording(&mut self) -> Result<()>;

    /// Classify the latest audio window. Output need not be sorted.
    fn classify(&mut self) -> Result<Vec<Category>>;

    /// Release the microphone.
    fn stop_recording(&mut self) -> Result<()>;
}

/// Classifier owned by an `EventSource` and lent to each session's
/// classification task.
pub type SharedClassifier = Arc<Mutex<Box<dyn AudioClassifier>>>;

pub fn shared(classifier: impl AudioClassifier + 'static) -> SharedClassifier {
    Arc::new(Mutex::new(Box::new(classifier)))
}

// ---------------------------------------------------------------------------
// Scripted back-end
// ---------------------------------------------------------------------------

pub struct ScriptedClassifier {
    frames: Vec<Vec<Category>>,
    next: usize,
    permission_granted: bool,
    fail_release: bool,
    recording: bool,
    invocations: usize,
}

impl ScriptedClassifier {
    /// Each call to `classify` returns the next frame, wrapping around.
    pub fn new(frames: Vec<Vec<Category>>) -> Self {
        Self {
            frames,
            next: 0,
            permission_granted: true,
            fail_release: false,
            recording: false,
            invocations: 0,
        }
    }

    /// Same output forever.
    pub fn constant(categories: Vec<Category>) -> Self {
        Self::new(vec![categories])
    }

    /// Behaves as if the host never granted audio recording.
    pub fn without_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    /// `stop_recording` reports an error (after releasing anyway).
    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn invocations(&self) -> usize {
        self.invocations
    }
}

impl AudioClassifier for ScriptedClassifier {
    fn start_recording(&mut self) -> Result<()> {
        if !self.permission_granted {
            return Err(ShakeError::PermissionDenied(
                "audio classifier needs RECORD_AUDIO permission".into(),
            ));
        }
        self.recording = true;
        Ok(())
    }

    fn classify(&mut self) -> Result<Vec<Category>> {
        if !self.recording {
            return Err(ShakeError::Classifier("classifier is not recording".into()));
        }
        self.invocations += 1;
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        let frame = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        log::debug!("scripted inference #{} -> {:?}", self.invocations, frame);
        Ok(frame)
    }

    fn stop_recording(&mut self) -> Result<()> {
        let was_recording = std::mem::replace(&mut self.recording, false);
        if self.fail_release && was_recording {
            return Err(ShakeError::Classifier(
                "could not release audio record, might be already released".into(),
            ));
        }
        Ok(())
    }
}
