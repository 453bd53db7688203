// Playback controller
// One active playback per controller; overlapping requests are rejected
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::audio::decoder::DecodedAudio;
use crate::audio::output::{AudioSink, Completion};
use crate::error::PlaybackError;

/// Releases the controller's slot when dropped
struct ActiveSlot(Arc<AtomicBool>);

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// An in-progress playback. Dropping it frees the controller early.
pub struct PlaybackHandle {
    completion: Completion,
    _slot: ActiveSlot,
}

impl PlaybackHandle {
    /// Wait until the clip has played to the end
    pub async fn finished(self) -> Result<(), PlaybackError> {
        let result = self.completion.await.unwrap_or_else(|_| {
            Err(PlaybackError::Unavailable("Audio output stopped unexpectedly".to_string()))
        });
        if let Err(e) = &result {
            warn!("[Playback] Playback failed: {}", e);
        }
        result
    }
}

/// Serializes playback for one widget (word card, sentence list, story, history row)
pub struct PlaybackController {
    name: &'static str,
    sink: Arc<dyn AudioSink>,
    active: Arc<AtomicBool>,
}

impl PlaybackController {
    pub fn new(name: &'static str, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            name,
            sink,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Claim the slot and hand the samples to the device.
    ///
    /// Fails with [`PlaybackError::Busy`] while a previous handle is alive.
    pub fn start(&self, samples: Vec<f32>, sample_rate: u32) -> Result<PlaybackHandle, PlaybackError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("[Playback] {} is busy, rejecting request", self.name);
            return Err(PlaybackError::Busy);
        }
        // From here on the slot is released on every exit path
        let slot = ActiveSlot(Arc::clone(&self.active));

        debug!(
            "[Playback] {} playing {} samples at {} Hz",
            self.name,
            samples.len(),
            sample_rate
        );
        let completion = self.sink.start(samples, sample_rate)?;

        Ok(PlaybackHandle {
            completion,
            _slot: slot,
        })
    }

    /// Play a buffer and resolve once it finished
    pub async fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<(), PlaybackError> {
        self.start(samples, sample_rate)?.finished().await
    }

    pub async fn play_decoded(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        self.play(audio.samples, audio.sample_rate).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    /// Sink that only finishes when the test says so
    #[derive(Default)]
    pub struct ManualSink {
        pending: Mutex<Vec<oneshot::Sender<Result<(), PlaybackError>>>>,
        pub started: Mutex<Vec<(usize, u32)>>,
        pub unavailable: AtomicBool,
    }

    impl ManualSink {
        pub fn finish_all(&self) {
            for tx in self.pending.lock().drain(..) {
                let _ = tx.send(Ok(()));
            }
        }

        pub fn start_count(&self) -> usize {
            self.started.lock().len()
        }
    }

    impl AudioSink for ManualSink {
        fn start(&self, samples: Vec<f32>, sample_rate: u32) -> Result<Completion, PlaybackError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(PlaybackError::Unavailable("test device missing".to_string()));
            }
            let (tx, rx) = oneshot::channel();
            self.started.lock().push((samples.len(), sample_rate));
            self.pending.lock().push(tx);
            Ok(rx)
        }
    }

    /// Sink that completes immediately
    #[derive(Default)]
    pub struct InstantSink {
        pub started: Mutex<Vec<(usize, u32)>>,
    }

    impl AudioSink for InstantSink {
        fn start(&self, samples: Vec<f32>, sample_rate: u32) -> Result<Completion, PlaybackError> {
            let (tx, rx) = oneshot::channel();
            self.started.lock().push((samples.len(), sample_rate));
            let _ = tx.send(Ok(()));
            Ok(rx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualSink;
    use super::*;

    #[tokio::test]
    async fn test_second_play_while_active_is_busy() {
        let sink = Arc::new(ManualSink::default());
        let controller = PlaybackController::new("word", sink.clone());

        let first = controller.start(vec![0.0; 10], 24_000).unwrap();
        assert!(controller.is_playing());
        assert!(matches!(
            controller.play(vec![0.0; 10], 24_000).await,
            Err(PlaybackError::Busy)
        ));

        sink.finish_all();
        first.finished().await.unwrap();
        assert!(!controller.is_playing());

        let second = controller.start(vec![0.0; 5], 24_000).unwrap();
        sink.finish_all();
        second.finished().await.unwrap();
        assert_eq!(sink.start_count(), 2);
    }

    #[tokio::test]
    async fn test_play_does_not_resolve_early() {
        let sink = Arc::new(ManualSink::default());
        let controller = Arc::new(PlaybackController::new("story", sink.clone()));

        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.play(vec![0.1; 4], 24_000).await })
        };

        // Let the task claim the slot
        while sink.start_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!task.is_finished());

        sink.finish_all();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_device_leaves_no_stuck_state() {
        let sink = Arc::new(ManualSink::default());
        sink.unavailable.store(true, Ordering::SeqCst);
        let controller = PlaybackController::new("sentence", sink.clone());

        assert!(matches!(
            controller.play(vec![0.0; 3], 24_000).await,
            Err(PlaybackError::Unavailable(_))
        ));
        assert!(!controller.is_playing());

        sink.unavailable.store(false, Ordering::SeqCst);
        let handle = controller.start(vec![0.0; 3], 24_000).unwrap();
        sink.finish_all();
        handle.finished().await.unwrap();
    }

    #[tokio::test]
    async fn test_controllers_are_independent() {
        let sink = Arc::new(ManualSink::default());
        let word = PlaybackController::new("word", sink.clone());
        let story = PlaybackController::new("story", sink.clone());

        let a = word.start(vec![0.0], 24_000).unwrap();
        let b = story.start(vec![0.0], 24_000).unwrap();
        sink.finish_all();
        a.finished().await.unwrap();
        b.finished().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sink_reports_unavailable() {
        struct DeadSink;
        impl AudioSink for DeadSink {
            fn start(&self, _: Vec<f32>, _: u32) -> Result<Completion, PlaybackError> {
                let (_tx, rx) = tokio::sync::oneshot::channel();
                Ok(rx)
            }
        }

        let controller = PlaybackController::new("history", Arc::new(DeadSink));
        assert!(matches!(
            controller.play(vec![0.0], 24_000).await,
            Err(PlaybackError::Unavailable(_))
        ));
        assert!(!controller.is_playing());
    }
}
