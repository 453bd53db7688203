// Audio output using cpal
// Plays one mono buffer on the default device and reports when it drained

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig, SupportedStreamConfig};
use log::{debug, error};
use ringbuf::{HeapRb, traits::{Consumer, Producer, Split}};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::PlaybackError;

type RingConsumer = ringbuf::HeapCons<f32>;

/// Fires once playback has finished (or the device failed mid-way)
pub type Completion = oneshot::Receiver<Result<(), PlaybackError>>;

/// Lets the device drain its own buffer before the stream is dropped
const DRAIN_TAIL: Duration = Duration::from_millis(120);

/// Something that can turn a mono sample buffer into sound
pub trait AudioSink: Send + Sync {
    /// Start playing `samples` at `sample_rate`.
    ///
    /// Errors here mean the device could not be initialized; the returned
    /// receiver resolves when playback ends.
    fn start(&self, samples: Vec<f32>, sample_rate: u32) -> Result<Completion, PlaybackError>;
}

/// Default-device output backed by cpal
pub struct CpalSink {
    volume: f32, // 0.0-1.0, applied to every sample
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl CpalSink {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

impl AudioSink for CpalSink {
    fn start(&self, samples: Vec<f32>, sample_rate: u32) -> Result<Completion, PlaybackError> {
        let (init_tx, init_rx) = mpsc::sync_channel::<Result<(), PlaybackError>>(1);
        let (done_tx, done_rx) = oneshot::channel();
        let volume = self.volume;

        // cpal streams are not Send, so each playback owns a thread for its lifetime
        std::thread::Builder::new()
            .name("kotoba-playback".to_string())
            .spawn(move || {
                let output = match OneShotOutput::open(samples, sample_rate, volume) {
                    Ok(output) => output,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(()));
                let _ = done_tx.send(output.wait());
            })
            .map_err(|e| PlaybackError::Unavailable(format!("Failed to spawn output thread: {}", e)))?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(done_rx),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PlaybackError::Unavailable(
                "Output thread exited during setup".to_string(),
            )),
        }
    }
}

/// A running stream fed from a pre-filled ring buffer
struct OneShotOutput {
    _stream: Stream,
    drained: mpsc::Receiver<Result<(), PlaybackError>>,
}

impl OneShotOutput {
    fn open(samples: Vec<f32>, sample_rate: u32, volume: f32) -> Result<Self, PlaybackError> {
        let host = cpal::default_host();

        let device = host.default_output_device()
            .ok_or_else(|| PlaybackError::Unavailable("No output device available".to_string()))?;

        let supported = Self::pick_config(&device, sample_rate)?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let device_rate = config.sample_rate.0;
        let channels = config.channels as usize;

        let samples = if device_rate == sample_rate {
            samples
        } else {
            debug!("[Playback] Resampling {} Hz -> {} Hz", sample_rate, device_rate);
            resample(&samples, sample_rate, device_rate)?
        };

        // The whole clip fits in the buffer, so the writer never has to wait
        let rb = HeapRb::<f32>::new(samples.len().max(1));
        let (mut producer, consumer) = rb.split();
        producer.push_slice(&samples);

        let (drained_tx, drained) = mpsc::channel();

        let stream = match sample_format {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, channels, consumer, volume, drained_tx)?
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, channels, consumer, volume, drained_tx)?
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, channels, consumer, volume, drained_tx)?
            }
            format => {
                return Err(PlaybackError::Unavailable(format!(
                    "Unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream.play()
            .map_err(|e| PlaybackError::Unavailable(format!("Failed to start stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            drained,
        })
    }

    /// Prefer a config running at the clip's own rate; fall back to the device default
    fn pick_config(device: &cpal::Device, sample_rate: u32) -> Result<SupportedStreamConfig, PlaybackError> {
        let wanted = cpal::SampleRate(sample_rate);

        if let Ok(ranges) = device.supported_output_configs() {
            let mut matching: Vec<_> = ranges
                .filter(|r| r.min_sample_rate() <= wanted && wanted <= r.max_sample_rate())
                .filter(|r| {
                    matches!(r.sample_format(), SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
                })
                .collect();
            // F32 first
            matching.sort_by_key(|r| r.sample_format() != SampleFormat::F32);
            if let Some(range) = matching.into_iter().next() {
                return Ok(range.with_sample_rate(wanted));
            }
        }

        device.default_output_config()
            .map_err(|e| PlaybackError::Unavailable(format!("Failed to get default output config: {}", e)))
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        channels: usize,
        mut consumer: RingConsumer,
        volume: f32,
        drained_tx: mpsc::Sender<Result<(), PlaybackError>>,
    ) -> Result<Stream, PlaybackError> {
        let error_tx = drained_tx.clone();
        let mut signalled = false;

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Same mono sample on every channel of the frame
                for frame in data.chunks_mut(channels.max(1)) {
                    let value = match consumer.try_pop() {
                        Some(sample) => sample * volume,
                        None => {
                            if !signalled {
                                signalled = true;
                                let _ = drained_tx.send(Ok(()));
                            }
                            0.0
                        }
                    };
                    for sample in frame.iter_mut() {
                        *sample = T::from_sample(value);
                    }
                }
            },
            move |err| {
                error!("[Playback] Audio output error: {}", err);
                let _ = error_tx.send(Err(PlaybackError::Unavailable(err.to_string())));
            },
            None,
        ).map_err(|e| PlaybackError::Unavailable(format!("Failed to build output stream: {}", e)))?;

        Ok(stream)
    }

    /// Block until the buffer drained, then let the device play out its tail
    fn wait(self) -> Result<(), PlaybackError> {
        let result = self.drained.recv().unwrap_or_else(|_| {
            Err(PlaybackError::Unavailable("Output stream closed".to_string()))
        });
        if result.is_ok() {
            std::thread::sleep(DRAIN_TAIL);
        }
        result
    }
}

/// Convert a mono buffer between sample rates
fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, PlaybackError> {
    if samples.is_empty() || from == 0 || to == 0 {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to as f64 / from as f64;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| PlaybackError::Unavailable(format!("Failed to create resampler: {}", e)))?;

    let mut body = resampler
        .process(&[samples], None)
        .map_err(|e| PlaybackError::Unavailable(format!("Resampling failed: {}", e)))?;
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| PlaybackError::Unavailable(format!("Resampling failed: {}", e)))?;

    let mut mono = body.swap_remove(0);
    if let Some(rest) = tail.first() {
        mono.extend_from_slice(rest);
    }

    // Drop the filter delay and any padding past the expected length
    let delay = resampler.output_delay().min(mono.len());
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut out: Vec<f32> = mono.split_off(delay);
    out.truncate(expected);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_doubles_length() {
        let input: Vec<f32> = (0..2400).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        let output = resample(&input, 24_000, 48_000).unwrap();
        assert!(output.len() <= 4800);
        assert!(output.len() > 4000);
        assert!(output.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_volume_is_clamped() {
        assert_eq!(CpalSink::new(1.5).volume, 1.0);
        assert_eq!(CpalSink::new(-0.2).volume, 0.0);
        assert_eq!(CpalSink::default().volume, 1.0);
    }

    #[test]
    fn test_resample_empty_input() {
        assert!(resample(&[], 24_000, 48_000).unwrap().is_empty());
    }
}
