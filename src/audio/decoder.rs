// Speech payload decoder
// Turns base64-encoded mono 16-bit little-endian PCM into normalized f32 samples

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::DecodeError;

/// Sample rate of the speech service output
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Scale mapping the signed 16-bit range onto [-1.0, 1.0)
const PCM16_SCALE: f32 = 32768.0;

/// A decoded, ready-to-play mono waveform
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length at the native sample rate
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Stateless PCM16 decoder bound to one sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioDecoder {
    sample_rate: u32,
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl AudioDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Get the sample rate of decoded audio
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode a transport payload into a waveform
    pub fn decode(&self, payload: &str) -> Result<DecodedAudio, DecodeError> {
        Ok(DecodedAudio {
            samples: decode_pcm16(payload)?,
            sample_rate: self.sample_rate,
        })
    }
}

/// Decode base64 PCM16 into samples in [-1.0, 1.0)
pub fn decode_pcm16(payload: &str) -> Result<Vec<f32>, DecodeError> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| DecodeError::MalformedPayload(format!("invalid base64: {}", e)))?;

    if bytes.len() % 2 != 0 {
        return Err(DecodeError::MalformedPayload(format!(
            "odd byte length {} cannot form 16-bit samples",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect())
}

/// Encode PCM16 samples into the transport format (inverse of [`decode_pcm16`])
pub fn encode_pcm16(samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}
