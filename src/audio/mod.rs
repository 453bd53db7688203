// Audio playback module
// Decodes speech payloads and plays them through cpal

pub mod decoder;
pub mod output;
pub mod player;

pub use decoder::{AudioDecoder, DecodedAudio};
pub use output::{AudioSink, CpalSink};
pub use player::{PlaybackController, PlaybackHandle};
