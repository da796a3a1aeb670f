//! Narration: text-to-speech per dialogue line, combined into one track
//! with speaker and word timings.

mod alignment;
mod audio;
mod narrator;
mod tts;

pub use alignment::{estimate_word_timings, words_from_alignment, WordTiming};
pub use audio::{
    combine_segments, decode_to_pcm, normalize_peak, samples_duration, write_wav, CHANNELS,
    SAMPLE_RATE,
};
pub use narrator::{Narration, Narrator, SpeakerTiming};
pub use tts::{Alignment, Synthesis, TtsClient, ELEVENLABS_API_BASE_URL, ELEVENLABS_API_KEY_ENV};

use crate::service::ServiceError;

/// Errors that can occur while producing narration.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Unknown speaker '{0}'")]
    UnknownSpeaker(String),

    #[error("Audio decode failed: {0}")]
    Decode(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Nothing to narrate")]
    Empty,
}
