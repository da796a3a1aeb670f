//! AI visual generation.
//!
//! Clips are generated from text prompts through fal.ai's queue API
//! (text-to-video or text-to-image) and downloaded into the run's work
//! directory for assembly.

mod client;

pub use client::{
    clip_prompts, GenerationStatus, QueueResponse, VisualClient, VisualKind, DEFAULT_MODEL,
    FAL_API_BASE_URL, FAL_API_KEY_ENV,
};
