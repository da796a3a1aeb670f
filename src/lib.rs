//! reelgen library crate.
//!
//! Turns a text prompt into a short vertical video: configuration, the
//! generation-service clients, and the ffmpeg assembler, composed by
//! [`reel::ReelGenerator`].

pub mod cli;
pub mod config;
pub mod extract;
pub mod interrupt;
pub mod reel;
pub mod render;
pub mod request;
pub mod retry;
pub mod script;
pub mod service;
pub mod speech;
pub mod visuals;

pub use config::Config;
pub use reel::{ReelError, ReelGenerator};
pub use request::{GenerationRequest, Prompt, Reel};
