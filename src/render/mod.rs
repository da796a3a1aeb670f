//! Video assembly: footage, narration, music, captions, title, and speaker
//! overlays composited by ffmpeg into a vertical MP4.

pub mod assembler;
pub mod background;
pub mod captions;
pub mod effects;
pub mod ffmpeg;
pub mod overlays;
pub mod subtitles;
pub mod title;

use std::path::{Path, PathBuf};

pub use assembler::{Assembly, Visuals};
pub use ffmpeg::{probe_duration, FfmpegError};

/// Extensions tried when music is given by name.
pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "ogg"];

/// Errors that can occur while assembling a reel.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("No background MP4s found in {}", .0.display())]
    NoBackgrounds(PathBuf),

    #[error("Image for speaker '{speaker}' not found at {}", .path.display())]
    MissingImage { speaker: String, path: PathBuf },

    #[error("Music track '{0}' not found")]
    MusicNotFound(String),

    #[error("Unknown color '{0}' (use a color name or #RRGGBB)")]
    InvalidColor(String),

    #[error(transparent)]
    Ffmpeg(#[from] FfmpegError),

    #[error("Render task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve the music choice to a file.
///
/// An existing path is used as is; otherwise the name is looked up in
/// `music_dir`, bare or with each of [`MUSIC_EXTENSIONS`].
pub fn resolve_music(choice: &str, music_dir: Option<&Path>) -> Result<PathBuf, RenderError> {
    let direct = PathBuf::from(choice);
    if direct.is_file() {
        return Ok(direct);
    }
    if let Some(dir) = music_dir {
        let bare = dir.join(choice);
        if bare.is_file() {
            return Ok(bare);
        }
        for ext in MUSIC_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", choice, ext));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(RenderError::MusicNotFound(choice.to_string()))
}
