//! Prompt, generation request, and reel output types.

use std::path::{Path, PathBuf};

/// Errors raised while validating a generation request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("Empty prompt")]
    EmptyPrompt,

    #[error("Duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f64),
}

/// The text describing the desired video content.
///
/// Always holds trimmed, non-empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    /// Validate and wrap prompt text.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::EmptyPrompt` for empty or whitespace-only text.
    pub fn new(text: &str) -> Result<Self, RequestError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RequestError::EmptyPrompt);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the prompt with an optional visual style appended.
    pub fn styled(&self, style: Option<&str>) -> String {
        match style.map(str::trim).filter(|s| !s.is_empty()) {
            Some(style) => format!("{}, {} style", self.0, style),
            None => self.0.clone(),
        }
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default reel length when nothing else decides it (seconds).
pub const DEFAULT_DURATION_SECS: f64 = 15.0;

/// One reel's worth of input: the prompt plus the per-run options.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    pub style: Option<String>,
    pub music: Option<String>,
    pub duration: f64,
    pub output: Option<PathBuf>,
}

impl GenerationRequest {
    pub fn new(prompt: Prompt) -> Self {
        Self {
            prompt,
            style: None,
            music: None,
            duration: DEFAULT_DURATION_SECS,
            output: None,
        }
    }

    pub fn with_style(mut self, style: Option<String>) -> Self {
        self.style = style;
        self
    }

    pub fn with_music(mut self, music: Option<String>) -> Self {
        self.music = music;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Check the request invariants.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::InvalidDuration` unless duration is finite and > 0.
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_duration(self.duration)
    }

    /// Where the reel will be written: the explicit output path, or
    /// `<output_dir>/final-<run_id>.mp4`.
    pub fn output_path(&self, output_dir: &Path, run_id: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| output_dir.join(format!("final-{}.mp4", run_id)))
    }
}

/// Validate a duration in seconds.
pub fn validate_duration(duration: f64) -> Result<(), RequestError> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(RequestError::InvalidDuration(duration))
    }
}

/// Unique-per-second run identifier from the local clock.
pub fn run_id() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// The finished output of one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Reel {
    pub path: PathBuf,
    pub run_id: String,
    pub duration: f64,
    /// Script title, when the reel was narrated
    pub title: Option<String>,
    /// Timing JSON files written next to the reel
    pub artifacts: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_rejects_empty() {
        assert_eq!(Prompt::new(""), Err(RequestError::EmptyPrompt));
        assert_eq!(Prompt::new("  \n\t "), Err(RequestError::EmptyPrompt));
    }

    #[test]
    fn test_prompt_is_trimmed() {
        let prompt = Prompt::new("  neon city at night ").unwrap();
        assert_eq!(prompt.as_str(), "neon city at night");
    }

    #[test]
    fn test_prompt_styled() {
        let prompt = Prompt::new("a fox in snow").unwrap();
        assert_eq!(prompt.styled(None), "a fox in snow");
        assert_eq!(prompt.styled(Some("  ")), "a fox in snow");
        assert_eq!(
            prompt.styled(Some("watercolor")),
            "a fox in snow, watercolor style"
        );
    }

    #[test]
    fn test_duration_must_be_positive() {
        let prompt = Prompt::new("x").unwrap();
        assert!(GenerationRequest::new(prompt.clone()).validate().is_ok());
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let req = GenerationRequest::new(prompt.clone()).with_duration(bad);
            assert!(matches!(
                req.validate(),
                Err(RequestError::InvalidDuration(_))
            ));
        }
    }

    #[test]
    fn test_output_path_default_and_explicit() {
        let prompt = Prompt::new("x").unwrap();
        let req = GenerationRequest::new(prompt);
        assert_eq!(
            req.output_path(Path::new("/tmp/reels"), "20250101120000"),
            PathBuf::from("/tmp/reels/final-20250101120000.mp4")
        );

        let req = req.with_output(Some(PathBuf::from("out/my.mp4")));
        assert_eq!(
            req.output_path(Path::new("/tmp/reels"), "20250101120000"),
            PathBuf::from("out/my.mp4")
        );
    }

    #[test]
    fn test_run_id_format() {
        let id = run_id();
        assert_eq!(id.len(), 14);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }
}
