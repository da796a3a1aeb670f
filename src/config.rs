//! Configuration file handling for reelgen.
//!
//! Loads configuration from `~/.config/reelgen/config.toml` or a custom path.
//! Files ending in `.json` are parsed as JSON, everything else as TOML.
//! Environment variables override file values; CLI flags override both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::request::{validate_duration, DEFAULT_DURATION_SECS};
use crate::visuals::VisualKind;

/// Generation-service API key; takes precedence over `FAL_API_KEY`.
pub const API_KEY_ENV: &str = "REELGEN_API_KEY";
pub const OUTPUT_DIR_ENV: &str = "REELGEN_OUTPUT_DIR";
pub const STYLE_ENV: &str = "REELGEN_STYLE";
pub const MUSIC_ENV: &str = "REELGEN_MUSIC";
pub const DURATION_ENV: &str = "REELGEN_DURATION";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory reels are written to when no output path is given
    pub output_dir: PathBuf,
    /// Visual style appended to the prompt
    pub style: Option<String>,
    /// Music track: a file path or a name looked up in `music.dir`
    pub music: Option<String>,
    /// Reel length in seconds when not narrated
    pub duration: f64,
    /// Generate a spoken dialogue with captions
    pub narrate: bool,
    /// Write timing JSON files next to the reel
    pub keep_artifacts: bool,
    pub video: VideoConfig,
    pub visuals: VisualsConfig,
    pub script: ScriptConfig,
    pub voice: VoiceConfig,
    pub speakers: Vec<SpeakerConfig>,
    pub music_mix: MusicConfig,
    pub captions: CaptionConfig,
    pub title: TitleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reels"),
            style: None,
            music: None,
            duration: DEFAULT_DURATION_SECS,
            narrate: false,
            keep_artifacts: true,
            video: VideoConfig::default(),
            visuals: VisualsConfig::default(),
            script: ScriptConfig::default(),
            voice: VoiceConfig::default(),
            speakers: default_speakers(),
            music_mix: MusicConfig::default(),
            captions: CaptionConfig::default(),
            title: TitleConfig::default(),
        }
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate: String,
    pub preset: String,
    pub threads: u32,
    /// Fade/crossfade length in seconds
    pub transition: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            bitrate: "6M".to_string(),
            preset: "medium".to_string(),
            threads: 4,
            transition: 0.5,
        }
    }
}

/// Text-to-video / text-to-image service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub kind: VisualKind,
    /// Number of generated clips, joined with crossfades
    pub clips: u32,
    /// Use a random stock video from this folder instead of generating
    pub background_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for VisualsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::visuals::FAL_API_BASE_URL.to_string(),
            model: crate::visuals::DEFAULT_MODEL.to_string(),
            kind: VisualKind::Video,
            clips: 1,
            background_dir: None,
            timeout_secs: 180,
        }
    }
}

/// Dialogue script generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Replaces the built-in system prompt
    pub system_prompt: Option<String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::script::OPENAI_API_BASE_URL.to_string(),
            model: crate::script::DEFAULT_MODEL.to_string(),
            system_prompt: None,
        }
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub output_format: String,
    /// Silence between speaker turns
    pub pause_ms: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::speech::ELEVENLABS_API_BASE_URL.to_string(),
            output_format: "mp3_44100_128".to_string(),
            pause_ms: 200,
        }
    }
}

/// Screen corner a speaker's image sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerSide {
    #[default]
    Left,
    Right,
}

/// One dialogue voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerConfig {
    pub name: String,
    pub voice_id: String,
    #[serde(default = "default_voice_model")]
    pub model_id: String,
    /// Playback speed multiplier applied after synthesis
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// PNG shown while this speaker talks
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub side: SpeakerSide,
}

fn default_voice_model() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_speed() -> f32 {
    1.2
}

fn default_speakers() -> Vec<SpeakerConfig> {
    vec![
        SpeakerConfig {
            name: "Host".to_string(),
            voice_id: "pNInz6obpgDQGcFmaJgB".to_string(),
            model_id: default_voice_model(),
            speed: default_speed(),
            image: None,
            side: SpeakerSide::Left,
        },
        SpeakerConfig {
            name: "Guest".to_string(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: default_voice_model(),
            speed: default_speed(),
            image: None,
            side: SpeakerSide::Right,
        },
    ]
}

/// Background music mixing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    /// Folder searched when `music` is a bare name
    pub dir: Option<PathBuf>,
    /// Gain applied to the music track (0.0-1.0)
    pub volume: f32,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            dir: None,
            volume: 0.15,
            fade_in: 1.0,
            fade_out: 2.0,
        }
    }
}

/// Word caption appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Font file; its folder is handed to libass
    pub font: Option<PathBuf>,
    pub font_name: String,
    pub font_size: u32,
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    /// Maximum caption line width in pixels
    pub width: u32,
    /// Seconds added to each caption start (negative = earlier)
    pub start_offset: f64,
    /// Landing zoom duration in seconds
    pub landing: f64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            font: None,
            font_name: "Arial".to_string(),
            font_size: 90,
            color: "yellow".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 2,
            width: 960,
            start_offset: -0.1,
            landing: 0.15,
        }
    }
}

/// Title card appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    pub font_size: u32,
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    pub width: u32,
    /// Longest time the title stays on screen
    pub max_duration: f64,
    pub margin_top: u32,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            font_size: 70,
            color: "white".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 3,
            width: 1000,
            max_duration: 15.0,
            margin_top: 120,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// With `None`, the default path is used and a missing file yields the
    /// default config. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::load_file(path)
            }
            None => {
                let path = default_path();
                if path.exists() {
                    Self::load_file(&path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path, &content)
    }

    /// Parse config text, choosing the format from the file extension.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let parsed = if is_json {
            serde_json::from_str(content).map_err(|e| e.to_string())
        } else {
            toml::from_str(content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::ParseError {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(API_KEY_ENV).or_else(|| get(crate::visuals::FAL_API_KEY_ENV)) {
            self.visuals.api_key = Some(key);
        }
        if let Some(key) = get(crate::script::OPENAI_API_KEY_ENV) {
            self.script.api_key = Some(key);
        }
        if let Some(key) = get(crate::speech::ELEVENLABS_API_KEY_ENV) {
            self.voice.api_key = Some(key);
        }
        if let Some(dir) = get(OUTPUT_DIR_ENV) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(style) = get(STYLE_ENV) {
            self.style = Some(style);
        }
        if let Some(music) = get(MUSIC_ENV) {
            self.music = Some(music);
        }
        if let Some(raw) = get(DURATION_ENV) {
            self.duration = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be a number of seconds, got '{}'",
                    DURATION_ENV, raw
                ))
            })?;
        }
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_duration(self.duration).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.video.width == 0 || self.video.height == 0 {
            return Err(ConfigError::Invalid(
                "video width and height must be greater than 0".to_string(),
            ));
        }
        if self.video.fps == 0 {
            return Err(ConfigError::Invalid("video fps must be greater than 0".to_string()));
        }
        if self.video.transition < 0.0 {
            return Err(ConfigError::Invalid("transition must not be negative".to_string()));
        }
        if self.visuals.clips == 0 {
            return Err(ConfigError::Invalid("visuals.clips must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.music_mix.volume) {
            return Err(ConfigError::Invalid(format!(
                "music volume must be between 0.0 and 1.0, got {}",
                self.music_mix.volume
            )));
        }
        if self.captions.font_size == 0 || self.captions.width == 0 {
            return Err(ConfigError::Invalid(
                "caption font size and width must be greater than 0".to_string(),
            ));
        }
        if self.narrate && self.speakers.is_empty() {
            return Err(ConfigError::Invalid(
                "narration needs at least one [[speakers]] entry".to_string(),
            ));
        }
        for speaker in &self.speakers {
            if !(speaker.speed.is_finite() && speaker.speed > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "speaker '{}' speed must be positive",
                    speaker.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a configured speaker by name, ignoring case.
    pub fn speaker(&self, name: &str) -> Option<&SpeakerConfig> {
        self.speakers
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    NotFound(PathBuf),
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        message: String,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(path) => {
                write!(f, "Config file '{}' does not exist", path.display())
            }
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, message } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    message
                )
            }
            ConfigError::Invalid(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("reelgen").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/reelgen/config.toml")
        })
}

/// Commented starter config written by `reelgen config init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# reelgen configuration

# Where reels are written (REELGEN_OUTPUT_DIR)
output_dir = "reels"
# Visual style appended to every prompt (REELGEN_STYLE)
# style = "cinematic"
# Music file path, or a name looked up in [music_mix].dir (REELGEN_MUSIC)
# music = "lofi"
# Reel length in seconds when not narrated (REELGEN_DURATION)
duration = 15.0
# Generate a spoken dialogue with word captions
narrate = false

[video]
width = 1080
height = 1920
fps = 30
bitrate = "6M"

[visuals]
# api_key = "..."        # or REELGEN_API_KEY / FAL_API_KEY
model = "fal-ai/fast-svd-lcm"
kind = "video"           # video | image
clips = 1
# background_dir = "background-videos"

[script]
# api_key = "..."        # or OPENAI_API_KEY
model = "o3"

[voice]
# api_key = "..."        # or ELEVENLABS_API_KEY
pause_ms = 200

[[speakers]]
name = "Host"
voice_id = "pNInz6obpgDQGcFmaJgB"
speed = 1.2
side = "left"
# image = "pngs/host.png"

[[speakers]]
name = "Guest"
voice_id = "21m00Tcm4TlvDq8ikWAM"
speed = 1.2
side = "right"

[music_mix]
# dir = "music"
volume = 0.15

[captions]
# font = "fonts/MyFont.ttf"
font_name = "Arial"
font_size = 90
color = "yellow"
"#;
