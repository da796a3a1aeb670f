//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::ClipKind;
use crate::config::Config;
use crate::request::validate_duration;

/// Parse and validate a duration in seconds (> 0)
fn parse_duration(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid number of seconds", s))?;
    validate_duration(secs).map_err(|e| e.to_string())?;
    Ok(secs)
}

/// Parse and validate a clip count (1-20)
fn parse_clips(s: &str) -> Result<u32, String> {
    let n: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid clip count", s))?;
    if !(1..=20).contains(&n) {
        return Err(format!("Clip count must be between 1 and 20, got {}", n));
    }
    Ok(n)
}

/// reelgen: turn a text prompt into a vertical video reel
#[derive(Parser, Debug)]
#[command(name = "reelgen")]
#[command(version, about = "Turn a text prompt into a vertical video reel", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Five AI clips with crossfades and background music
    reelgen generate \"robots learning to dance\" --music lofi

    # Narrated dialogue over a gameplay background
    reelgen generate \"why the sky is blue\" --narrate --background-dir ~/backgrounds

    # Narrate a hand-written script
    reelgen generate \"black holes\" --script dialogue.txt

    # One reel per line of a file
    reelgen generate --batch prompts.txt

ENVIRONMENT:
    FAL_API_KEY / REELGEN_API_KEY   Visual generation
    OPENAI_API_KEY                  Script writing (--narrate)
    ELEVENLABS_API_KEY              Speech (--narrate)")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path (default: ~/.config/reelgen/config.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a reel from a prompt
    Generate(GenerateArgs),
    /// Write a dialogue script for a topic and print it as JSON
    Script {
        /// Topic of the dialogue
        topic: String,
        /// Page whose text is given to the writer as context (repeatable)
        #[arg(long = "context-url", value_name = "URL")]
        context_urls: Vec<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Text describing the reel
    #[arg(required_unless_present = "batch")]
    pub prompt: Option<String>,

    /// File with one prompt per line (`#` starts a comment)
    #[arg(long, short = 'b', conflicts_with_all = ["prompt", "output", "script"])]
    pub batch: Option<PathBuf>,

    /// Visual style appended to the prompt
    #[arg(long, short)]
    pub style: Option<String>,

    /// Music file, or a track name in the configured music directory
    #[arg(long, short)]
    pub music: Option<String>,

    /// Reel length in seconds (ignored when narrating)
    #[arg(long, short, value_parser = parse_duration)]
    pub duration: Option<f64>,

    /// Output MP4 path (default: <output_dir>/final-<run id>.mp4)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Generate a spoken dialogue with word captions
    #[arg(long)]
    pub narrate: bool,

    /// Narrate this script instead of generating one (implies --narrate)
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Page whose text is given to the script writer (repeatable)
    #[arg(long = "context-url", value_name = "URL")]
    pub context_urls: Vec<String>,

    /// Use a random clip from this folder instead of generated visuals
    #[arg(long, value_name = "DIR")]
    pub background_dir: Option<PathBuf>,

    /// Number of generated clips
    #[arg(long, value_parser = parse_clips)]
    pub clips: Option<u32>,

    /// Generate videos or still images
    #[arg(long, value_enum)]
    pub kind: Option<ClipKind>,
}

impl GenerateArgs {
    /// Apply flag overrides on top of file and environment settings.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(style) = &self.style {
            config.style = Some(style.clone());
        }
        if let Some(music) = &self.music {
            config.music = Some(music.clone());
        }
        if let Some(duration) = self.duration {
            config.duration = duration;
        }
        if self.narrate || self.script.is_some() {
            config.narrate = true;
        }
        if let Some(dir) = &self.background_dir {
            config.visuals.background_dir = Some(dir.clone());
        }
        if let Some(clips) = self.clips {
            config.visuals.clips = clips;
        }
        if let Some(kind) = self.kind {
            config.visuals.kind = kind.into();
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Create default config file
    Init,
}
