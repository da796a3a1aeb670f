//! ASS subtitle document for captions and the title card.
//!
//! ffmpeg's `subtitles` filter (libass) burns the document into the video,
//! so caption styling, per-chunk font sizes and the landing zoom all live
//! here as ASS styles and override tags.

use std::fmt::Write as _;

use super::captions::Caption;
use super::effects::landing_tags;
use super::RenderError;
use crate::config::{CaptionConfig, TitleConfig};

/// Numpad-style ASS alignments.
const ALIGN_MIDDLE_CENTER: u8 = 5;
const ALIGN_TOP_CENTER: u8 = 8;

/// Convert a color name or `#RRGGBB` to ASS `&HAABBGGRR` form.
pub fn ass_color(color: &str) -> Result<String, RenderError> {
    let value = color.trim().to_lowercase();
    let (r, g, b) = match value.as_str() {
        "white" => (255, 255, 255),
        "black" => (0, 0, 0),
        "yellow" => (255, 255, 0),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "cyan" => (0, 255, 255),
        "magenta" => (255, 0, 255),
        "orange" => (255, 165, 0),
        "pink" => (255, 192, 203),
        "purple" => (128, 0, 128),
        "gray" | "grey" => (128, 128, 128),
        hex => parse_hex(hex).ok_or_else(|| RenderError::InvalidColor(color.to_string()))?,
    };
    Ok(format!("&H00{:02X}{:02X}{:02X}", b, g, r))
}

fn parse_hex(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// ASS timestamp `H:MM:SS.cc`.
pub fn ass_time(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    format!(
        "{}:{:02}:{:02}.{:02}",
        centis / 360_000,
        (centis / 6_000) % 60,
        (centis / 100) % 60,
        centis % 100
    )
}

/// Keep text literal: braces would open override blocks and backslashes
/// would start tags.
fn escape_text(text: &str) -> String {
    text.replace('\\', "/").replace('{', "(").replace('}', ")")
}

/// Subtitle track for one reel.
#[derive(Debug, Clone)]
pub struct SubtitleTrack<'a> {
    pub width: u32,
    pub height: u32,
    pub captions_style: &'a CaptionConfig,
    pub title_style: &'a TitleConfig,
    pub captions: &'a [Caption],
    /// Title lines and how long they stay up
    pub title: Option<(&'a [String], f64)>,
}

impl SubtitleTrack<'_> {
    /// Render the complete `.ass` document.
    pub fn to_ass(&self) -> Result<String, RenderError> {
        let cap = self.captions_style;
        let title = self.title_style;
        let mut out = String::new();

        let _ = writeln!(out, "[Script Info]");
        let _ = writeln!(out, "ScriptType: v4.00+");
        let _ = writeln!(out, "PlayResX: {}", self.width);
        let _ = writeln!(out, "PlayResY: {}", self.height);
        let _ = writeln!(out, "WrapStyle: 2");
        let _ = writeln!(out, "ScaledBorderAndShadow: yes");
        let _ = writeln!(out);

        let _ = writeln!(out, "[V4+ Styles]");
        let _ = writeln!(
            out,
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, \
Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
        );
        let side_margin = |box_width: u32| self.width.saturating_sub(box_width) / 2;
        let _ = writeln!(
            out,
            "Style: Caption,{},{},{},&H000000FF,{},&H00000000,-1,0,0,0,100,100,0,0,1,{},0,{},{},{},0,1",
            cap.font_name,
            cap.font_size,
            ass_color(&cap.color)?,
            ass_color(&cap.stroke_color)?,
            cap.stroke_width,
            ALIGN_MIDDLE_CENTER,
            side_margin(cap.width),
            side_margin(cap.width),
        );
        let _ = writeln!(
            out,
            "Style: Title,{},{},{},&H000000FF,{},&H00000000,-1,0,0,0,100,100,0,0,1,{},0,{},{},{},{},1",
            cap.font_name,
            title.font_size,
            ass_color(&title.color)?,
            ass_color(&title.stroke_color)?,
            title.stroke_width,
            ALIGN_TOP_CENTER,
            side_margin(title.width),
            side_margin(title.width),
            title.margin_top,
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "[Events]");
        let _ = writeln!(
            out,
            "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
        );

        if let Some((lines, duration)) = self.title {
            if !lines.is_empty() && duration > 0.0 {
                let text = lines
                    .iter()
                    .map(|l| escape_text(l))
                    .collect::<Vec<_>>()
                    .join("\\N");
                let _ = writeln!(
                    out,
                    "Dialogue: 1,{},{},Title,,0,0,0,,{}",
                    ass_time(0.0),
                    ass_time(duration),
                    text
                );
            }
        }

        let landing = landing_tags(cap.landing);
        for caption in self.captions {
            if caption.end <= caption.start {
                continue;
            }
            let _ = writeln!(
                out,
                "Dialogue: 0,{},{},Caption,,0,0,0,,{{\\fs{}{}}}{}",
                ass_time(caption.start),
                ass_time(caption.end),
                caption.font_size,
                landing,
                escape_text(&caption.text)
            );
        }
        Ok(out)
    }
}
