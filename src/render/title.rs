//! Title card text.

use super::captions::{wraps, TextMeasure};
use crate::config::TitleConfig;

/// Uppercase `title` and break it into lines at word boundaries so that no
/// line wraps inside the title box. Words never split; a word wider than
/// the box sits alone on its line.
pub fn format_title(title: &str, measure: &dyn TextMeasure, style: &TitleConfig) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in title.to_uppercase().split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if wraps(measure, &candidate, style.font_size, style.width, style.stroke_width) {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// How long the title stays up: `max_duration`, or the whole reel if shorter.
pub fn title_duration(style: &TitleConfig, reel_duration: f64) -> f64 {
    style.max_duration.min(reel_duration).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMeasure;

    impl TextMeasure for FixedMeasure {
        fn text_width(&self, text: &str, font_size: u32) -> f64 {
            text.chars().count() as f64 * font_size as f64
        }
    }

    fn style(width: u32) -> TitleConfig {
        TitleConfig {
            font_size: 10,
            stroke_width: 0,
            width,
            ..TitleConfig::default()
        }
    }

    #[test]
    fn test_format_title_wraps_on_words() {
        let lines = format_title("robots learn to dance", &FixedMeasure, &style(120));
        assert_eq!(lines, vec!["ROBOTS LEARN", "TO DANCE"]);
    }

    #[test]
    fn test_format_title_single_line() {
        let lines = format_title("  AI  news ", &FixedMeasure, &style(1000));
        assert_eq!(lines, vec!["AI NEWS"]);
    }

    #[test]
    fn test_format_title_keeps_long_word_whole() {
        let lines = format_title("a supercalifragilistic b", &FixedMeasure, &style(50));
        assert_eq!(lines, vec!["A", "SUPERCALIFRAGILISTIC", "B"]);
    }

    #[test]
    fn test_format_title_empty() {
        assert!(format_title("   ", &FixedMeasure, &style(100)).is_empty());
    }

    #[test]
    fn test_title_duration() {
        let s = TitleConfig::default();
        assert_eq!(title_duration(&s, 60.0), 15.0);
        assert_eq!(title_duration(&s, 9.5), 9.5);
    }
}
