//! Word captions: grouping timed words into on-screen chunks.

use crate::config::CaptionConfig;
use crate::speech::{SpeakerTiming, WordTiming};

/// Smallest font a single-word caption shrinks to.
pub const MIN_FONT_SIZE: u32 = 20;

/// Font size decrement while shrinking a single-word caption.
pub const FONT_STEP: u32 = 15;

/// Measures rendered text width.
pub trait TextMeasure {
    /// Width in pixels of `text` set on one line at `font_size`.
    fn text_width(&self, text: &str, font_size: u32) -> f64;
}

/// Width estimate from per-character advance classes, tuned for bold sans
/// capitals. Errs wide so captions stay inside their box.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMeasure;

impl HeuristicMeasure {
    fn advance(c: char) -> f64 {
        match c {
            ' ' => 0.28,
            'I' | 'J' | 'i' | 'j' | 'l' | '1' | '.' | ',' | '\'' | '!' | ':' | ';' | '|' => 0.32,
            'M' | 'W' | 'm' | 'w' | '@' => 0.92,
            c if c.is_ascii_lowercase() => 0.58,
            _ => 0.70,
        }
    }
}

impl TextMeasure for HeuristicMeasure {
    fn text_width(&self, text: &str, font_size: u32) -> f64 {
        text.chars().map(Self::advance).sum::<f64>() * font_size as f64
    }
}

/// Whether `text` would wrap inside a box `width` pixels wide.
pub fn wraps(measure: &dyn TextMeasure, text: &str, font_size: u32, width: u32, stroke: u32) -> bool {
    measure.text_width(text, font_size) + 2.0 * stroke as f64 > width as f64
}

/// The speaker talking at `time`; intervals are half-open `[start, end)`.
pub fn speaker_at(timings: &[SpeakerTiming], time: f64) -> Option<&str> {
    timings
        .iter()
        .find(|t| t.start <= time && time < t.end)
        .map(|t| t.speaker.as_str())
}

/// Words shown together on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionChunk {
    pub words: Vec<String>,
    pub start: f64,
    pub end: f64,
    pub speaker: Option<String>,
}

impl CaptionChunk {
    /// Display text: words joined by spaces, uppercased.
    pub fn text(&self) -> String {
        self.words.join(" ").to_uppercase()
    }
}

/// Group words into chunks.
///
/// A chunk ends when the speaker changes or when the next word would make
/// the uppercased line wrap at the configured font size and width. A word
/// that cannot fit even alone still gets its own chunk.
pub fn chunk_words(
    words: &[WordTiming],
    speakers: &[SpeakerTiming],
    measure: &dyn TextMeasure,
    style: &CaptionConfig,
) -> Vec<CaptionChunk> {
    let mut chunks = Vec::new();
    let mut current: Option<CaptionChunk> = None;

    for word in words {
        let speaker = speaker_at(speakers, word.start).map(str::to_string);

        if let Some(chunk) = current.take() {
            let mut candidate = chunk.words.clone();
            candidate.push(word.word.clone());
            let test_text = candidate.join(" ").to_uppercase();

            if chunk.speaker != speaker
                || wraps(measure, &test_text, style.font_size, style.width, style.stroke_width)
            {
                chunks.push(chunk);
            } else {
                current = Some(CaptionChunk {
                    words: candidate,
                    start: chunk.start,
                    end: word.end,
                    speaker: chunk.speaker,
                });
                continue;
            }
        }

        current = Some(CaptionChunk {
            words: vec![word.word.clone()],
            start: word.start,
            end: word.end,
            speaker,
        });
    }

    chunks.extend(current);
    chunks
}

/// Font size for a single-word chunk: shrink by [`FONT_STEP`] until the word
/// fits, never below [`MIN_FONT_SIZE`].
pub fn single_word_font_size(text: &str, measure: &dyn TextMeasure, style: &CaptionConfig) -> u32 {
    let mut size = style.font_size;
    while size >= MIN_FONT_SIZE {
        if !wraps(measure, text, size, style.width, style.stroke_width) {
            return size;
        }
        if size < MIN_FONT_SIZE + FONT_STEP {
            break;
        }
        size -= FONT_STEP;
    }
    MIN_FONT_SIZE.min(style.font_size)
}

/// A caption ready to place on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub font_size: u32,
}

/// Chunk the words and position each chunk, applying the start offset.
pub fn build_captions(
    words: &[WordTiming],
    speakers: &[SpeakerTiming],
    measure: &dyn TextMeasure,
    style: &CaptionConfig,
) -> Vec<Caption> {
    chunk_words(words, speakers, measure, style)
        .into_iter()
        .map(|chunk| {
            let text = chunk.text();
            let font_size = if chunk.words.len() == 1 {
                single_word_font_size(&text, measure, style)
            } else {
                style.font_size
            };
            let start = (chunk.start + style.start_offset).max(0.0);
            let end = (chunk.end + style.start_offset).max(start);
            Caption {
                text,
                start,
                end,
                font_size,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is one em wide.
    struct FixedMeasure;

    impl TextMeasure for FixedMeasure {
        fn text_width(&self, text: &str, font_size: u32) -> f64 {
            text.chars().count() as f64 * font_size as f64
        }
    }

    fn style(font_size: u32, width: u32) -> CaptionConfig {
        CaptionConfig {
            font_size,
            width,
            stroke_width: 0,
            ..CaptionConfig::default()
        }
    }

    fn word(w: &str, start: f64, end: f64) -> WordTiming {
        WordTiming {
            word: w.to_string(),
            start,
            end,
        }
    }

    fn timing(s: &str, start: f64, end: f64) -> SpeakerTiming {
        SpeakerTiming {
            speaker: s.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_speaker_at_half_open() {
        let timings = vec![timing("Peter", 0.0, 1.0), timing("Stewie", 1.2, 2.0)];
        assert_eq!(speaker_at(&timings, 0.0), Some("Peter"));
        assert_eq!(speaker_at(&timings, 1.0), None);
        assert_eq!(speaker_at(&timings, 1.2), Some("Stewie"));
        assert_eq!(speaker_at(&timings, 2.0), None);
    }

    #[test]
    fn test_chunk_splits_on_width() {
        // 10px per char, 100px box: "AB CD EF" (80px) fits, adding "GH" does not
        let words = vec![
            word("ab", 0.0, 0.1),
            word("cd", 0.1, 0.2),
            word("ef", 0.2, 0.3),
            word("gh", 0.3, 0.4),
        ];
        let chunks = chunk_words(&words, &[], &FixedMeasure, &style(10, 100));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text(), "AB CD EF");
        assert_eq!(chunks[0].start, 0.0);
        assert_eq!(chunks[0].end, 0.3);
        assert_eq!(chunks[1].words, vec!["gh".to_string()]);
        assert_eq!(chunks[1].start, 0.3);
    }

    #[test]
    fn test_chunk_splits_on_speaker_change() {
        let speakers = vec![timing("Peter", 0.0, 1.0), timing("Stewie", 1.0, 2.0)];
        let words = vec![
            word("hi", 0.0, 0.5),
            word("there", 0.5, 0.9),
            word("hello", 1.0, 1.5),
        ];
        let chunks = chunk_words(&words, &speakers, &FixedMeasure, &style(1, 1000));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].speaker.as_deref(), Some("Peter"));
        assert_eq!(chunks[1].speaker.as_deref(), Some("Stewie"));
        assert_eq!(chunks[1].words, vec!["hello".to_string()]);
    }

    #[test]
    fn test_chunk_never_mixes_speakers_or_overflows() {
        let speakers = vec![timing("A", 0.0, 3.0), timing("B", 3.2, 6.0)];
        let words: Vec<WordTiming> = (0..24)
            .map(|i| {
                let t = i as f64 * 0.25;
                word(if i % 3 == 0 { "longword" } else { "a" }, t, t + 0.2)
            })
            .collect();
        let cfg = style(10, 120);
        let chunks = chunk_words(&words, &speakers, &FixedMeasure, &cfg);
        for chunk in &chunks {
            for w in &words {
                if w.start >= chunk.start && w.end <= chunk.end {
                    assert_eq!(speaker_at(&speakers, w.start).map(str::to_string), chunk.speaker);
                }
            }
            if chunk.words.len() > 1 {
                assert!(!wraps(&FixedMeasure, &chunk.text(), 10, 120, 0));
            }
        }
        let total: usize = chunks.iter().map(|c| c.words.len()).sum();
        assert_eq!(total, words.len());
    }

    #[test]
    fn test_oversized_word_gets_own_chunk() {
        let words = vec![word("a", 0.0, 0.1), word("enormous", 0.1, 0.2), word("b", 0.2, 0.3)];
        let chunks = chunk_words(&words, &[], &FixedMeasure, &style(10, 50));
        let texts: Vec<String> = chunks.iter().map(|c| c.text()).collect();
        assert_eq!(texts, vec!["A", "ENORMOUS", "B"]);
    }

    #[test]
    fn test_single_word_font_shrinks_in_steps() {
        // 8 chars at 1 em each; 400px box fits at 45 (360px) but not at 60 (480px)
        let cfg = style(90, 400);
        assert_eq!(single_word_font_size("ENORMOUS", &FixedMeasure, &cfg), 45);
        assert_eq!(single_word_font_size("HI", &FixedMeasure, &cfg), 90);
    }

    #[test]
    fn test_single_word_font_floor() {
        let cfg = style(90, 10);
        assert_eq!(single_word_font_size("ENORMOUS", &FixedMeasure, &cfg), MIN_FONT_SIZE);
    }

    #[test]
    fn test_single_word_font_always_in_range() {
        for width in (10..2000).step_by(37) {
            let cfg = style(90, width);
            let size = single_word_font_size("SUPERCALIFRAGILISTIC", &FixedMeasure, &cfg);
            assert!((MIN_FONT_SIZE..=90).contains(&size));
            assert!(size == MIN_FONT_SIZE || (90 - size) % FONT_STEP == 0);
        }
    }

    #[test]
    fn test_build_captions_applies_offset() {
        let words = vec![word("hello", 0.05, 0.5), word("world", 0.5, 1.0)];
        let mut cfg = style(10, 1000);
        cfg.start_offset = -0.1;
        let captions = build_captions(&words, &[], &FixedMeasure, &cfg);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].text, "HELLO WORLD");
        assert_eq!(captions[0].start, 0.0);
        assert!((captions[0].end - 0.9).abs() < 1e-9);
        assert_eq!(captions[0].font_size, 10);
    }

    #[test]
    fn test_heuristic_measure_orders_widths() {
        let m = HeuristicMeasure;
        assert!(m.text_width("WWW", 90) > m.text_width("III", 90));
        assert!(m.text_width("HELLO WORLD", 90) > m.text_width("HELLO", 90));
        assert_eq!(m.text_width("", 90), 0.0);
    }
}
