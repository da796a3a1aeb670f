//! Word-level timing from character alignment, or estimated from text.

use serde::{Deserialize, Serialize};

use super::tts::Alignment;

/// Pause assumed after a comma when estimating.
const COMMA_PAUSE: f64 = 0.20;

/// Pause assumed after sentence-ending punctuation when estimating.
const SENTENCE_END_PAUSE: f64 = 0.40;

/// Pauses may take at most this share of a segment.
const MAX_PAUSE_SHARE: f64 = 0.5;

/// A spoken word positioned on the narration track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Group character alignment into words.
///
/// Times are divided by `speed` (the tempo change applied after synthesis)
/// and shifted by `offset`, the segment's start on the combined track.
pub fn words_from_alignment(alignment: &Alignment, speed: f64, offset: f64) -> Vec<WordTiming> {
    let speed = if speed > 0.0 { speed } else { 1.0 };
    let mut words = Vec::new();
    let mut current = String::new();
    let mut start = 0.0;
    let mut end = 0.0;

    let chars = alignment
        .characters
        .iter()
        .zip(&alignment.character_start_times_seconds)
        .zip(&alignment.character_end_times_seconds);

    for ((ch, &ch_start), &ch_end) in chars {
        if ch.trim().is_empty() {
            if !current.is_empty() {
                words.push(WordTiming {
                    word: std::mem::take(&mut current),
                    start: offset + start / speed,
                    end: offset + end / speed,
                });
            }
            continue;
        }
        if current.is_empty() {
            start = ch_start;
        }
        current.push_str(ch);
        end = ch_end.max(start);
    }
    if !current.is_empty() {
        words.push(WordTiming {
            word: current,
            start: offset + start / speed,
            end: offset + end / speed,
        });
    }
    words
}

fn trailing_pause(word: &str) -> f64 {
    match word.chars().last() {
        Some(',') | Some(';') | Some(':') => COMMA_PAUSE,
        Some('.') | Some('!') | Some('?') => SENTENCE_END_PAUSE,
        _ => 0.0,
    }
}

/// Spread the words of `text` over `[start, end]`.
///
/// Used when the speech service returns no alignment. Each word gets time in
/// proportion to the square root of its length, and punctuation inserts a
/// short pause before the next word.
pub fn estimate_word_timings(text: &str, start: f64, end: f64) -> Vec<WordTiming> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let total = (end - start).max(0.0);
    if words.is_empty() {
        return Vec::new();
    }

    let pauses: Vec<f64> = words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i + 1 == words.len() {
                0.0
            } else {
                trailing_pause(w)
            }
        })
        .collect();
    let pause_total: f64 = pauses.iter().sum();
    let pause_scale = if pause_total > total * MAX_PAUSE_SHARE && pause_total > 0.0 {
        total * MAX_PAUSE_SHARE / pause_total
    } else {
        1.0
    };

    let speaking = total - pause_total * pause_scale;
    let weights: Vec<f64> = words
        .iter()
        .map(|w| (w.chars().count() as f64).sqrt())
        .collect();
    let weight_total: f64 = weights.iter().sum();

    let mut cursor = start;
    let mut timings = Vec::with_capacity(words.len());
    for ((word, weight), pause) in words.iter().zip(&weights).zip(&pauses) {
        let duration = if weight_total > 0.0 {
            speaking * weight / weight_total
        } else {
            0.0
        };
        timings.push(WordTiming {
            word: word.to_string(),
            start: cursor,
            end: cursor + duration,
        });
        cursor += duration + pause * pause_scale;
    }
    timings
}
