//! Turns a script into one narration track with speaker and word timings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::alignment::{estimate_word_timings, words_from_alignment, WordTiming};
use super::audio::{combine_segments, decode_to_pcm, normalize_peak, samples_duration, write_wav};
use super::tts::{Alignment, TtsClient};
use super::SpeechError;
use crate::config::SpeakerConfig;
use crate::interrupt::ctrlc_received;
use crate::script::Script;
use crate::service::ServiceError;

/// Who is talking, and when, on the narration track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerTiming {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
}

/// The finished narration track and its timings.
#[derive(Debug, Clone)]
pub struct Narration {
    pub wav_path: PathBuf,
    pub duration: f64,
    pub speaker_timings: Vec<SpeakerTiming>,
    pub word_timings: Vec<WordTiming>,
}

/// One decoded dialogue line waiting to be placed on the track.
struct VoicedLine {
    speaker: String,
    text: String,
    samples: Vec<i16>,
    alignment: Option<Alignment>,
    speed: f64,
}

/// Turns a script into a narration track.
pub struct Narrator {
    tts: TtsClient,
    speakers: Vec<SpeakerConfig>,
    pause_ms: u32,
}

impl Narrator {
    pub fn new(tts: TtsClient, speakers: Vec<SpeakerConfig>, pause_ms: u32) -> Self {
        Self {
            tts,
            speakers,
            pause_ms,
        }
    }

    fn speaker(&self, name: &str) -> Result<&SpeakerConfig, SpeechError> {
        self.speakers
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| SpeechError::UnknownSpeaker(name.to_string()))
    }

    /// Voice every line of `script`, join them, and write
    /// `<dir>/narration.wav`.
    pub async fn narrate(&self, script: &Script, dir: &Path) -> Result<Narration, SpeechError> {
        if script.dialogue.is_empty() {
            return Err(SpeechError::Empty);
        }

        let mut lines = Vec::with_capacity(script.dialogue.len());
        for (i, line) in script.dialogue.iter().enumerate() {
            if ctrlc_received() {
                return Err(ServiceError::Interrupted.into());
            }
            let voice = self.speaker(&line.speaker)?;
            log::info!(
                "Voicing line {}/{} ({})",
                i + 1,
                script.dialogue.len(),
                voice.name
            );
            let synthesis = self.tts.synthesize(&line.text, voice).await?;
            let speed = voice.speed as f64;
            let mut samples = decode_to_pcm(&synthesis.audio, speed).await?;
            normalize_peak(&mut samples);
            lines.push(VoicedLine {
                speaker: voice.name.clone(),
                text: line.text.clone(),
                samples,
                alignment: synthesis.alignment,
                speed,
            });
        }

        let (samples, speaker_timings, word_timings) = place_lines(lines, self.pause_ms);

        std::fs::create_dir_all(dir)?;
        let wav_path = dir.join("narration.wav");
        write_wav(&wav_path, &samples)?;

        let duration = samples_duration(samples.len());
        log::info!(
            "Narration: {:.2}s, {} segments, {} words",
            duration,
            speaker_timings.len(),
            word_timings.len()
        );

        Ok(Narration {
            wav_path,
            duration,
            speaker_timings,
            word_timings,
        })
    }
}

/// Lay voiced lines end to end and derive speaker and word timings.
fn place_lines(
    lines: Vec<VoicedLine>,
    pause_ms: u32,
) -> (Vec<i16>, Vec<SpeakerTiming>, Vec<WordTiming>) {
    let (segments, meta): (Vec<Vec<i16>>, Vec<_>) = lines
        .into_iter()
        .map(|l| (l.samples, (l.speaker, l.text, l.alignment, l.speed)))
        .unzip();
    let (samples, spans) = combine_segments(&segments, pause_ms);

    let mut speaker_timings = Vec::with_capacity(spans.len());
    let mut word_timings = Vec::new();
    for ((speaker, text, alignment, speed), (start, end)) in meta.into_iter().zip(spans) {
        let words = match alignment {
            Some(alignment) => words_from_alignment(&alignment, speed, start),
            None => estimate_word_timings(&text, start, end),
        };
        word_timings.extend(words.into_iter().map(|mut w| {
            w.start = w.start.min(end);
            w.end = w.end.min(end).max(w.start);
            w
        }));
        speaker_timings.push(SpeakerTiming {
            speaker,
            start,
            end,
        });
    }
    (samples, speaker_timings, word_timings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(speaker: &str, text: &str, seconds: f64) -> VoicedLine {
        VoicedLine {
            speaker: speaker.to_string(),
            text: text.to_string(),
            samples: vec![1; (seconds * 44_100.0) as usize],
            alignment: None,
            speed: 1.0,
        }
    }

    #[test]
    fn test_place_lines_speaker_timings_are_contiguous() {
        let (samples, speakers, _) = place_lines(
            vec![
                line("Peter", "hey there", 1.0),
                line("Stewie", "hello", 0.5),
                line("Peter", "bye", 0.5),
            ],
            200,
        );
        assert_eq!(speakers.len(), 3);
        assert_eq!(speakers[0].start, 0.0);
        for pair in speakers.windows(2) {
            assert!((pair[1].start - pair[0].end - 0.2).abs() < 1e-6);
        }
        let total = samples_duration(samples.len());
        assert!((total - (2.0 + 0.4)).abs() < 1e-6);
        assert!((speakers[2].end - total).abs() < 1e-6);
        assert_eq!(speakers[1].speaker, "Stewie");
    }

    #[test]
    fn test_place_lines_estimates_words_inside_segments() {
        let (_, speakers, words) = place_lines(
            vec![line("Peter", "hey there", 1.0), line("Stewie", "hello", 0.5)],
            200,
        );
        assert_eq!(words.len(), 3);
        assert!((words[2].start - speakers[1].start).abs() < 1e-6);
        assert!((words[2].end - speakers[1].end).abs() < 1e-6);
    }

    #[test]
    fn test_place_lines_uses_alignment_when_present() {
        let mut second = line("Stewie", "ok", 1.0);
        second.alignment = Some(Alignment {
            characters: vec!["o".into(), "k".into()],
            character_start_times_seconds: vec![0.0, 0.2],
            character_end_times_seconds: vec![0.2, 0.4],
        });
        second.speed = 2.0;
        let (_, speakers, words) = place_lines(vec![line("Peter", "a", 1.0), second], 200);
        let ok = &words[1];
        assert_eq!(ok.word, "ok");
        assert!((ok.start - speakers[1].start).abs() < 1e-6);
        assert!((ok.end - (speakers[1].start + 0.2)).abs() < 1e-6);
    }
}
