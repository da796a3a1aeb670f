//! PCM decoding, normalization, concatenation and WAV output.

use std::path::Path;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::SpeechError;

/// Narration sample rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Narration is mono.
pub const CHANNELS: u16 = 1;

/// Peak level after normalization, in dBFS.
const PEAK_HEADROOM_DB: f64 = -0.1;

/// Build an `atempo` chain for `speed`. A single atempo stage only accepts
/// 0.5..=2.0, so larger changes are split into several stages.
fn atempo_chain(speed: f64) -> String {
    let mut remaining = speed;
    let mut stages = Vec::new();
    while remaining > 2.0 {
        stages.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    stages.push(format!("atempo={}", remaining));
    stages.join(",")
}

/// Spawn `cmd` with piped stdio, feed `input` to its stdin, and collect its
/// output. Stdout and stderr are drained together, so a chatty stderr can't
/// stall the child.
async fn run_with_input(mut cmd: Command, input: &[u8]) -> Result<Output, SpeechError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SpeechError::Decode(format!("failed to spawn {}: {}", program, e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| SpeechError::Decode(format!("{} stdin unavailable", program)))?;
    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        let result = stdin.write_all(&input).await;
        drop(stdin);
        result
    });

    let output = child.wait_with_output().await?;
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::debug!("{} closed stdin early: {}", program, e),
        Err(e) => log::debug!("stdin writer task failed: {}", e),
    }
    Ok(output)
}

/// Decode encoded audio to 44.1 kHz mono signed 16-bit samples with ffmpeg,
/// applying a tempo change of `speed` (1.0 leaves the tempo alone).
pub async fn decode_to_pcm(encoded: &[u8], speed: f64) -> Result<Vec<i16>, SpeechError> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0"]);
    if speed.is_finite() && speed > 0.0 && (speed - 1.0).abs() > f64::EPSILON {
        cmd.args(["-filter:a", &atempo_chain(speed)]);
    }
    cmd.args(["-f", "s16le", "-acodec", "pcm_s16le", "-ac", "1", "-ar"])
        .arg(SAMPLE_RATE.to_string())
        .arg("pipe:1");

    let output = run_with_input(cmd, encoded).await?;
    if !output.status.success() {
        return Err(SpeechError::Decode(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(output
        .stdout
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Scale samples so the loudest one sits just under full scale.
/// Silence is left untouched.
pub fn normalize_peak(samples: &mut [i16]) {
    let peak = samples
        .iter()
        .map(|s| (*s as i32).abs())
        .max()
        .unwrap_or(0);
    if peak == 0 {
        return;
    }
    let target = i16::MAX as f64 * 10f64.powf(PEAK_HEADROOM_DB / 20.0);
    let gain = target / peak as f64;
    for s in samples.iter_mut() {
        *s = (*s as f64 * gain)
            .round()
            .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
    }
}

/// Duration in seconds of `count` narration samples.
pub fn samples_duration(count: usize) -> f64 {
    count as f64 / SAMPLE_RATE as f64
}

/// Join segments with `pause_ms` of silence between them (none after the
/// last). Returns the combined samples and each segment's `(start, end)` in
/// seconds.
pub fn combine_segments(segments: &[Vec<i16>], pause_ms: u32) -> (Vec<i16>, Vec<(f64, f64)>) {
    let pause_samples = (SAMPLE_RATE as u64 * pause_ms as u64 / 1000) as usize;
    let total: usize = segments.iter().map(Vec::len).sum::<usize>()
        + pause_samples * segments.len().saturating_sub(1);

    let mut combined = Vec::with_capacity(total);
    let mut spans = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        let start = samples_duration(combined.len());
        combined.extend_from_slice(segment);
        spans.push((start, samples_duration(combined.len())));
        if i + 1 != segments.len() {
            combined.resize(combined.len() + pause_samples, 0);
        }
    }
    (combined, spans)
}

/// Write mono 16-bit PCM WAV.
pub fn write_wav(path: &Path, samples: &[i16]) -> Result<(), SpeechError> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
