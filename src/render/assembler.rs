//! Builds the ffmpeg command that composites and exports a reel.

use std::path::{Path, PathBuf};

use super::background::vertical_filter;
use super::effects::{audio_fades, clip_slots, video_fades, xfade_chain};
use super::ffmpeg::run_ffmpeg;
use super::overlays::{overlay_filter, OverlaySpec};
use super::RenderError;
use crate::config::{MusicConfig, VideoConfig};
use crate::speech::SAMPLE_RATE;
use crate::visuals::VisualKind;

/// Where the picture comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Visuals {
    /// Stock footage, starting `start` seconds in
    Background { path: PathBuf, start: f64 },
    /// Generated clips, crossfaded in order
    Clips { paths: Vec<PathBuf>, kind: VisualKind },
}

/// Everything that goes into one reel.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub visuals: Visuals,
    /// Output length in seconds
    pub duration: f64,
    pub narration: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub overlays: Vec<OverlaySpec>,
    /// ASS file, relative to the render directory
    pub subtitles: Option<PathBuf>,
    /// Extra fonts for the subtitles filter, relative to the render directory
    pub fonts_dir: Option<PathBuf>,
    pub output: PathBuf,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Assembly {
    /// The full ffmpeg argument list.
    ///
    /// Inputs are numbered visuals first, then narration, music, and
    /// overlay images.
    pub fn ffmpeg_args(&self, video: &VideoConfig, music: &MusicConfig) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];
        let mut filters: Vec<String> = Vec::new();
        let mut next_input = 0usize;
        let duration = self.duration;
        let fps = video.fps;
        let vertical = vertical_filter(video.width, video.height);

        match &self.visuals {
            Visuals::Background { path, start } => {
                args.extend([
                    "-stream_loop".into(),
                    "-1".into(),
                    "-ss".into(),
                    format!("{:.3}", start),
                    "-i".into(),
                    path_arg(path),
                ]);
                filters.push(format!(
                    "[{}:v]{},fps={},trim=duration={:.3},setpts=PTS-STARTPTS[base]",
                    next_input, vertical, fps, duration
                ));
                next_input += 1;
            }
            Visuals::Clips { paths, kind } => {
                let slots = clip_slots(paths.len(), duration, video.transition);
                let mut labels = Vec::with_capacity(paths.len());
                for path in paths {
                    match kind {
                        VisualKind::Video => {
                            args.extend(["-stream_loop".into(), "-1".into()]);
                        }
                        VisualKind::Image => {
                            args.extend([
                                "-loop".into(),
                                "1".into(),
                                "-framerate".into(),
                                fps.to_string(),
                            ]);
                        }
                    }
                    args.extend(["-i".into(), path_arg(path)]);
                    let label = format!("c{}", next_input);
                    filters.push(format!(
                        "[{}:v]{},fps={},trim=duration={:.3},setpts=PTS-STARTPTS[{}]",
                        next_input, vertical, fps, slots.segment, label
                    ));
                    labels.push(label);
                    next_input += 1;
                }
                filters.push(xfade_chain(&labels, &slots, "base"));
            }
        }

        let mut current = "base".to_string();
        if let Some(fades) = video_fades(duration, video.transition) {
            filters.push(format!("[{}]{}[faded]", current, fades));
            current = "faded".to_string();
        }

        let narration_input = self.narration.as_ref().map(|path| {
            args.extend(["-i".into(), path_arg(path)]);
            next_input += 1;
            next_input - 1
        });
        let music_input = self.music.as_ref().map(|path| {
            args.extend(["-stream_loop".into(), "-1".into(), "-i".into(), path_arg(path)]);
            next_input += 1;
            next_input - 1
        });

        for (k, spec) in self.overlays.iter().enumerate() {
            args.extend(["-i".into(), path_arg(&spec.image)]);
            let out = format!("ov{}", k);
            filters.push(overlay_filter(spec, next_input, video.height, &current, &out));
            current = out;
            next_input += 1;
        }

        if let Some(ass) = &self.subtitles {
            let fonts = self
                .fonts_dir
                .as_ref()
                .map(|dir| format!(":fontsdir={}", path_arg(dir)))
                .unwrap_or_default();
            filters.push(format!(
                "[{}]subtitles=filename={}{}[subbed]",
                current,
                path_arg(ass),
                fonts
            ));
            current = "subbed".to_string();
        }
        filters.push(format!("[{}]format=yuv420p[vout]", current));

        let stereo = format!(
            "aformat=sample_rates={}:channel_layouts=stereo",
            SAMPLE_RATE
        );
        if let Some(idx) = narration_input {
            filters.push(format!("[{}:a]{}[voice]", idx, stereo));
        }
        if let Some(idx) = music_input {
            let mut chain = format!(
                "[{}:a]{},volume={:.3},atrim=duration={:.3}",
                idx, stereo, music.volume, duration
            );
            if let Some(fades) = audio_fades(duration, music.fade_in, music.fade_out) {
                chain.push(',');
                chain.push_str(&fades);
            }
            chain.push_str("[music]");
            filters.push(chain);
        }
        let audio_label = match (narration_input, music_input) {
            (Some(_), Some(_)) => {
                filters.push(
                    "[voice][music]amix=inputs=2:duration=first:normalize=0[aout]".to_string(),
                );
                Some("aout")
            }
            (Some(_), None) => Some("voice"),
            (None, Some(_)) => Some("music"),
            (None, None) => None,
        };

        args.extend(["-filter_complex".into(), filters.join(";")]);
        args.extend(["-map".into(), "[vout]".into()]);
        if let Some(label) = audio_label {
            args.extend(["-map".into(), format!("[{}]", label)]);
        }

        args.extend([
            "-t".into(),
            format!("{:.3}", duration),
            "-r".into(),
            fps.to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            video.preset.clone(),
            "-b:v".into(),
            video.bitrate.clone(),
            "-threads".into(),
            video.threads.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]);
        if audio_label.is_some() {
            args.extend([
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                "192k".into(),
                "-ar".into(),
                SAMPLE_RATE.to_string(),
            ]);
        } else {
            args.push("-an".into());
        }
        args.extend([
            "-movflags".into(),
            "+faststart".into(),
            "-fps_mode".into(),
            "cfr".into(),
            path_arg(&self.output),
        ]);
        args
    }

    /// Run ffmpeg on a blocking thread inside `cwd`.
    pub async fn render(
        &self,
        video: &VideoConfig,
        music: &MusicConfig,
        cwd: &Path,
    ) -> Result<(), RenderError> {
        let args = self.ffmpeg_args(video, music);
        let cwd = cwd.to_path_buf();
        log::info!(
            "Rendering {:.1}s reel to {}",
            self.duration,
            self.output.display()
        );
        tokio::task::spawn_blocking(move || run_ffmpeg(&args, Some(&cwd)))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeakerSide;

    fn filter_graph(args: &[String]) -> &str {
        let pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        &args[pos + 1]
    }

    fn assembly(visuals: Visuals) -> Assembly {
        Assembly {
            visuals,
            duration: 20.0,
            narration: None,
            music: None,
            overlays: Vec::new(),
            subtitles: None,
            fonts_dir: None,
            output: PathBuf::from("/out/final.mp4"),
        }
    }

    #[test]
    fn test_background_with_narration_overlay_and_captions() {
        let mut a = assembly(Visuals::Background {
            path: PathBuf::from("/bg/minecraft.mp4"),
            start: 12.25,
        });
        a.narration = Some(PathBuf::from("/work/narration.wav"));
        a.overlays = vec![OverlaySpec {
            speaker: "Peter".to_string(),
            image: PathBuf::from("/img/peter.png"),
            side: SpeakerSide::Left,
            windows: vec![(0.0, 4.0)],
        }];
        a.subtitles = Some(PathBuf::from("captions.ass"));
        a.fonts_dir = Some(PathBuf::from("fonts"));

        let args = a.ffmpeg_args(&VideoConfig::default(), &MusicConfig::default());
        let joined = args.join(" ");
        assert!(joined.starts_with(
            "-hide_banner -y -stream_loop -1 -ss 12.250 -i /bg/minecraft.mp4 -i /work/narration.wav -i /img/peter.png"
        ));

        let graph = filter_graph(&args);
        assert!(graph.contains("[0:v]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,setsar=1,fps=30,trim=duration=20.000"));
        assert!(graph.contains("[base]fade=t=in:st=0:d=0.500,fade=t=out:st=19.500:d=0.500[faded]"));
        assert!(graph.contains("[2:v]scale=-1:768,format=rgba[img2];[faded][img2]overlay=x=0:"));
        assert!(graph.contains("[ov0]subtitles=filename=captions.ass:fontsdir=fonts[subbed]"));
        assert!(graph.contains("[subbed]format=yuv420p[vout]"));
        assert!(graph.contains("[1:a]aformat=sample_rates=44100:channel_layouts=stereo[voice]"));
        assert!(!graph.contains("amix"));

        assert!(joined.contains("-map [vout] -map [voice]"));
        assert!(joined.contains("-c:v libx264 -preset medium -b:v 6M -threads 4"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.ends_with("-movflags +faststart -fps_mode cfr /out/final.mp4"));
    }

    #[test]
    fn test_clips_crossfade_and_music_only() {
        let mut a = assembly(Visuals::Clips {
            paths: vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")],
            kind: VisualKind::Video,
        });
        a.music = Some(PathBuf::from("/music/lofi.mp3"));

        let args = a.ffmpeg_args(&VideoConfig::default(), &MusicConfig::default());
        let joined = args.join(" ");
        assert!(joined.contains("-stream_loop -1 -i a.mp4 -stream_loop -1 -i b.mp4 -stream_loop -1 -i /music/lofi.mp3"));

        let graph = filter_graph(&args);
        assert!(graph.contains("trim=duration=10.250,setpts=PTS-STARTPTS[c0]"));
        assert!(graph.contains("[c0][c1]xfade=transition=fade:duration=0.500:offset=9.750[base]"));
        assert!(graph.contains(
            "[2:a]aformat=sample_rates=44100:channel_layouts=stereo,volume=0.150,atrim=duration=20.000,\
afade=t=in:st=0:d=1.000,afade=t=out:st=18.000:d=2.000[music]"
        ));
        assert!(joined.contains("-map [vout] -map [music]"));
    }

    #[test]
    fn test_narration_and_music_are_mixed() {
        let mut a = assembly(Visuals::Background {
            path: PathBuf::from("bg.mp4"),
            start: 0.0,
        });
        a.narration = Some(PathBuf::from("n.wav"));
        a.music = Some(PathBuf::from("m.mp3"));
        let args = a.ffmpeg_args(&VideoConfig::default(), &MusicConfig::default());
        assert!(filter_graph(&args)
            .contains("[voice][music]amix=inputs=2:duration=first:normalize=0[aout]"));
        assert!(args.join(" ").contains("-map [aout]"));
    }

    #[test]
    fn test_image_clips_without_audio() {
        let a = assembly(Visuals::Clips {
            paths: vec![PathBuf::from("still.png")],
            kind: VisualKind::Image,
        });
        let args = a.ffmpeg_args(&VideoConfig::default(), &MusicConfig::default());
        let joined = args.join(" ");
        assert!(joined.contains("-loop 1 -framerate 30 -i still.png"));
        assert!(filter_graph(&args).contains("[c0]null[base]"));
        assert!(joined.contains(" -an "));
        assert!(!joined.contains("-c:a"));
    }
}
