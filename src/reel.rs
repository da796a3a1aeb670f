//! Prompt-to-reel orchestration.

use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigError};
use crate::extract::{context_client, gather_context, script_input};
use crate::interrupt::ctrlc_received;
use crate::render::background::{pick_background, random_start};
use crate::render::captions::{build_captions, HeuristicMeasure};
use crate::render::subtitles::SubtitleTrack;
use crate::render::title::{format_title, title_duration};
use crate::render::{
    overlays::plan_overlays, probe_duration, resolve_music, Assembly,
    FfmpegError, RenderError, Visuals,
};
use crate::request::{run_id, GenerationRequest, Reel, RequestError};
use crate::script::{Script, ScriptClient, ScriptError};
use crate::service::ServiceError;
use crate::speech::{Narration, Narrator, SpeechError, TtsClient};
use crate::visuals::VisualClient;

/// Errors that can occur while generating a reel.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to write timings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted")]
    Interrupted,
}

impl ReelError {
    /// True when Ctrl+C stopped the run, wherever it was caught.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ReelError::Interrupted
                | ReelError::Service(ServiceError::Interrupted)
                | ReelError::Speech(SpeechError::Service(ServiceError::Interrupted))
                | ReelError::Render(RenderError::Ffmpeg(FfmpegError::Interrupted))
        )
    }
}

/// Generates reels from prompts with one configuration.
pub struct ReelGenerator {
    config: Config,
    script: Option<Script>,
    context_urls: Vec<String>,
}

impl ReelGenerator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            script: None,
            context_urls: Vec::new(),
        }
    }

    /// Narrate this script instead of generating one.
    pub fn with_script(mut self, script: Option<Script>) -> Self {
        self.script = script;
        self
    }

    /// Pages whose text is handed to the script writer as context.
    pub fn with_context_urls(mut self, urls: Vec<String>) -> Self {
        self.context_urls = urls;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Turn one request into a finished MP4.
    ///
    /// # Errors
    ///
    /// Fails on an invalid request or configuration, any service error, a
    /// render failure, or Ctrl+C.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Reel, ReelError> {
        request.validate()?;
        self.config.validate()?;

        let run_id = run_id();
        let output = std::path::absolute(request.output_path(&self.config.output_dir, &run_id))?;
        let output_dir = output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&output_dir)?;

        let work_dir = output_dir.join(format!(".reelgen-{}", run_id));
        std::fs::create_dir_all(&work_dir)?;
        log::info!("Run {}: \"{}\"", run_id, request.prompt);

        let result = self
            .build(request, &run_id, &output, &output_dir, &work_dir)
            .await;

        if let Err(e) = std::fs::remove_dir_all(&work_dir) {
            log::warn!("Could not remove {}: {}", work_dir.display(), e);
        }
        result
    }

    async fn build(
        &self,
        request: &GenerationRequest,
        run_id: &str,
        output: &Path,
        output_dir: &Path,
        work_dir: &Path,
    ) -> Result<Reel, ReelError> {
        let config = &self.config;

        let narrated = if config.narrate || self.script.is_some() {
            let script = self.script_for(request).await?;
            check_interrupt()?;
            let narration = self.narrate(&script, work_dir).await?;
            Some((script, narration))
        } else {
            None
        };
        check_interrupt()?;

        let duration = narrated
            .as_ref()
            .map(|(_, n)| n.duration)
            .unwrap_or(request.duration);

        let visuals = self.visuals(request, duration, work_dir).await?;
        check_interrupt()?;

        let music = request
            .music
            .as_deref()
            .or(config.music.as_deref())
            .map(|choice| resolve_music(choice, config.music_mix.dir.as_deref()))
            .transpose()?
            .map(std::path::absolute)
            .transpose()?;

        let mut assembly = Assembly {
            visuals,
            duration,
            narration: None,
            music,
            overlays: Vec::new(),
            subtitles: None,
            fonts_dir: None,
            output: output.to_path_buf(),
        };

        let mut title = None;
        let mut artifacts = Vec::new();
        if let Some((script, narration)) = &narrated {
            let title_text = if script.title.trim().is_empty() {
                request.prompt.to_string()
            } else {
                script.title.clone()
            };
            self.write_subtitles(&title_text, narration, duration, work_dir, &mut assembly)?;
            assembly.narration = Some(narration.wav_path.clone());
            assembly.overlays = plan_overlays(&narration.speaker_timings, &config.speakers)?
                .into_iter()
                .map(|mut spec| {
                    spec.image = std::path::absolute(&spec.image)?;
                    Ok::<_, std::io::Error>(spec)
                })
                .collect::<Result<_, _>>()?;
            title = Some(title_text);

            if config.keep_artifacts {
                artifacts = write_artifacts(output_dir, run_id, narration)?;
            }
        }

        assembly
            .render(&config.video, &config.music_mix, work_dir)
            .await?;
        log::info!("Reel written to {}", output.display());

        Ok(Reel {
            path: output.to_path_buf(),
            run_id: run_id.to_string(),
            duration,
            title,
            artifacts,
        })
    }

    async fn script_for(&self, request: &GenerationRequest) -> Result<Script, ReelError> {
        if let Some(script) = &self.script {
            let mut script = script.clone();
            script.validate(&self.config.speakers)?;
            return Ok(script);
        }

        let context = if self.context_urls.is_empty() {
            String::new()
        } else {
            let client = context_client().map_err(ServiceError::from)?;
            gather_context(&client, &self.context_urls).await
        };

        let client = ScriptClient::from_config(&self.config.script)?;
        let script = client
            .generate(
                &script_input(request.prompt.as_str(), &context),
                &self.config.speakers,
                request.style.as_deref().or(self.config.style.as_deref()),
            )
            .await?;
        Ok(script)
    }

    async fn narrate(&self, script: &Script, work_dir: &Path) -> Result<Narration, ReelError> {
        let tts = TtsClient::from_config(&self.config.voice)?;
        let narrator = Narrator::new(tts, self.config.speakers.clone(), self.config.voice.pause_ms);
        Ok(narrator.narrate(script, work_dir).await?)
    }

    async fn visuals(
        &self,
        request: &GenerationRequest,
        duration: f64,
        work_dir: &Path,
    ) -> Result<Visuals, ReelError> {
        let visuals = &self.config.visuals;
        if let Some(dir) = &visuals.background_dir {
            let mut rng = rand::thread_rng();
            let path = std::path::absolute(pick_background(dir, &mut rng)?)?;
            let clip_len = probe_duration(&path).map_err(RenderError::from)?;
            let start = random_start(clip_len, duration, &mut rng);
            log::info!("Background {} from {:.2}s", path.display(), start);
            return Ok(Visuals::Background { path, start });
        }

        let style = request.style.as_deref().or(self.config.style.as_deref());
        let client = VisualClient::from_config(visuals)?;
        let paths = client
            .generate_clips(&request.prompt.styled(style), visuals.clips, work_dir)
            .await?;
        Ok(Visuals::Clips {
            paths,
            kind: visuals.kind,
        })
    }

    fn write_subtitles(
        &self,
        title_text: &str,
        narration: &Narration,
        duration: f64,
        work_dir: &Path,
        assembly: &mut Assembly,
    ) -> Result<(), ReelError> {
        let config = &self.config;
        let measure = HeuristicMeasure;
        let captions = build_captions(
            &narration.word_timings,
            &narration.speaker_timings,
            &measure,
            &config.captions,
        );
        let title_lines = format_title(title_text, &measure, &config.title);
        let track = SubtitleTrack {
            width: config.video.width,
            height: config.video.height,
            captions_style: &config.captions,
            title_style: &config.title,
            captions: &captions,
            title: Some((title_lines.as_slice(), title_duration(&config.title, duration))),
        };

        let ass_name = PathBuf::from("captions.ass");
        std::fs::write(work_dir.join(&ass_name), track.to_ass()?)?;
        assembly.subtitles = Some(ass_name);

        if let Some(font) = &config.captions.font {
            let fonts = PathBuf::from("fonts");
            std::fs::create_dir_all(work_dir.join(&fonts))?;
            let file_name = font
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("caption-font.ttf"));
            std::fs::copy(font, work_dir.join(&fonts).join(file_name))?;
            assembly.fonts_dir = Some(fonts);
        }
        log::info!("{} captions prepared", captions.len());
        Ok(())
    }
}

fn check_interrupt() -> Result<(), ReelError> {
    if ctrlc_received() {
        Err(ReelError::Interrupted)
    } else {
        Ok(())
    }
}

/// Write the speaker and word timing JSON files next to the reel.
pub fn write_artifacts(
    dir: &Path,
    run_id: &str,
    narration: &Narration,
) -> Result<Vec<PathBuf>, ReelError> {
    let speakers = dir.join(format!("{}_speaker_timings.json", run_id));
    std::fs::write(
        &speakers,
        serde_json::to_string_pretty(&narration.speaker_timings)?,
    )?;
    let words = dir.join(format!("{}_word_alignments.json", run_id));
    std::fs::write(&words, serde_json::to_string_pretty(&narration.word_timings)?)?;
    Ok(vec![speakers, words])
}
