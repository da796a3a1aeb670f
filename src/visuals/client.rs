//! VisualClient - handles communication with the fal.ai queue API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::config::VisualsConfig;
use crate::interrupt::ctrlc_received;
use crate::retry::RetryPolicy;
use crate::service::{check_response, http_client, ServiceError};

/// The environment variable name for the fal.ai API key.
pub const FAL_API_KEY_ENV: &str = "FAL_API_KEY";

/// Default base URL for the fal.ai queue API.
pub const FAL_API_BASE_URL: &str = "https://queue.fal.run";

/// Default model for clip generation.
pub const DEFAULT_MODEL: &str = "fal-ai/fast-svd-lcm";

/// Default timeout for HTTP requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a whole generation (180 seconds).
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Default polling interval for status checks (2 seconds).
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

const SERVICE: &str = "fal.ai";

/// What the generation model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    /// Text-to-video; the clip is looped to fill its slot
    #[default]
    Video,
    /// Text-to-image; the still is held for its slot
    Image,
}

impl VisualKind {
    /// File extension for downloaded media.
    pub fn extension(self) -> &'static str {
        match self {
            VisualKind::Video => "mp4",
            VisualKind::Image => "png",
        }
    }
}

/// Request body for generation. Both shape hints ask for portrait output;
/// models ignore the one they don't understand.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<&'static str>,
}

/// Response from queue submission.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueResponse {
    /// The unique request ID for polling.
    pub request_id: String,
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaFile {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ResultResponse {
    #[serde(default)]
    video: Option<MediaFile>,
    #[serde(default)]
    image: Option<MediaFile>,
    #[serde(default)]
    images: Vec<MediaFile>,
}

impl ResultResponse {
    fn media_url(self) -> Option<String> {
        self.video
            .or(self.image)
            .or_else(|| self.images.into_iter().next())
            .map(|m| m.url)
    }
}

/// Status of a queued generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStatus {
    /// Request is queued for processing.
    Pending,
    /// Media is being generated.
    InProgress,
    /// Generation finished; the result can be fetched.
    Completed,
    /// Generation failed with an error.
    Failed { error: String },
}

/// Build one prompt per clip. A single clip keeps the prompt as is; several
/// clips are told which shot they are so the model varies the framing.
pub fn clip_prompts(prompt: &str, count: u32) -> Vec<String> {
    if count <= 1 {
        return vec![prompt.to_string()];
    }
    (1..=count)
        .map(|i| format!("{}, shot {} of {}", prompt, i, count))
        .collect()
}

/// Client for communicating with the fal.ai queue API.
pub struct VisualClient {
    api_key: String,
    base_url: String,
    model: String,
    kind: VisualKind,
    http_client: reqwest::Client,
    retry: RetryPolicy,
    poll_interval: Duration,
    generation_timeout: Duration,
}

impl VisualClient {
    /// Create a client with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::MissingApiKey` if the key is absent or empty.
    pub fn new(api_key: Option<String>) -> Result<Self, ServiceError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ServiceError::MissingApiKey {
                env: FAL_API_KEY_ENV,
            })?;

        Ok(Self {
            api_key,
            base_url: FAL_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            kind: VisualKind::Video,
            http_client: http_client(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)?,
            retry: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        })
    }

    /// Create a client from the `[visuals]` config section.
    pub fn from_config(config: &VisualsConfig) -> Result<Self, ServiceError> {
        Ok(Self::new(config.api_key.clone())?
            .with_base_url(config.base_url.clone())
            .with_model(config.model.clone())
            .with_kind(config.kind)
            .with_generation_timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// Point the client at another server (used against mock servers in tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_kind(mut self, kind: VisualKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn kind(&self) -> VisualKind {
        self.kind
    }

    /// Submit a generation request to the fal.ai queue, retrying transient
    /// network failures and rate limits.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::EmptyPrompt` if the prompt is empty (no request
    /// is sent), `ServiceError::ContentPolicyViolation` if the prompt is
    /// rejected, `ServiceError::RateLimit` / `ServiceError::NetworkError` once
    /// retries are exhausted, or `ServiceError::Api` for other failures.
    pub async fn submit(&self, prompt: &str) -> Result<QueueResponse, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::EmptyPrompt);
        }

        let url = format!("{}/{}", self.base_url, self.model);
        let body = match self.kind {
            VisualKind::Video => GenerateRequest {
                prompt,
                aspect_ratio: Some("9:16"),
                image_size: None,
            },
            VisualKind::Image => GenerateRequest {
                prompt,
                aspect_ratio: None,
                image_size: Some("portrait_16_9"),
            },
        };

        self.retry
            .run("fal.ai submit", || async {
                let response = self
                    .http_client
                    .post(&url)
                    .header("Authorization", format!("Key {}", self.api_key))
                    .json(&body)
                    .send()
                    .await?;
                let response = check_response(SERVICE, response).await?;
                Ok::<_, ServiceError>(response.json::<QueueResponse>().await?)
            })
            .await
    }

    /// Check generation status.
    ///
    /// Uses the `status_url` from the queue response when present, else
    /// `GET /{model}/requests/{request_id}/status`.
    pub async fn poll_status(&self, queued: &QueueResponse) -> Result<GenerationStatus, ServiceError> {
        let url = queued.status_url.clone().unwrap_or_else(|| {
            format!(
                "{}/{}/requests/{}/status",
                self.base_url, self.model, queued.request_id
            )
        });

        let status_response: StatusResponse = self
            .retry
            .run("fal.ai status", || async {
                let response = self
                    .http_client
                    .get(&url)
                    .header("Authorization", format!("Key {}", self.api_key))
                    .send()
                    .await?;
                let response = check_response(SERVICE, response).await?;
                Ok::<_, ServiceError>(response.json::<StatusResponse>().await?)
            })
            .await?;

        match status_response.status.to_uppercase().as_str() {
            "PENDING" | "IN_QUEUE" => Ok(GenerationStatus::Pending),
            "PROCESSING" | "IN_PROGRESS" => Ok(GenerationStatus::InProgress),
            "COMPLETED" | "OK" => Ok(GenerationStatus::Completed),
            "FAILED" | "ERROR" => Ok(GenerationStatus::Failed {
                error: status_response
                    .error
                    .unwrap_or_else(|| "Unknown error occurred during generation".to_string()),
            }),
            unknown => Err(ServiceError::InvalidResponse(format!(
                "Unknown generation status: {}",
                unknown
            ))),
        }
    }

    /// Fetch the URL of the generated media once the request completed.
    pub async fn fetch_result(&self, queued: &QueueResponse) -> Result<String, ServiceError> {
        let url = queued.response_url.clone().unwrap_or_else(|| {
            format!(
                "{}/{}/requests/{}",
                self.base_url, self.model, queued.request_id
            )
        });

        let result: ResultResponse = self
            .retry
            .run("fal.ai result", || async {
                let response = self
                    .http_client
                    .get(&url)
                    .header("Authorization", format!("Key {}", self.api_key))
                    .send()
                    .await?;
                let response = check_response(SERVICE, response).await?;
                Ok::<_, ServiceError>(response.json::<ResultResponse>().await?)
            })
            .await?;

        result.media_url().ok_or_else(|| {
            ServiceError::InvalidResponse(
                "Generation completed but no media URL in response".to_string(),
            )
        })
    }

    /// Download a media file from a URL to disk.
    ///
    /// Streams the body to disk without loading the full file into memory.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, ServiceError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.http_client.get(url).send().await?;
        let response = check_response(SERVICE, response).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;

        Ok(dest.to_path_buf())
    }

    /// Generate one clip from a prompt and download it into `dest_dir`.
    ///
    /// Submits, polls every poll interval until completion or the generation
    /// timeout, fetches the result, and downloads it as
    /// `<dest_dir>/<request_id>.<ext>`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Timeout` if the generation outlives the timeout,
    /// `ServiceError::Interrupted` once Ctrl+C is pressed while polling,
    /// `ServiceError::Api` if the service reports a failed generation, or any
    /// error from the individual steps.
    pub async fn generate(&self, prompt: &str, dest_dir: &Path) -> Result<PathBuf, ServiceError> {
        use tokio::time::Instant;

        log::info!("Submitting {:?} generation: {}", self.kind, prompt);
        let queued = self.submit(prompt).await?;
        log::info!("Generation submitted, request_id: {}", queued.request_id);

        let start_time = Instant::now();
        loop {
            if ctrlc_received() {
                log::warn!("Generation {} abandoned on Ctrl+C", queued.request_id);
                return Err(ServiceError::Interrupted);
            }
            if start_time.elapsed() > self.generation_timeout {
                log::error!("Generation timed out after {:?}", self.generation_timeout);
                return Err(ServiceError::Timeout);
            }

            match self.poll_status(&queued).await? {
                GenerationStatus::Pending => log::debug!("Status: queued, waiting..."),
                GenerationStatus::InProgress => log::debug!("Status: generating..."),
                GenerationStatus::Completed => break,
                GenerationStatus::Failed { error } => {
                    log::error!("Generation failed: {}", error);
                    return Err(ServiceError::Api(format!("Generation failed: {}", error)));
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        let media_url = self.fetch_result(&queued).await?;
        let dest = dest_dir.join(format!(
            "{}.{}",
            queued.request_id,
            self.kind.extension()
        ));
        log::info!("Downloading clip from: {}", media_url);
        let path = self.download(&media_url, &dest).await?;
        log::info!("Clip downloaded to: {}", path.display());
        Ok(path)
    }

    /// Generate `count` clips for one prompt, in order.
    pub async fn generate_clips(
        &self,
        prompt: &str,
        count: u32,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ServiceError> {
        let prompts = clip_prompts(prompt, count);
        let mut clips = Vec::with_capacity(prompts.len());
        for (i, clip_prompt) in prompts.iter().enumerate() {
            if ctrlc_received() {
                return Err(ServiceError::Interrupted);
            }
            log::info!("Generating clip {}/{}", i + 1, prompts.len());
            clips.push(self.generate(clip_prompt, dest_dir).await?);
        }
        Ok(clips)
    }
}
