//! Dialogue script generation.
//!
//! Scripts come from an OpenAI-compatible chat completions endpoint using
//! structured (JSON schema) output, or from a hand-written file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ScriptConfig, SpeakerConfig};
use crate::retry::RetryPolicy;
use crate::service::{check_response, http_client, ServiceError};

/// The environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default base URL for chat completions.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "o3";

/// Reasoning models can take a while on a full script.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const SERVICE: &str = "OpenAI";

/// One spoken line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
}

/// A titled dialogue, ready for text-to-speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub title: String,
    pub dialogue: Vec<DialogueLine>,
}

/// Reasons a script cannot be narrated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("Script has no dialogue")]
    Empty,

    #[error("Line {line}: unknown speaker '{speaker}'")]
    UnknownSpeaker { line: usize, speaker: String },

    #[error("Line {line}: empty text")]
    EmptyLine { line: usize },

    #[error("Script must open with {expected}, not {found}")]
    WrongOpener { expected: String, found: String },

    #[error("Line {line}: expected 'Speaker: text'")]
    Malformed { line: usize },

    #[error("Invalid JSON script: {0}")]
    Json(String),
}

impl Script {
    /// Check the script against the configured speakers.
    ///
    /// Every line needs a known speaker and some text, and the first
    /// configured speaker has to open the dialogue. Speaker names are
    /// normalized to their configured spelling.
    pub fn validate(&mut self, speakers: &[SpeakerConfig]) -> Result<(), ScriptError> {
        if self.dialogue.is_empty() {
            return Err(ScriptError::Empty);
        }

        for (i, line) in self.dialogue.iter_mut().enumerate() {
            let speaker = speakers
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(line.speaker.trim()))
                .ok_or_else(|| ScriptError::UnknownSpeaker {
                    line: i + 1,
                    speaker: line.speaker.clone(),
                })?;
            line.speaker = speaker.name.clone();
            line.text = line.text.trim().to_string();
            if line.text.is_empty() {
                return Err(ScriptError::EmptyLine { line: i + 1 });
            }
        }

        if let Some(first) = speakers.first() {
            if self.dialogue[0].speaker != first.name {
                return Err(ScriptError::WrongOpener {
                    expected: first.name.clone(),
                    found: self.dialogue[0].speaker.clone(),
                });
            }
        }
        Ok(())
    }

    /// Number of spoken words.
    pub fn word_count(&self) -> usize {
        self.dialogue
            .iter()
            .map(|l| l.text.split_whitespace().count())
            .sum()
    }
}

/// Parse a hand-written script.
///
/// Accepts either a JSON array of `[speaker, text]` pairs or plain text with
/// one `Speaker: text` line per turn. In plain text, a leading `# ` line
/// becomes the title and blank lines are skipped.
pub fn parse_manual_script(text: &str) -> Result<Script, ScriptError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let pairs: Vec<(String, String)> =
            serde_json::from_str(trimmed).map_err(|e| ScriptError::Json(e.to_string()))?;
        return Ok(Script {
            title: String::new(),
            dialogue: pairs
                .into_iter()
                .map(|(speaker, text)| DialogueLine { speaker, text })
                .collect(),
        });
    }

    let mut title = String::new();
    let mut dialogue = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(heading) = line.strip_prefix("# ") {
            if title.is_empty() && dialogue.is_empty() {
                title = heading.trim().to_string();
                continue;
            }
        }
        let (speaker, spoken) = line
            .split_once(':')
            .ok_or(ScriptError::Malformed { line: i + 1 })?;
        if speaker.trim().is_empty() {
            return Err(ScriptError::Malformed { line: i + 1 });
        }
        dialogue.push(DialogueLine {
            speaker: speaker.trim().to_string(),
            text: spoken.trim().to_string(),
        });
    }

    if dialogue.is_empty() {
        return Err(ScriptError::Empty);
    }
    Ok(Script { title, dialogue })
}

/// Build the system prompt for a dialogue between the given speakers.
pub fn system_prompt(speakers: &[SpeakerConfig], style: Option<&str>) -> String {
    let names: Vec<&str> = speakers.iter().map(|s| s.name.as_str()).collect();
    let first = names.first().copied().unwrap_or("the first speaker");
    let cast = match names.len() {
        0 => "two hosts".to_string(),
        1 => names[0].to_string(),
        _ => format!(
            "{} and {}",
            names[..names.len() - 1].join(", "),
            names[names.len() - 1]
        ),
    };

    let mut prompt = format!(
        "You are writing a short, lighthearted dialogue between {cast} for a vertical \
short-form video. They discuss the topic and context supplied by the user.\n\n\
The dialogue should be fast-paced, funny and informative, and give a listener \
everything they need to get up to speed on the topic. Blend humor with real facts \
from the context; where something is unclear, fill in with light humor rather \
than made-up data. Avoid profanity, politics and dark humor. End with a clever \
punchline or callback.\n\n\
{first} must speak first. Use only these speaker names: {names}.\n\
Each line is sent directly to a text-to-speech engine, so only include spoken words.\n\
Target length: about 200-250 words. Keep each line under 30 words.\n\
Also write a short, attention-grabbing title.",
        cast = cast,
        first = first,
        names = names.join(", "),
    );
    if let Some(style) = style.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!("\nTone: {}.", style));
    }
    prompt
}

/// JSON schema for structured script output.
fn script_schema(speakers: &[SpeakerConfig]) -> serde_json::Value {
    let names: Vec<&str> = speakers.iter().map(|s| s.name.as_str()).collect();
    serde_json::json!({
        "type": "object",
        "properties": {
            "title": { "type": "string", "description": "A short title for the dialogue" },
            "dialogue": {
                "type": "array",
                "description": "The dialogue lines for the script",
                "items": {
                    "type": "object",
                    "properties": {
                        "speaker": { "type": "string", "enum": names },
                        "text": { "type": "string" }
                    },
                    "required": ["speaker", "text"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["title", "dialogue"],
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// Client for the chat completions endpoint.
pub struct ScriptClient {
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
    http_client: reqwest::Client,
    retry: RetryPolicy,
}

impl ScriptClient {
    /// # Errors
    ///
    /// Returns `ServiceError::MissingApiKey` if the key is absent or empty.
    pub fn new(api_key: Option<String>) -> Result<Self, ServiceError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ServiceError::MissingApiKey {
                env: OPENAI_API_KEY_ENV,
            })?;
        Ok(Self {
            api_key,
            base_url: OPENAI_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            http_client: http_client(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)?,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &ScriptConfig) -> Result<Self, ServiceError> {
        let mut client = Self::new(config.api_key.clone())?
            .with_base_url(config.base_url.clone())
            .with_model(config.model.clone());
        client.system_prompt = config.system_prompt.clone();
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generate a dialogue script about `topic`.
    ///
    /// `topic` is sent as the user message and may carry extracted article
    /// text after the topic line. The result is validated against
    /// `speakers` before it is returned.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::EmptyPrompt` for an empty topic,
    /// `ServiceError::ContentPolicyViolation` when the model refuses, and
    /// `ServiceError::InvalidResponse` when the reply is not a usable script.
    pub async fn generate(
        &self,
        topic: &str,
        speakers: &[SpeakerConfig],
        style: Option<&str>,
    ) -> Result<Script, ServiceError> {
        if topic.trim().is_empty() {
            return Err(ServiceError::EmptyPrompt);
        }

        let system = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| system_prompt(speakers, style));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": topic },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "script",
                    "strict": true,
                    "schema": script_schema(speakers),
                }
            }
        });
        let url = format!("{}/chat/completions", self.base_url);

        log::info!("Requesting script from {} ({})", SERVICE, self.model);
        let chat: ChatResponse = self
            .retry
            .run("script generation", || async {
                let response = self
                    .http_client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await?;
                let response = check_response(SERVICE, response).await?;
                Ok::<_, ServiceError>(response.json::<ChatResponse>().await?)
            })
            .await?;

        let message = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ServiceError::InvalidResponse("No choices in response".to_string()))?;

        if let Some(refusal) = message.refusal {
            return Err(ServiceError::ContentPolicyViolation { message: refusal });
        }
        let content = message
            .content
            .ok_or_else(|| ServiceError::InvalidResponse("Empty message content".to_string()))?;

        let mut script: Script = serde_json::from_str(&content)
            .map_err(|e| ServiceError::InvalidResponse(format!("Script JSON: {}", e)))?;
        script
            .validate(speakers)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        log::info!(
            "Script '{}': {} lines, {} words",
            script.title,
            script.dialogue.len(),
            script.word_count()
        );
        Ok(script)
    }
}
