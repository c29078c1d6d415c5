//! Шлюз до Gemini API: один виклик `generateContent` із системною
//! інструкцією обраного режиму.

pub mod instructions;

use crate::config::AiConfig;
use instructions::{InstructionStore, ModeError};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

pub const QUOTA_MESSAGE: &str = "Ліміт вичерпано. Почекай і повтори.";
pub const EMPTY_MESSAGE: &str = "Порожня відповідь.";
const ERROR_DETAIL_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("квоту API вичерпано")]
    QuotaExhausted,
    #[error("API повернуло {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("API повернуло порожню відповідь")]
    EmptyResponse,
}

impl AiError {
    /// Текст для користувача. Окремо класифікується лише 429.
    pub fn user_message(&self) -> String {
        match self {
            AiError::QuotaExhausted => QUOTA_MESSAGE.to_string(),
            AiError::EmptyResponse => EMPTY_MESSAGE.to_string(),
            other => {
                let detail: String = other.to_string().chars().take(ERROR_DETAIL_CHARS).collect();
                format!("❌ Помилка API: {detail}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AskOptions {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl AskOptions {
    pub fn short(config: &AiConfig) -> Self {
        Self {
            max_output_tokens: config.short_max_tokens,
            temperature: config.short_temperature,
        }
    }

    pub fn detailed(config: &AiConfig) -> Self {
        Self {
            max_output_tokens: config.detail_max_tokens,
            temperature: config.detail_temperature,
        }
    }
}

pub fn build_user_prompt(question: &str, detailed: bool) -> String {
    let length_rule = if detailed {
        "Відповідь детально, розгорнуто, але без води. Максимум 20 рядків."
    } else {
        "Відповідь коротко: 3-7 рядків, тільки суть."
    };
    format!(
        "Ти корисний AI асистент. Пиши по-людськи, природно.\n\
         Без зайвих вступів, без моралей, без емодзі.\n\
         Використовуй просту, зрозумілу мову.\n\
         {length_rule}\n\n\
         Запит: {}",
        question.trim()
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
    }
}

fn build_request(prompt: &str, system_instruction: Option<&str>, options: AskOptions) -> GenerateContentRequest {
    GenerateContentRequest {
        system_instruction: system_instruction
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| Content {
                role: None,
                parts: vec![text_part(text)],
            }),
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![text_part(prompt)],
        }],
        generation_config: GenerationConfig {
            max_output_tokens: options.max_output_tokens,
            temperature: options.temperature,
        },
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, AiError> {
    let text: String = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect();
    let text = text.trim();
    if text.is_empty() {
        Err(AiError::EmptyResponse)
    } else {
        Ok(text.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> AiError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        AiError::QuotaExhausted
    } else {
        AiError::Http { status, body }
    }
}

pub struct AiGateway {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
    instructions: Mutex<InstructionStore>,
}

impl AiGateway {
    pub fn new(
        config: &AiConfig,
        api_key: String,
        instructions: InstructionStore,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            instructions: Mutex::new(instructions),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    pub async fn ask(&self, prompt: &str, mode: &str, options: AskOptions) -> Result<String, AiError> {
        let system_instruction = self
            .instructions
            .lock()
            .await
            .instruction(mode)
            .map(str::to_string);
        if system_instruction.is_none() {
            tracing::warn!(mode = %mode, "Unknown AI mode, asking without system instruction");
        }
        let request = build_request(prompt, system_instruction.as_deref(), options);

        tracing::debug!(
            mode = %mode,
            model = %self.model,
            max_output_tokens = options.max_output_tokens,
            "Sending generateContent request"
        );
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, mode = %mode, "AI request failed");
            return Err(classify_status(status, body));
        }

        let payload: GenerateContentResponse = response.json().await?;
        extract_text(payload)
    }

    /// Як `ask`, але помилки перетворюються на текст для користувача.
    pub async fn ask_or_apology(&self, prompt: &str, mode: &str, options: AskOptions) -> String {
        match self.ask(prompt, mode, options).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(error = %error, mode = %mode, "AI answer replaced with apology");
                error.user_message()
            }
        }
    }

    pub async fn list_modes(&self) -> Vec<String> {
        self.instructions.lock().await.list_modes()
    }

    pub async fn has_mode(&self, mode: &str) -> bool {
        self.instructions.lock().await.has_mode(mode)
    }

    pub async fn add_mode(&self, name: &str, prompt: &str) -> Result<bool, ModeError> {
        self.instructions.lock().await.add_mode(name, prompt)
    }

    pub async fn delete_mode(&self, name: &str) -> Result<(), ModeError> {
        self.instructions.lock().await.delete_mode(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_gemini_field_names() {
        let request = build_request(
            "Що таке фотосинтез?",
            Some("Ти вчитель біології."),
            AskOptions {
                max_output_tokens: 420,
                temperature: 0.5,
            },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "systemInstruction": {"parts": [{"text": "Ти вчитель біології."}]},
                "contents": [{"role": "user", "parts": [{"text": "Що таке фотосинтез?"}]}],
                "generationConfig": {"maxOutputTokens": 420, "temperature": 0.5}
            })
        );
    }

    #[test]
    fn blank_system_instruction_is_omitted() {
        let request = build_request("hi", Some("   "), AskOptions::short(&AiConfig::default()));
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("systemInstruction").is_none());
    }

    #[test]
    fn response_parts_are_joined() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Перша частина. "}, {"text": "Друга.\n"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 12}
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Перша частина. Друга.");
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        let error = extract_text(response).unwrap_err();
        assert!(matches!(error, AiError::EmptyResponse));
        assert_eq!(error.user_message(), EMPTY_MESSAGE);
    }

    #[test]
    fn too_many_requests_maps_to_quota_message() {
        let error = classify_status(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert_eq!(error.user_message(), QUOTA_MESSAGE);

        let other = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".repeat(100));
        let message = other.user_message();
        assert!(message.starts_with("❌ Помилка API:"));
        assert!(message.chars().count() <= "❌ Помилка API: ".chars().count() + 100);
    }

    #[test]
    fn prompt_carries_length_rule() {
        let short = build_user_prompt("  Привіт ", false);
        assert!(short.contains("3-7 рядків"));
        assert!(short.ends_with("Запит: Привіт"));
        let detailed = build_user_prompt("Привіт", true);
        assert!(detailed.contains("Максимум 20 рядків"));
    }

    #[test]
    fn ask_options_follow_config() {
        let config = AiConfig::default();
        assert_eq!(AskOptions::short(&config).max_output_tokens, 420);
        assert_eq!(AskOptions::detailed(&config).max_output_tokens, 900);
    }
}
