use crate::embeddings::Embedder;
use crate::error::ProviderError;
use crate::traits::ChatModel;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const MAX_BATCH: usize = 100;
const BACKEND: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Blocking client for the Generative Language REST API, used both as the
/// embedder and as the answering model.
pub struct GeminiClient {
    config: GeminiConfig,
    base_url: Url,
    client: Client,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> Result<Url, ProviderError> {
        Ok(self
            .base_url
            .join(&format!("v1beta/models/{model}:{method}"))?)
    }

    fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<R, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let details = response
                .text()
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{status}: {details}"),
            });
        }

        Ok(response.json()?)
    }

    fn embed_request<'a>(&self, text: &'a str, task_type: &'static str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: format!("models/{}", self.config.embedding_model),
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
            task_type,
        }
    }
}

impl Embedder for GeminiClient {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let url = self.endpoint(&self.config.embedding_model, "batchEmbedContents")?;
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH) {
            let body = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| self.embed_request(text, "RETRIEVAL_DOCUMENT"))
                    .collect(),
            };
            let response: BatchEmbedResponse = self.post(url.clone(), &body)?;
            vectors.extend(batch_vectors(response, batch.len())?);
        }

        Ok(vectors)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = self.endpoint(&self.config.embedding_model, "embedContent")?;
        let response: EmbedContentResponse =
            self.post(url, &self.embed_request(text, "RETRIEVAL_QUERY"))?;

        if response.embedding.values.is_empty() {
            return Err(ProviderError::EmptyResponse(BACKEND.to_string()));
        }
        Ok(response.embedding.values)
    }
}

impl ChatModel for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = self.endpoint(&self.config.chat_model, "generateContent")?;
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        let response: GenerateContentResponse = self.post(url, &body)?;
        response_text(response)
    }
}

fn batch_vectors(
    response: BatchEmbedResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if response.embeddings.len() != expected {
        return Err(ProviderError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            ),
        });
    }

    Ok(response
        .embeddings
        .into_iter()
        .map(|embedding| embedding.values)
        .collect())
}

fn response_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::EmptyResponse(BACKEND.to_string()));
    }
    Ok(text)
}
