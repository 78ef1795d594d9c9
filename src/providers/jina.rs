//! Jina-compatible client for embeddings and reranking.
//!
//! See: <https://jina.ai/embeddings/> and <https://jina.ai/reranker/>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::http::{DEFAULT_TIMEOUT, build_client, check_status};
use super::traits::{Embedder, Reranker};
use crate::types::{Embedding, Ranking, RerankOptions};
use crate::{Result, SwitchyardError};

/// Default base URL for the Jina API
pub const DEFAULT_BASE_URL: &str = "https://api.jina.ai";

pub const DEFAULT_EMBEDDING_MODEL: &str = "jina-embeddings-v3";
pub const DEFAULT_RERANK_MODEL: &str = "jina-reranker-v2-base-multilingual";

/// Connection to one Jina-compatible endpoint.
#[derive(Clone)]
pub struct JinaClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl JinaClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::with_base_url(DEFAULT_BASE_URL)?.with_api_key(api_key))
    }

    /// Client for a custom base URL. A trailing `/v1` is tolerated.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/');
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.strip_suffix("/v1").unwrap_or(base_url).to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    /// Embedder for `model`, or the default embedding model when empty.
    pub fn embedder(&self, model: impl Into<String>) -> JinaEmbedder {
        JinaEmbedder {
            client: self.clone(),
            model: or_default(model.into(), DEFAULT_EMBEDDING_MODEL),
        }
    }

    /// Reranker for `model`, or the default rerank model when empty.
    pub fn reranker(&self, model: impl Into<String>) -> JinaReranker {
        JinaReranker {
            client: self.clone(),
            model: or_default(model.into(), DEFAULT_RERANK_MODEL),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.http.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

fn or_default(model: String, default: &str) -> String {
    if model.is_empty() {
        default.to_string()
    } else {
        model
    }
}

/// Embeddings through `/v1/embeddings`.
pub struct JinaEmbedder {
    client: JinaClient,
    model: String,
}

#[async_trait]
impl Embedder for JinaEmbedder {
    fn name(&self) -> &str {
        "jina"
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or(SwitchyardError::EmptyResponse)
    }

    #[instrument(name = "jina.embed", skip_all, fields(model = %self.model, batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let input: Vec<&str> = texts.iter().map(|t| t.trim()).collect();
        let response = self
            .client
            .post("/v1/embeddings")
            .json(&EmbedRequest {
                model: &self.model,
                input: &input,
            })
            .send()
            .await?;
        let response: EmbedResponse = check_status(response, &self.model).await?.json().await?;

        let mut data = response.data;
        if data.is_empty() && !texts.is_empty() {
            return Err(SwitchyardError::EmptyResponse);
        }
        data.sort_by_key(|d| d.index);
        Ok(data
            .into_iter()
            .map(|d| Embedding::new(d.embedding, self.model.clone()))
            .collect())
    }
}

/// Reranking through `/v1/rerank`.
pub struct JinaReranker {
    client: JinaClient,
    model: String,
}

#[async_trait]
impl Reranker for JinaReranker {
    fn name(&self) -> &str {
        "jina"
    }

    #[instrument(name = "jina.rerank", skip_all, fields(model = %self.model, documents = texts.len()))]
    async fn rerank(
        &self,
        query: &str,
        texts: &[&str],
        options: &RerankOptions,
    ) -> Result<Vec<Ranking>> {
        let response = self
            .client
            .post("/v1/rerank")
            .json(&RerankRequest {
                model: &self.model,
                query,
                documents: texts,
                top_n: options.limit,
            })
            .send()
            .await?;
        let response: RerankResponse = check_status(response, &self.model).await?.json().await?;

        if response.results.is_empty() {
            return Err(SwitchyardError::EmptyResponse);
        }

        let mut rankings = response
            .results
            .into_iter()
            .map(|r| {
                let text = texts.get(r.index).copied().ok_or_else(|| {
                    SwitchyardError::InvalidInput(format!("rerank index {} out of range", r.index))
                })?;
                Ok(Ranking {
                    index: r.index,
                    text: text.to_string(),
                    score: r.relevance_score,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rankings.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(rankings)
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    top_n: Option<usize>,
}

#[derive(Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let client = JinaClient::with_base_url("https://example.com/v1/").unwrap();
        assert_eq!(client.base_url, "https://example.com");
    }

    #[test]
    fn test_default_models() {
        let client = JinaClient::with_base_url(DEFAULT_BASE_URL).unwrap();
        assert_eq!(client.embedder("").model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(client.reranker("custom").model, "custom");
    }
}
