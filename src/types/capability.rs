//! Request options and results for the non-chat capabilities.

use serde::{Deserialize, Serialize};

/// Embedding result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
}

impl Embedding {
    pub fn new(values: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            dimensions: values.len(),
            values,
            model: model.into(),
        }
    }
}

/// Options for a rerank call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerankOptions {
    /// Keep only the best `limit` results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// One scored input of a rerank call, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// Position of the text in the request.
    pub index: usize,
    pub text: String,
    pub score: f64,
}

/// Options for speech synthesis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesizeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Audio container, e.g. `mp3` or `wav`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Synthesized audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub id: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Options for transcription
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscribeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Transcribed audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Audio duration in seconds, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub text: String,
}

/// Options for translation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslateOptions {
    /// Target language (ISO code or name, vendor-dependent).
    pub language: String,
}

/// Translated text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub id: String,
    pub text: String,
}

/// Options for image rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// `WIDTHxHEIGHT`, e.g. `1024x1024`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Rendered image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub content_type: String,
    pub content: Vec<u8>,
}
