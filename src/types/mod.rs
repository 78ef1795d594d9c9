//! Public types for the Switchyard API.

mod capability;
mod completion;
mod message;
mod options;
mod tool;

pub use capability::{
    Embedding, Image, Ranking, RenderOptions, RerankOptions, Synthesis, SynthesizeOptions,
    TranscribeOptions, Transcription, TranslateOptions, Translation,
};
pub use completion::{Completion, FinishReason, Usage};
pub use message::{File, Message, Role};
pub use options::{CompleteOptions, ReasoningEffort, ResponseFormat, Schema};
pub use tool::{ToolCall, ToolDefinition};
