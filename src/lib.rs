//! Switchyard - vendor-neutral completion gateway core
//!
//! Callers talk to models through small capability traits
//! ([`Completer`], [`Embedder`], [`Reranker`], ...) and never see a vendor
//! API. Vendor adapters normalize their wire formats into one
//! [`Completion`](types::Completion) shape, including incremental deltas.
//! A [`Toolbox`] drives the tool-calling loop over any completer, and a
//! [`ModelRegistry`] maps model ids to instances per capability.
//!
//! # Completion Example
//!
//! ```rust,no_run
//! use switchyard::providers::OpenAiClient;
//! use switchyard::types::{CompleteOptions, Message};
//! use switchyard::Completer;
//!
//! #[tokio::main]
//! async fn main() -> switchyard::Result<()> {
//!     let completer = OpenAiClient::new("sk-your-key")?.completer("gpt-4o-mini");
//!
//!     let completion = completer
//!         .complete(
//!             &[
//!                 Message::system("You are a helpful assistant."),
//!                 Message::user("What is the capital of France?"),
//!             ],
//!             CompleteOptions::default(),
//!         )
//!         .await?;
//!
//!     println!("{}", completion.message.content);
//!     Ok(())
//! }
//! ```
//!
//! # Registry Example
//!
//! ```rust,no_run
//! use switchyard::config::Config;
//! use switchyard::tool::ToolSet;
//!
//! # fn main() -> switchyard::Result<()> {
//! let config = Config::load(None)?;
//! let registry = config.build_registry(&config.secrets()?, &ToolSet::new())?;
//!
//! // "" resolves to the first configured completer
//! let completer = registry.require_completer("")?;
//! # let _ = completer;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod registry;
pub mod streaming;
pub mod telemetry;
pub mod tool;
pub mod types;
mod version;

pub use agent::{Toolbox, ToolboxConfig};
pub use error::{Result, SwitchyardError};
pub use providers::{
    Completer, Embedder, Renderer, Reranker, Synthesizer, Transcriber, Translator,
};
pub use registry::{Capability, ModelRegistry, RegistryBuilder};
pub use streaming::{CompletionStream, DeltaSink, delta_channel, spawn_completion};
pub use tool::{Tool, ToolSet};
pub use version::{BUILD_DATE, GIT_SHA, PKG_VERSION, version_string};
