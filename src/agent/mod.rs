//! Higher-order completers composed from a base completer and tools.

mod toolbox;

pub use toolbox::{DEFAULT_MAX_ROUNDS, Toolbox, ToolboxConfig};
