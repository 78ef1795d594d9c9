//! Spread calls across several completers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::traits::Completer;
use crate::types::{CompleteOptions, Completion, Message};
use crate::{Result, SwitchyardError};

/// A completer that hands each call to the next of its members in turn.
pub struct RoundRobin {
    name: String,
    completers: Vec<Arc<dyn Completer>>,
    next: AtomicUsize,
}

impl RoundRobin {
    /// Fails when `completers` is empty.
    pub fn new(name: impl Into<String>, completers: Vec<Arc<dyn Completer>>) -> Result<Self> {
        let name = name.into();
        if completers.is_empty() {
            return Err(SwitchyardError::Configuration(format!(
                "router '{name}' has no completers"
            )));
        }
        Ok(Self {
            name,
            completers,
            next: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.completers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completers.is_empty()
    }

    fn pick(&self) -> &Arc<dyn Completer> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.completers.len();
        &self.completers[index]
    }
}

#[async_trait]
impl Completer for RoundRobin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, messages: &[Message], options: CompleteOptions) -> Result<Completion> {
        let completer = self.pick();
        debug!(router = %self.name, completer = completer.name(), "routing completion");
        completer.complete(messages, options).await
    }
}
