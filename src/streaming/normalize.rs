//! Reduce a vendor's incremental event stream to deltas plus one result.

use std::collections::BTreeMap;

use super::DeltaSink;
use crate::{Result, SwitchyardError};
use crate::types::{Completion, FinishReason, ToolCall, Usage};

/// One event of a vendor stream, already decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorEvent {
    /// The message id became known.
    Start { id: String },
    /// A fragment of output.
    Delta(Fragment),
    /// Token usage, possibly arriving after the stop event.
    Metadata(Usage),
    /// The vendor's stop signal, with its finish reason if it gave one.
    Stop(Option<FinishReason>),
}

/// A fragment of streamed output.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Content(String),
    /// Part of a tool call. Fragments sharing `index` belong to the same
    /// call; `id` and `name` usually arrive only on the first of them.
    ToolCall {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
}

/// Accumulates vendor events and forwards them as deltas.
///
/// Feed every event through [`apply`](Self::apply), then call
/// [`finish`](Self::finish) once the vendor stream has ended. The normalizer
/// emits exactly one terminal delta, from `finish`, so usage reported after
/// the stop event still reaches the consumer.
///
/// A stream that ends without a [`VendorEvent::Stop`] was cut short and
/// fails with [`SwitchyardError::Stream`].
#[derive(Debug)]
pub struct Normalizer {
    sink: Option<DeltaSink>,
    acc: Completion,
    // vendor index -> position in acc.message.tool_calls
    calls: BTreeMap<usize, usize>,
    reason: Option<FinishReason>,
    stopped: bool,
}

impl Normalizer {
    pub fn new(id: impl Into<String>, sink: Option<DeltaSink>) -> Self {
        Self {
            sink,
            acc: Completion::empty(id),
            calls: BTreeMap::new(),
            reason: None,
            stopped: false,
        }
    }

    /// Content accumulated so far.
    pub fn content(&self) -> &str {
        &self.acc.message.content
    }

    pub async fn apply(&mut self, event: VendorEvent) -> Result<()> {
        match event {
            VendorEvent::Start { id } => {
                if !id.is_empty() {
                    self.acc.id = id;
                }
            }
            VendorEvent::Delta(Fragment::Content(text)) => {
                if text.is_empty() {
                    return Ok(());
                }
                self.acc.message.content.push_str(&text);
                let delta = Completion::content_delta(self.acc.id.clone(), text);
                self.emit(delta).await?;
            }
            VendorEvent::Delta(Fragment::ToolCall {
                index,
                id,
                name,
                arguments,
            }) => {
                let call = self.call_at(index, id, name);
                call.arguments.push_str(&arguments);
                let fragment = ToolCall::new(call.id.clone(), call.name.clone(), arguments);
                let delta = Completion::tool_call_delta(self.acc.id.clone(), fragment);
                self.emit(delta).await?;
            }
            VendorEvent::Metadata(usage) => self.acc.usage = Some(usage),
            VendorEvent::Stop(reason) => {
                self.stopped = true;
                if reason.is_some() {
                    self.reason = reason;
                }
            }
        }
        Ok(())
    }

    /// Close out the stream: complete empty tool-call arguments, resolve the
    /// finish reason, emit the terminal delta and return the accumulated
    /// completion.
    ///
    /// A call whose arguments never arrived gets a `{}` fragment, so the
    /// fragments of every call still concatenate to its final arguments.
    pub async fn finish(mut self) -> Result<Completion> {
        if !self.stopped {
            return Err(SwitchyardError::Stream(
                "vendor stream ended before its stop signal".to_string(),
            ));
        }

        let mut fills = Vec::new();
        for call in &mut self.acc.message.tool_calls {
            if call.arguments.trim().is_empty() {
                call.arguments.push_str("{}");
                fills.push(ToolCall::new(call.id.clone(), call.name.clone(), "{}"));
            }
        }
        for fill in fills {
            let delta = Completion::tool_call_delta(self.acc.id.clone(), fill);
            self.emit(delta).await?;
        }

        let reason = resolve_reason(self.reason, !self.acc.message.tool_calls.is_empty());
        self.acc.reason = Some(reason);

        let terminal = Completion {
            usage: self.acc.usage,
            reason: Some(reason),
            ..Completion::empty(self.acc.id.clone())
        };
        self.emit(terminal).await?;

        Ok(self.acc)
    }

    fn call_at(&mut self, index: usize, id: Option<String>, name: Option<String>) -> &mut ToolCall {
        let calls = &mut self.acc.message.tool_calls;
        let position = *self.calls.entry(index).or_insert_with(|| {
            let id = id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{index}"));
            calls.push(ToolCall::new(id, "", ""));
            calls.len() - 1
        });

        let call = &mut calls[position];
        if call.name.is_empty()
            && let Some(name) = name
        {
            call.name = name;
        }
        call
    }

    async fn emit(&self, delta: Completion) -> Result<()> {
        match &self.sink {
            Some(sink) => sink.send(delta).await,
            None => Ok(()),
        }
    }
}

/// Settle the finish reason of a completed turn.
///
/// Tool calls win over a plain stop, and a tool-call reason without any
/// calls degrades to a stop. A stop signal that carried no reason is a
/// normal stop.
pub fn resolve_reason(reported: Option<FinishReason>, has_tool_calls: bool) -> FinishReason {
    match (reported, has_tool_calls) {
        (None | Some(FinishReason::Stop), true) => FinishReason::ToolCalls,
        (Some(FinishReason::ToolCalls), false) | (None, false) => FinishReason::Stop,
        (Some(reason), _) => reason,
    }
}
