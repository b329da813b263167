use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;

use crate::error::LLMError;
use crate::stream::FragmentStream;
use crate::types::Role;

use super::Thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Committed,
    Failed,
}

/// Streaming reply that owns the session's thread for as long as it lives.
///
/// Fragments are forwarded as they arrive and accumulated. When the provider
/// reports the end of generation the accumulated text is committed as one
/// assistant turn. Dropping the stream early, or a failed fragment, leaves the
/// thread untouched. Once ended the stream keeps returning `None`.
pub struct ReplyStream<'a> {
    fragments: FragmentStream,
    thread: &'a mut Thread,
    role: Role,
    prefix: String,
    buffer: String,
    state: State,
}

impl<'a> ReplyStream<'a> {
    pub(crate) fn new(fragments: FragmentStream, thread: &'a mut Thread, role: Role) -> Self {
        Self {
            fragments,
            thread,
            role,
            prefix: String::new(),
            buffer: String::new(),
            state: State::Open,
        }
    }

    /// Text committed in front of the fragments, such as a JSON priming turn
    /// that was sent with the request but not yet stored.
    pub(crate) fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// `true` once the full reply has been written to the thread.
    pub fn is_committed(&self) -> bool {
        self.state == State::Committed
    }

    /// Drains the remaining fragments and returns the full reply text.
    pub async fn collect_text(mut self) -> Result<String, LLMError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for ReplyStream<'_> {
    type Item = Result<String, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state != State::Open {
            return Poll::Ready(None);
        }

        match this.fragments.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                this.buffer.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.state = State::Failed;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                let mut text = std::mem::take(&mut this.prefix);
                text.push_str(&this.buffer);
                this.buffer.clear();
                this.thread.commit_assistant(this.role.clone(), text);
                this.state = State::Committed;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for ReplyStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyStream")
            .field("role", &self.role)
            .field("buffered", &self.buffer.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
