use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tracing::Span;

use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::session::report_usage;
use crate::types::TokenUsage;

/// Lazy sequence of text fragments produced by a provider.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>;

/// How a provider frames its streaming body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Server-sent events: `data:` lines terminated by a blank line.
    Sse,
    /// One JSON document per line (Ollama).
    JsonLines,
}

/// Standardized event yielded by [`StreamDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Raw payload emitted by the provider.
    Data(String),
    /// Terminal marker reported via `[DONE]`.
    Done,
}

/// Splits a raw HTTP body stream into [`StreamEvent`] values.
pub struct StreamDecoder {
    body: HttpBodyStream,
    framing: Framing,
    buffer: Vec<u8>,
    data_lines: Vec<Vec<u8>>,
    pending: VecDeque<Result<StreamEvent, LLMError>>,
    provider: &'static str,
    stream_closed: bool,
    done_received: bool,
}

impl StreamDecoder {
    pub fn new(body: HttpBodyStream, framing: Framing, provider: &'static str) -> Self {
        Self {
            body,
            framing,
            buffer: Vec::new(),
            data_lines: Vec::new(),
            pending: VecDeque::new(),
            provider,
            stream_closed: false,
            done_received: false,
        }
    }

    fn handle_line(&mut self, line: Vec<u8>) -> Result<(), LLMError> {
        match self.framing {
            Framing::Sse => {
                if line.is_empty() {
                    return self.flush_event();
                }
                if let Some(rest) = line.strip_prefix(b"data:") {
                    let data = rest.strip_prefix(b" ").unwrap_or(rest);
                    self.data_lines.push(data.to_vec());
                }
                Ok(())
            }
            Framing::JsonLines => {
                if line.iter().all(u8::is_ascii_whitespace) {
                    return Ok(());
                }
                self.data_lines.push(line);
                self.flush_event()
            }
        }
    }

    fn flush_event(&mut self) -> Result<(), LLMError> {
        if self.data_lines.is_empty() {
            return Ok(());
        }

        let joined = self.data_lines.drain(..).collect::<Vec<_>>().join(&b'\n');
        if joined.is_empty() {
            return Ok(());
        }

        let data = String::from_utf8(joined).map_err(|err| LLMError::Provider {
            provider: self.provider,
            message: format!("invalid UTF-8 in stream chunk: {err}"),
        })?;

        if self.framing == Framing::Sse && data.trim() == "[DONE]" {
            if !self.done_received {
                self.done_received = true;
                self.pending.push_back(Ok(StreamEvent::Done));
            }
        } else {
            self.pending.push_back(Ok(StreamEvent::Data(data)));
        }

        Ok(())
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl Stream for StreamDecoder {
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(event) = this.pending.pop_front() {
            return Poll::Ready(Some(event));
        }

        if this.done_received || this.stream_closed {
            return Poll::Ready(None);
        }

        loop {
            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        if let Err(err) = this.handle_line(line) {
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                    if let Some(event) = this.pending.pop_front() {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => {
                    this.stream_closed = true;
                    if !this.buffer.is_empty() {
                        let line = std::mem::take(&mut this.buffer);
                        if let Err(err) = this.handle_line(line) {
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                    if let Err(err) = this.flush_event() {
                        return Poll::Ready(Some(Err(err)));
                    }
                    return Poll::Ready(this.pending.pop_front());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// What a provider extracted from one decoded event.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ChunkUpdate {
    pub(crate) text: Option<String>,
    pub(crate) usage: Option<TokenUsage>,
    /// The provider signalled the end of generation.
    pub(crate) done: bool,
}

impl ChunkUpdate {
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub(crate) fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

pub(crate) type ChunkParser = fn(&str) -> Result<ChunkUpdate, LLMError>;

/// Provider-agnostic text stream over a decoded body.
///
/// Yields non-empty text fragments, merges usage counters across events and
/// logs them once when the provider reports the end of generation.
pub(crate) struct TextStream {
    events: StreamDecoder,
    parse: ChunkParser,
    provider: &'static str,
    requires_terminal: bool,
    usage: Option<TokenUsage>,
    span: Span,
    finished: bool,
}

impl TextStream {
    pub(crate) fn new(
        body: HttpBodyStream,
        framing: Framing,
        provider: &'static str,
        parse: ChunkParser,
        span: Span,
    ) -> Self {
        Self {
            events: StreamDecoder::new(body, framing, provider),
            parse,
            provider,
            requires_terminal: true,
            usage: None,
            span,
            finished: false,
        }
    }

    /// Treat the end of the body as the end of generation (Gemini has no marker).
    pub(crate) fn ends_with_body(mut self) -> Self {
        self.requires_terminal = false;
        self
    }

    pub(crate) fn boxed(self) -> FragmentStream {
        Box::pin(self)
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            report_usage(&self.span, self.usage.as_ref());
        }
    }

    fn fail(&mut self, err: LLMError) -> Poll<Option<Result<String, LLMError>>> {
        self.finished = true;
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for TextStream {
    type Item = Result<String, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            match this.events.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(StreamEvent::Data(data)))) => {
                    let update = match (this.parse)(&data) {
                        Ok(update) => update,
                        Err(err) => return this.fail(err),
                    };
                    if let Some(usage) = update.usage {
                        this.usage.get_or_insert_with(TokenUsage::default).merge(usage);
                    }
                    if update.done {
                        this.finish();
                    }
                    if let Some(text) = update.text.filter(|text| !text.is_empty()) {
                        return Poll::Ready(Some(Ok(text)));
                    }
                }
                Poll::Ready(Some(Ok(StreamEvent::Done))) => this.finish(),
                Poll::Ready(Some(Err(err))) => return this.fail(err),
                Poll::Ready(None) => {
                    if this.requires_terminal {
                        let err = LLMError::StreamClosed {
                            message: format!(
                                "{} stream ended before the end-of-generation marker",
                                this.provider
                            ),
                        };
                        return this.fail(err);
                    }
                    this.finish();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
