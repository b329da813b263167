use std::collections::HashMap;

use async_trait::async_trait;
use tracing::Span;

use crate::config::{LlmConfig, Provider};
use crate::error::LLMError;
use crate::http::{
    DynHttpTransport, HttpResponse, collect_body_text, post_json_stream_with_headers,
    post_json_with_headers, retry_after_from_headers,
};
use crate::provider::{join_url, log_models, log_request_body, parse_body};
use crate::session::json_mode::{complete_primed_json, finish_reply};
use crate::session::{ChatSession, Reply, ReplyStream, SessionEnv, Thread, report_usage, session_span};
use crate::stream::{FragmentStream, Framing, TextStream};
use crate::types::{Role, TokenUsage};

use super::error::parse_anthropic_error;
use super::request::build_anthropic_body;
use super::response::{extract_reply, parse_stream_event};
use super::types::AnthropicMessageResponse;
use super::{API_VERSION, DEFAULT_BASE_URL, JSON_PRIMING, KNOWN_MODELS, PROVIDER_ID};

/// Conversation against the Anthropic Messages API.
///
/// JSON mode has no native switch here. The request ends with an assistant
/// turn ending in `{` so the model continues an object, and the reply is
/// re-prefixed with the brace before parsing. The priming turn reaches the
/// thread only together with a completed reply.
pub struct AnthropicSession {
    transport: DynHttpTransport,
    base_url: String,
    api_key: String,
    config: LlmConfig,
    thread: Thread,
    span: Span,
}

impl AnthropicSession {
    pub fn new(config: LlmConfig, env: &SessionEnv) -> Result<Self, LLMError> {
        let api_key = env.require_credential(Provider::Anthropic)?;
        let span = session_span(&config);
        if config.seed.is_some() {
            span.in_scope(|| tracing::warn!("seed is not supported by Anthropic and is ignored"));
        }
        Ok(Self {
            transport: env.transport(),
            base_url: env.base_url(Provider::Anthropic, DEFAULT_BASE_URL),
            api_key,
            config,
            thread: Thread::new(),
            span,
        })
    }

    pub(crate) fn boxed(config: LlmConfig, env: &SessionEnv) -> Result<Box<dyn ChatSession>, LLMError> {
        Ok(Box::new(Self::new(config, env)?))
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            join_url(base, "messages")
        } else {
            join_url(base, "v1/messages")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("x-api-key".to_string(), self.api_key.clone()),
            ("anthropic-version".to_string(), API_VERSION.to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ])
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, LLMError> {
        let status = response.status;
        let retry_after = retry_after_from_headers(&response.headers);
        let text = response.into_string()?;
        if (200..300).contains(&status) {
            Ok(text)
        } else {
            Err(parse_anthropic_error(status, &text, retry_after))
        }
    }
}

#[async_trait]
impl ChatSession for AnthropicSession {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn thread(&self) -> &Thread {
        &self.thread
    }

    fn add_message_to_thread(&mut self, content: &str, role: Role) {
        self.thread.push(role, content);
    }

    fn report_usage(&self, usage: Option<&TokenUsage>) {
        report_usage(&self.span, usage);
    }

    fn stream_response(&mut self, fragments: FragmentStream) -> ReplyStream<'_> {
        let reply = ReplyStream::new(fragments, &mut self.thread, Role::assistant());
        if self.config.json_mode {
            reply.with_prefix(JSON_PRIMING)
        } else {
            reply
        }
    }

    async fn send_message<'a>(&'a mut self, content: &str) -> Result<Reply<'a>, LLMError> {
        self.add_message_to_thread(content, Role::user());
        let priming = self.config.json_mode.then_some(JSON_PRIMING);
        let stream = self.config.stream;
        let body = build_anthropic_body(&self.config, &self.thread, priming, stream);
        log_request_body(&self.config, &self.span, &body);

        if stream {
            let response = post_json_stream_with_headers(
                self.transport.as_ref(),
                self.endpoint(),
                self.build_headers(),
                &body,
            )
            .await?;
            if !(200..300).contains(&response.status) {
                let retry_after = retry_after_from_headers(&response.headers);
                let text = collect_body_text(response.body, PROVIDER_ID).await?;
                return Err(parse_anthropic_error(response.status, &text, retry_after));
            }
            let fragments = TextStream::new(
                response.body,
                Framing::Sse,
                PROVIDER_ID,
                parse_stream_event,
                self.span.clone(),
            )
            .boxed();
            return Ok(Reply::Stream(self.stream_response(fragments)));
        }

        let response = post_json_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(),
            &body,
        )
        .await?;
        let text = self.ensure_success(response)?;
        let parsed: AnthropicMessageResponse = parse_body(PROVIDER_ID, &text)?;
        let (answer, usage) = extract_reply(parsed);
        self.report_usage(usage.as_ref());
        self.thread
            .commit_assistant(Role::assistant(), format!("{}{answer}", priming.unwrap_or_default()));
        Ok(finish_reply(self.config.json_mode, answer, complete_primed_json))
    }

    async fn list_models(&self) -> Result<Vec<String>, LLMError> {
        let models: Vec<String> = KNOWN_MODELS.iter().map(|model| model.to_string()).collect();
        log_models(&self.span, "Available models for Anthropic:", &models);
        Ok(models)
    }
}
