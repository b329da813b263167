use std::collections::HashMap;

use async_trait::async_trait;
use tracing::Span;

use crate::config::{LlmConfig, Provider};
use crate::error::LLMError;
use crate::http::{
    DynHttpTransport, HttpResponse, collect_body_text, get_with_headers, post_json_stream_with_headers,
    post_json_with_headers, retry_after_from_headers,
};
use crate::provider::{join_url, log_models, log_request_body, parse_body};
use crate::session::json_mode::{extract_json, finish_reply};
use crate::session::{ChatSession, Reply, ReplyStream, SessionEnv, Thread, report_usage, session_span};
use crate::stream::{FragmentStream, Framing, TextStream};
use crate::types::{Role, TokenUsage};

use super::error::parse_openai_error;
use super::request::build_openai_body;
use super::response::{chat_model_ids, extract_reply, parse_stream_chunk};
use super::types::{OpenAiChatResponse, OpenAiModelList};
use super::{DEFAULT_BASE_URL, PROVIDER_ID};

/// Conversation against the OpenAI Chat Completions endpoint.
pub struct OpenAiSession {
    transport: DynHttpTransport,
    base_url: String,
    api_key: String,
    config: LlmConfig,
    thread: Thread,
    span: Span,
}

impl OpenAiSession {
    /// Reads `OPENAI_API_KEY` and prepares an empty thread.
    ///
    /// # Errors
    ///
    /// [`LLMError::MissingCredential`] when the key is not set.
    pub fn new(config: LlmConfig, env: &SessionEnv) -> Result<Self, LLMError> {
        let api_key = env.require_credential(Provider::OpenAi)?;
        let span = session_span(&config);
        Ok(Self {
            transport: env.transport(),
            base_url: env.base_url(Provider::OpenAi, DEFAULT_BASE_URL),
            api_key,
            config,
            thread: Thread::new(),
            span,
        })
    }

    pub(crate) fn boxed(config: LlmConfig, env: &SessionEnv) -> Result<Box<dyn ChatSession>, LLMError> {
        Ok(Box::new(Self::new(config, env)?))
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            join_url(base, path)
        } else {
            join_url(base, &format!("v1/{path}"))
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            ),
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
            Err(parse_openai_error(status, &text, retry_after))
        }
    }
}

#[async_trait]
impl ChatSession for OpenAiSession {
    fn provider(&self) -> Provider {
        Provider::OpenAi
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
        ReplyStream::new(fragments, &mut self.thread, Role::assistant())
    }

    async fn send_message<'a>(&'a mut self, content: &str) -> Result<Reply<'a>, LLMError> {
        self.add_message_to_thread(content, Role::user());
        let stream = self.config.stream;
        let body = build_openai_body(&self.config, &self.thread, stream);
        log_request_body(&self.config, &self.span, &body);
        let url = self.endpoint("chat/completions");

        if stream {
            let response =
                post_json_stream_with_headers(self.transport.as_ref(), url, self.build_headers(), &body)
                    .await?;
            if !(200..300).contains(&response.status) {
                let retry_after = retry_after_from_headers(&response.headers);
                let text = collect_body_text(response.body, PROVIDER_ID).await?;
                return Err(parse_openai_error(response.status, &text, retry_after));
            }
            let fragments = TextStream::new(
                response.body,
                Framing::Sse,
                PROVIDER_ID,
                parse_stream_chunk,
                self.span.clone(),
            )
            .boxed();
            return Ok(Reply::Stream(self.stream_response(fragments)));
        }

        let response =
            post_json_with_headers(self.transport.as_ref(), url, self.build_headers(), &body).await?;
        let text = self.ensure_success(response)?;
        let parsed: OpenAiChatResponse = parse_body(PROVIDER_ID, &text)?;
        let (answer, usage) = extract_reply(parsed)?;
        self.report_usage(usage.as_ref());
        self.thread.commit_assistant(Role::assistant(), answer.clone());
        Ok(finish_reply(self.config.json_mode, answer, extract_json))
    }

    async fn list_models(&self) -> Result<Vec<String>, LLMError> {
        let response =
            get_with_headers(self.transport.as_ref(), self.endpoint("models"), self.build_headers())
                .await?;
        let text = self.ensure_success(response)?;
        let list: OpenAiModelList = parse_body(PROVIDER_ID, &text)?;
        let models = chat_model_ids(list);
        log_models(&self.span, "Available models for OpenAI:", &models);
        Ok(models)
    }
}
