use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Url;
use tracing::Span;

use crate::config::{LlmConfig, Provider};
use crate::error::LLMError;
use crate::http::{
    DynHttpTransport, HttpResponse, collect_body_text, get_with_headers, post_json_stream_with_headers,
    post_json_with_headers, retry_after_from_headers,
};
use crate::provider::{join_url, log_models, log_request_body, parse_body};
use crate::session::{ChatSession, Reply, ReplyStream, SessionEnv, Thread, report_usage, session_span};
use crate::stream::{FragmentStream, Framing, TextStream};
use crate::types::{Role, TokenUsage};

use super::error::parse_gemini_error;
use super::request::build_gemini_body;
use super::response::{extract_reply, generative_model_ids, parse_stream_chunk};
use super::types::{GeminiModelPage, GeminiResponse};
use super::{API_VERSION, DEFAULT_BASE_URL, PROVIDER_ID};

const PAGE_SIZE: u32 = 100;

/// Listing URL for one page; the opaque token is percent-encoded.
fn page_url(base: &str, page_token: Option<&str>) -> Result<String, LLMError> {
    let page_size = PAGE_SIZE.to_string();
    let mut params = vec![("pageSize", page_size.as_str())];
    if let Some(token) = page_token {
        params.push(("pageToken", token));
    }
    Url::parse_with_params(base, &params)
        .map(String::from)
        .map_err(|err| LLMError::invalid_config("base_url", format!("invalid Google base URL: {err}")))
}

/// Conversation against Gemini `generateContent`.
pub struct GoogleSession {
    transport: DynHttpTransport,
    base_url: String,
    api_key: String,
    config: LlmConfig,
    thread: Thread,
    span: Span,
}

impl GoogleSession {
    pub fn new(config: LlmConfig, env: &SessionEnv) -> Result<Self, LLMError> {
        let api_key = env.require_credential(Provider::Google)?;
        let span = session_span(&config);
        if config.json_mode {
            span.in_scope(|| {
                tracing::warn!("JSON mode is not supported for Google; replies are returned as text")
            });
        }
        Ok(Self {
            transport: env.transport(),
            base_url: env.base_url(Provider::Google, DEFAULT_BASE_URL),
            api_key,
            config,
            thread: Thread::new(),
            span,
        })
    }

    pub(crate) fn boxed(config: LlmConfig, env: &SessionEnv) -> Result<Box<dyn ChatSession>, LLMError> {
        Ok(Box::new(Self::new(config, env)?))
    }

    fn model_path(&self) -> String {
        let model = self.config.model.trim_start_matches("models/");
        join_url(&self.base_url, &format!("{API_VERSION}/models/{model}"))
    }

    fn generate_endpoint(&self, stream: bool) -> String {
        if stream {
            format!("{}:streamGenerateContent?alt=sse", self.model_path())
        } else {
            format!("{}:generateContent", self.model_path())
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        HashMap::from([("x-goog-api-key".to_string(), self.api_key.clone())])
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, LLMError> {
        let status = response.status;
        let retry_after = retry_after_from_headers(&response.headers);
        let text = response.into_string()?;
        if (200..300).contains(&status) {
            Ok(text)
        } else {
            Err(parse_gemini_error(status, &text, retry_after))
        }
    }
}

#[async_trait]
impl ChatSession for GoogleSession {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn thread(&self) -> &Thread {
        &self.thread
    }

    fn add_message_to_thread(&mut self, content: &str, role: Role) {
        let role = if role.is_assistant() { Role::model() } else { role };
        self.thread.push(role, content);
    }

    fn report_usage(&self, usage: Option<&TokenUsage>) {
        report_usage(&self.span, usage);
    }

    fn stream_response(&mut self, fragments: FragmentStream) -> ReplyStream<'_> {
        ReplyStream::new(fragments, &mut self.thread, Role::model())
    }

    async fn send_message<'a>(&'a mut self, content: &str) -> Result<Reply<'a>, LLMError> {
        self.add_message_to_thread(content, Role::user());
        let stream = self.config.stream;
        let body = build_gemini_body(&self.config, &self.thread);
        log_request_body(&self.config, &self.span, &body);
        let url = self.generate_endpoint(stream);

        if stream {
            let response =
                post_json_stream_with_headers(self.transport.as_ref(), url, self.build_headers(), &body)
                    .await?;
            if !(200..300).contains(&response.status) {
                let retry_after = retry_after_from_headers(&response.headers);
                let text = collect_body_text(response.body, PROVIDER_ID).await?;
                return Err(parse_gemini_error(response.status, &text, retry_after));
            }
            let fragments = TextStream::new(
                response.body,
                Framing::Sse,
                PROVIDER_ID,
                parse_stream_chunk,
                self.span.clone(),
            )
            .ends_with_body()
            .boxed();
            return Ok(Reply::Stream(self.stream_response(fragments)));
        }

        let response =
            post_json_with_headers(self.transport.as_ref(), url, self.build_headers(), &body).await?;
        let text = self.ensure_success(response)?;
        let parsed: GeminiResponse = parse_body(PROVIDER_ID, &text)?;
        let (answer, usage) = extract_reply(parsed)?;
        self.report_usage(usage.as_ref());
        self.thread.commit_assistant(Role::model(), answer.clone());
        Ok(Reply::Text(answer))
    }

    async fn list_models(&self) -> Result<Vec<String>, LLMError> {
        let base = join_url(&self.base_url, &format!("{API_VERSION}/models"));
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = page_url(&base, page_token.as_deref())?;
            let response =
                get_with_headers(self.transport.as_ref(), url, self.build_headers()).await?;
            let text = self.ensure_success(response)?;
            let mut page: GeminiModelPage = parse_body(PROVIDER_ID, &text)?;
            page_token = page.next_page_token.take().filter(|token| !token.is_empty());
            models.extend(generative_model_ids(page));
            if page_token.is_none() {
                break;
            }
        }
        log_models(&self.span, "Available models for Google:", &models);
        Ok(models)
    }
}
