use async_trait::async_trait;
use tracing::{Span, info};

use crate::config::{LlmConfig, Provider};
use crate::error::LLMError;
use crate::http::{
    DynHttpTransport, HttpResponse, collect_body_text, get_with_headers, post_json_stream_with_headers,
    post_json_with_headers,
};
use crate::provider::{join_url, log_models, log_request_body, parse_body};
use crate::session::json_mode::{extract_json, finish_reply};
use crate::session::{ChatSession, Reply, ReplyStream, SessionEnv, Thread, report_usage, session_span};
use crate::stream::{FragmentStream, Framing, TextStream};
use crate::types::{Role, TokenUsage};

use super::error::parse_ollama_error;
use super::request::{build_chat_body, build_pull_body};
use super::response::{
    catalog_model_names, extract_reply, is_installed, local_model_names, parse_stream_line,
};
use super::types::{CatalogResponse, OllamaChatResponse, OllamaPullResponse, OllamaTagsResponse};
use super::{CATALOG_URL, DEFAULT_BASE_URL, HOST_ENV, PROVIDER_ID, host_to_base_url};

/// Conversation against a local Ollama server.
///
/// No credential is needed. Before the first generation the session makes
/// sure the configured model is installed and pulls it otherwise.
pub struct OllamaSession {
    transport: DynHttpTransport,
    base_url: String,
    catalog_url: String,
    config: LlmConfig,
    thread: Thread,
    model_ready: bool,
    span: Span,
}

impl OllamaSession {
    pub fn new(config: LlmConfig, env: &SessionEnv) -> Result<Self, LLMError> {
        let default_base = env
            .secret(HOST_ENV)
            .map(|host| host_to_base_url(&host))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let span = session_span(&config);
        Ok(Self {
            transport: env.transport(),
            base_url: env.base_url(Provider::Ollama, &default_base),
            catalog_url: CATALOG_URL.to_string(),
            config,
            thread: Thread::new(),
            model_ready: false,
            span,
        })
    }

    pub(crate) fn boxed(config: LlmConfig, env: &SessionEnv) -> Result<Box<dyn ChatSession>, LLMError> {
        Ok(Box::new(Self::new(config, env)?))
    }

    /// Replaces the community catalog queried by `list_models`.
    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, LLMError> {
        let status = response.status;
        let text = response.into_string()?;
        if (200..300).contains(&status) {
            Ok(text)
        } else {
            Err(parse_ollama_error(status, &text))
        }
    }

    async fn installed_models(&self) -> Result<Vec<String>, LLMError> {
        let response =
            get_with_headers(self.transport.as_ref(), self.endpoint("api/tags"), Default::default())
                .await?;
        let text = self.ensure_success(response)?;
        let tags: OllamaTagsResponse = parse_body(PROVIDER_ID, &text)?;
        Ok(local_model_names(tags))
    }

    async fn ensure_model(&mut self) -> Result<(), LLMError> {
        if self.model_ready {
            return Ok(());
        }
        let installed = self.installed_models().await?;
        if !is_installed(&installed, &self.config.model) {
            let model = self.config.model.clone();
            self.span.in_scope(|| info!("Pulling model {model}..."));
            let response = post_json_with_headers(
                self.transport.as_ref(),
                self.endpoint("api/pull"),
                Default::default(),
                &build_pull_body(&model),
            )
            .await?;
            let text = self.ensure_success(response)?;
            let pulled: OllamaPullResponse = parse_body(PROVIDER_ID, &text)?;
            if let Some(error) = pulled.error {
                return Err(LLMError::provider(
                    PROVIDER_ID,
                    format!("failed to pull {model}: {error}"),
                ));
            }
            let status = pulled.status.unwrap_or_else(|| "success".to_string());
            self.span
                .in_scope(|| info!(status = %status, "Model pulled successfully."));
        }
        self.model_ready = true;
        Ok(())
    }
}

#[async_trait]
impl ChatSession for OllamaSession {
    fn provider(&self) -> Provider {
        Provider::Ollama
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
        self.ensure_model().await?;
        self.add_message_to_thread(content, Role::user());
        let stream = self.config.stream;
        let body = build_chat_body(&self.config, &self.thread, stream);
        log_request_body(&self.config, &self.span, &body);
        let url = self.endpoint("api/chat");

        if stream {
            let response = post_json_stream_with_headers(
                self.transport.as_ref(),
                url,
                Default::default(),
                &body,
            )
            .await?;
            if !(200..300).contains(&response.status) {
                let text = collect_body_text(response.body, PROVIDER_ID).await?;
                return Err(parse_ollama_error(response.status, &text));
            }
            let fragments = TextStream::new(
                response.body,
                Framing::JsonLines,
                PROVIDER_ID,
                parse_stream_line,
                self.span.clone(),
            )
            .boxed();
            return Ok(Reply::Stream(self.stream_response(fragments)));
        }

        let response =
            post_json_with_headers(self.transport.as_ref(), url, Default::default(), &body).await?;
        let text = self.ensure_success(response)?;
        let parsed: OllamaChatResponse = parse_body(PROVIDER_ID, &text)?;
        let (answer, usage) = extract_reply(parsed)?;
        self.report_usage(usage.as_ref());
        self.thread.commit_assistant(Role::assistant(), answer.clone());
        Ok(finish_reply(self.config.json_mode, answer, extract_json))
    }

    async fn list_models(&self) -> Result<Vec<String>, LLMError> {
        let installed = self.installed_models().await?;
        log_models(&self.span, "Pulled models for Ollama:", &installed);

        let response =
            get_with_headers(self.transport.as_ref(), self.catalog_url.clone(), Default::default())
                .await?;
        let text = self.ensure_success(response)?;
        let catalog: CatalogResponse = parse_body(PROVIDER_ID, &text)?;
        let available = catalog_model_names(catalog);
        log_models(&self.span, "Available models for Ollama:", &available);

        let mut models = installed;
        for model in available {
            if !models.contains(&model) {
                models.push(model);
            }
        }
        Ok(models)
    }
}
