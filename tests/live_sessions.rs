use std::env;

use dotenvy::dotenv;
use futures_util::StreamExt;
use llmanager::config::{LlmConfig, Provider};
use llmanager::registry::SessionRegistry;
use llmanager::session::{Reply, SessionEnv};

fn load_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

async fn exercise(provider: Provider, model_var: &str, fallback_model: &str) {
    let _ = dotenv();

    let key_var = provider.api_key_env();
    if provider.requires_credential() && load_env_var(&key_var).is_none() {
        eprintln!("skip live test: {key_var} missing");
        return;
    }
    let model = load_env_var(model_var).unwrap_or_else(|| fallback_model.to_string());
    let env = SessionEnv::from_process_env().expect("transport");
    let registry = SessionRegistry::builtin();

    let mut session = registry
        .build(LlmConfig::new(provider, model.clone()), &env)
        .expect("session");
    session.add_system_prompt("You are a helpful assistant.");
    let text = session
        .send_message("Please introduce Rust language in one sentence.")
        .await
        .expect("reply")
        .into_text()
        .await
        .expect("text");
    assert!(!text.trim().is_empty(), "sync reply should have text");
    assert_eq!(session.thread().len(), 3);

    let mut config = LlmConfig::new(provider, model);
    config.stream = true;
    let mut session = registry.build(config, &env).expect("session");
    let reply = session
        .send_message("Count from one to five.")
        .await
        .expect("reply");
    let Reply::Stream(mut fragments) = reply else {
        panic!("expected a streamed reply");
    };
    let mut collected = String::new();
    while let Some(fragment) = fragments.next().await {
        collected.push_str(&fragment.expect("fragment"));
    }
    assert!(fragments.is_committed());
    drop(fragments);
    assert!(!collected.is_empty(), "stream should yield text");
    assert_eq!(session.thread().len(), 2);
}

#[tokio::test]
#[ignore = "requires OPENAI_API_KEY"]
async fn openai_live_sync_and_stream() {
    exercise(Provider::OpenAi, "OPENAI_MODEL", "gpt-4o-mini").await;
}

#[tokio::test]
#[ignore = "requires ANTHROPIC_API_KEY"]
async fn anthropic_live_sync_and_stream() {
    exercise(Provider::Anthropic, "ANTHROPIC_MODEL", "claude-3-5-haiku-latest").await;
}

#[tokio::test]
#[ignore = "requires GOOGLE_API_KEY"]
async fn google_live_sync_and_stream() {
    exercise(Provider::Google, "GOOGLE_MODEL", "gemini-1.5-flash").await;
}

#[tokio::test]
#[ignore = "requires a running Ollama server"]
async fn ollama_live_sync_and_stream() {
    exercise(Provider::Ollama, "OLLAMA_MODEL", "llama3.2").await;
}
