//! LLM client: one prompt in, generated text (or a terminal error) out.
//!
//! [`TextGenerator`] is the seam between the pipeline and the network. The
//! production implementation, [`ProviderGenerator`], wraps any
//! `edgequake_llm` provider; tests plug in scripted generators.
//!
//! ## Retry Strategy
//!
//! Every attempt runs under `api_timeout_secs`. Timeouts and API errors are
//! retried with exponential backoff (`retry_backoff_ms * 2^(attempt-1)`);
//! authentication failures are not, since a bad key stays bad. With the
//! defaults (3 retries, 2 s base) the waits are 2 s → 4 s → 8 s.

use crate::config::{PackConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::MentorixError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Prefix some providers put in place of content when the free quota is gone.
pub const QUOTA_EXHAUSTED_MARKER: &str = "QUOTA_EXHAUSTED";

/// What to send to the model.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Images attached to the user turn (vision OCR only).
    pub images: Vec<ImageData>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// What came back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmCallError {
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("{0}")]
    Api(String),
}

impl LlmCallError {
    fn is_retryable(&self) -> bool {
        !matches!(self, LlmCallError::Auth(_))
    }
}

/// Anything that can turn a prompt into text.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Generation, LlmCallError>>;
}

/// [`TextGenerator`] backed by an `edgequake_llm` provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PackConfig) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
                ..Default::default()
            },
        }
    }
}

impl TextGenerator for ProviderGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Generation, LlmCallError>> {
        Box::pin(async move {
            let mut messages = Vec::with_capacity(2);
            if let Some(ref system) = request.system {
                messages.push(ChatMessage::system(system.as_str()));
            }
            if request.images.is_empty() {
                messages.push(ChatMessage::user(request.prompt.as_str()));
            } else {
                messages.push(ChatMessage::user_with_images(
                    request.prompt.as_str(),
                    request.images.clone(),
                ));
            }

            let response = self
                .provider
                .chat(&messages, Some(&self.options))
                .await
                .map_err(|e| classify_provider_error(&e.to_string()))?;

            Ok(Generation {
                text: response.content,
                input_tokens: response.prompt_tokens as usize,
                output_tokens: response.completion_tokens as usize,
            })
        })
    }
}

/// Sort a provider error message into auth vs. everything else.
fn classify_provider_error(message: &str) -> LlmCallError {
    let lower = message.to_lowercase();
    let auth = ["401", "403", "unauthorized", "permission denied", "invalid api key", "api key not valid"];
    if auth.iter().any(|needle| lower.contains(needle)) {
        LlmCallError::Auth(message.to_string())
    } else {
        LlmCallError::Api(message.to_string())
    }
}

/// A successful call plus what it cost.
#[derive(Debug, Clone)]
pub struct Attempted {
    pub generation: Generation,
    pub retries: u32,
    pub duration_ms: u64,
}

/// Call `generator` until it succeeds, the error is not retryable, or
/// `max_retries` retries are used up.
///
/// `label` names the call in logs and errors ("notes", "ocr page 3", …).
pub async fn generate_with_retry(
    generator: &dyn TextGenerator,
    label: &str,
    request: &GenerationRequest,
    config: &PackConfig,
) -> Result<Attempted, MentorixError> {
    let start = Instant::now();
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<LlmCallError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match timeout(limit, generator.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmCallError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        match outcome {
            Ok(generation) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    "{}: {} input tokens, {} output tokens, {}ms",
                    label, generation.input_tokens, generation.output_tokens, duration_ms
                );
                return Ok(Attempted {
                    generation,
                    retries: attempt,
                    duration_ms,
                });
            }
            Err(e) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                let retryable = e.is_retryable();
                last_err = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    Err(match last_err {
        Some(LlmCallError::Timeout { secs }) => MentorixError::ApiTimeout {
            label: label.to_string(),
            secs,
        },
        Some(LlmCallError::Auth(detail)) => MentorixError::AuthError { detail },
        Some(LlmCallError::Api(message)) => MentorixError::LlmApiError { message },
        None => MentorixError::Internal(format!("{label}: no attempt was made")),
    })
}

/// Reject quota notices and (nearly) empty answers.
pub fn validate_response(text: &str, min_chars: usize) -> Result<(), MentorixError> {
    let trimmed = text.trim();
    if trimmed.starts_with(QUOTA_EXHAUSTED_MARKER) {
        return Err(MentorixError::QuotaExhausted);
    }
    let len = trimmed.chars().count();
    if len < min_chars {
        return Err(MentorixError::ResponseTooShort { len });
    }
    Ok(())
}

/// Resolve the text generator, from most-specific to least-specific.
///
/// 1. **Pre-built generator** (`config.generator`).
/// 2. **Pre-built provider** (`config.provider`).
/// 3. **Named provider** (`config.provider_name`), reading its API key from
///    the environment.
/// 4. **Environment pair** (`MENTORIX_LLM_PROVIDER` + `MENTORIX_MODEL`).
/// 5. **Gemini** when `GEMINI_API_KEY` is set.
/// 6. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_generator(config: &PackConfig) -> Result<Arc<dyn TextGenerator>, MentorixError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderGenerator::new(provider, config)))
}

fn resolve_provider(config: &PackConfig) -> Result<Arc<dyn LLMProvider>, MentorixError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or_else(|| default_model_for(name));
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("MENTORIX_LLM_PROVIDER"),
        std::env::var("MENTORIX_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(DEFAULT_PROVIDER, model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| MentorixError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(llm_provider)
}

fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4.1-mini",
        "anthropic" => "claude-sonnet-4-20250514",
        "ollama" => "llama3.2",
        _ => DEFAULT_MODEL,
    }
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, MentorixError> {
    info!("Using LLM provider '{}' with model '{}'", name, model);
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        MentorixError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls with `error`, then answers.
    struct Flaky {
        failures: u32,
        error: LlmCallError,
        calls: AtomicU32,
    }

    impl TextGenerator for Flaky {
        fn generate<'a>(
            &'a self,
            _request: &'a GenerationRequest,
        ) -> BoxFuture<'a, Result<Generation, LlmCallError>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    Err(self.error.clone())
                } else {
                    Ok(Generation {
                        text: "ok".into(),
                        input_tokens: 3,
                        output_tokens: 1,
                    })
                }
            })
        }
    }

    struct Slow;

    impl TextGenerator for Slow {
        fn generate<'a>(
            &'a self,
            _request: &'a GenerationRequest,
        ) -> BoxFuture<'a, Result<Generation, LlmCallError>> {
            Box::pin(async move {
                sleep(Duration::from_secs(5)).await;
                Ok(Generation::default())
            })
        }
    }

    fn fast_config(max_retries: u32) -> PackConfig {
        PackConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(0)
            .build()
            .unwrap()
    }

    #[test]
    fn retries_until_success() {
        let gen = Flaky {
            failures: 2,
            error: LlmCallError::Api("503 Service Unavailable".into()),
            calls: AtomicU32::new(0),
        };
        let req = GenerationRequest::text("hi");
        let out = tokio_test::block_on(generate_with_retry(&gen, "notes", &req, &fast_config(3))).unwrap();
        assert_eq!(out.retries, 2);
        assert_eq!(out.generation.text, "ok");
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let gen = Flaky {
            failures: 10,
            error: LlmCallError::Api("500".into()),
            calls: AtomicU32::new(0),
        };
        let req = GenerationRequest::text("hi");
        let err = generate_with_retry(&gen, "roadmap", &req, &fast_config(2)).await.unwrap_err();
        assert!(matches!(err, MentorixError::LlmApiError { .. }));
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn long_retry_runs_do_not_overflow_backoff() {
        let gen = Flaky {
            failures: 70,
            error: LlmCallError::Api("503".into()),
            calls: AtomicU32::new(0),
        };
        let req = GenerationRequest::text("hi");
        let out = generate_with_retry(&gen, "notes", &req, &fast_config(80)).await.unwrap();
        assert_eq!(out.retries, 70);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 71);
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let gen = Flaky {
            failures: 10,
            error: LlmCallError::Auth("401".into()),
            calls: AtomicU32::new(0),
        };
        let req = GenerationRequest::text("hi");
        let err = generate_with_retry(&gen, "qbank", &req, &fast_config(3)).await.unwrap_err();
        assert!(matches!(err, MentorixError::AuthError { .. }));
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_becomes_api_timeout() {
        let config = PackConfig::builder()
            .max_retries(0)
            .api_timeout_secs(1)
            .build()
            .unwrap();
        let req = GenerationRequest::text("hi");
        let err = generate_with_retry(&Slow, "notes", &req, &config).await.unwrap_err();
        match err {
            MentorixError::ApiTimeout { label, secs } => {
                assert_eq!(label, "notes");
                assert_eq!(secs, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_response_rules() {
        assert!(matches!(
            validate_response("QUOTA_EXHAUSTED: try later", 10),
            Err(MentorixError::QuotaExhausted)
        ));
        assert!(matches!(
            validate_response("  short  ", 100),
            Err(MentorixError::ResponseTooShort { len: 5 })
        ));
        assert!(validate_response(&"x".repeat(100), 100).is_ok());
    }

    #[test]
    fn classify_errors() {
        assert!(matches!(classify_provider_error("HTTP 401 Unauthorized"), LlmCallError::Auth(_)));
        assert!(matches!(classify_provider_error("API key not valid"), LlmCallError::Auth(_)));
        assert!(matches!(classify_provider_error("HTTP 503"), LlmCallError::Api(_)));
    }

    #[test]
    fn resolve_prefers_prebuilt_generator() {
        let gen: Arc<dyn TextGenerator> = Arc::new(Slow);
        let config = PackConfig::builder().generator(Arc::clone(&gen)).build().unwrap();
        let resolved = resolve_generator(&config).unwrap();
        assert!(Arc::ptr_eq(&gen, &resolved));
    }
}
