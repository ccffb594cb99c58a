//! Blocking and streaming answer generation on top of an [`LlmClient`].

use std::sync::Arc;

use futures::StreamExt;
use ragline_core::{AppError, AppResult};

use crate::client::{LlmClient, LlmOptions, LlmRequest, LlmStream};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::types::{EventStream, GenerationEvent, GenerationOptions};

/// Message emitted when the backend closes a stream without a `done` record.
pub const INCOMPLETE_STREAM: &str = "generation stream ended before completion";

#[derive(Debug, Clone)]
pub struct Generator {
    client: Arc<dyn LlmClient>,
    options: GenerationOptions,
    policy: RetryPolicy,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, options: GenerationOptions, policy: RetryPolicy) -> Self {
        Self {
            client,
            options,
            policy,
        }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    fn request(&self, system: Option<&str>, prompt: &str) -> LlmRequest {
        let mut request = LlmRequest::new(prompt, self.options.model.clone()).with_options(
            LlmOptions {
                temperature: Some(self.options.temperature),
                num_ctx: Some(self.options.context_window),
                num_predict: Some(self.options.max_output_tokens),
            },
        );
        if let Some(system) = system {
            request = request.with_system(system);
        }
        request
    }

    /// Replace an unknown-model error with one listing the installed models.
    async fn enrich(&self, error: AppError) -> AppError {
        match error {
            AppError::ModelNotFound { model, .. } => {
                let available = match self.client.list_models().await {
                    Ok(models) => models,
                    Err(e) => {
                        tracing::warn!("Could not list models: {}", e);
                        Vec::new()
                    }
                };
                AppError::ModelNotFound { model, available }
            }
            other => other,
        }
    }

    /// Generate the full answer text, retrying under the timeout schedule.
    pub async fn generate(&self, system: Option<&str>, prompt: &str) -> AppResult<String> {
        let _timer = ragline_core::logging::Stopwatch::start("generate");
        let base = self.request(system, prompt);

        let result = run_with_retry(&self.policy, "generate", |timeout| {
            let request = base.clone().with_timeout(timeout);
            let client = Arc::clone(&self.client);
            async move { client.complete(&request).await }
        })
        .await;

        match result {
            Ok(response) => Ok(response.content),
            Err(e) => Err(self.enrich(e).await),
        }
    }

    /// Open a streamed answer.
    ///
    /// Only opening the connection is retried. Once the stream is returned,
    /// failures are reported in-band and the stream still ends with `Done`.
    pub async fn generate_stream(&self, system: Option<&str>, prompt: &str) -> AppResult<EventStream> {
        let base = self.request(system, prompt).with_streaming();

        let result = run_with_retry(&self.policy, "generate_stream", |timeout| {
            let request = base.clone().with_timeout(timeout);
            let client = Arc::clone(&self.client);
            async move { client.stream(&request).await }
        })
        .await;

        match result {
            Ok(upstream) => Ok(bracket_events(upstream)),
            Err(e) => Err(self.enrich(e).await),
        }
    }
}

enum Phase {
    Start,
    Streaming,
    Closing,
    Finished,
}

struct BracketState {
    upstream: Option<LlmStream>,
    phase: Phase,
}

/// Wrap raw chunks in `Start ... Done`, converting failures to one `ErrorDelta`.
///
/// The upstream is polled only when the consumer asks for the next event and
/// is released as soon as the stream reaches its closing phase.
pub fn bracket_events(upstream: LlmStream) -> EventStream {
    let state = BracketState {
        upstream: Some(upstream),
        phase: Phase::Start,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            match st.phase {
                Phase::Start => {
                    st.phase = Phase::Streaming;
                    return Some((GenerationEvent::Start, st));
                }
                Phase::Streaming => {
                    let next = match st.upstream.as_mut() {
                        Some(upstream) => upstream.next().await,
                        None => None,
                    };
                    match next {
                        Some(Ok(chunk)) => {
                            if chunk.done {
                                st.upstream = None;
                                st.phase = Phase::Closing;
                            }
                            if !chunk.content.is_empty() {
                                return Some((GenerationEvent::ContentDelta(chunk.content), st));
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Generation stream failed: {}", e);
                            st.upstream = None;
                            st.phase = Phase::Closing;
                            return Some((GenerationEvent::ErrorDelta(e.to_string()), st));
                        }
                        None => {
                            tracing::warn!("{}", INCOMPLETE_STREAM);
                            st.upstream = None;
                            st.phase = Phase::Closing;
                            return Some((
                                GenerationEvent::ErrorDelta(INCOMPLETE_STREAM.to_string()),
                                st,
                            ));
                        }
                    }
                }
                Phase::Closing => {
                    st.phase = Phase::Finished;
                    return Some((GenerationEvent::Done, st));
                }
                Phase::Finished => return None,
            }
        }
    });

    Box::pin(stream)
}
