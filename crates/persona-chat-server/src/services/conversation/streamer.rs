use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use super::prompt::assemble_prompt;
use super::session::Session;
use crate::config::{GenerationConfig, PersonaConfig};
use crate::models::chat::{FailureReason, Role, SessionId, StreamUpdate};
use crate::services::generation::{GenerationProvider, GenerationRequest};

/// Trailing marker shown while a response is still arriving.
pub const CURSOR_MARKER: &str = "▌";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    AwaitingResponse,
    Streaming,
    Completed,
    Failed,
}

impl SubmissionPhase {
    pub fn can_advance_to(self, next: SubmissionPhase) -> bool {
        use SubmissionPhase::*;
        matches!(
            (self, next),
            (Idle, AwaitingResponse)
                | (AwaitingResponse, Streaming)
                | (AwaitingResponse, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (Completed, Idle)
                | (Failed, Idle)
        )
    }
}

/// Phase tracker for one user submission.
struct Submission {
    session_id: SessionId,
    phase: SubmissionPhase,
    started: Instant,
}

impl Submission {
    fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            phase: SubmissionPhase::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: SubmissionPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid submission transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(session_id = %self.session_id, from = ?self.phase, to = ?next, "Submission phase");
        self.phase = next;
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

/// Turns one user submission into a generation call and a stream of display updates.
pub struct ResponseStreamer {
    provider: Arc<dyn GenerationProvider>,
    persona: Arc<PersonaConfig>,
    generation: GenerationConfig,
}

impl ResponseStreamer {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        persona: Arc<PersonaConfig>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            provider,
            persona,
            generation,
        }
    }

    /// Build the request from the session's current configuration.
    ///
    /// The persona instruction travels only in `system_instruction`; the
    /// response-language choice is added there as a final directive line.
    pub fn build_request(&self, session: &Session, prompt: String) -> GenerationRequest {
        let system_instruction = format!(
            "{}\n\nResponse language: {}.",
            session.log.system_instruction().trim_end(),
            session.config.language
        );

        GenerationRequest {
            model: session.config.model.clone(),
            system_instruction,
            temperature: session.config.temperature,
            top_p: self.generation.top_p,
            top_k: self.generation.top_k,
            max_output_tokens: self.generation.max_output_tokens,
            prompt,
        }
    }

    /// Run one submission while holding the session.
    ///
    /// The user turn is recorded before the call is issued. The assistant turn
    /// is recorded only when at least one fragment arrived and the sequence
    /// ended cleanly; dropping the stream early records nothing further.
    pub fn submit(
        self: Arc<Self>,
        session: OwnedMutexGuard<Session>,
        input: String,
    ) -> impl Stream<Item = StreamUpdate> + Send + 'static {
        async_stream::stream! {
            let mut session = session;
            let mut submission = Submission::new(session.id);
            session.touch();

            let prompt = assemble_prompt(session.log.prior_turns(), &input);
            let request = self.build_request(&session, prompt);
            session.log.append(Role::User, input);

            info!(
                session_id = %session.id,
                model = %request.model,
                temperature = request.temperature,
                turns = session.log.len(),
                "Submitting message"
            );

            submission.advance(SubmissionPhase::AwaitingResponse);
            yield StreamUpdate::Thinking {
                message: self.persona.thinking_message.clone(),
            };

            let mut fragments = match self.provider.generate_stream(request).await {
                Ok(fragments) => fragments,
                Err(e) => {
                    warn!(session_id = %session.id, "Generation setup failed: {:#}", e);
                    submission.advance(SubmissionPhase::Failed);
                    yield StreamUpdate::Failed {
                        reason: FailureReason::Setup,
                        message: format!("{}: {}", self.persona.error_prefix, e),
                    };
                    submission.advance(SubmissionPhase::Idle);
                    return;
                }
            };

            let mut buffer = String::new();
            let mut fragment_count = 0usize;

            while let Some(item) = fragments.next().await {
                match item {
                    Ok(fragment) => {
                        if fragment.is_empty() {
                            continue;
                        }
                        if submission.phase == SubmissionPhase::AwaitingResponse {
                            submission.advance(SubmissionPhase::Streaming);
                        }
                        fragment_count += 1;
                        buffer.push_str(&fragment);
                        yield StreamUpdate::Frame {
                            content: format!("{}{}", buffer, CURSOR_MARKER),
                        };
                    }
                    Err(e) => {
                        // Nothing shown yet: same outcome as a failed call.
                        let reason = if fragment_count == 0 {
                            FailureReason::Setup
                        } else {
                            FailureReason::Interrupted
                        };
                        warn!(
                            session_id = %session.id,
                            fragments = fragment_count,
                            ?reason,
                            "Generation stream broke off: {:#}", e
                        );
                        submission.advance(SubmissionPhase::Failed);
                        yield StreamUpdate::Failed {
                            reason,
                            message: format!("{}: {}", self.persona.error_prefix, e),
                        };
                        submission.advance(SubmissionPhase::Idle);
                        return;
                    }
                }
            }

            if buffer.is_empty() {
                warn!(session_id = %session.id, "Generation produced no text");
                submission.advance(SubmissionPhase::Failed);
                yield StreamUpdate::Failed {
                    reason: FailureReason::EmptyResult,
                    message: self.persona.fallback_message.clone(),
                };
                submission.advance(SubmissionPhase::Idle);
                return;
            }

            session.log.append(Role::Assistant, buffer.clone());
            submission.advance(SubmissionPhase::Completed);

            info!(
                session_id = %session.id,
                fragments = fragment_count,
                response_len = buffer.len(),
                elapsed_ms = submission.elapsed_ms() as u64,
                "Response completed"
            );

            yield StreamUpdate::Completed { content: buffer };
            submission.advance(SubmissionPhase::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::test_support::{persona, settings};
    use crate::models::chat::{ResponseLanguage, SessionConfiguration, UpdateConfigRequest};
    use crate::services::generation::{FragmentStream, MockGenerationProvider};
    use anyhow::Result;
    use tokio::sync::Mutex;

    fn fragments(items: Vec<Result<String>>) -> FragmentStream {
        Box::pin(futures::stream::iter(items))
    }

    fn ok_fragments(texts: &[&str]) -> FragmentStream {
        fragments(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    fn new_session() -> Arc<Mutex<Session>> {
        Arc::new(Mutex::new(Session::new(
            uuid::Uuid::new_v4(),
            &persona().system_prompt,
            SessionConfiguration {
                temperature: 0.3,
                model: "gemini-2.0-flash".to_string(),
                language: ResponseLanguage::Vietnamese,
            },
        )))
    }

    fn streamer(provider: impl GenerationProvider + 'static) -> Arc<ResponseStreamer> {
        Arc::new(ResponseStreamer::new(
            Arc::new(provider),
            Arc::new(persona()),
            settings().generation,
        ))
    }

    async fn run(
        streamer: &Arc<ResponseStreamer>,
        session: &Arc<Mutex<Session>>,
        input: &str,
    ) -> Vec<StreamUpdate> {
        let guard = session.clone().lock_owned().await;
        streamer.clone().submit(guard, input.to_string()).collect().await
    }

    /// Records every request and replays canned fragment lists.
    struct RecordingProvider {
        requests: std::sync::Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait::async_trait]
    impl GenerationProvider for Arc<RecordingProvider> {
        async fn generate_stream(&self, request: GenerationRequest) -> Result<FragmentStream> {
            self.requests.lock().unwrap().push(request);
            Ok(ok_fragments(&["ok"]))
        }
    }

    #[tokio::test]
    async fn test_fragments_are_revealed_with_cursor() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate_stream()
            .times(1)
            .returning(|_| Ok(ok_fragments(&["Hel", "lo"])));

        let streamer = streamer(provider);
        let session = new_session();
        let updates = run(&streamer, &session, "hi").await;

        let displayed: Vec<&str> = updates
            .iter()
            .filter_map(|u| match u {
                StreamUpdate::Frame { content } | StreamUpdate::Completed { content } => {
                    Some(content.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(displayed, vec!["Hel▌", "Hello▌", "Hello"]);
        assert!(matches!(updates[0], StreamUpdate::Thinking { .. }));

        let session = session.lock().await;
        let last = session.log.turns().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hello");
    }

    #[tokio::test]
    async fn test_setup_failure_records_only_user_turn() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate_stream()
            .returning(|_| Err(anyhow::anyhow!("invalid API key")));

        let streamer = streamer(provider);
        let session = new_session();
        let before = session.lock().await.log.len();

        let updates = run(&streamer, &session, "hi").await;

        match updates.last() {
            Some(StreamUpdate::Failed { reason, message }) => {
                assert_eq!(*reason, FailureReason::Setup);
                assert!(message.starts_with("Error generating response"));
                assert!(message.contains("invalid API key"));
            }
            other => panic!("unexpected update: {:?}", other),
        }
        assert_eq!(session.lock().await.log.len(), before + 1);
    }

    #[tokio::test]
    async fn test_empty_result_shows_fallback_and_records_nothing_more() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate_stream()
            .returning(|_| Ok(ok_fragments(&["", ""])));

        let streamer = streamer(provider);
        let session = new_session();
        let updates = run(&streamer, &session, "hi").await;

        assert_eq!(
            updates.last(),
            Some(&StreamUpdate::Failed {
                reason: FailureReason::EmptyResult,
                message: persona().fallback_message,
            })
        );
        assert!(!updates.iter().any(|u| matches!(u, StreamUpdate::Frame { .. })));

        let session = session.lock().await;
        assert_eq!(session.log.len(), 2);
        assert_eq!(session.log.turns()[1].role, Role::User);
    }

    #[tokio::test]
    async fn test_interrupted_stream_discards_partial_text() {
        let mut provider = MockGenerationProvider::new();
        provider.expect_generate_stream().returning(|_| {
            Ok(fragments(vec![
                Ok("partial".to_string()),
                Err(anyhow::anyhow!("connection reset")),
            ]))
        });

        let streamer = streamer(provider);
        let session = new_session();
        let updates = run(&streamer, &session, "hi").await;

        assert!(matches!(
            updates.last(),
            Some(StreamUpdate::Failed {
                reason: FailureReason::Interrupted,
                ..
            })
        ));
        let session = session.lock().await;
        assert_eq!(session.log.len(), 2);
        assert!(session.log.turns().iter().all(|t| t.content != "partial"));
    }

    #[tokio::test]
    async fn test_error_before_first_fragment_is_a_setup_failure() {
        let mut provider = MockGenerationProvider::new();
        provider.expect_generate_stream().returning(|_| {
            Ok(fragments(vec![Err(anyhow::anyhow!("quota exceeded"))]))
        });

        let streamer = streamer(provider);
        let session = new_session();
        let updates = run(&streamer, &session, "hi").await;

        assert!(!updates.iter().any(|u| matches!(u, StreamUpdate::Frame { .. })));
        match updates.last() {
            Some(StreamUpdate::Failed { reason, message }) => {
                assert_eq!(*reason, FailureReason::Setup);
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(session.lock().await.log.len(), 2);
    }

    #[tokio::test]
    async fn test_successful_submissions_alternate() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate_stream()
            .times(4)
            .returning(|_| Ok(ok_fragments(&["answer"])));

        let streamer = streamer(provider);
        let session = new_session();
        for i in 0..4 {
            run(&streamer, &session, &format!("question {}", i)).await;
        }

        let session = session.lock().await;
        let turns = session.log.turns();
        assert_eq!(turns.len(), 1 + 2 * 4);
        assert_eq!(turns[0].role, Role::System);
        for (i, turn) in turns[1..].iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role, expected);
        }
    }

    #[tokio::test]
    async fn test_request_carries_history_and_instruction_separately() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate_stream()
            .times(1)
            .withf(|req| {
                req.prompt == "Previous conversation:\nUser: hi\n\nAssistant: hello\n\n\nUser: next\n\nAssistant: "
                    && !req.prompt.contains("You are MediAssist.")
                    && req.system_instruction.starts_with("You are MediAssist.")
                    && req.system_instruction.ends_with("Response language: Vietnamese.")
                    && req.top_p == 0.95
                    && req.top_k == 40
                    && req.max_output_tokens == 1024
            })
            .returning(|_| Ok(ok_fragments(&["fine"])));

        let streamer = streamer(provider);
        let session = new_session();
        {
            let mut s = session.lock().await;
            s.log.append(Role::User, "hi");
            s.log.append(Role::Assistant, "hello");
        }

        let updates = run(&streamer, &session, "next").await;
        assert!(matches!(updates.last(), Some(StreamUpdate::Completed { .. })));
    }

    #[tokio::test]
    async fn test_config_change_affects_only_later_calls() {
        let recorder = Arc::new(RecordingProvider {
            requests: std::sync::Mutex::new(Vec::new()),
        });
        let streamer = streamer(recorder.clone());
        let session = new_session();

        run(&streamer, &session, "first").await;
        let history_before = session.lock().await.log.turns().to_vec();

        session
            .lock()
            .await
            .update_config(
                UpdateConfigRequest {
                    temperature: Some(0.9),
                    ..Default::default()
                },
                &persona(),
            )
            .unwrap();

        assert_eq!(session.lock().await.log.turns(), history_before.as_slice());

        run(&streamer, &session, "second").await;

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].temperature, 0.3);
        assert_eq!(requests[1].temperature, 0.9);
    }

    #[tokio::test]
    async fn test_dropped_stream_records_no_assistant_turn() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_generate_stream()
            .returning(|_| Ok(ok_fragments(&["a", "b", "c"])));

        let streamer = streamer(provider);
        let session = new_session();
        {
            let guard = session.clone().lock_owned().await;
            let stream = streamer.clone().submit(guard, "hi".to_string());
            let first_two: Vec<StreamUpdate> = stream.take(2).collect().await;
            assert!(matches!(first_two[1], StreamUpdate::Frame { .. }));
        }

        let session = session.lock().await;
        assert_eq!(session.log.len(), 2);
        assert_eq!(session.log.turns()[1].role, Role::User);
    }

    #[test]
    fn test_phase_transitions() {
        use SubmissionPhase::*;
        assert!(Idle.can_advance_to(AwaitingResponse));
        assert!(AwaitingResponse.can_advance_to(Failed));
        assert!(Streaming.can_advance_to(Completed));
        assert!(Completed.can_advance_to(Idle));
        assert!(!Completed.can_advance_to(Streaming));
        assert!(!Idle.can_advance_to(Streaming));
        assert!(!Failed.can_advance_to(AwaitingResponse));
    }
}
