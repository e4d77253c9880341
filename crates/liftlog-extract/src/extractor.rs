//! The extraction entry point.

use liftlog_llm::{InferenceOptions, LlmError, SharedStructuredBackend};
use liftlog_types::{ChatMessage, WorkoutDraft};

use crate::context::{DEFAULT_MAX_HISTORY, render_context};
use crate::parse::{ExtractionOutcome, interpret};
use crate::prompt::{EXTRACTION_INSTRUCTION, fallback_prompt, user_prompt};

/// Turns a user utterance into validated workout drafts.
///
/// Never fails: collaborator errors and malformed output are logged and
/// produce an empty result.
#[derive(Clone)]
pub struct WorkoutExtractor {
    backend: SharedStructuredBackend,
    max_history: usize,
    options: InferenceOptions,
}

impl WorkoutExtractor {
    pub fn new(backend: SharedStructuredBackend) -> Self {
        Self {
            backend,
            max_history: DEFAULT_MAX_HISTORY,
            options: InferenceOptions::default(),
        }
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_options(mut self, options: InferenceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &InferenceOptions {
        &self.options
    }

    /// Extract drafts from `text` using the configured history window.
    pub async fn extract(&self, text: &str, history: &[ChatMessage]) -> Vec<WorkoutDraft> {
        self.extract_outcome(text, history, self.max_history)
            .await
            .into_records()
    }

    /// Extract with an explicit history window, keeping the parse outcome.
    pub async fn extract_outcome(
        &self,
        text: &str,
        history: &[ChatMessage],
        max_history: usize,
    ) -> ExtractionOutcome {
        if text.trim().is_empty() {
            return ExtractionOutcome::Empty;
        }

        let context = render_context(history, max_history);
        let Some(raw) = self.infer(&context, text).await else {
            return ExtractionOutcome::Empty;
        };

        let outcome = interpret(&raw, text);
        match &outcome {
            ExtractionOutcome::Records(records) => {
                tracing::info!(
                    count = records.len(),
                    backend = self.backend.name(),
                    "Extracted workouts"
                );
            }
            ExtractionOutcome::Empty => {
                tracing::debug!("No workouts in message");
            }
            ExtractionOutcome::Unparseable { reason } => {
                tracing::warn!(
                    reason = %reason,
                    response_len = raw.len(),
                    "Extraction response was not usable"
                );
            }
        }
        outcome
    }

    /// Primary chat call, then one generate fallback. `None` when both fail.
    async fn infer(&self, context: &str, text: &str) -> Option<String> {
        let user = user_prompt(context, text);
        let primary = self
            .bounded(self.backend.chat_json(EXTRACTION_INSTRUCTION, &user, &self.options))
            .await;

        let primary_error = match primary {
            Ok(raw) => return Some(raw),
            Err(e) => e,
        };
        tracing::warn!(error = %primary_error, "Extraction chat call failed, trying generate");

        let prompt = fallback_prompt(context, text);
        match self
            .bounded(self.backend.generate(&prompt, &self.options))
            .await
        {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!(error = %e, "Extraction fallback failed");
                None
            }
        }
    }

    async fn bounded<F>(&self, call: F) -> liftlog_llm::Result<String>
    where
        F: std::future::Future<Output = liftlog_llm::Result<String>>,
    {
        match tokio::time::timeout(self.options.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Network(format!(
                "extraction timed out after {}s",
                self.options.timeout.as_secs_f32()
            ))),
        }
    }
}

impl std::fmt::Debug for WorkoutExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkoutExtractor")
            .field("backend", &self.backend.name())
            .field("max_history", &self.max_history)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use liftlog_llm::{MockOutcome, MockStructuredBackend, StructuredCall};
    use liftlog_types::{ExerciseType, Fixed2, WeightUnit};

    const BENCH_JSON: &str = r#"[{"exercise_name":"bench press","exercise_type":"strength","weight":80,"weight_unit":"kg","reps":5,"sets":3}]"#;

    fn extractor(mock: &Arc<MockStructuredBackend>) -> WorkoutExtractor {
        WorkoutExtractor::new(mock.clone())
    }

    #[tokio::test]
    async fn test_extracts_bench_press() {
        let mock = Arc::new(MockStructuredBackend::with_chat(BENCH_JSON));
        let drafts = extractor(&mock)
            .extract("I benched 80kg for 5 reps, 3 sets", &[])
            .await;

        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.exercise_name, "bench press");
        assert_eq!(draft.exercise_type, ExerciseType::Strength);
        assert_eq!(draft.weight, Some(Fixed2::from_units(80)));
        assert_eq!(draft.weight_unit, Some(WeightUnit::Kg));
        assert_eq!(draft.reps, Some(5));
        assert_eq!(draft.sets, Some(3));
        assert!(draft.duration.is_none() && draft.distance.is_none());

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        let StructuredCall::Chat { system, user, options } = &calls[0] else {
            panic!("expected a chat call");
        };
        assert_eq!(system, EXTRACTION_INSTRUCTION);
        assert!(user.ends_with("Extract workouts from this message:\n\nI benched 80kg for 5 reps, 3 sets"));
        assert_eq!(options.num_predict, 1000);
        assert!(options.json_format);
    }

    #[tokio::test]
    async fn test_non_workout_text_is_empty() {
        let mock = Arc::new(MockStructuredBackend::with_chat("[]"));
        let outcome = extractor(&mock)
            .extract_outcome("What should I eat before a run?", &[], 3)
            .await;
        assert_eq!(outcome, ExtractionOutcome::Empty);
    }

    #[tokio::test]
    async fn test_blank_text_skips_backend() {
        let mock = Arc::new(MockStructuredBackend::new());
        let drafts = extractor(&mock).extract("   ", &[]).await;
        assert!(drafts.is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_included() {
        let mock = Arc::new(MockStructuredBackend::with_chat("[]"));
        let history = vec![
            ChatMessage::user("leg day today"),
            ChatMessage::assistant("Nice, what did you do?"),
        ];
        extractor(&mock).extract("squats 100kg 5x5", &history).await;

        let StructuredCall::Chat { user, .. } = &mock.calls()[0] else {
            panic!("expected a chat call");
        };
        assert!(user.starts_with("Recent conversation:\nuser: leg day today\n"));
    }

    #[tokio::test]
    async fn test_falls_back_to_generate_once() {
        let mock = Arc::new(
            MockStructuredBackend::new()
                .then_chat(MockOutcome::Fail("connection refused".into()))
                .then_generate(MockOutcome::Text(format!("```json\n{BENCH_JSON}\n```"))),
        );
        let drafts = extractor(&mock)
            .extract("I benched 80kg for 5 reps, 3 sets", &[])
            .await;
        assert_eq!(drafts.len(), 1);

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        let StructuredCall::Generate { prompt, .. } = &calls[1] else {
            panic!("expected a generate call");
        };
        assert!(prompt.starts_with(EXTRACTION_INSTRUCTION));
        assert!(prompt.ends_with("JSON array:"));
    }

    #[tokio::test]
    async fn test_both_calls_fail_is_empty() {
        let mock = Arc::new(
            MockStructuredBackend::new()
                .then_chat(MockOutcome::Fail("down".into()))
                .then_generate(MockOutcome::Fail("still down".into())),
        );
        let drafts = extractor(&mock).extract("ran 5km", &[]).await;
        assert!(drafts.is_empty());
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_triggers_fallback() {
        let mock = Arc::new(
            MockStructuredBackend::new()
                .then_chat(MockOutcome::Delayed(Duration::from_secs(5), BENCH_JSON.into()))
                .then_generate(MockOutcome::Text("[]".into())),
        );
        let extractor = extractor(&mock)
            .with_options(InferenceOptions::default().with_timeout(Duration::from_millis(20)));
        let outcome = extractor.extract_outcome("bench 80kg", &[], 3).await;
        assert_eq!(outcome, ExtractionOutcome::Empty);
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_wrapped_object_and_prose() {
        let mock = Arc::new(MockStructuredBackend::with_chat(
            r#"Sure! {"workouts": [{"exercise_name": "running", "exercise_type": "cardio", "distance": 5, "distance_unit": "km", "duration": 30, "duration_unit": "minutes"}]}"#,
        ));
        let drafts = extractor(&mock).extract("I ran 5km this morning", &[]).await;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].distance, Some(Fixed2::from_units(5)));
        // "minutes" never appears in the text
        assert!(drafts[0].duration.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_is_empty_without_fallback() {
        let mock = Arc::new(MockStructuredBackend::with_chat("I found no workouts."));
        let outcome = extractor(&mock).extract_outcome("hello", &[], 3).await;
        assert!(matches!(outcome, ExtractionOutcome::Unparseable { .. }));
        assert_eq!(mock.calls().len(), 1);
    }
}
