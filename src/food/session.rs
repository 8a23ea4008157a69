use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::food::analysis::{apply_fallback, extract, Analysis, RecordSource};
use crate::food::chart::{project, ChartSeries};
use crate::food::config::AnalysisConfig;
use crate::providers::traits::{InferenceOutput, InferenceProvider, InferenceRequest, QueueUpdate};
use crate::providers::utils::ImagePayload;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Ready,
    Analyzing,
    Analyzed,
    Errored,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{provider} request failed")]
    ProviderFailure { provider: &'static str },
    #[error("{provider} returned no output")]
    MissingOutput { provider: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoImage,
    AlreadyAnalyzing,
}

#[derive(Debug, Clone)]
pub enum AnalyzeOutcome {
    Completed(Analysis),
    /// User-facing error message, also stored in the session.
    Failed(String),
    Skipped(SkipReason),
    /// The image changed while the request was in flight.
    Discarded,
}

#[derive(Debug, Clone)]
pub enum AnalyzerEvent {
    StateChanged(SessionState),
    Progress(QueueUpdate),
}

#[derive(Debug, Clone)]
struct SelectedImage {
    id: Uuid,
    payload: ImagePayload,
}

#[derive(Debug)]
struct Session {
    state: SessionState,
    image: Option<SelectedImage>,
    analysis: Option<Analysis>,
    error: Option<String>,
}

/// Point-in-time copy of the session for display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub image_id: Option<Uuid>,
    pub analysis: Option<Analysis>,
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn chart(&self) -> Option<ChartSeries> {
        self.analysis.as_ref().and_then(|a| project(&a.record))
    }
}

/// Owns the single meal-analysis session and drives it through
/// `Idle -> Ready -> Analyzing -> Analyzed | Errored`.
///
/// Clones share the same session. At most one inference call is in flight;
/// the session lock is never held across it.
#[derive(Clone)]
pub struct MealAnalyzer {
    provider: Box<dyn InferenceProvider + Send + Sync>,
    config: AnalysisConfig,
    session: Arc<Mutex<Session>>,
    events: broadcast::Sender<AnalyzerEvent>,
}

impl MealAnalyzer {
    pub fn new(provider: Box<dyn InferenceProvider + Send + Sync>, config: AnalysisConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            provider,
            config,
            session: Arc::new(Mutex::new(Session {
                state: SessionState::Idle,
                image: None,
                analysis: None,
                error: None,
            })),
            events,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn model(&self) -> String {
        self.provider.get_model_info()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock();
        SessionSnapshot {
            state: session.state,
            image_id: session.image.as_ref().map(|image| image.id),
            analysis: session.analysis.clone(),
            error: session.error.clone(),
        }
    }

    fn publish(&self, event: AnalyzerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Makes `payload` the current image and clears any previous result.
    ///
    /// A request already in flight keeps running; its result is dropped when it arrives.
    pub fn select_image(&self, payload: ImagePayload) -> Uuid {
        let id = Uuid::new_v4();
        let state = {
            let mut session = self.session.lock();
            session.image = Some(SelectedImage { id, payload });
            session.analysis = None;
            session.error = None;
            if session.state != SessionState::Analyzing {
                session.state = SessionState::Ready;
            }
            session.state
        };
        log::info!("Selected image {}", id);
        self.publish(AnalyzerEvent::StateChanged(state));
        id
    }

    /// Analyzes the current image.
    ///
    /// Without an image, or while another analysis is running, this returns
    /// immediately with [`AnalyzeOutcome::Skipped`].
    pub async fn analyze(&self) -> AnalyzeOutcome {
        let image = {
            let mut session = self.session.lock();
            let image = match session.image.clone() {
                Some(image) => image,
                None => {
                    log::debug!("Analyze requested with no image selected");
                    return AnalyzeOutcome::Skipped(SkipReason::NoImage);
                }
            };
            if session.state == SessionState::Analyzing {
                log::debug!("Analyze requested while already analyzing");
                return AnalyzeOutcome::Skipped(SkipReason::AlreadyAnalyzing);
            }
            session.analysis = None;
            session.error = None;
            session.state = SessionState::Analyzing;
            image
        };
        self.publish(AnalyzerEvent::StateChanged(SessionState::Analyzing));

        // The call runs on its own task so a dropped caller cannot leave the
        // session stuck in Analyzing.
        let image_id = image.id;
        let worker = self.clone();
        match tokio::spawn(async move { worker.run_inference(image).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Analysis task for image {} ended abnormally: {}", image_id, e);
                self.finish(
                    image_id,
                    Err(AnalysisError::ProviderFailure {
                        provider: self.provider.name(),
                    }),
                )
            }
        }
    }

    async fn run_inference(&self, image: SelectedImage) -> AnalyzeOutcome {
        let request = InferenceRequest {
            image_urls: vec![image.payload.as_data_url().to_string()],
            prompt: self.config.prompt.clone(),
        };

        log::info!(
            "Sending image {} to {} ({})",
            image.id,
            self.provider.name(),
            self.provider.get_model_info()
        );

        let events = self.events.clone();
        let on_update = move |update: QueueUpdate| {
            let _ = events.send(AnalyzerEvent::Progress(update));
        };

        let result = match self.provider.infer(&request, &on_update).await {
            Ok(InferenceOutput { output: Some(text) }) => Ok(text),
            Ok(InferenceOutput { output: None }) => {
                log::error!("{} response had no output field", self.provider.name());
                Err(AnalysisError::MissingOutput {
                    provider: self.provider.name(),
                })
            }
            Err(e) => {
                log::error!("{} inference failed: {:#}", self.provider.name(), e);
                Err(AnalysisError::ProviderFailure {
                    provider: self.provider.name(),
                })
            }
        };

        self.finish(image.id, result)
    }

    fn finish(&self, image_id: Uuid, result: Result<String, AnalysisError>) -> AnalyzeOutcome {
        let (state, outcome) = {
            let mut session = self.session.lock();

            if session.image.as_ref().map(|image| image.id) != Some(image_id) {
                log::info!("Discarding result for replaced image {}", image_id);
                session.state = if session.image.is_some() {
                    SessionState::Ready
                } else {
                    SessionState::Idle
                };
                (session.state, AnalyzeOutcome::Discarded)
            } else {
                match result {
                    Ok(text) => {
                        log::debug!("Raw output: {}", text);
                        let analysis = self.build_analysis(text);
                        session.analysis = Some(analysis.clone());
                        session.state = SessionState::Analyzed;
                        (session.state, AnalyzeOutcome::Completed(analysis))
                    }
                    Err(e) => {
                        let message = format!("Failed to analyze the image: {}", e);
                        session.error = Some(message.clone());
                        session.state = SessionState::Errored;
                        (session.state, AnalyzeOutcome::Failed(message))
                    }
                }
            }
        };

        self.publish(AnalyzerEvent::StateChanged(state));
        outcome
    }

    fn build_analysis(&self, raw_output: String) -> Analysis {
        let extracted = extract(&raw_output);
        let (record, source) = if self.config.fallback_profile {
            apply_fallback(extracted)
        } else {
            (extracted, RecordSource::Extracted)
        };
        log::info!("Parsed analysis data: {:?} ({:?})", record, source);

        Analysis {
            record,
            source,
            raw_output,
            analyzed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::food::analysis::{CalorieEstimate, FALLBACK_PROFILE};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Clone)]
    struct ScriptedProvider {
        reply: Result<Option<String>, String>,
        calls: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(Some(text.to_string())),
                calls: Arc::new(AtomicUsize::new(0)),
                gate: None,
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                ..Self::replying("")
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl InferenceProvider for ScriptedProvider {
        async fn infer(
            &self,
            _request: &InferenceRequest,
            on_update: &(dyn Fn(QueueUpdate) + Send + Sync),
        ) -> Result<InferenceOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            on_update(QueueUpdate::InProgress {
                logs: vec!["loading model".to_string()],
            });
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.reply {
                Ok(output) => Ok(InferenceOutput {
                    output: output.clone(),
                }),
                Err(message) => Err(anyhow!("{}", message)),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn get_model_info(&self) -> String {
            "test-model".to_string()
        }

        fn clone_box(&self) -> Box<dyn InferenceProvider + Send + Sync> {
            Box::new(self.clone())
        }
    }

    fn image() -> ImagePayload {
        ImagePayload::from_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap()
    }

    fn analyzer(provider: ScriptedProvider) -> MealAnalyzer {
        MealAnalyzer::new(Box::new(provider), AnalysisConfig::default())
    }

    async fn wait_for_call(calls: &AtomicUsize) {
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn analyze_without_image_is_a_no_op() {
        let provider = ScriptedProvider::replying("Total Calories: 500");
        let calls = provider.calls.clone();
        let analyzer = analyzer(provider);

        let outcome = analyzer.analyze().await;
        assert!(matches!(outcome, AnalyzeOutcome::Skipped(SkipReason::NoImage)));
        assert_eq!(analyzer.state(), SessionState::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(analyzer.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn successful_analysis_stores_extracted_record() {
        let analyzer = analyzer(ScriptedProvider::replying(
            "Total Calories: 450, Carbohydrates: 40%, Fat: 20%, Protein: 25%, Sodium: 8%, Calcium: 4%, Saturated Fat: 3%",
        ));
        let id = analyzer.select_image(image());
        assert_eq!(analyzer.state(), SessionState::Ready);

        let outcome = analyzer.analyze().await;
        let analysis = match outcome {
            AnalyzeOutcome::Completed(analysis) => analysis,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(analysis.source, RecordSource::Extracted);
        assert_eq!(analysis.record.total_calories, CalorieEstimate::Kcal(450));

        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.state, SessionState::Analyzed);
        assert_eq!(snapshot.image_id, Some(id));
        assert_eq!(snapshot.chart().unwrap().values(), vec![40, 20, 25, 8, 4, 3]);
    }

    #[tokio::test]
    async fn unparseable_output_uses_fallback_profile() {
        let analyzer = analyzer(ScriptedProvider::replying("A tasty looking slice of pizza."));
        analyzer.select_image(image());

        match analyzer.analyze().await {
            AnalyzeOutcome::Completed(analysis) => {
                assert_eq!(analysis.record, FALLBACK_PROFILE);
                assert_eq!(analysis.source, RecordSource::FallbackProfile);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn disabled_fallback_leaves_nothing_to_chart() {
        let config = AnalysisConfig {
            fallback_profile: false,
            ..AnalysisConfig::default()
        };
        let analyzer = MealAnalyzer::new(Box::new(ScriptedProvider::replying("no idea")), config);
        analyzer.select_image(image());

        assert!(matches!(analyzer.analyze().await, AnalyzeOutcome::Completed(_)));
        let snapshot = analyzer.snapshot();
        assert!(snapshot.analysis.as_ref().unwrap().record.is_empty());
        assert!(snapshot.chart().is_none());
    }

    #[tokio::test]
    async fn provider_failure_shows_message_and_drops_old_record() {
        let provider = ScriptedProvider::failing("connection reset by peer");
        let analyzer = analyzer(provider);
        analyzer.select_image(image());

        {
            let mut session = analyzer.session.lock();
            session.state = SessionState::Analyzed;
            session.analysis = Some(Analysis {
                record: FALLBACK_PROFILE,
                source: RecordSource::FallbackProfile,
                raw_output: String::new(),
                analyzed_at: Utc::now(),
            });
        }

        let outcome = analyzer.analyze().await;
        let message = match outcome {
            AnalyzeOutcome::Failed(message) => message,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(message, "Failed to analyze the image: scripted request failed");
        assert!(!message.contains("connection reset"));

        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.state, SessionState::Errored);
        assert!(snapshot.analysis.is_none());
        assert_eq!(snapshot.error.as_deref(), Some(message.as_str()));
    }

    #[tokio::test]
    async fn missing_output_is_an_error() {
        let provider = ScriptedProvider {
            reply: Ok(None),
            ..ScriptedProvider::replying("")
        };
        let analyzer = analyzer(provider);
        analyzer.select_image(image());

        assert!(matches!(analyzer.analyze().await, AnalyzeOutcome::Failed(_)));
        assert_eq!(analyzer.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn second_analyze_while_in_flight_is_ignored() {
        let gate = Arc::new(Notify::new());
        let provider = ScriptedProvider::replying("Total Calories: 700, Fat: 30%").gated(gate.clone());
        let calls = provider.calls.clone();
        let analyzer = analyzer(provider);
        analyzer.select_image(image());

        let first = tokio::spawn({
            let analyzer = analyzer.clone();
            async move { analyzer.analyze().await }
        });
        wait_for_call(&calls).await;
        assert_eq!(analyzer.state(), SessionState::Analyzing);

        let second = analyzer.analyze().await;
        assert!(matches!(second, AnalyzeOutcome::Skipped(SkipReason::AlreadyAnalyzing)));

        gate.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(first, AnalyzeOutcome::Completed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(analyzer.state(), SessionState::Analyzed);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_strand_the_session() {
        let gate = Arc::new(Notify::new());
        let provider = ScriptedProvider::replying("Total Calories: 700, Fat: 30%").gated(gate.clone());
        let calls = provider.calls.clone();
        let analyzer = analyzer(provider);
        analyzer.select_image(image());

        let caller = tokio::spawn({
            let analyzer = analyzer.clone();
            async move { analyzer.analyze().await }
        });
        wait_for_call(&calls).await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        gate.notify_one();
        while analyzer.state() == SessionState::Analyzing {
            tokio::task::yield_now().await;
        }
        assert_eq!(analyzer.state(), SessionState::Analyzed);

        gate.notify_one();
        let again = analyzer.analyze().await;
        assert!(matches!(again, AnalyzeOutcome::Completed(_)), "unexpected outcome: {:?}", again);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn new_image_during_analysis_discards_stale_result() {
        let gate = Arc::new(Notify::new());
        let provider = ScriptedProvider::replying("Total Calories: 700, Fat: 30%").gated(gate.clone());
        let calls = provider.calls.clone();
        let analyzer = analyzer(provider);
        analyzer.select_image(image());

        let pending = tokio::spawn({
            let analyzer = analyzer.clone();
            async move { analyzer.analyze().await }
        });
        wait_for_call(&calls).await;

        let replacement = analyzer.select_image(image());
        assert_eq!(analyzer.state(), SessionState::Analyzing);

        gate.notify_one();
        assert!(matches!(pending.await.unwrap(), AnalyzeOutcome::Discarded));

        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.state, SessionState::Ready);
        assert_eq!(snapshot.image_id, Some(replacement));
        assert!(snapshot.analysis.is_none());
    }

    #[tokio::test]
    async fn selecting_an_image_clears_previous_result() {
        let analyzer = analyzer(ScriptedProvider::replying("Total Calories: 300"));
        analyzer.select_image(image());
        analyzer.analyze().await;
        assert!(analyzer.snapshot().analysis.is_some());

        analyzer.select_image(image());
        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.state, SessionState::Ready);
        assert!(snapshot.analysis.is_none());

        let failing = super::MealAnalyzer::new(
            Box::new(ScriptedProvider::failing("boom")),
            AnalysisConfig::default(),
        );
        failing.select_image(image());
        failing.analyze().await;
        assert!(failing.snapshot().error.is_some());

        failing.select_image(image());
        let snapshot = failing.snapshot();
        assert_eq!(snapshot.state, SessionState::Ready);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn progress_and_state_changes_are_published() {
        let analyzer = analyzer(ScriptedProvider::replying("Protein: 20%"));
        let mut events = analyzer.subscribe();
        analyzer.select_image(image());
        analyzer.analyze().await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen[0], AnalyzerEvent::StateChanged(SessionState::Ready)));
        assert!(matches!(seen[1], AnalyzerEvent::StateChanged(SessionState::Analyzing)));
        assert!(seen.iter().any(|e| matches!(e, AnalyzerEvent::Progress(QueueUpdate::InProgress { .. }))));
        assert!(matches!(seen.last(), Some(AnalyzerEvent::StateChanged(SessionState::Analyzed))));
    }
}
