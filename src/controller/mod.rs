//! Generation controller: runs one prompt-to-history cycle at a time.
//!
//! A cycle goes `Idle → Validating → Requesting → Compressing → Committed`
//! on success, or `Idle → Validating → Requesting → Failed` on error, and
//! always ends back in `Idle`. Each cycle carries an id; only the latest
//! issued id may commit, so a result that arrives after
//! [`GenerationController::abandon`] is dropped.

mod progress;
mod state;

pub use progress::PROGRESS_CAP;
pub use state::{CycleOutcome, Phase, Snapshot};

use crate::config::ControllerConfig;
use crate::error::{Result, WarrickError};
use crate::history::{GeneratedImage, HistoryStorage, HistoryStore, IdClock};
use crate::image::{
    compress, AspectRatio, GenerationMode, GenerationRequest, ImagePayload, ImageProvider,
};
use crate::keys::KeySelector;
use progress::ProgressTicker;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Form fields a cycle is started from.
#[derive(Debug, Clone, Default)]
struct Form {
    prompt: String,
    aspect_ratio: AspectRatio,
    mode: GenerationMode,
}

struct Inner<S> {
    form: Form,
    history: HistoryStore<S>,
    current: Option<String>,
    latest_cycle: u64,
    in_flight: Option<u64>,
    ids: IdClock,
}

/// Owns the form, the history and the selection, and runs generation cycles.
pub struct GenerationController<P, S> {
    provider: P,
    key_selector: Option<Arc<dyn KeySelector>>,
    config: ControllerConfig,
    inner: Mutex<Inner<S>>,
    state: Arc<watch::Sender<Snapshot>>,
}

impl<P, S> GenerationController<P, S>
where
    P: ImageProvider,
    S: HistoryStorage,
{
    /// Creates a controller over a loaded history. The newest entry starts
    /// selected.
    pub fn new(provider: P, history: HistoryStore<S>, config: ControllerConfig) -> Self {
        let current = history.latest().map(|e| e.id.clone());
        let newest_id = history
            .entries()
            .iter()
            .filter_map(|e| e.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);

        let (state, _) = watch::channel(Snapshot {
            current: current.clone(),
            ..Snapshot::default()
        });

        Self {
            provider,
            key_selector: None,
            config,
            inner: Mutex::new(Inner {
                form: Form::default(),
                history,
                current,
                latest_cycle: 0,
                in_flight: None,
                ids: IdClock::starting_after(newest_id),
            }),
            state: Arc::new(state),
        }
    }

    /// Installs the host's key-selection capability.
    pub fn with_key_selector(mut self, selector: Arc<dyn KeySelector>) -> Self {
        self.key_selector = Some(selector);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets the prompt for the next cycle.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.lock().form.prompt = prompt.into();
    }

    /// Returns the current prompt.
    pub fn prompt(&self) -> String {
        self.lock().form.prompt.clone()
    }

    /// Sets the aspect ratio for the next cycle.
    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.lock().form.aspect_ratio = ratio;
    }

    /// Returns the selected aspect ratio.
    pub fn aspect_ratio(&self) -> AspectRatio {
        self.lock().form.aspect_ratio
    }

    /// Sets the mode for the next cycle.
    pub fn set_mode(&self, mode: GenerationMode) {
        self.lock().form.mode = mode;
    }

    /// Returns the selected mode.
    pub fn mode(&self) -> GenerationMode {
        self.lock().form.mode
    }

    /// Returns the latest state.
    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    /// Returns true while a cycle is in flight.
    pub fn is_generating(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// History entries, newest first.
    pub fn history(&self) -> Vec<GeneratedImage> {
        self.lock().history.entries().to_vec()
    }

    /// The selected entry, if it is still in history.
    pub fn current(&self) -> Option<GeneratedImage> {
        let inner = self.lock();
        let id = inner.current.as_deref()?;
        inner.history.get(id).cloned()
    }

    /// Selects the history entry with `id`.
    pub fn select(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.history.get(id).is_none() {
            return Err(WarrickError::InvalidRequest(format!(
                "no history entry with id {id}"
            )));
        }
        inner.current = Some(id.to_string());
        self.state.send_modify(|s| s.current = Some(id.to_string()));
        Ok(())
    }

    /// Empties history and clears the selection.
    pub fn clear_history(&self) {
        let mut inner = self.lock();
        inner.history.clear();
        inner.current = None;
        self.state.send_modify(|s| s.current = None);
    }

    /// Gives up on the in-flight cycle. Its result, when it arrives, is
    /// dropped, and a new cycle may start right away.
    ///
    /// Returns false if nothing was in flight.
    pub fn abandon(&self) -> bool {
        let mut inner = self.lock();
        let Some(cycle) = inner.in_flight.take() else {
            return false;
        };
        inner.latest_cycle += 1;
        let latest = inner.latest_cycle;
        self.state.send_modify(|s| {
            s.phase = Phase::Idle;
            s.progress = 0.0;
            s.cycle = latest;
        });
        tracing::debug!(cycle, "abandoned generation cycle");
        true
    }

    /// Runs one generation cycle from the current form.
    ///
    /// A blank prompt or a cycle already in flight is not an error; see
    /// [`CycleOutcome`]. Failures are recorded in the snapshot and returned.
    pub async fn generate(&self) -> Result<CycleOutcome> {
        let (cycle, form) = {
            let mut inner = self.lock();
            if inner.in_flight.is_some() {
                return Ok(CycleOutcome::Busy);
            }
            self.state.send_modify(|s| s.phase = Phase::Validating);
            if inner.form.prompt.trim().is_empty() {
                self.state.send_modify(|s| s.phase = Phase::Idle);
                return Ok(CycleOutcome::EmptyPrompt);
            }

            inner.latest_cycle += 1;
            let cycle = inner.latest_cycle;
            inner.in_flight = Some(cycle);
            self.state.send_modify(|s| {
                s.phase = Phase::Requesting;
                s.progress = 0.0;
                s.error = None;
                s.cycle = cycle;
            });
            (cycle, inner.form.clone())
        };
        let guard = CycleGuard {
            inner: &self.inner,
            state: &self.state,
            cycle,
        };

        tracing::debug!(
            cycle,
            mode = %form.mode,
            aspect_ratio = %form.aspect_ratio,
            "starting generation cycle"
        );
        let result = self.request_and_compress(cycle, &form).await;

        let outcome = {
            let mut inner = self.lock();
            if inner.latest_cycle != cycle {
                None
            } else {
                inner.in_flight = None;
                Some(self.finish_cycle(&mut inner, cycle, form, result))
            }
        };
        drop(guard);

        let outcome = match outcome {
            None => {
                tracing::debug!(cycle, "dropping result of abandoned cycle");
                return Ok(CycleOutcome::Discarded);
            }
            Some(Ok(entry)) => Ok(CycleOutcome::Committed(entry)),
            Some(Err(e)) => {
                if e.is_authorization() {
                    self.remediate_key().await;
                }
                Err(e)
            }
        };

        tokio::time::sleep(self.config.completion_delay).await;
        self.state.send_if_modified(|s| {
            if s.cycle == cycle && matches!(s.phase, Phase::Committed | Phase::Failed) {
                s.phase = Phase::Idle;
                return true;
            }
            false
        });

        outcome
    }

    /// Applies a cycle's result: commit on success, record the error otherwise.
    fn finish_cycle(
        &self,
        inner: &mut Inner<S>,
        cycle: u64,
        form: Form,
        result: Result<ImagePayload>,
    ) -> Result<GeneratedImage> {
        match result {
            Ok(payload) => {
                let now = chrono::Utc::now().timestamp_millis();
                let (id, timestamp) = inner.ids.next(now);
                let entry =
                    GeneratedImage::new(id, &payload, form.prompt, timestamp, form.aspect_ratio);
                inner.history.prepend(entry.clone());
                inner.current = Some(entry.id.clone());
                self.state.send_modify(|s| {
                    s.phase = Phase::Committed;
                    s.progress = 100.0;
                    s.current = Some(entry.id.clone());
                });
                tracing::debug!(cycle, id = %entry.id, "committed generated image");
                Ok(entry)
            }
            Err(e) => {
                self.state.send_modify(|s| {
                    s.phase = Phase::Failed;
                    s.error = Some(e.to_string());
                });
                tracing::debug!(cycle, "generation failed: {e}");
                Err(e)
            }
        }
    }

    async fn request_and_compress(&self, cycle: u64, form: &Form) -> Result<ImagePayload> {
        self.ensure_pro_key(form.mode).await?;

        let request = GenerationRequest::new(form.prompt.clone())
            .with_aspect_ratio(form.aspect_ratio)
            .with_model(form.mode.model().as_str());

        let ticker = ProgressTicker::start(
            self.state.clone(),
            cycle,
            form.mode.progress_steps(),
            self.config.progress_tick,
        );

        let result = async {
            let raw = self.provider.generate(&request).await?;
            self.state.send_if_modified(|s| {
                if s.cycle != cycle {
                    return false;
                }
                s.phase = Phase::Compressing;
                true
            });
            compress(&raw, self.config.compress, self.config.compress_timeout).await
        }
        .await;

        ticker.stop().await;
        result
    }

    async fn ensure_pro_key(&self, mode: GenerationMode) -> Result<()> {
        if mode != GenerationMode::Pro {
            return Ok(());
        }
        let Some(selector) = &self.key_selector else {
            return Ok(());
        };
        if !selector.has_selected_api_key().await {
            tracing::debug!("pro mode without a selected key, opening key selection");
            selector.open_select_key().await?;
        }
        Ok(())
    }

    async fn remediate_key(&self) {
        let Some(selector) = &self.key_selector else {
            return;
        };
        tracing::debug!("authorization failed, opening key selection");
        if let Err(e) = selector.open_select_key().await {
            tracing::warn!("key selection failed: {e}");
        }
    }
}

/// Releases the in-flight slot if a cycle's future is dropped before it
/// finishes.
struct CycleGuard<'a, S> {
    inner: &'a Mutex<Inner<S>>,
    state: &'a watch::Sender<Snapshot>,
    cycle: u64,
}

impl<S> Drop for CycleGuard<'_, S> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.in_flight != Some(self.cycle) {
            return;
        }
        inner.in_flight = None;
        inner.latest_cycle += 1;
        let latest = inner.latest_cycle;
        self.state.send_modify(|s| {
            s.phase = Phase::Idle;
            s.progress = 0.0;
            s.cycle = latest;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStorage;
    use crate::image::compress::tests::png_payload;
    use crate::image::GeminiModel;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    type EventLog = Arc<Mutex<Vec<&'static str>>>;

    #[derive(Default)]
    struct FakeProvider {
        responses: Mutex<VecDeque<Result<ImagePayload>>>,
        requests: Mutex<Vec<GenerationRequest>>,
        calls: AtomicUsize,
        delay: Duration,
        entered: Arc<Notify>,
        gate: Option<Arc<Notify>>,
        log: EventLog,
    }

    impl FakeProvider {
        fn failing(err: WarrickError) -> Self {
            let provider = Self::default();
            provider.responses.lock().unwrap().push_back(Err(err));
            provider
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ImageProvider for FakeProvider {
        async fn generate(&self, request: &GenerationRequest) -> Result<ImagePayload> {
            self.log.lock().unwrap().push("generate");
            self.requests.lock().unwrap().push(request.clone());
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(png_payload(64, 48)))
        }

        fn name(&self) -> &str {
            "fake"
        }

        async fn health_check(&self, _model: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FakeSelector {
        has_key: AtomicBool,
        opens: AtomicUsize,
        log: EventLog,
    }

    impl FakeSelector {
        fn new(has_key: bool, log: EventLog) -> Arc<Self> {
            Arc::new(Self {
                has_key: AtomicBool::new(has_key),
                opens: AtomicUsize::new(0),
                log,
            })
        }
    }

    #[async_trait]
    impl KeySelector for FakeSelector {
        async fn has_selected_api_key(&self) -> bool {
            self.log.lock().unwrap().push("has_selected_api_key");
            self.has_key.load(Ordering::SeqCst)
        }

        async fn open_select_key(&self) -> Result<()> {
            self.log.lock().unwrap().push("open_select_key");
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.has_key.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> ControllerConfig {
        ControllerConfig::default()
            .with_progress_tick(Duration::from_millis(5))
            .with_completion_delay(Duration::ZERO)
    }

    fn controller(
        provider: &Arc<FakeProvider>,
        storage: &MemoryStorage,
    ) -> GenerationController<Arc<FakeProvider>, MemoryStorage> {
        GenerationController::new(
            provider.clone(),
            HistoryStore::load(storage.clone()),
            test_config(),
        )
    }

    #[tokio::test]
    async fn test_blank_prompt_is_silent_noop() {
        let provider = Arc::new(FakeProvider::default());
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage);

        for prompt in ["", "   ", "\n\t "] {
            controller.set_prompt(prompt);
            assert_eq!(controller.generate().await.unwrap(), CycleOutcome::EmptyPrompt);
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.error, None);
        assert_eq!(storage.contents(), None);
    }

    #[tokio::test]
    async fn test_success_commits_one_entry_and_selects_it() {
        let provider = Arc::new(FakeProvider::default());
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage);
        controller.set_prompt("a lighthouse in fog");
        controller.set_aspect_ratio(AspectRatio::Landscape);

        let CycleOutcome::Committed(entry) = controller.generate().await.unwrap() else {
            panic!("expected a committed entry");
        };

        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.current().unwrap().id, entry.id);
        assert_eq!(entry.prompt, "a lighthouse in fog");
        assert_eq!(entry.aspect_ratio, AspectRatio::Landscape);
        assert!(entry.url.starts_with("data:image/jpeg;base64,"));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.progress, 100.0);
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.current.as_deref(), Some(entry.id.as_str()));

        let request = provider.requests.lock().unwrap()[0].clone();
        assert_eq!(request.model, GeminiModel::FlashImage.as_str());
        assert_eq!(request.aspect_ratio, AspectRatio::Landscape);

        let reloaded = HistoryStore::load(storage.clone());
        assert_eq!(reloaded.latest().unwrap().id, entry.id);
    }

    #[tokio::test]
    async fn test_consecutive_cycles_get_unique_ids() {
        let provider = Arc::new(FakeProvider::default());
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage);
        controller.set_prompt("tiny robot");

        let mut ids = Vec::new();
        for _ in 0..3 {
            match controller.generate().await.unwrap() {
                CycleOutcome::Committed(entry) => ids.push(entry.id),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        let history: Vec<_> = controller.history().into_iter().map(|e| e.id).collect();
        ids.reverse();
        assert_eq!(history, ids);
        assert_eq!(controller.current().unwrap().id, history[0]);
    }

    #[tokio::test]
    async fn test_empty_response_leaves_history_untouched() {
        let provider = Arc::new(FakeProvider::failing(WarrickError::EmptyResponse(
            "no parts".into(),
        )));
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage);
        controller.set_prompt("anything");

        let err = controller.generate().await.unwrap_err();
        assert!(matches!(err, WarrickError::EmptyResponse(_)));
        assert!(controller.history().is_empty());
        assert_eq!(storage.contents(), None);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.error.as_deref(), Some("empty response: no parts"));
        assert!(snapshot.progress < 100.0);
        assert!(!controller.is_generating());
    }

    #[tokio::test]
    async fn test_next_cycle_clears_previous_error() {
        let provider = Arc::new(FakeProvider::failing(WarrickError::NoImageData));
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage);
        controller.set_prompt("retry me");

        assert!(controller.generate().await.is_err());
        assert!(controller.snapshot().error.is_some());

        assert!(matches!(
            controller.generate().await.unwrap(),
            CycleOutcome::Committed(_)
        ));
        assert_eq!(controller.snapshot().error, None);
    }

    #[tokio::test]
    async fn test_pro_mode_selects_key_once_before_request() {
        let log = EventLog::default();
        let provider = Arc::new(FakeProvider {
            log: log.clone(),
            ..FakeProvider::default()
        });
        let selector = FakeSelector::new(false, log.clone());
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage).with_key_selector(selector.clone());
        controller.set_prompt("a cathedral made of glass");
        controller.set_mode(GenerationMode::Pro);

        controller.generate().await.unwrap();

        assert_eq!(selector.opens.load(Ordering::SeqCst), 1);
        assert_eq!(
            *log.lock().unwrap(),
            ["has_selected_api_key", "open_select_key", "generate"]
        );
        let request = provider.requests.lock().unwrap()[0].clone();
        assert_eq!(request.model, GeminiModel::ProImage.as_str());
    }

    #[tokio::test]
    async fn test_key_selection_skipped_when_not_needed() {
        let log = EventLog::default();
        let provider = Arc::new(FakeProvider::default());
        let selector = FakeSelector::new(true, log.clone());
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage).with_key_selector(selector.clone());
        controller.set_prompt("river delta at dusk");

        controller.generate().await.unwrap();
        assert!(log.lock().unwrap().is_empty());

        controller.set_mode(GenerationMode::Pro);
        controller.generate().await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["has_selected_api_key"]);
        assert_eq!(selector.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_opens_key_selection() {
        let log = EventLog::default();
        let provider = Arc::new(FakeProvider::failing(WarrickError::Api {
            status: 404,
            message: "Requested entity was not found.".into(),
        }));
        let selector = FakeSelector::new(true, log.clone());
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage).with_key_selector(selector.clone());
        controller.set_prompt("owl");

        let err = controller.generate().await.unwrap_err();
        assert!(err.is_authorization());
        assert_eq!(selector.opens.load(Ordering::SeqCst), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_capped() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_millis(150),
            ..FakeProvider::default()
        });
        let storage = MemoryStorage::new();
        let controller = controller(&provider, &storage);
        controller.set_prompt("slow render");

        let mut rx = controller.subscribe();
        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let s = rx.borrow_and_update().clone();
                seen.push((s.phase, s.progress));
            }
            seen
        });

        controller.generate().await.unwrap();
        drop(controller);
        let seen = observer.await.unwrap();

        let in_flight: Vec<f32> = seen
            .iter()
            .filter(|(phase, _)| phase.is_in_flight())
            .map(|(_, p)| *p)
            .collect();
        assert!(in_flight.iter().any(|p| *p > 0.0));
        assert!(in_flight.iter().all(|p| *p <= PROGRESS_CAP));
        assert!(in_flight.windows(2).all(|w| w[0] <= w[1]));

        for (phase, progress) in &seen {
            if *phase == Phase::Committed {
                assert_eq!(*progress, 100.0);
            }
        }
        assert_eq!(seen.last().unwrap(), &(Phase::Idle, 100.0));
    }

    #[tokio::test]
    async fn test_second_request_while_in_flight_is_not_started() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(FakeProvider::gated(gate.clone()));
        let storage = MemoryStorage::new();
        let controller = Arc::new(controller(&provider, &storage));
        controller.set_prompt("first");

        let running = controller.clone();
        let first = tokio::spawn(async move { running.generate().await });
        provider.entered.notified().await;

        assert!(controller.is_generating());
        assert_eq!(controller.generate().await.unwrap(), CycleOutcome::Busy);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert!(matches!(
            first.await.unwrap().unwrap(),
            CycleOutcome::Committed(_)
        ));
        assert_eq!(controller.history().len(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_cycle_result_is_discarded() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(FakeProvider::gated(gate.clone()));
        let storage = MemoryStorage::new();
        let controller = Arc::new(controller(&provider, &storage));
        controller.set_prompt("stale");

        let running = controller.clone();
        let first = tokio::spawn(async move { running.generate().await });
        provider.entered.notified().await;

        assert!(controller.abandon());
        assert!(!controller.is_generating());
        assert!(!controller.abandon());

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), CycleOutcome::Discarded);
        assert!(controller.history().is_empty());
        assert_eq!(storage.contents(), None);
        assert_eq!(controller.snapshot().phase, Phase::Idle);
        assert_eq!(controller.snapshot().progress, 0.0);
    }

    #[tokio::test]
    async fn test_dropped_cycle_frees_controller() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(FakeProvider::gated(gate));
        let storage = MemoryStorage::new();
        let controller = Arc::new(controller(&provider, &storage));
        controller.set_prompt("cancelled");

        let running = controller.clone();
        let first = tokio::spawn(async move { running.generate().await });
        provider.entered.notified().await;
        first.abort();
        let _ = first.await;

        assert!(!controller.is_generating());
        assert_eq!(controller.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_selection_and_clear() {
        let storage = MemoryStorage::new();
        {
            let mut store = HistoryStore::load(storage.clone());
            for (id, prompt) in [("100", "older"), ("200", "newer")] {
                store.prepend(GeneratedImage::new(
                    id,
                    &png_payload(4, 4),
                    prompt,
                    id.parse().unwrap(),
                    AspectRatio::Square,
                ));
            }
        }

        let provider = Arc::new(FakeProvider::default());
        let controller = controller(&provider, &storage);
        assert_eq!(controller.current().unwrap().prompt, "newer");

        controller.select("100").unwrap();
        assert_eq!(controller.current().unwrap().prompt, "older");
        assert!(matches!(
            controller.select("missing"),
            Err(WarrickError::InvalidRequest(_))
        ));

        controller.clear_history();
        assert!(controller.current().is_none());
        assert!(controller.snapshot().current.is_none());
        assert!(HistoryStore::load(storage.clone()).is_empty());
    }

    #[tokio::test]
    async fn test_commit_survives_storage_that_cannot_hold_it() {
        let provider = Arc::new(FakeProvider::default());
        let storage = MemoryStorage::with_quota(2);
        let controller = controller(&provider, &storage);
        controller.set_prompt("x");

        let CycleOutcome::Committed(entry) = controller.generate().await.unwrap() else {
            panic!("expected a committed entry");
        };

        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.current().unwrap().id, entry.id);
        assert_eq!(controller.snapshot().current.as_deref(), Some(entry.id.as_str()));
        assert_eq!(storage.contents(), None);
    }

    #[tokio::test]
    async fn test_new_ids_follow_restored_history() {
        let storage = MemoryStorage::new();
        let far_future = i64::MAX / 2;
        {
            let mut store = HistoryStore::load(storage.clone());
            store.prepend(GeneratedImage::new(
                far_future.to_string(),
                &png_payload(4, 4),
                "from the future",
                far_future,
                AspectRatio::Square,
            ));
        }

        let provider = Arc::new(FakeProvider::default());
        let controller = controller(&provider, &storage);
        controller.set_prompt("now");
        let CycleOutcome::Committed(entry) = controller.generate().await.unwrap() else {
            panic!("expected a committed entry");
        };
        assert_eq!(entry.id, (far_future + 1).to_string());
    }
}
