use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::types::{ApiResponse, FetchStatus, PortfolioData};

/// Automatic refresh cadence once an address is tracked. Fixed, not
/// configurable.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Fallback message when the backend reports failure without a reason.
const FETCH_FAILED_MSG: &str = "Failed to fetch portfolio data";

/// Fetch collaborator consumed by [`PortfolioStore`].
///
/// The store only ever needs the portfolio endpoint; the seam keeps it
/// testable without a backend.
#[async_trait]
pub trait PortfolioApi: Send + Sync {
    async fn fetch_portfolio(&self, address: &str) -> ApiResponse<PortfolioData>;
}

#[async_trait]
impl PortfolioApi for ApiClient {
    async fn fetch_portfolio(&self, address: &str) -> ApiResponse<PortfolioData> {
        self.get_portfolio(address).await
    }
}

/// Read-only projection of the store for presentational observers.
#[derive(Debug, Clone)]
pub struct StoreView {
    pub tracked_address: Option<String>,
    pub snapshot: Option<PortfolioData>,
    pub status: FetchStatus,
}

struct StoreState {
    tracked_address: Option<String>,
    snapshot: Option<PortfolioData>,
    status: FetchStatus,
    /// Handle of the single live refresh-timer task, if any.
    refresh_task: Option<JoinHandle<()>>,
}

/// Slot held for the duration of one fetch. Released on drop, so a fetch
/// cancelled mid-await (timer task aborted) still frees the counter instead
/// of wedging the refresh guard.
struct InFlightGuard(Arc<AtomicU32>);

impl InFlightGuard {
    fn acquire(counter: &Arc<AtomicU32>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Single source of truth for the tracked address, the latest portfolio
/// snapshot, and the fetch status. Owns the 30-second refresh timer.
///
/// Cheap to clone; all clones share one state. State is mutated only through
/// the store's own methods — observers read via [`PortfolioStore::view`].
#[derive(Clone)]
pub struct PortfolioStore {
    api: Arc<dyn PortfolioApi>,
    state: Arc<Mutex<StoreState>>,
    /// Number of fetches currently awaiting a response. Timer refreshes are
    /// dropped while this is non-zero.
    in_flight: Arc<AtomicU32>,
}

impl PortfolioStore {
    pub fn new(api: Arc<dyn PortfolioApi>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(StoreState {
                tracked_address: None,
                snapshot: None,
                status: FetchStatus::Idle,
                refresh_task: None,
            })),
            in_flight: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Start tracking `address`: store it, fetch immediately, and restart the
    /// periodic refresh anchored to this call. Any previously running timer
    /// is cancelled first, so exactly one timer is ever live.
    ///
    /// Input validation belongs to the caller; empty input is ignored here as
    /// a final guard.
    pub async fn set_tracked_address(&self, address: &str) {
        let address = address.trim();
        if address.is_empty() {
            warn!("Ignoring empty tracked address");
            return;
        }

        {
            let mut state = self.state.lock().await;
            state.tracked_address = Some(address.to_string());
            if let Some(old_timer) = state.refresh_task.take() {
                old_timer.abort();
            }
            let store = self.clone();
            state.refresh_task = Some(tokio::spawn(async move {
                loop {
                    sleep(REFRESH_INTERVAL).await;
                    store.refresh_portfolio().await;
                }
            }));
        }

        info!("Tracking address {address}");
        self.fetch_portfolio(address).await;
    }

    /// Re-fetch for the currently tracked address. No-op when nothing is
    /// tracked, and dropped (not queued) while another fetch is in flight —
    /// the timer fires regardless of request state, so the guard lives here.
    pub async fn refresh_portfolio(&self) {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            debug!("Refresh dropped: fetch already in flight");
            return;
        }
        let address = {
            let state = self.state.lock().await;
            match &state.tracked_address {
                Some(address) => address.clone(),
                None => return,
            }
        };
        self.fetch_portfolio(&address).await;
    }

    /// One fetch lifecycle: `Loading` → collaborator call → `Idle` with a new
    /// snapshot, or `Error` with the prior snapshot untouched.
    ///
    /// The request is tagged with the address it targets; if the tracked
    /// address changed while the response was in flight, the response is
    /// discarded without touching state.
    async fn fetch_portfolio(&self, address: &str) {
        let _slot = InFlightGuard::acquire(&self.in_flight);
        {
            let mut state = self.state.lock().await;
            state.status = FetchStatus::Loading;
        }

        let response = self.api.fetch_portfolio(address).await;

        let mut state = self.state.lock().await;

        if state.tracked_address.as_deref() != Some(address) {
            debug!("Discarding stale response for replaced address {address}");
            return;
        }

        match response {
            ApiResponse {
                success: true,
                data: Some(data),
                ..
            } => {
                debug!(
                    "Portfolio updated: {} holds {} KAS",
                    data.address, data.kaspa_holdings
                );
                state.snapshot = Some(data);
                state.status = FetchStatus::Idle;
            }
            ApiResponse { error, .. } => {
                let message = error.unwrap_or_else(|| FETCH_FAILED_MSG.to_string());
                warn!("Portfolio fetch failed for {address}: {message}");
                state.status = FetchStatus::Error(message);
            }
        }
    }

    /// Snapshot of the observable surface.
    pub async fn view(&self) -> StoreView {
        let state = self.state.lock().await;
        StoreView {
            tracked_address: state.tracked_address.clone(),
            snapshot: state.snapshot.clone(),
            status: state.status.clone(),
        }
    }

    /// True while a fetch is awaiting its response.
    pub async fn loading(&self) -> bool {
        self.state.lock().await.status.is_loading()
    }

    /// Message of the last failed fetch, if the store is in the error state.
    pub async fn error(&self) -> Option<String> {
        self.state.lock().await.status.error().map(str::to_owned)
    }

    /// Stop the periodic refresh. The tracked address and snapshot survive;
    /// a later `set_tracked_address` starts tracking again.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(timer) = state.refresh_task.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use tokio::sync::Notify;
    use tokio::task::yield_now;
    use tokio::time::advance;

    use super::*;

    fn portfolio(address: &str, holdings: f64) -> PortfolioData {
        PortfolioData {
            address: address.to_string(),
            kaspa_holdings: holdings,
        }
    }

    /// Responds immediately from a per-address script; unknown addresses get
    /// `{success: false, error: "not found"}`.
    struct ScriptedApi {
        calls: StdMutex<Vec<String>>,
        responses: StdMutex<HashMap<String, ApiResponse<PortfolioData>>>,
    }

    impl ScriptedApi {
        fn new() -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
                responses: StdMutex::new(HashMap::new()),
            }
        }

        fn script(&self, address: &str, response: ApiResponse<PortfolioData>) {
            self.responses
                .lock()
                .unwrap()
                .insert(address.to_string(), response);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PortfolioApi for ScriptedApi {
        async fn fetch_portfolio(&self, address: &str) -> ApiResponse<PortfolioData> {
            self.calls.lock().unwrap().push(address.to_string());
            self.responses
                .lock()
                .unwrap()
                .get(address)
                .cloned()
                .unwrap_or_else(|| ApiResponse::err("not found"))
        }
    }

    /// Blocks responses for one designated slow address until the gate is
    /// opened; everything else succeeds immediately.
    struct GatedApi {
        calls: StdMutex<Vec<String>>,
        gate: Notify,
        slow_address: String,
    }

    impl GatedApi {
        fn new(slow_address: &str) -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
                gate: Notify::new(),
                slow_address: slow_address.to_string(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PortfolioApi for GatedApi {
        async fn fetch_portfolio(&self, address: &str) -> ApiResponse<PortfolioData> {
            self.calls.lock().unwrap().push(address.to_string());
            if address == self.slow_address {
                self.gate.notified().await;
            }
            ApiResponse::ok(portfolio(address, 42.0))
        }
    }

    /// Drive spawned tasks forward on the current-thread test runtime.
    async fn settle() {
        for _ in 0..8 {
            yield_now().await;
        }
    }

    #[tokio::test]
    async fn successful_fetch_stores_snapshot_and_goes_idle() {
        let api = Arc::new(ScriptedApi::new());
        api.script("kaspa:abc", ApiResponse::ok(portfolio("kaspa:abc", 500.0)));
        let store = PortfolioStore::new(api.clone());

        store.set_tracked_address("kaspa:abc").await;

        let view = store.view().await;
        assert_eq!(view.tracked_address.as_deref(), Some("kaspa:abc"));
        assert_eq!(view.snapshot, Some(portfolio("kaspa:abc", 500.0)));
        assert_eq!(view.status, FetchStatus::Idle);
        assert_eq!(api.calls(), vec!["kaspa:abc"]);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn failed_fetch_sets_error_and_keeps_prior_snapshot() {
        let api = Arc::new(ScriptedApi::new());
        api.script("kaspa:abc", ApiResponse::ok(portfolio("kaspa:abc", 500.0)));
        let store = PortfolioStore::new(api.clone());

        store.set_tracked_address("kaspa:abc").await;
        store.set_tracked_address("kaspa:missing").await;

        let view = store.view().await;
        assert_eq!(view.status, FetchStatus::Error("not found".to_string()));
        // Stale-but-present: the old snapshot is not cleared on error.
        assert_eq!(view.snapshot, Some(portfolio("kaspa:abc", 500.0)));
        assert_eq!(store.error().await.as_deref(), Some("not found"));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn backend_failure_without_message_gets_fallback() {
        let api = Arc::new(ScriptedApi::new());
        api.script(
            "kaspa:abc",
            ApiResponse {
                success: false,
                data: None,
                error: None,
            },
        );
        let store = PortfolioStore::new(api.clone());

        store.set_tracked_address("kaspa:abc").await;

        assert_eq!(
            store.error().await.as_deref(),
            Some("Failed to fetch portfolio data")
        );
        store.shutdown().await;
    }

    #[tokio::test]
    async fn refresh_without_tracked_address_is_noop() {
        let api = Arc::new(ScriptedApi::new());
        let store = PortfolioStore::new(api.clone());

        store.refresh_portfolio().await;

        let view = store.view().await;
        assert!(view.tracked_address.is_none());
        assert!(view.snapshot.is_none());
        assert_eq!(view.status, FetchStatus::Idle);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_address_is_ignored() {
        let api = Arc::new(ScriptedApi::new());
        let store = PortfolioStore::new(api.clone());

        store.set_tracked_address("   ").await;

        let view = store.view().await;
        assert!(view.tracked_address.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn status_is_loading_while_fetch_in_flight() {
        let api = Arc::new(GatedApi::new("kaspa:slow"));
        let store = PortfolioStore::new(api.clone());

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.set_tracked_address("kaspa:slow").await })
        };
        settle().await;

        assert!(store.loading().await);

        api.gate.notify_one();
        pending.await.expect("fetch task completes");
        assert!(!store.loading().await);
        assert_eq!(store.view().await.status, FetchStatus::Idle);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn stale_response_discarded_after_address_change() {
        let api = Arc::new(GatedApi::new("kaspa:old"));
        let store = PortfolioStore::new(api.clone());

        // First fetch parks on the gate with the old address tagged.
        let stale = {
            let store = store.clone();
            tokio::spawn(async move { store.set_tracked_address("kaspa:old").await })
        };
        settle().await;
        assert_eq!(api.calls(), vec!["kaspa:old"]);

        // Replace the address; its fetch resolves immediately.
        store.set_tracked_address("kaspa:new").await;
        let view = store.view().await;
        assert_eq!(view.snapshot, Some(portfolio("kaspa:new", 42.0)));
        assert_eq!(view.status, FetchStatus::Idle);

        // Now let the overtaken response land: it must not overwrite state.
        api.gate.notify_one();
        stale.await.expect("stale fetch completes");
        let view = store.view().await;
        assert_eq!(view.snapshot, Some(portfolio("kaspa:new", 42.0)));
        assert_eq!(view.status, FetchStatus::Idle);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn refresh_dropped_while_fetch_in_flight() {
        let api = Arc::new(GatedApi::new("kaspa:slow"));
        let store = PortfolioStore::new(api.clone());

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.set_tracked_address("kaspa:slow").await })
        };
        settle().await;

        // Timer-style refresh while the first fetch is still out: dropped.
        store.refresh_portfolio().await;
        assert_eq!(api.calls(), vec!["kaspa:slow"]);

        api.gate.notify_one();
        pending.await.expect("fetch task completes");

        // Once settled, refresh goes through again. Pre-arm the gate so the
        // second response resolves immediately.
        api.gate.notify_one();
        store.refresh_portfolio().await;
        assert_eq!(api.calls().len(), 2);
        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_refresh_fires_on_the_interval() {
        let api = Arc::new(ScriptedApi::new());
        api.script("kaspa:abc", ApiResponse::ok(portfolio("kaspa:abc", 500.0)));
        let store = PortfolioStore::new(api.clone());

        store.set_tracked_address("kaspa:abc").await;
        settle().await; // let the timer task register its first sleep
        assert_eq!(api.calls().len(), 1);

        advance(REFRESH_INTERVAL).await;
        settle().await;
        assert_eq!(api.calls().len(), 2);

        advance(REFRESH_INTERVAL).await;
        settle().await;
        assert_eq!(api.calls().len(), 3);
        assert!(api.calls().iter().all(|a| a == "kaspa:abc"));
        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn address_change_cancels_old_timer_and_restarts() {
        let api = Arc::new(ScriptedApi::new());
        api.script("kaspa:a", ApiResponse::ok(portfolio("kaspa:a", 1.0)));
        api.script("kaspa:b", ApiResponse::ok(portfolio("kaspa:b", 2.0)));
        let store = PortfolioStore::new(api.clone());

        store.set_tracked_address("kaspa:a").await;
        settle().await;
        advance(Duration::from_secs(15)).await;
        settle().await;

        store.set_tracked_address("kaspa:b").await;
        settle().await;
        assert_eq!(api.calls(), vec!["kaspa:a", "kaspa:b"]);

        // 15s later the old timer would have fired; it must be dead.
        advance(Duration::from_secs(15)).await;
        settle().await;
        assert_eq!(api.calls().len(), 2);

        // The new timer is anchored to the second set call.
        advance(Duration::from_secs(15)).await;
        settle().await;
        assert_eq!(api.calls(), vec!["kaspa:a", "kaspa:b", "kaspa:b"]);
        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_survives_address_change_during_inflight_refresh() {
        let api = Arc::new(GatedApi::new("kaspa:a"));
        let store = PortfolioStore::new(api.clone());

        // Pre-arm the gate so the immediate fetch for the slow address
        // resolves; only the later timer refresh will park on it.
        api.gate.notify_one();
        store.set_tracked_address("kaspa:a").await;
        settle().await;
        assert_eq!(api.calls(), vec!["kaspa:a"]);

        // Timer refresh goes out and parks awaiting its response.
        advance(REFRESH_INTERVAL).await;
        settle().await;
        assert_eq!(api.calls(), vec!["kaspa:a", "kaspa:a"]);
        assert!(store.loading().await);

        // Replacing the address aborts the timer task mid-fetch. The
        // in-flight slot must be released, not leaked.
        store.set_tracked_address("kaspa:b").await;
        settle().await;
        assert_eq!(api.calls().len(), 3);

        // The new timer keeps refreshing the new address.
        advance(REFRESH_INTERVAL).await;
        settle().await;
        advance(REFRESH_INTERVAL).await;
        settle().await;
        let calls = api.calls();
        assert_eq!(&calls[2..], ["kaspa:b", "kaspa:b", "kaspa:b"]);
        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_timer() {
        let api = Arc::new(ScriptedApi::new());
        api.script("kaspa:abc", ApiResponse::ok(portfolio("kaspa:abc", 500.0)));
        let store = PortfolioStore::new(api.clone());

        store.set_tracked_address("kaspa:abc").await;
        store.shutdown().await;

        advance(REFRESH_INTERVAL).await;
        settle().await;
        assert_eq!(api.calls().len(), 1);
    }
}
