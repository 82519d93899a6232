use tracing::debug;

use crate::store::PortfolioStore;

/// Boundary between raw user text and the store.
///
/// Trims input and silently discards empty submissions — an empty address is
/// a guard condition, not a reported failure. Holds no state of its own; the
/// loading/error accessors are read-only projections of the store so a UI can
/// disable input and render error text.
pub struct AddressInputHandler {
    store: PortfolioStore,
}

impl AddressInputHandler {
    pub fn new(store: PortfolioStore) -> Self {
        Self { store }
    }

    /// Submit raw user text. Whitespace-only input is dropped; anything else
    /// is trimmed and becomes the tracked address.
    pub async fn submit(&self, raw_text: &str) {
        let trimmed = raw_text.trim();
        if trimmed.is_empty() {
            debug!("Discarding empty address submission");
            return;
        }
        self.store.set_tracked_address(trimmed).await;
    }

    /// True while the store has a fetch in flight.
    pub async fn loading(&self) -> bool {
        self.store.loading().await
    }

    /// Error text from the store's last failed fetch, if any.
    pub async fn error(&self) -> Option<String> {
        self.store.error().await
    }
}
