use serde::Serialize;

use crate::store::StoreView;
use crate::types::FetchStatus;

/// Flattened store state for the JSON-line report.
#[derive(Serialize)]
struct ReportLine<'a> {
    tracked_address: Option<&'a str>,
    kaspa_holdings: Option<f64>,
    loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Emit the store's observable surface as a single JSON line to stdout.
/// Read-only: the presentational layer never mutates the store.
pub fn report_view(view: &StoreView) {
    let line = ReportLine {
        tracked_address: view.tracked_address.as_deref(),
        kaspa_holdings: view.snapshot.as_ref().map(|s| s.kaspa_holdings),
        loading: view.status.is_loading(),
        error: view.status.error(),
    };
    if let Ok(json) = serde_json::to_string(&line) {
        println!("{json}");
    }
}

/// Human-readable one-liner for interactive use.
pub fn format_view(view: &StoreView) -> String {
    let address = view.tracked_address.as_deref().unwrap_or("(none)");
    let holdings = view
        .snapshot
        .as_ref()
        .map(|s| format!("{} KAS", s.kaspa_holdings))
        .unwrap_or_else(|| "-".to_string());
    match &view.status {
        FetchStatus::Loading => format!("{address}: {holdings} (refreshing...)"),
        FetchStatus::Error(msg) => format!("{address}: {holdings} [error: {msg}]"),
        FetchStatus::Idle => format!("{address}: {holdings}"),
    }
}
