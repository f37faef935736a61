//! Assertion and event collection helpers.

use dr_protocol::ipc::Event;
use dr_protocol::process_models::ProcessState;
use std::time::Duration;
use tokio::sync::mpsc;

/// Drain every event until the channel closes or `timeout` passes.
#[allow(dead_code)]
pub async fn collect_events(rx: &mut mpsc::Receiver<Event>, timeout: Duration) -> Vec<Event> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;

    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        events.push(event);
    }

    events
}

#[allow(dead_code)]
pub fn count_shutdown_started(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::ShutdownStarted { .. }))
        .count()
}

/// States reported for `name`, in order.
#[allow(dead_code)]
pub fn states_of(events: &[Event], name: &str) -> Vec<ProcessState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ProcessStateUpdate { name: n, state } if n == name => Some(state.clone()),
            _ => None,
        })
        .collect()
}

/// Index of the first event matching `pred`, panicking if none does.
#[allow(dead_code)]
pub fn position_of(events: &[Event], what: &str, pred: impl Fn(&Event) -> bool) -> usize {
    events
        .iter()
        .position(pred)
        .unwrap_or_else(|| panic!("Expected a {what} event in {events:#?}"))
}
