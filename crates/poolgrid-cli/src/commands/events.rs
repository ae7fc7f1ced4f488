//! `poolgrid events`: recent scaling audit events, oldest first.

use chrono::DateTime;

use poolgrid_state::{AuditEvent, Severity, StateStore};

pub fn list(store: &StateStore, limit: usize) -> anyhow::Result<()> {
    let events = store.list_events(limit)?;
    if events.is_empty() {
        println!("no events recorded");
        return Ok(());
    }
    for event in &events {
        println!("{}", format_event(event));
    }
    Ok(())
}

fn format_event(event: &AuditEvent) -> String {
    let when = i64::try_from(event.timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| event.timestamp.to_string());
    let severity = match event.severity {
        Severity::Normal => "Normal",
        Severity::Warning => "Warning",
    };
    format!(
        "{when}  {severity:<7} {:<16} {}/{}  {}",
        event.reason.to_string(),
        event.cluster,
        event.pool,
        event.message
    )
}
