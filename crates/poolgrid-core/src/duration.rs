/// Parse a duration string like "30s", "5m" into seconds.
///
/// Unparseable input yields `None` so callers can pick their own fallback.
pub fn parse_duration_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok()?.checked_mul(60)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok()?.checked_mul(3600)
    } else {
        s.parse::<u64>().ok()
    }
}
