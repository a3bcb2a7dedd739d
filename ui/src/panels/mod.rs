pub(crate) mod filters;
pub(crate) mod list;
pub(crate) mod log;
pub(crate) mod map;

#[derive(Clone, Copy, PartialEq)]
pub(crate) enum Tab {
    Nearby,
    Log,
}

/// Extract the time portion from an ISO 8601 timestamp string.
/// "2026-02-27T12:34:56.789Z" -> "12:34:56.789"
pub(crate) fn extract_time(iso: &str) -> String {
    if let Some(t_pos) = iso.find('T') {
        let time_part = &iso[t_pos + 1..];
        time_part.trim_end_matches('Z').to_string()
    } else {
        iso.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_time_strips_date_and_zone() {
        assert_eq!(extract_time("2026-02-27T12:34:56.789Z"), "12:34:56.789");
        assert_eq!(extract_time("12:00"), "12:00");
    }
}
