use std::borrow::Cow;
use tracing_subscriber::EnvFilter;

/// Longest value written into a single log line
pub const MAX_LOG_CHARS: usize = 800;

/// Install the global subscriber. Logs go to stderr so stdout stays
/// free for the JSON report.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Cut `value` to `MAX_LOG_CHARS` characters for logging
pub fn log_preview(value: &str) -> Cow<'_, str> {
    match value.char_indices().nth(MAX_LOG_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}...(truncated)", &value[..cut])),
        None => Cow::Borrowed(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_values_pass_through() {
        assert!(matches!(log_preview("cell"), Cow::Borrowed("cell")));
        let exact = "x".repeat(MAX_LOG_CHARS);
        assert_eq!(log_preview(&exact), exact.as_str());
    }

    #[test]
    fn test_long_values_are_cut_on_char_boundary() {
        let long = "é".repeat(MAX_LOG_CHARS + 10);
        let preview = log_preview(&long);
        assert!(preview.ends_with("...(truncated)"));
        assert_eq!(preview.chars().filter(|c| *c == 'é').count(), MAX_LOG_CHARS);
    }
}
