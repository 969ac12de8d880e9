use cellpolar_concepts::SetupError;
use tracing_subscriber::{filter, prelude::*};

/// Installs a global subscriber which prints all events up to the given level in a
/// human-readable format.
///
/// Fails if another global subscriber was installed before.
pub fn init_logging(level: filter::LevelFilter) -> Result<(), SetupError> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_line_number(true)
        .with_level(true);
    tracing_subscriber::registry()
        .with(stdout_log.with_filter(level))
        .try_init()
        .map_err(|e| SetupError(format!("Could not install subscriber: {e}")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn second_subscriber_fails() {
        let _ = init_logging(filter::LevelFilter::WARN);
        assert!(init_logging(filter::LevelFilter::WARN).is_err());
    }
}
