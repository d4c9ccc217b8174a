use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use crate::errors::GenerationError;

/// Install a global subscriber writing to stderr. `filter` uses `EnvFilter`
/// directive syntax, e.g. `info` or `rowsmith_generate=debug`.
pub fn init_tracing(filter: &str, json: bool) -> Result<(), GenerationError> {
    let filter = parse_filter(filter)?;
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    installed.map_err(|err| GenerationError::Logging(err.to_string()))
}

fn parse_filter(filter: &str) -> Result<EnvFilter, GenerationError> {
    EnvFilter::try_new(filter).map_err(|err| GenerationError::Logging(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_is_reported() {
        let err = init_tracing("rowsmith=notalevel[", false).expect_err("invalid filter");
        assert!(matches!(err, GenerationError::Logging(_)));
    }
}
