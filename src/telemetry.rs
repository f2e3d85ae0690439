use crate::config::LoggingConfig;
use anyhow::Result;
use tracing::Dispatch;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Build the subscriber described by `cfg`.
///
/// Nothing is installed globally; callers scope the returned handle with
/// `tracing::dispatcher::set_default` or `with_default`. `RUST_LOG` takes
/// precedence over the configured filter.
pub fn build_dispatch(cfg: &LoggingConfig) -> Result<Dispatch> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cfg.filter))?;
    let registry = tracing_subscriber::registry().with(filter);

    let dispatch = if cfg.json {
        Dispatch::new(registry.with(tracing_subscriber::fmt::layer().json()))
    } else {
        Dispatch::new(registry.with(tracing_subscriber::fmt::layer()))
    };
    Ok(dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_plain_and_json() {
        for json in [false, true] {
            let cfg = LoggingConfig {
                filter: "debug,hyper=warn".to_string(),
                json,
            };
            let dispatch = build_dispatch(&cfg).unwrap();
            tracing::dispatcher::with_default(&dispatch, || {
                tracing::info!(json, "logging initialised");
            });
        }
    }
}
