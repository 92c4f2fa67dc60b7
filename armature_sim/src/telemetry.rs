// armature_sim/src/telemetry.rs

//! `tracing` subscriber setup for binaries and tests driving the bridge.
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `ARMATURE_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. Call once at process start; a second call
/// leaves the first subscriber in place.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = wants_json(std::env::var("ARMATURE_LOG_FORMAT").ok().as_deref());

    let result = if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_selection() {
        assert!(wants_json(Some("json")));
        assert!(wants_json(Some("JSON")));
        assert!(!wants_json(Some("compact")));
        assert!(!wants_json(None));
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_tracing();
        init_tracing();
    }
}
