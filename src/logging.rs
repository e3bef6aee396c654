//! Log subscriber setup for the binary.

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "encodeplan=trace,ep_plan=trace,ep_probe=trace,ep_core=trace"
    } else {
        "encodeplan=info,ep_plan=info,ep_probe=info,ep_core=info"
    }
}

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// the plan.
pub fn init(verbose: bool) {
    // Respect RUST_LOG if set
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(verbose).to_string());

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_level() {
        assert!(default_filter(false).contains("ep_plan=info"));
        assert!(default_filter(true).contains("ep_plan=trace"));
    }
}
