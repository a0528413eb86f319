use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. Output goes to stderr so stdout
/// stays clean for command results.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            "contract_rag=debug,info".into()
        } else {
            "contract_rag=info,warn".into()
        }
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose);

    // try_init: a second call (e.g. from tests) keeps the first subscriber.
    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(verbose, json, "Logging initialized");
    }
}
