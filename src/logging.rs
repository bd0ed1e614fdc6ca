//! Subscriber bootstrap for binaries and tests embedding the DAO layer.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::DaoError;
use crate::error::Result;

/// Install a global subscriber filtered by `RUST_LOG`. `with_spans` adds span open/close events, which is handy when
/// chasing single-flight waits.
pub fn init_tracing(with_spans: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();

    let fmt_layer = tracing_subscriber::fmt::layer().with_span_events(if with_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    }
    else {
        FmtSpan::NONE
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| DaoError::Config(format!("cannot initialize tracing: {err}")))?;

    tracing::info!("Tracing initialized");
    Ok(())
}
