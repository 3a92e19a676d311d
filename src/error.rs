use std::fmt::Debug;
use std::fmt::Display;

/// One variant per error kind in the taxonomy: validation failures never
/// retried, not-found lookups that cause a recipient/email to be skipped,
/// placeholder resolution misses, gateway transport failures, persistence
/// failures, and scheduling invariant violations that are fatal to a single
/// send.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not resolve placeholder: {0}")]
    Resolution(String),

    #[error("gateway error: {0}")]
    Gateway(#[source] anyhow::Error),

    #[error("persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("scheduling invariant violated: {0}")]
    SchedulingInvariant(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

    pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }

    pub fn resolution(msg: impl Into<String>) -> Self { Self::Resolution(msg.into()) }

    pub fn invariant(msg: impl Into<String>) -> Self { Self::SchedulingInvariant(msg.into()) }
}

/// Pretty-print the full `source()` chain of an error, one cause per line.
/// Used by `Debug` impls that want `{:?}` to read like a stack trace rather
/// than a single opaque line.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{e}\n")?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{cause}")?;
        current = cause.source();
    }
    Ok(())
}

/// Convert arbitrary error types that can't easily implement `std::error::Error`
/// (closures, strings) into a boxed error for `anyhow::Context`-style call sites.
pub fn anyhow_from<T>(e: T) -> anyhow::Error
where
    T: Debug + Display + Send + Sync + 'static,
{
    anyhow::anyhow!("{e}")
}
