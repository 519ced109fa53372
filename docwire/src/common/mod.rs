//! Supporting utility.

/// Trace when `verbose` feature enabled.
macro_rules! verbose {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        tracing::trace!($($tt)*)
    };
}

/// Create and enter `Span` when `verbose` feature enabled.
///
/// The guard is `!Send`, only use it in a block without `.await`.
macro_rules! span {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        let s = tracing::trace_span!($($tt)*);
        #[cfg(feature = "verbose")]
        let _s = s.enter();
    };
}

/// Debug log a message dump, the dump is only built when debug is enabled.
macro_rules! dump {
    ($title:literal, $header:expr, $body:expr) => {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("{}:\n{}", $title, $crate::wire::dump_message($header, $body));
        }
    };
}

pub(crate) use verbose;
pub(crate) use span;
pub(crate) use dump;
