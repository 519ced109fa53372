//! Client connections.
//!
//! The [`Listener`] accepts clients and runs a [`Session`] for each of them. A
//! session reads requests in order and, depending on the [`Mode`], answers them
//! with the local [`Handler`][crate::handlers::Handler], forwards them to a
//! [`Proxy`], or both while logging the difference.
mod diff;
mod listener;
mod proxy;
mod session;

#[cfg(feature = "tls")]
mod tls;

pub use crate::config::Mode;
pub use diff::unified as unified_diff;
pub use listener::Listener;
pub use proxy::Proxy;
pub use session::Session;
