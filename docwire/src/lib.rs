//! Document database wire protocol frontend for relational document stores.
//!
//! Clients speak the document database wire protocol, requests are translated
//! to SQL and executed against a relational backend. A session can instead, or
//! additionally, forward requests to a real document database and log the
//! difference between both responses.
//!
//! # Examples
//!
//! Serving clients:
//!
//! ```no_run
//! use docwire::{Config, Handler, Listener, Metrics, Pool, PoolConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn app() -> docwire::Result<()> {
//! let config = Config::from_env()?;
//! let pool = Pool::connect_lazy_with(PoolConfig::from_env(&config)?);
//!
//! let handler = Handler::new(pool.clone(), Metrics::new());
//! let listener = Listener::bind(config, handler).await?;
//!
//! listener.run(CancellationToken::new()).await?;
//! pool.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! Translating a query:
//!
//! ```
//! use docwire::doc;
//!
//! let filter = doc! { "a.b" => "x" };
//! let find = docwire::translate::find("users", &filter, &doc! {}, &doc! {}, 0).unwrap();
//!
//! assert_eq!(find.sql(), r#"SELECT * FROM "users" WHERE "a"."b" = $1"#);
//! ```

mod common;
mod ext;
#[cfg(feature = "tokio")]
mod net;

// Protocol
pub mod bson;
pub mod wire;
pub mod postgres;

// Component
pub mod row;
pub mod backend;
pub mod translate;
pub mod handlers;
pub mod metrics;
pub mod config;

// Connection
#[cfg(feature = "tokio")]
pub mod connection;
#[cfg(feature = "tokio")]
pub mod pool;
#[cfg(feature = "tokio")]
pub mod clientconn;

mod error;


pub use bson::{Document, Value};
pub use backend::Backend;
pub use config::{Config, Mode};
pub use handlers::{CommandError, ErrorCode, Handler};
pub use self::metrics::Metrics;
pub use row::{Row, Rows, FromColumn};
pub use error::{Error, ErrorKind, Result, ResultExt};

#[cfg(feature = "tokio")]
pub use pool::{Pool, PoolConfig};
#[cfg(feature = "tokio")]
pub use clientconn::{Listener, Proxy, Session};
