//! Relational backend protocol, postgres v3.
//!
//! Only the startup exchange and the simple query flow are spoken, values are
//! always received in text format.
//!
//! Every message but the startup one is framed as a type byte followed by a big
//! endian `u32` length, which counts itself but not the type byte.
//!
//! <https://www.postgresql.org/docs/17/protocol-overview.html>
mod backend;
mod error;
mod frontend;

pub use backend::{Auth, BackendMessage, message_name, rows_affected};
pub use error::{DatabaseError, ProtocolError, UnsupportedAuth};
pub use frontend::{FrontendMessage, md5_password};
