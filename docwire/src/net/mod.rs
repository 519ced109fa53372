//! Runtime networking.
mod socket;

pub use socket::Socket;
