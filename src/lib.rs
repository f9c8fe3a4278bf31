//! Ferry - point-to-point file transfer over a single TCP stream
//!
//! One persistent connection per client, strictly sequential commands:
//! list the files a daemon serves, download one, upload one, or exit.

pub mod cli;
pub mod codec;
pub mod error;
pub mod history;
pub mod logger;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transfer;
