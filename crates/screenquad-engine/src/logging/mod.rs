//! Logger initialization.
//!
//! Library code only talks to the `log` facade; binaries call
//! [`init_logging`] once, early in `main`.

mod init;

pub use init::{LoggingConfig, init_logging};
