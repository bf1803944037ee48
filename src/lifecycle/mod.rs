//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     ctrl-c / SIGTERM → broadcast → server stops accepting → drain → exit
//!
//! Signals (signals.rs):
//!     SIGHUP → reload config file → same channel as the file watcher
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - SIGHUP triggers config reload, not shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
