//! Reader for INI-like config files with `${name}` substitution.
//!
//! ```text
//! address=127.0.0.1:1234   # root-level values come first
//!
//! [service]
//! url=http://${address}/api
//! ```
//!
//! Malformed lines are skipped and unknown references are left as written;
//! the only error is a file that cannot be opened.

pub mod config;
pub mod error;
pub mod line;
pub mod resolve;

pub use config::{load, Document, Section};
pub use error::{Error, Result};
