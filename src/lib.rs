//! debugmcp — a standalone Debug Adapter Protocol backend.
//!
//! The crate lets an automation agent drive a running program through its
//! debugger without knowing DAP exists: the [`backend::DebugBackend`]
//! contract covers session lifecycle, stepping, breakpoints and inspection,
//! while the [`dap`] subsystem handles framing, request correlation and the
//! adapter child process underneath.
//!
//! ```no_run
//! use debugmcp::backend::{DapBackend, DebugBackend};
//! use debugmcp::cfg::{ConfigurationProvider, StandaloneConfig, find_config_file};
//! use std::path::Path;
//!
//! # fn main() -> debugmcp::error::Result<()> {
//! let config_path = find_config_file(Path::new(".")).expect("debugmcp.config.json");
//! let config = StandaloneConfig::load(&config_path)?;
//! let backend = DapBackend::from_config(&config);
//!
//! let launch = config.resolve_launch_config(Path::new("app.py"), Path::new("."));
//! backend.start_debugging(Path::new("."), launch)?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cfg;
pub mod dap;
pub mod error;
pub mod types;

pub use backend::{DapBackend, DebugBackend};
pub use error::{Error, Result};
