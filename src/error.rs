use std::path::PathBuf;
use std::time::Duration;

/// Crate level error. Every operation of the backend contract either returns
/// its declared value or fails with one of these kinds, each carrying a
/// message suitable for display.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- configuration ---------------------------------------------
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    // --------------------------------- adapter lifecycle -----------------------------------------
    #[error("no debug adapter configured for language `{language}` (configured: {})", available.join(", "))]
    NoAdapterConfigured {
        language: String,
        available: Vec<String>,
    },
    #[error("failed to spawn debug adapter `{command}`: {source}")]
    AdapterSpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("adapter already active")]
    AdapterAlreadyActive,
    #[error("adapter did not send `initialized` within {0:?}")]
    InitializationTimeout(Duration),
    #[error("adapter exited unexpectedly (code {code:?}, signal {signal:?})")]
    AdapterCrashed {
        code: Option<i32>,
        signal: Option<i32>,
    },

    // --------------------------------- DAP exchange ----------------------------------------------
    #[error("DAP request '{command}' failed: {message}")]
    RequestFailed { command: String, message: String },
    #[error("DAP request '{command}' timed out after {timeout:?}")]
    RequestTimedOut { command: String, timeout: Duration },
    #[error("DAP client is closed")]
    ClientClosed,

    // --------------------------------- session state ---------------------------------------------
    #[error("no active debug session")]
    NoActiveSession,
    #[error("no such session: {0}")]
    NoSuchSession(String),
    #[error("no threads available")]
    NoThreadsAvailable,
    #[error("nothing to restart: no previous launch configuration")]
    NothingToRestart,

    // --------------------------------- passthrough -----------------------------------------------
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(target: "backend", "{:#}", e);
                None
            }
        }
    };
    ($res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(target: "backend", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}
