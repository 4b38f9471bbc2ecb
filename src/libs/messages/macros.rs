//! Output macros.
//!
//! Every macro takes a [`Message`](super::Message) (or anything `Display`)
//! and routes it by mode:
//!
//! ```text
//! TASKNEST_DEBUG or RUST_LOG set  ->  tracing (info/warn/error/debug)
//! otherwise                       ->  stdout / stderr, debug messages dropped
//! ```
//!
//! `msg_error_anyhow!` and `msg_bail_anyhow!` build `anyhow` errors carrying
//! the same text.

use std::sync::OnceLock;

static DEBUG_MODE: OnceLock<bool> = OnceLock::new();

/// Whether output goes through `tracing`. Read once per process.
#[doc(hidden)]
pub fn is_debug_mode() -> bool {
    *DEBUG_MODE.get_or_init(|| std::env::var("TASKNEST_DEBUG").is_ok() || std::env::var("RUST_LOG").is_ok())
}

/// Shared body of the display macros: `level` picks the tracing event,
/// `out` the console writer, `pad` wraps the line in blank lines.
#[doc(hidden)]
#[macro_export]
macro_rules! __tasknest_emit {
    ($level:ident, $out:ident, $prefix:expr, $msg:expr, $pad:expr) => {{
        let line = format!("{}{}", $prefix, $msg);
        let line = if $pad { format!("\n{}\n", line) } else { line };
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::$level!("{}", line);
        } else {
            $out!("{}", line);
        }
    }};
}

/// Plain line. `msg_print!(msg, true)` surrounds it with blank lines.
#[macro_export]
macro_rules! msg_print {
    ($msg:expr) => {
        $crate::__tasknest_emit!(info, println, "", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__tasknest_emit!(info, println, "", $msg, true)
    };
}

#[macro_export]
macro_rules! msg_success {
    ($msg:expr) => {
        $crate::__tasknest_emit!(info, println, "✅ ", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__tasknest_emit!(info, println, "✅ ", $msg, true)
    };
}

/// Error line; goes to stderr outside debug mode.
#[macro_export]
macro_rules! msg_error {
    ($msg:expr) => {
        $crate::__tasknest_emit!(error, eprintln, "❌ ", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__tasknest_emit!(error, eprintln, "❌ ", $msg, true)
    };
}

#[macro_export]
macro_rules! msg_warning {
    ($msg:expr) => {
        $crate::__tasknest_emit!(warn, println, "⚠️ ", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__tasknest_emit!(warn, println, "⚠️ ", $msg, true)
    };
}

#[macro_export]
macro_rules! msg_info {
    ($msg:expr) => {
        $crate::__tasknest_emit!(info, println, "ℹ️ ", $msg, false)
    };
    ($msg:expr, true) => {
        $crate::__tasknest_emit!(info, println, "ℹ️ ", $msg, true)
    };
}

/// Diagnostic detail. Silent unless debug mode is on.
#[macro_export]
macro_rules! msg_debug {
    ($msg:expr) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::debug!("🔍 {}", $msg);
        }
    };
}

/// `anyhow::Error` with the message text.
///
/// ```rust,ignore
/// let db = Db::new().map_err(|e| msg_error_anyhow!(Message::StoreOpenFailed(e.to_string())))?;
/// ```
#[macro_export]
macro_rules! msg_error_anyhow {
    ($msg:expr) => {
        anyhow::anyhow!("❌ {}", $msg)
    };
}

/// Early return with [`msg_error_anyhow!`].
#[macro_export]
macro_rules! msg_bail_anyhow {
    ($msg:expr) => {
        anyhow::bail!("❌ {}", $msg)
    };
}
