//! Shared error type and printing helpers for every command module.
//!
//! A command function returns `CmdResult<T>`; `main` turns whatever comes
//! back into the right exit code and the right stream (stdout for
//! `--json`, stderr for human-mode errors).

use serde_json::json;

pub type CmdResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    /// Bad arguments the command handler itself rejected (clap already
    /// catches malformed flags; this covers things like an unparsable
    /// status name passed to `--status`).
    Usage(String),
    Core(tx_core::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Core(_) => 1,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CliError::Usage(_) => "UsageError",
            CliError::Core(e) => e.code(),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Core(e) => write!(f, "{e}"),
        }
    }
}

impl From<tx_core::Error> for CliError {
    fn from(e: tx_core::Error) -> Self {
        CliError::Core(e)
    }
}

/// `--json` error shape: `{"error":{"code":...,"message":...}}` on stdout.
/// Human mode prints the tag and message to stderr.
pub fn print_error(json_mode: bool, err: &CliError) {
    if json_mode {
        let payload = json!({"error": {"code": err.code(), "message": err.to_string()}});
        println!("{}", serde_json::to_string_pretty(&payload).expect("json payload is always serializable"));
    } else {
        eprintln!("error[{}]: {err}", err.code());
    }
}

/// Emit a successful result: pretty JSON on stdout in `--json` mode, or
/// hand the typed value to a human-readable printer otherwise.
pub fn emit<T: serde::Serialize>(json_mode: bool, value: &T, human: impl FnOnce(&T)) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(value).expect("json payload is always serializable"));
    } else {
        human(value);
    }
}
