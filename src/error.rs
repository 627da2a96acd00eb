//! Error types for signing and signature merging

use thiserror::Error;

use crate::types::ScriptClass;

/// Illegal script-hash nesting encountered while resolving a locking script.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingViolation {
    #[error("cannot nest P2SH scripts")]
    P2shInP2sh,

    #[error("cannot nest P2SH inside P2WSH")]
    P2shInP2wsh,

    #[error("cannot nest P2WSH inside P2WSH")]
    P2wshInP2wsh,
}

#[derive(Error, Debug)]
pub enum SignError {
    #[error("can't sign {0} scripts")]
    UnsupportedScript(ScriptClass),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    #[error(transparent)]
    Nesting(#[from] NestingViolation),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Script parse error: {0}")]
    ScriptParse(String),

    #[error("Script build error: {0}")]
    ScriptBuild(String),

    #[error("Signature hash error: {0}")]
    SigHash(String),

    #[error("Address encoding error: {0}")]
    Encoding(String),

    #[error("No operation at {index} (log holds {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Script execution failed: {0}")]
    ScriptExecution(String),
}

pub type Result<T> = std::result::Result<T, SignError>;
