use std::path::PathBuf;

/// Errors from parsing a board written as rows of color letters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardParseError {
    #[error("invalid number of rows: expected {expected}, found {found}")]
    RowCount { expected: usize, found: usize },

    #[error("row {row} has {found} cells, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unrecognized character '{ch}' in row {row} col {col}")]
    UnknownColor { ch: char, row: usize, col: usize },
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Errors raised by a session store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access store file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a spell cannot be cast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpellError {
    #[error("the spell is still locked ({remaining} awakening(s) to go)")]
    Locked { remaining: u32 },

    #[error("not enough energy")]
    NotEnoughEnergy,
}

/// Reasons the game session refuses a player intent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("wait for the current move to finish")]
    Busy,

    #[error("time is up")]
    TimeUp,

    #[error("the level is already complete")]
    LevelComplete,

    #[error("pick a target for the pending spell first")]
    SpellTargetPending,

    #[error("no spell is waiting for a target")]
    NoSpellTarget,

    #[error("cell {0} is outside the board")]
    IndexOutOfRange(usize),

    #[error(transparent)]
    Spell(#[from] SpellError),
}
