//! # Rune Cascade Library
//!
//! This library provides the board simulation for a 5x5 rune matching puzzle:
//! swapping runes, destroying runs of three or more, dropping and refilling
//! tiles, and resolving the cascades that follow. Every engine call returns the
//! settled board together with an ordered script of visual actions.
//!
//! It is used by two binaries:
//! - `rune_player`: Allows interactive play of a full session via the command line.
//! - `autoplay`: Plays seeded games with the hint strategy and reports statistics.
//!
//! ## Modules
//! - `engine`: Tiles (`RuneTile`), boards (`Board`), match detection, fall
//!   distances and the `Engine` that resolves swaps and spell removals.
//! - `action`: The `Action` script and `MoveResult`.
//! - `player`: Replays action scripts against a view model, frame by frame.
//! - `session`: Level progress, scoring, the timer and spell casting.
//! - `spellbook`: Spell definitions, unlocks and per-color energy.
//! - `storage`: Key-value persistence of sessions as JSON.
//! - `hints`: Finds swaps that produce a match.
//! - `config`: Tunable constants loaded from TOML.
//! - `error`: Error types.
//! - `utils`: Parsing boards from rows of color letters.

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod hints;
pub mod player;
pub mod session;
pub mod spellbook;
pub mod storage;
pub mod utils;
