//! Visual actions emitted by the engine and the result of a single engine call.
//!
//! An action list is a script: replaying it in order against the starting board
//! reproduces every intermediate layout and ends on `MoveResult::final_grid`.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::engine::{Board, RuneColor, RuneTile};

/// A freshly created tile placed into an empty cell during a refill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillRune {
    pub index: usize,
    pub tile: RuneTile,
}

/// One atomic visual event.
///
/// Indices always refer to the layout produced by committing every earlier
/// action of the same list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Two adjacent tiles trade places.
    Swap { from: usize, to: usize },
    /// The tile at `index` wobbles to show a rejected move.
    BounceBack { index: usize },
    /// The tiles at `indices` (ascending) are destroyed.
    Match { indices: Vec<usize> },
    /// The tiles at `indices` (ascending) drop `distance` rows.
    Fall { indices: Vec<usize>, distance: usize },
    /// New tiles appear in the listed empty cells.
    Refill { tiles: Vec<RefillRune> },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Swap { from, to } => write!(f, "swap {} <-> {}", from, to),
            Action::BounceBack { index } => write!(f, "bounce {}", index),
            Action::Match { indices } => write!(f, "match {:?}", indices),
            Action::Fall { indices, distance } => write!(f, "fall {:?} by {}", indices, distance),
            Action::Refill { tiles } => {
                write!(f, "refill")?;
                for rune in tiles {
                    write!(f, " {}:{}#{}", rune.index, rune.tile.color.to_char(), rune.tile.id)?;
                }
                Ok(())
            }
        }
    }
}

/// Everything a single engine call produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveResult {
    /// Actions in emission order.
    pub actions: Vec<Action>,
    /// Number of resolution rounds that found at least one match.
    pub cascades: u32,
    /// The settled board.
    pub final_grid: Board,
    /// Destroyed tiles per color, accumulated over the whole call.
    pub color_stats: BTreeMap<RuneColor, u32>,
}

impl MoveResult {
    /// A result that leaves `grid` untouched.
    pub fn unchanged(grid: &Board, actions: Vec<Action>) -> Self {
        MoveResult {
            actions,
            cascades: 0,
            final_grid: grid.clone(),
            color_stats: BTreeMap::new(),
        }
    }

    /// Total number of tiles destroyed, summed over all colors.
    pub fn matched_tiles(&self) -> u32 {
        self.color_stats.values().sum()
    }

    /// Iterates over the tiles introduced by `Refill` actions.
    pub fn refilled_tiles(&self) -> impl Iterator<Item = &RuneTile> {
        self.actions.iter().flat_map(|action| match action {
            Action::Refill { tiles } => tiles.iter().map(|rune| &rune.tile).collect::<Vec<_>>(),
            _ => Vec::new(),
        })
    }
}
