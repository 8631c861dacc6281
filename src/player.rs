//! Replays engine actions against a view model of the board.
//!
//! The player is strictly sequential: each action animates over a short, fixed
//! duration and is then committed (positions reassigned, cells cleared or
//! filled) before the next one starts, since later indices assume the layout
//! left by earlier commits. The player only computes frames; pacing them in
//! real time is the caller's business.
use std::f32::consts::PI;

use crate::action::Action;
use crate::engine::{row_col, Board, RuneColor, RuneTile, GRID_COUNT, GRID_SIZE};

pub const SWAP_DURATION_MS: u32 = 200;
pub const BOUNCE_DURATION_MS: u32 = 100;
pub const MATCH_DURATION_MS: u32 = 160;
pub const FALL_DURATION_MS: u32 = 250;
pub const REFILL_DURATION_MS: u32 = 260;

/// Frames produced per action by `ActionPlayer::default()`.
pub const DEFAULT_FRAMES_PER_ACTION: u32 = 30;

/// Visual state of one rune. Offsets are in cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuneView {
    pub id: u64,
    pub color: RuneColor,
    pub row: usize,
    pub col: usize,
    pub x_offset: f32,
    pub y_offset: f32,
    pub scale: f32,
    pub alpha: f32,
}

impl RuneView {
    /// A rune at rest in cell `index`.
    pub fn at_rest(tile: RuneTile, index: usize) -> Self {
        let (row, col) = row_col(index);
        RuneView {
            id: tile.id,
            color: tile.color,
            row,
            col,
            x_offset: 0.0,
            y_offset: 0.0,
            scale: 1.0,
            alpha: 1.0,
        }
    }

    fn moved_to(self, index: usize) -> Self {
        let (row, col) = row_col(index);
        RuneView { row, col, ..self }
    }

    fn settled(self) -> Self {
        RuneView {
            x_offset: 0.0,
            y_offset: 0.0,
            scale: 1.0,
            alpha: 1.0,
            ..self
        }
    }
}

/// What a renderer draws: one optional rune per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardView {
    runes: [Option<RuneView>; GRID_COUNT],
}

impl BoardView {
    pub fn from_board(board: &Board) -> Self {
        let mut runes = [None; GRID_COUNT];
        for (index, tile) in board.tiles().iter().enumerate() {
            runes[index] = Some(RuneView::at_rest(*tile, index));
        }
        BoardView { runes }
    }

    pub fn get(&self, index: usize) -> Option<&RuneView> {
        self.runes[index].as_ref()
    }

    pub fn runes(&self) -> &[Option<RuneView>; GRID_COUNT] {
        &self.runes
    }

    fn update(&mut self, indices: &[usize], f: impl Fn(usize, RuneView) -> RuneView) {
        for &index in indices {
            if let Some(rune) = self.runes[index] {
                self.runes[index] = Some(f(index, rune));
            }
        }
    }

    fn reset_offsets(&mut self, indices: &[usize]) {
        self.update(indices, |_, rune| rune.settled());
    }
}

/// Returned by a frame callback to keep going or to cancel playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Playback {
    Continue,
    Stop,
}

/// Position of a frame within the playback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    /// Index of the action being animated.
    pub action_index: usize,
    /// Milliseconds since the action started.
    pub elapsed_ms: u32,
    /// Animation progress of the action, `0.0..=1.0`.
    pub progress: f32,
}

/// How a playback ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Number of actions whose logical change was committed.
    pub committed: usize,
    /// `true` if the frame callback cancelled playback.
    pub stopped: bool,
}

/// Animates action lists frame by frame.
#[derive(Clone, Copy, Debug)]
pub struct ActionPlayer {
    frames_per_action: u32,
}

impl Default for ActionPlayer {
    fn default() -> Self {
        ActionPlayer::new(DEFAULT_FRAMES_PER_ACTION)
    }
}

impl ActionPlayer {
    pub fn new(frames_per_action: u32) -> Self {
        ActionPlayer { frames_per_action }
    }

    /// Animation length of `action` in milliseconds.
    pub fn duration_ms(action: &Action) -> u32 {
        match action {
            Action::Swap { .. } => SWAP_DURATION_MS,
            Action::BounceBack { .. } => BOUNCE_DURATION_MS,
            Action::Match { .. } => MATCH_DURATION_MS,
            Action::Fall { .. } => FALL_DURATION_MS,
            Action::Refill { .. } => REFILL_DURATION_MS,
        }
    }

    /// Plays `actions` in order against `view`, calling `on_frame` after every
    /// animation step.
    ///
    /// When `on_frame` returns `Playback::Stop` the current action is rolled
    /// back to its committed state and nothing after it is applied, so `view`
    /// always reflects a prefix of the action list.
    pub fn play<F>(&self, actions: &[Action], view: &mut BoardView, mut on_frame: F) -> PlaybackReport
    where
        F: FnMut(&Frame, &BoardView) -> Playback,
    {
        for (action_index, action) in actions.iter().enumerate() {
            let duration = Self::duration_ms(action);
            if let Action::Refill { tiles } = action {
                for rune in tiles {
                    view.runes[rune.index] = Some(RuneView {
                        y_offset: -1.0,
                        alpha: 0.0,
                        ..RuneView::at_rest(rune.tile, rune.index)
                    });
                }
            }

            let steps = self.frames_per_action;
            for step in 0..=steps {
                let progress = if steps == 0 { 1.0 } else { step as f32 / steps as f32 };
                animate(action, view, progress);
                let frame = Frame {
                    action_index,
                    elapsed_ms: (duration as f32 * progress).round() as u32,
                    progress,
                };
                if on_frame(&frame, view) == Playback::Stop {
                    rollback(action, view);
                    return PlaybackReport {
                        committed: action_index,
                        stopped: true,
                    };
                }
            }
            let previous = action_index.checked_sub(1).map(|i| &actions[i]);
            commit(action, previous, view);
        }
        PlaybackReport {
            committed: actions.len(),
            stopped: false,
        }
    }

    /// Commits every action without producing frames.
    pub fn apply_instant(actions: &[Action], view: &mut BoardView) {
        let mut previous = None;
        for action in actions {
            if let Action::Refill { tiles } = action {
                for rune in tiles {
                    view.runes[rune.index] = Some(RuneView::at_rest(rune.tile, rune.index));
                }
            }
            commit(action, previous, view);
            previous = Some(action);
        }
    }
}

fn animate(action: &Action, view: &mut BoardView, progress: f32) {
    match action {
        Action::Swap { from, to } => {
            let (from_row, from_col) = row_col(*from);
            let (to_row, to_col) = row_col(*to);
            let dx = to_col as f32 - from_col as f32;
            let dy = to_row as f32 - from_row as f32;
            let from = *from;
            view.update(&[from, *to], |index, rune| {
                let sign = if index == from { 1.0 } else { -1.0 };
                RuneView {
                    x_offset: sign * dx * progress,
                    y_offset: sign * dy * progress,
                    ..rune
                }
            });
        }
        Action::BounceBack { index } => {
            let offset = -0.15 * (progress * PI).sin();
            view.update(&[*index], |_, rune| RuneView {
                y_offset: offset,
                ..rune
            });
        }
        Action::Match { indices } => {
            view.update(indices, |_, rune| RuneView {
                alpha: 1.0 - progress,
                scale: 1.0 + 0.3 * (1.0 - progress),
                ..rune
            });
        }
        Action::Fall { indices, distance } => {
            let eased = ease_out_bounce(progress);
            let distance = *distance as f32;
            view.update(indices, |_, rune| RuneView {
                y_offset: distance * eased,
                ..rune
            });
        }
        Action::Refill { tiles } => {
            let indices: Vec<usize> = tiles.iter().map(|rune| rune.index).collect();
            view.update(&indices, |_, rune| RuneView {
                y_offset: -(1.0 - progress),
                alpha: progress,
                ..rune
            });
        }
    }
}

fn swap_runes(view: &mut BoardView, a: usize, b: usize) {
    let a_rune = view.runes[a].map(|r| r.moved_to(b));
    let b_rune = view.runes[b].map(|r| r.moved_to(a));
    view.runes[a] = b_rune;
    view.runes[b] = a_rune;
    view.reset_offsets(&[a, b]);
}

// Applies the logical change of `action` and clears its visual offsets.
// A bounce right after a swap from the same cell reverts that swap.
fn commit(action: &Action, previous: Option<&Action>, view: &mut BoardView) {
    match action {
        Action::Swap { from, to } => swap_runes(view, *from, *to),
        Action::BounceBack { index } => match previous {
            Some(Action::Swap { from, to }) if from == index => swap_runes(view, *from, *to),
            _ => view.reset_offsets(&[*index]),
        },
        Action::Match { indices } => {
            for &index in indices {
                view.runes[index] = None;
            }
        }
        Action::Fall { indices, distance } => {
            // Bottom-most first so no rune lands on one that has not moved yet.
            for &index in indices.iter().rev() {
                if let Some(rune) = view.runes[index].take() {
                    let target = index + GRID_SIZE * distance;
                    view.runes[target] = Some(rune.moved_to(target).settled());
                }
            }
        }
        Action::Refill { tiles } => {
            let indices: Vec<usize> = tiles.iter().map(|rune| rune.index).collect();
            view.reset_offsets(&indices);
        }
    }
}

// Undoes the visual part of an interrupted action.
fn rollback(action: &Action, view: &mut BoardView) {
    match action {
        Action::Swap { from, to } => view.reset_offsets(&[*from, *to]),
        Action::BounceBack { index } => view.reset_offsets(&[*index]),
        Action::Match { indices } | Action::Fall { indices, .. } => view.reset_offsets(indices),
        Action::Refill { tiles } => {
            for rune in tiles {
                view.runes[rune.index] = None;
            }
        }
    }
}

fn ease_out_bounce(x: f32) -> f32 {
    let n1 = 7.5625;
    let d1 = 2.75;
    if x < 1.0 / d1 {
        n1 * x * x
    } else if x < 2.0 / d1 {
        let t = x - 1.5 / d1;
        n1 * t * t + 0.75
    } else if x < 2.5 / d1 {
        let t = x - 2.25 / d1;
        n1 * t * t + 0.9375
    } else {
        let t = x - 2.625 / d1;
        n1 * t * t + 0.984375
    }
}
