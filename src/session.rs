//! A single player's run: the current board, level progress, the timer and the
//! spellbook, driven one intent at a time.
//!
//! The session hands every engine result back to the caller for playback and
//! stays busy until `finish_playback` is called, so at most one move is in
//! flight per board.
use log::{debug, info};
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::action::MoveResult;
use crate::config::GameConfig;
use crate::engine::{row_col, Board, ColorSource, Engine, RngColors, RuneColor, GRID_COUNT};
use crate::error::{SessionError, StorageError};
use crate::spellbook::{SpellId, SpellState, Spellbook};
use crate::storage::{load_json, save_json, SessionStore, SESSION_KEY, SPELLBOOK_KEY};

/// Tiles destroyed of one color during the level and the energy they earned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorStats {
    pub count: u32,
    pub energy: f32,
}

/// What a targeted spell is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellTarget {
    /// Any cell; its whole row is destroyed.
    Row,
    /// Any cell; every tile of its color is destroyed.
    Color,
}

/// Progress within the current level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameProgress {
    pub current_level: u32,
    /// Level completion, `0.0..=1.0`.
    pub energy_progress: f32,
    pub experience_earned: u32,
    pub bonus_energy: u32,
    pub color_stats: BTreeMap<RuneColor, ColorStats>,
    pub time_remaining_seconds: u32,
    pub is_time_up: bool,
    pub is_level_complete: bool,
    pub is_paused: bool,
    pub pending_spell_target: Option<SpellTarget>,
    pub freeze_seconds_left: u32,
    pub is_busy: bool,
}

impl GameProgress {
    fn fresh(level: u32, config: &GameConfig) -> Self {
        GameProgress {
            current_level: level,
            energy_progress: 0.0,
            experience_earned: 0,
            bonus_energy: 0,
            color_stats: BTreeMap::new(),
            time_remaining_seconds: config.level_time_seconds,
            is_time_up: false,
            is_level_complete: false,
            is_paused: false,
            pending_spell_target: None,
            freeze_seconds_left: 0,
            is_busy: false,
        }
    }

    pub fn is_time_frozen(&self) -> bool {
        self.freeze_seconds_left > 0
    }
}

/// Outcome of a swap or a targeted spell.
#[derive(Clone, Debug, PartialEq)]
pub struct Turn {
    /// What the engine did; play `result.actions` before `finish_playback`.
    pub result: MoveResult,
    /// Spell energy credited per color.
    pub energy_gains: BTreeMap<RuneColor, f32>,
    /// `true` if this turn completed the level.
    pub level_completed: bool,
}

/// Immediate effect of casting a spell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpellEffect {
    TimeFrozen { seconds: u32 },
    AwaitingTarget(SpellTarget),
}

/// Everything needed to resume a level later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub board: Board,
    pub progress: GameProgress,
    pub has_reset_spellbook_for_run: bool,
}

pub struct GameSession<C = RngColors<SmallRng>> {
    engine: Engine<C>,
    board: Board,
    config: GameConfig,
    spellbook: Spellbook,
    progress: GameProgress,
    has_reset_spellbook_for_run: bool,
}

impl<C: ColorSource> GameSession<C> {
    /// Starts a new run at level 1. The spellbook is reset, as every run
    /// begins without awakenings or energy.
    pub fn new(colors: C, config: GameConfig, mut spellbook: Spellbook) -> Self {
        let mut engine = Engine::with_source(colors);
        spellbook.reset();
        let board = engine.generate_start_grid();
        info!("new run started");
        GameSession {
            engine,
            board,
            progress: GameProgress::fresh(1, &config),
            config,
            spellbook,
            has_reset_spellbook_for_run: true,
        }
    }

    /// Starts a level on `board`, keeping `spellbook` as given.
    pub fn with_board(colors: C, board: Board, config: GameConfig, spellbook: Spellbook) -> Self {
        GameSession {
            engine: Engine::with_source(colors).resume_after(&board),
            progress: GameProgress::fresh(1, &config),
            board,
            config,
            spellbook,
            has_reset_spellbook_for_run: true,
        }
    }

    /// Resumes a saved level.
    ///
    /// Transient state is dropped: the session is not busy, no spell target
    /// is pending and the timer is not frozen.
    pub fn restore(snapshot: SessionSnapshot, colors: C, config: GameConfig, spellbook: Spellbook) -> Self {
        let SessionSnapshot {
            board,
            mut progress,
            has_reset_spellbook_for_run,
        } = snapshot;
        progress.is_busy = false;
        progress.pending_spell_target = None;
        progress.freeze_seconds_left = 0;
        GameSession {
            engine: Engine::with_source(colors).resume_after(&board),
            board,
            config,
            spellbook,
            progress,
            has_reset_spellbook_for_run,
        }
    }

    /// Restores the saved session from `store`, or starts a new run if none
    /// is stored.
    pub fn load_from<S>(store: &S, colors: C, config: GameConfig) -> Result<Self, StorageError>
    where
        S: SessionStore + ?Sized,
    {
        let spellbook: Spellbook = load_json(store, SPELLBOOK_KEY)?.unwrap_or_default();
        Ok(match load_json::<_, SessionSnapshot>(store, SESSION_KEY)? {
            Some(snapshot) => {
                info!("resuming level {}", snapshot.progress.current_level);
                Self::restore(snapshot, colors, config, spellbook)
            }
            None => Self::new(colors, config, spellbook),
        })
    }

    /// Writes the session and the spellbook to `store`.
    pub fn save_to<S>(&self, store: &mut S) -> Result<(), StorageError>
    where
        S: SessionStore + ?Sized,
    {
        save_json(store, SESSION_KEY, &self.snapshot())?;
        save_json(store, SPELLBOOK_KEY, &self.spellbook)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            board: self.board.clone(),
            progress: self.progress.clone(),
            has_reset_spellbook_for_run: self.has_reset_spellbook_for_run,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn progress(&self) -> &GameProgress {
        &self.progress
    }

    pub fn spellbook(&self) -> &Spellbook {
        &self.spellbook
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn spell_states(&self) -> Vec<SpellState> {
        SpellId::ALL.iter().map(|&id| self.spellbook.spell_state(id)).collect()
    }

    /// Swaps two tiles and scores the resulting cascades.
    pub fn swap(&mut self, from: usize, to: usize) -> Result<Turn, SessionError> {
        self.ensure_playable()?;
        if self.progress.pending_spell_target.is_some() {
            return Err(SessionError::SpellTargetPending);
        }
        for index in [from, to] {
            if index >= GRID_COUNT {
                return Err(SessionError::IndexOutOfRange(index));
            }
        }

        let result = self.engine.process_move(from, to, &self.board);
        Ok(self.finish_turn(result, None))
    }

    /// Marks the last turn's playback as done, allowing the next intent.
    pub fn finish_playback(&mut self) {
        self.progress.is_busy = false;
    }

    /// Casts `id`, paying its energy.
    ///
    /// Frozen Hourglass takes effect at once. The other spells wait for
    /// `select_spell_target`, and are refused while a move is still playing.
    pub fn cast_spell(&mut self, id: SpellId) -> Result<SpellEffect, SessionError> {
        if self.progress.pending_spell_target.is_some() {
            return Err(SessionError::SpellTargetPending);
        }
        if self.progress.is_time_up {
            return Err(SessionError::TimeUp);
        }
        if self.progress.is_level_complete {
            return Err(SessionError::LevelComplete);
        }
        if id != SpellId::FreezeTime && self.progress.is_busy {
            return Err(SessionError::Busy);
        }

        let definition = self.spellbook.try_cast(id)?;
        debug!("cast {}", definition.title);
        let effect = match id {
            SpellId::FreezeTime => {
                self.progress.freeze_seconds_left = self.config.freeze_duration_seconds;
                SpellEffect::TimeFrozen {
                    seconds: self.config.freeze_duration_seconds,
                }
            }
            SpellId::FireEgg => SpellEffect::AwaitingTarget(SpellTarget::Row),
            SpellId::Teleport => SpellEffect::AwaitingTarget(SpellTarget::Color),
        };
        if let SpellEffect::AwaitingTarget(target) = effect {
            self.progress.pending_spell_target = Some(target);
        }
        Ok(effect)
    }

    /// Resolves the pending spell on the cell at `index`.
    ///
    /// The forced removal counts as one extra cascade for scoring.
    pub fn select_spell_target(&mut self, index: usize) -> Result<Turn, SessionError> {
        let target = self
            .progress
            .pending_spell_target
            .ok_or(SessionError::NoSpellTarget)?;
        self.ensure_playable()?;
        if index >= GRID_COUNT {
            return Err(SessionError::IndexOutOfRange(index));
        }

        let indices: BTreeSet<usize> = match target {
            SpellTarget::Row => Board::row_indices(row_col(index).0),
            SpellTarget::Color => self.board.indices_of_color(self.board.color_at(index)),
        };
        self.progress.pending_spell_target = None;

        let result = self.engine.apply_spell_removal(&self.board, &indices);
        let scored_cascades = (result.cascades + 1).max(1);
        Ok(self.finish_turn(result, Some(scored_cascades)))
    }

    /// Advances the level timer by `seconds`. Frozen seconds are used up
    /// first. Returns `true` if time ran out during this call.
    pub fn tick(&mut self, seconds: u32) -> bool {
        let progress = &mut self.progress;
        if progress.is_time_up || progress.is_level_complete || progress.is_paused {
            return false;
        }
        let frozen = seconds.min(progress.freeze_seconds_left);
        progress.freeze_seconds_left -= frozen;
        progress.time_remaining_seconds = progress.time_remaining_seconds.saturating_sub(seconds - frozen);
        if progress.time_remaining_seconds == 0 {
            progress.is_time_up = true;
            info!("time is up on level {}", progress.current_level);
            return true;
        }
        false
    }

    /// Stops or restarts the timer, e.g. while a menu is open.
    pub fn set_paused(&mut self, paused: bool) {
        self.progress.is_paused = paused;
    }

    /// Moves on to the next level and records an awakening.
    pub fn advance_level(&mut self) {
        self.progress.current_level += 1;
        self.spellbook.increment_awakenings();
        self.start_level();
    }

    /// Starts the current level over on a fresh board.
    pub fn restart_level(&mut self) {
        self.start_level();
    }

    fn start_level(&mut self) {
        let level = self.progress.current_level;
        if level == 1 && !self.has_reset_spellbook_for_run {
            self.spellbook.reset();
            self.has_reset_spellbook_for_run = true;
        }
        self.board = self.engine.generate_start_grid();
        self.progress = GameProgress::fresh(level, &self.config);
        info!("level {} started", level);
    }

    fn ensure_playable(&self) -> Result<(), SessionError> {
        if self.progress.is_busy {
            Err(SessionError::Busy)
        } else if self.progress.is_time_up {
            Err(SessionError::TimeUp)
        } else if self.progress.is_level_complete {
            Err(SessionError::LevelComplete)
        } else {
            Ok(())
        }
    }

    // Stores the new board and scores the turn. `scored_cascades` overrides
    // the engine's cascade count.
    fn finish_turn(&mut self, result: MoveResult, scored_cascades: Option<u32>) -> Turn {
        self.board = result.final_grid.clone();
        self.progress.is_busy = true;
        let cascades = scored_cascades.unwrap_or(result.cascades);
        let (energy_gains, level_completed) = self.score(cascades, &result.color_stats);
        Turn {
            result,
            energy_gains,
            level_completed,
        }
    }

    fn score(&mut self, cascades: u32, matches: &BTreeMap<RuneColor, u32>) -> (BTreeMap<RuneColor, f32>, bool) {
        let energy_from_move = cascades as f32 * self.config.energy_per_cascade;
        let total_matched: u32 = matches.values().sum();

        let mut gains = BTreeMap::new();
        for (&color, &count) in matches {
            let share = if total_matched > 0 {
                count as f32 / total_matched as f32 * energy_from_move
            } else {
                0.0
            };
            let stats = self.progress.color_stats.entry(color).or_default();
            stats.count += count;
            stats.energy += share;
            if share > 0.0 {
                gains.insert(color, share);
            }
        }
        if !gains.is_empty() {
            self.spellbook.add_energy(&gains);
        }

        let progress = &mut self.progress;
        let new_energy = (progress.energy_progress + energy_from_move).min(1.0);
        let just_completed = !progress.is_level_complete && new_energy >= 1.0;
        if just_completed {
            progress.bonus_energy = (cascades * self.config.bonus_energy_per_cascade + 5).max(10);
            progress.experience_earned = self.config.base_experience
                + (progress.current_level - 1) * self.config.experience_per_level
                + cascades * 10;
            progress.freeze_seconds_left = 0;
            info!(
                "level {} complete: {} xp, {} bonus energy",
                progress.current_level, progress.experience_earned, progress.bonus_energy
            );
        }
        progress.energy_progress = new_energy;
        progress.is_level_complete |= just_completed;

        if cascades > 0 {
            debug!(
                "cascades {}, energy from move {:.3}, level energy {:.3}",
                cascades, energy_from_move, progress.energy_progress
            );
            for (color, stats) in &progress.color_stats {
                debug!("  {}: {} tiles, {:.3} energy", color.name(), stats.count, stats.energy);
            }
        }
        (gains, just_completed)
    }
}
