use clap::Parser;
use log::warn;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rune_cascade::config::GameConfig;
use rune_cascade::engine::RngColors;
use rune_cascade::hints::choose_swap_max_matched;
use rune_cascade::player::{ActionPlayer, BoardView};
use rune_cascade::session::GameSession;
use rune_cascade::spellbook::Spellbook;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Play seeded games with the hint strategy and report statistics", long_about = None)]
struct Args {
    /// Number of games to play
    #[clap(short, long, default_value_t = 20)]
    games: u64,

    /// Maximum number of swaps per game
    #[clap(short, long, default_value_t = 200)]
    moves: u32,

    /// Seed of the first game; game N uses SEED + N
    #[clap(short, long, default_value_t = 0)]
    seed: u64,

    /// Path to a TOML file with game settings
    #[clap(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct GameStats {
    swaps: u32,
    cascades: u32,
    longest_chain: u32,
    runes_destroyed: u32,
    levels_completed: u32,
    dead_boards: u32,
    replay_mismatches: u32,
}

fn play_game(seed: u64, max_moves: u32, config: &GameConfig) -> GameStats {
    let colors = RngColors::new(SmallRng::seed_from_u64(seed));
    let mut session = GameSession::new(colors, config.clone(), Spellbook::default());
    let mut stats = GameStats::default();

    while stats.swaps < max_moves {
        let Some((from, to)) = choose_swap_max_matched(session.board()) else {
            stats.dead_boards += 1;
            if stats.dead_boards > max_moves {
                break;
            }
            session.restart_level();
            continue;
        };

        let mut view = BoardView::from_board(session.board());
        let turn = match session.swap(from, to) {
            Ok(turn) => turn,
            Err(e) => {
                warn!("seed {}: swap {} <-> {} refused: {}", seed, from, to, e);
                break;
            }
        };
        ActionPlayer::apply_instant(&turn.result.actions, &mut view);
        if view != BoardView::from_board(&turn.result.final_grid) {
            stats.replay_mismatches += 1;
        }
        session.finish_playback();

        stats.swaps += 1;
        stats.cascades += turn.result.cascades;
        stats.longest_chain = stats.longest_chain.max(turn.result.cascades);
        stats.runes_destroyed += turn.result.matched_tiles();
        if turn.level_completed {
            stats.levels_completed += 1;
            session.advance_level();
        }
    }
    stats
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match GameConfig::load_or_default(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => GameConfig::default(),
    };
    // Levels run on a timer; autoplay ignores it and never ticks.

    println!("Starting autoplay for {} games of up to {} swaps...", args.games, args.moves);

    let mut totals = GameStats::default();
    for game_idx in 0..args.games {
        let seed = args.seed + game_idx;
        let stats = play_game(seed, args.moves, &config);
        println!(
            "  Game {:<4} (Seed: {:<6}) Swaps: {:<5} Cascades: {:<5} Longest chain: {:<3} Levels: {}",
            game_idx, seed, stats.swaps, stats.cascades, stats.longest_chain, stats.levels_completed
        );

        totals.swaps += stats.swaps;
        totals.cascades += stats.cascades;
        totals.longest_chain = totals.longest_chain.max(stats.longest_chain);
        totals.runes_destroyed += stats.runes_destroyed;
        totals.levels_completed += stats.levels_completed;
        totals.dead_boards += stats.dead_boards;
        totals.replay_mismatches += stats.replay_mismatches;
    }

    println!("\n--- Autoplay Complete ---");
    println!("Games played: {}", args.games);
    if totals.swaps == 0 {
        println!("No swaps were made.");
        return;
    }
    println!("Total swaps: {}", totals.swaps);
    println!("Average cascades per swap: {:.3}", totals.cascades as f64 / totals.swaps as f64);
    println!("Average runes per swap: {:.2}", totals.runes_destroyed as f64 / totals.swaps as f64);
    println!("Longest chain: {}", totals.longest_chain);
    println!("Levels completed: {}", totals.levels_completed);
    println!("Boards without moves: {}", totals.dead_boards);
    if totals.replay_mismatches > 0 {
        eprintln!("Warning: {} replay(s) did not end on the engine's board.", totals.replay_mismatches);
    }
}
