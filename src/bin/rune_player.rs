use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rune_cascade::config::GameConfig;
use rune_cascade::engine::{RngColors, GRID_COUNT};
use rune_cascade::hints::{choose_swap_max_matched, has_moves};
use rune_cascade::session::{GameSession, SpellEffect, SpellTarget, Turn};
use rune_cascade::spellbook::{SpellId, Spellbook};
use rune_cascade::storage::JsonFileStore;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Play Rune Cascade in the terminal", long_about = None)]
struct Args {
    /// Seed for tile colors; random if omitted
    #[clap(short, long)]
    seed: Option<u64>,

    /// Path to a TOML file with game settings
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// JSON file used to resume and save the session
    #[clap(long)]
    save: Option<PathBuf>,
}

type Session = GameSession<RngColors<SmallRng>>;

fn open_session(args: &Args) -> Result<(Session, Option<JsonFileStore>), String> {
    let config = match &args.config {
        Some(path) => GameConfig::load_or_default(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => GameConfig::default(),
    };
    let rng = match args.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let colors = RngColors::new(rng);

    match &args.save {
        Some(path) => {
            let store = JsonFileStore::new(path);
            let session = GameSession::load_from(&store, colors, config)
                .map_err(|e| format!("Failed to load save file: {}", e))?;
            Ok((session, Some(store)))
        }
        None => Ok((GameSession::new(colors, config, Spellbook::default()), None)),
    }
}

fn parse_spell(name: &str) -> Option<SpellId> {
    match name {
        "1" | "freeze" | "hourglass" => Some(SpellId::FreezeTime),
        "2" | "fire" | "chant" => Some(SpellId::FireEgg),
        "3" | "storm" | "surge" => Some(SpellId::Teleport),
        _ => None,
    }
}

fn print_status(session: &Session) {
    let progress = session.progress();
    println!("---------------------");
    println!(
        "Level {}, Energy: {:.0}%, Time left: {}s{}",
        progress.current_level,
        progress.energy_progress * 100.0,
        progress.time_remaining_seconds,
        if progress.is_time_frozen() {
            format!(" (frozen {}s)", progress.freeze_seconds_left)
        } else {
            String::new()
        }
    );
    for (slot, state) in session.spell_states().iter().enumerate() {
        let status = if !state.is_unlocked {
            format!("locked, {} awakening(s) to go", state.remaining_awakenings)
        } else if state.is_active {
            "READY".to_string()
        } else {
            format!("{:.0}% charged", state.energy_progress * 100.0)
        };
        println!(
            "  {}. {} ({}): {}",
            slot + 1,
            state.definition.title,
            state.definition.color.name(),
            status
        );
    }
    println!("{}", session.board());
}

fn print_turn_summary(session: &mut Session, turn: Turn) {
    for action in &turn.result.actions {
        println!("  {}", action);
    }
    if turn.result.cascades > 0 {
        println!(
            "{} cascade(s), {} rune(s) destroyed.",
            turn.result.cascades,
            turn.result.matched_tiles()
        );
    }
    session.finish_playback();
    if turn.level_completed {
        let progress = session.progress();
        println!("");
        println!("🎉 LEVEL {} COMPLETE! 🎉", progress.current_level);
        println!("Experience: {}", progress.experience_earned);
        println!("Bonus energy: {}", progress.bonus_energy);
        println!("Enter 'n' for the next level.");
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let (mut session, mut store) = match open_session(&args) {
        Ok(opened) => opened,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    println!("Welcome to Rune Cascade!");

    let mut clock = Instant::now();
    loop {
        let elapsed = clock.elapsed().as_secs() as u32;
        if elapsed > 0 {
            clock = Instant::now();
            if session.tick(elapsed) {
                println!("⌛ Time is up! Enter 'r' to retry the level.");
            }
        }

        print_status(&session);
        if !has_moves(session.board()) {
            println!("No swap lines up a run. Cast a spell or enter 'r' to reshuffle the level.");
        }
        if let Some(target) = session.progress().pending_spell_target {
            match target {
                SpellTarget::Row => println!("Pick a cell: its whole row will burn (t INDEX)."),
                SpellTarget::Color => println!("Pick a cell: every rune of its color vanishes (t INDEX)."),
            }
        }

        print!("Enter 's FROM TO', 'c SPELL', 't INDEX', 'h' hint, 'n' next, 'r' restart, or 'q' to quit: ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Error reading input. Please try again.");
            continue;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        match parts.as_slice() {
            ["q"] => {
                println!("Thanks for playing!");
                break;
            }
            ["h"] => match choose_swap_max_matched(session.board()) {
                Some((a, b)) => println!("Hint: try 's {} {}'.", a, b),
                None => println!("No matching swap available."),
            },
            ["n"] => {
                if session.progress().is_level_complete {
                    session.advance_level();
                } else {
                    println!("Finish the level first.");
                }
            }
            ["r"] => session.restart_level(),
            ["s", from, to] => match (from.parse::<usize>(), to.parse::<usize>()) {
                (Ok(from), Ok(to)) => match session.swap(from, to) {
                    Ok(turn) => print_turn_summary(&mut session, turn),
                    Err(e) => println!("Cannot swap: {}", e),
                },
                _ => println!("Invalid input: cells are numbers between 0 and {}.", GRID_COUNT - 1),
            },
            ["c", spell] => match parse_spell(spell) {
                Some(id) => match session.cast_spell(id) {
                    Ok(SpellEffect::TimeFrozen { seconds }) => println!("Time stands still for {}s.", seconds),
                    Ok(SpellEffect::AwaitingTarget(_)) => println!("{} is ready.", id.definition().title),
                    Err(e) => println!("Cannot cast: {}", e),
                },
                None => println!("Unknown spell '{}'. Use 1, 2 or 3.", spell),
            },
            ["t", index] => match index.parse::<usize>() {
                Ok(index) => match session.select_spell_target(index) {
                    Ok(turn) => print_turn_summary(&mut session, turn),
                    Err(e) => println!("Cannot target: {}", e),
                },
                Err(_) => println!("Invalid input: cells are numbers between 0 and {}.", GRID_COUNT - 1),
            },
            _ => println!("Invalid input format."),
        }

        if let Some(store) = store.as_mut() {
            if let Err(e) = session.save_to(store) {
                eprintln!("Failed to save session: {}", e);
            }
        }
    }
}
