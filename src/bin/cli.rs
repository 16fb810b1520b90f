#![cfg(not(tarpaulin_include))]

use rusty_calculator::calculator::{Action, CalculatorState};
use rusty_calculator::config::AppConfig;
use rusty_calculator::history::{
    FileHistoryStore, HistoryRecorder, HistoryStore, MemoryHistoryStore,
};
use rusty_calculator::login::is_valid_username;
use rusty_calculator::number::format_number;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

fn print_help() {
    println!("Keys:");
    println!("  0-9 .      Enter a number");
    println!("  + - * /    Operators");
    println!("  =          Evaluate");
    println!("  C          Clear");
    println!("Several keys may go on one line, e.g. 12+3=");
    println!("Commands:");
    println!("  history    Show recent calculations");
    println!("  help       Show this message");
    println!("  q          Quit");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let mut database = AppConfig::from_env().database_dir;
    let mut user: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--database" if i + 1 < args.len() => {
                database = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "--user" if i + 1 < args.len() => {
                user = Some(args[i + 1].clone());
                i += 2;
            }
            _ => {
                eprintln!("Usage: {} [--database <dir>] [--user <name>]", args[0]);
                return Ok(());
            }
        }
    }

    let store: Arc<dyn HistoryStore> = match &user {
        Some(name) if is_valid_username(name) => {
            Arc::new(FileHistoryStore::for_user(&database, name))
        }
        Some(name) => {
            eprintln!("Error: invalid user name {:?}", name);
            return Ok(());
        }
        None => Arc::new(MemoryHistoryStore::new()),
    };
    let recorder = HistoryRecorder::new(store);
    recorder.refresh().await?;

    let mut state = CalculatorState::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("[{}] > ", state.display());
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let command = line.trim();

        match command {
            "" => continue,
            "q" => break,
            "help" => {
                print_help();
                continue;
            }
            "history" => {
                for entry in recorder.recent().await {
                    println!(
                        "  {} = {}    ({})",
                        entry.expression,
                        format_number(entry.result),
                        entry.timestamp
                    );
                }
                continue;
            }
            _ => {}
        }

        let mut pending = Vec::new();
        for c in command.chars().filter(|c| !c.is_whitespace()) {
            let key = c.to_string();
            let Some(action) = Action::from_key(&key) else {
                println!("ignored key {:?}", c);
                continue;
            };
            let transition = state.reduce(action);
            state = transition.state;
            if let Some(calculation) = transition.calculation {
                pending.push(recorder.record(&calculation));
            }
        }

        // The REPL waits so `history` right after `=` shows the new entry
        for handle in pending {
            handle.await?;
        }
    }

    Ok(())
}
