//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tasktree_core` linkage and storage bootstrap outside any UI.
//! - Print the stored task tree as an indented outline.
//!
//! Usage: `tasktree_cli [DB_PATH [LOG_DIR]]`. Without a path an in-memory
//! database is used and seeded with a small sample tree. Logs go to
//! `LOG_DIR`, or to `logs/` next to `DB_PATH`; the in-memory run only logs
//! when `LOG_DIR` is given.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tasktree_core::db::{open_db, open_db_in_memory};
use tasktree_core::{
    default_log_level, init_logging, CollapseState, SqliteSnapshotRepository, TodoStore,
};

fn main() -> ExitCode {
    println!("tasktree_core ping={}", tasktree_core::ping());
    println!("tasktree_core version={}", tasktree_core::core_version());

    let mut args = std::env::args().skip(1);
    let db_path = args.next();
    let log_dir = args.next();

    match run(db_path, log_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: Option<String>, log_dir: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = resolve_log_dir(db_path.as_deref(), log_dir.as_deref()) {
        let dir = std::path::absolute(dir)?;
        init_logging(default_log_level(), &dir.to_string_lossy())?;
        println!("tasktree_core log_dir={}", dir.display());
    }

    let conn = match db_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let repo = SqliteSnapshotRepository::try_new(&conn)?;
    let mut store = TodoStore::open(repo)?;

    if db_path.is_none() {
        let groceries = store.create("Buy milk", None)?;
        store.create("2% milk", Some(groceries.id))?;
        store.create("Walk the dog", None)?;
    }

    if !store.load_report().is_clean() {
        println!("integrity issues={}", store.load_report().issues.len());
    }
    if store.is_empty() {
        println!("No todos");
        return Ok(());
    }

    for row in store.visible_rows(&CollapseState::new()) {
        let Some(task) = store.get(row.task_id) else {
            continue;
        };
        let mark = if task.completed { "x" } else { " " };
        println!("{}[{mark}] {}", "  ".repeat(row.depth), task.title);
    }
    Ok(())
}

/// Explicit `LOG_DIR` wins; otherwise `logs/` beside the database file.
fn resolve_log_dir(db_path: Option<&str>, log_dir: Option<&str>) -> Option<PathBuf> {
    if let Some(dir) = log_dir.filter(|dir| !dir.trim().is_empty()) {
        return Some(PathBuf::from(dir));
    }
    let db_path = Path::new(db_path?);
    let parent = db_path.parent().unwrap_or_else(|| Path::new(""));
    Some(parent.join("logs"))
}
