//! Thin CLI host exercising the `projectlens` facade: list a directory,
//! assemble it into a context artifact, watch it for changes, or split a
//! unified diff. Grounded in the teacher's `cli.rs` (`clap::Parser`
//! derive struct) and `main.rs` (dispatch by flag), without carrying over
//! the teacher's TUI/recording/replay/sharing/statistics surface — those
//! were the teacher's product, not this one's.

use std::path::PathBuf;

use clap::Parser;
use projectlens::{AssemblerConfig, DiffSplitConfig, Event, ProjectLens};

#[derive(Parser, Debug)]
#[command(name = "projectlens")]
#[command(version)]
#[command(about = "Assemble a directory into an LLM-ready text artifact")]
struct Cli {
    /// Directory to open
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Write the assembled artifact here instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Maximum artifact size in bytes
    #[arg(long = "byte-cap", default_value_t = 10_000_000)]
    byte_cap: usize,

    /// Watch the directory and print a line for every change instead of
    /// assembling once
    #[arg(long = "watch")]
    watch: bool,

    /// Split a unified diff file into chunks instead of assembling
    #[arg(long = "split-diff")]
    split_diff: Option<PathBuf>,

    /// Approximate line limit per chunk, used with --split-diff
    #[arg(long = "line-limit", default_value_t = 800)]
    line_limit: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Some(diff_path) = &cli.split_diff {
        return run_split_diff(diff_path, cli.line_limit);
    }

    let settings_path = projectlens::settings::SettingsStore::default_path()?;
    let (lens, mut events) = ProjectLens::new(settings_path);
    lens.open_directory(&cli.path)?;

    if cli.path.is_dir() {
        lens.emit_auto_open_folder(cli.path.clone());
    }

    if cli.watch {
        lens.start_watcher()?;
        eprintln!("watching {} ...", cli.path.display());
        while let Some(event) = events.recv().await {
            match event {
                Event::FilesChanged(path) => println!("filesChanged: {}", path.display()),
                Event::AutoOpenFolder(path) => eprintln!("autoOpenFolder: {}", path.display()),
                _ => {}
            }
        }
        return Ok(());
    }

    lens.request_context_generation(AssemblerConfig { byte_cap: cli.byte_cap })?;

    loop {
        match events.recv().await {
            Some(Event::ContextGenerated(artifact)) => {
                match &cli.output {
                    Some(path) => std::fs::write(path, artifact)?,
                    None => print!("{artifact}"),
                }
                break;
            }
            Some(Event::ContextError(message)) => {
                anyhow::bail!("context generation failed: {message}");
            }
            Some(Event::ContextProgress(progress)) => {
                eprint!("\rassembling... {}/{}", progress.current, progress.total);
            }
            Some(Event::AutoOpenFolder(path)) => {
                eprintln!("autoOpenFolder: {}", path.display());
            }
            Some(_) => {}
            None => break,
        }
    }

    Ok(())
}

fn run_split_diff(path: &PathBuf, line_limit: i64) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)?;
    let splits = projectlens::diffsplit::split_diff(&text, DiffSplitConfig { approx_line_limit: line_limit });
    for (i, split) in splits.iter().enumerate() {
        println!("--- split {} of {} ---", i + 1, splits.len());
        println!("{split}");
    }
    Ok(())
}
