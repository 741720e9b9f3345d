//! keyshift
//!
//! Runs the keyboard remapping hook and checks remap configs.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use keyshift_core::config::DISABLED_TARGET;
use keyshift_core::tables::{ChordTable, KeyTarget, RemapTables};
use keyshift_core::RemapConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keyshift")]
#[command(about = "System-wide key and shortcut remapper")]
#[command(version)]
struct Cli {
    /// Log filter (overrides RUST_LOG), e.g. `debug` or `keyshift_core=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a config file and print the resulting tables
    Check { config: PathBuf },

    /// Print the built-in sample config as JSON
    Sample,

    /// Install the keyboard hook and remap until the process exits
    Run { config: PathBuf },

    /// Capture a shortcut from the keyboard
    Record {
        /// Seconds without a new key press before the capture ends
        #[arg(short, long, default_value_t = 3)]
        idle_secs: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Check { config } => cmd_check(&config),
        Commands::Sample => cmd_sample(),
        Commands::Run { config } => cmd_run(&config),
        Commands::Record { idle_secs } => cmd_record(idle_secs),
    }
}

fn load_tables(path: &Path) -> anyhow::Result<RemapTables> {
    let config = RemapConfig::load(path)?;
    config
        .build()
        .with_context(|| format!("invalid config {}", path.display()))
}

fn cmd_check(path: &Path) -> anyhow::Result<()> {
    let tables = load_tables(path)?;
    println!("Configuration is valid: {}", path.display());

    let mut singles: Vec<_> = tables.single_keys().collect();
    singles.sort_unstable_by_key(|(from, _)| *from);
    println!("  Single-key remaps: {}", singles.len());
    for (from, to) in singles {
        let to = match to {
            KeyTarget::Key(vk) => vk.to_string(),
            KeyTarget::Disabled => DISABLED_TARGET.to_string(),
        };
        println!("    {} -> {}", from, to);
    }

    let mut toggles: Vec<_> = tables.toggle_keys().collect();
    toggles.sort_unstable();
    let toggles: Vec<String> = toggles.iter().map(|k| k.to_string()).collect();
    println!("  Toggle keys: {}", toggles.join(", "));
    print_chords("  OS-level shortcuts", tables.os_chords());

    let mut apps: Vec<&str> = tables.app_identities().collect();
    apps.sort_unstable();
    for app in apps {
        if let Some(table) = tables.app_chords(app) {
            print_chords(&format!("  {}", app), table);
        }
    }
    Ok(())
}

fn print_chords(title: &str, table: &ChordTable) {
    println!("{}: {}", title, table.len());
    for entry in table.entries() {
        let target: Vec<String> = entry
            .remap
            .target
            .keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        println!("    {} -> {}", entry.trigger, target.join(" + "));
    }
}

fn cmd_sample() -> anyhow::Result<()> {
    println!("{}", RemapConfig::sample().to_json_pretty()?);
    Ok(())
}

#[cfg(windows)]
fn cmd_run(path: &Path) -> anyhow::Result<()> {
    use keyshift_core::engine::ENGINE;
    use keyshift_core::keyboard_hook;

    let tables = load_tables(path)?;

    {
        let mut engine = ENGINE.lock();
        engine.load_tables(tables);
        engine.set_on_enabled_change(|enabled| {
            tracing::info!("Remapping {}", if enabled { "resumed" } else { "paused" });
        });
    }

    let hook_thread = std::thread::spawn(|| {
        tracing::info!("Hook thread started");
        match keyboard_hook::install_hook() {
            Ok(_) => {
                keyboard_hook::run_event_loop();
                keyboard_hook::uninstall_hook();
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to install hook: {}", e);
                Err(e)
            }
        }
    });

    hook_thread
        .join()
        .map_err(|_| anyhow::anyhow!("hook thread panicked"))?
}

#[cfg(windows)]
fn cmd_record(idle_secs: u64) -> anyhow::Result<()> {
    use crossbeam_channel::RecvTimeoutError;
    use keyshift_core::engine::ENGINE;
    use keyshift_core::keyboard_hook;
    use keyshift_core::recorder::ShortcutRecorder;
    use std::time::Duration;

    let (tx, rx) = crossbeam_channel::bounded(16);
    ENGINE
        .lock()
        .begin_recording(ShortcutRecorder::with_updates(tx));

    let hook_thread = std::thread::spawn(|| {
        keyboard_hook::install_hook()?;
        keyboard_hook::run_event_loop();
        keyboard_hook::uninstall_hook();
        anyhow::Ok(())
    });

    println!("Press the shortcut to record...");
    let idle = Duration::from_secs(idle_secs);
    let mut seen_any = false;
    loop {
        match rx.recv_timeout(idle) {
            Ok(keys) => {
                seen_any = true;
                let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                println!("  {}", names.join(" + "));
            }
            Err(RecvTimeoutError::Timeout) if seen_any || hook_thread.is_finished() => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let recorder = ENGINE.lock().end_recording();
    keyboard_hook::request_stop();
    hook_thread
        .join()
        .map_err(|_| anyhow::anyhow!("hook thread panicked"))??;

    let recorder = recorder.context("recording was cancelled")?;
    match recorder.detected_shortcut() {
        Ok(shortcut) => println!("Detected: {}", shortcut),
        Err(e) => println!("Not a valid shortcut: {}", e),
    }
    Ok(())
}

#[cfg(not(windows))]
fn cmd_run(_path: &Path) -> anyhow::Result<()> {
    anyhow::bail!("the keyboard hook is only available on Windows")
}

#[cfg(not(windows))]
fn cmd_record(_idle_secs: u64) -> anyhow::Result<()> {
    anyhow::bail!("shortcut recording needs the Windows keyboard hook")
}
