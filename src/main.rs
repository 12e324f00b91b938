//! Lightscript - command line host
//!
//! ```bash
//! lightscript list
//! lightscript schema sparkle_field --markup
//! lightscript run rainbow_wave --frames 240 --set speed=8 --set mode=Fire --snapshot wave.png
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde_json::Value;

use lightscript::controls::bridge::resolve;
use lightscript::controls::ControlValue;
use lightscript::effects::EffectCatalog;
use lightscript::host::{HostConfig, LightscriptHost, LogPanel};
use lightscript::settings::HostPreferences;
use lightscript::telemetry::{init_logging, FrameProfiler, LogConfig, RunMetrics};
use lightscript::MemoryStore;

const DEFAULT_EFFECT: &str = "rainbow_wave";

#[derive(Parser)]
#[command(name = "lightscript")]
#[command(about = "Run and inspect parameterized lightscripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging for the crate
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered lightscripts by category
    List,

    /// Print the control schema of a lightscript
    Schema {
        effect: String,

        /// Emit the markup template instead of JSON
        #[arg(long)]
        markup: bool,
    },

    /// Load a lightscript and render frames headlessly
    Run {
        /// Effect id (defaults to the last remembered effect)
        effect: Option<String>,

        /// Number of frames to render
        #[arg(short, long, default_value = "120")]
        frames: u64,

        /// Control override, `id=value` (repeatable)
        #[arg(short, long = "set", value_name = "ID=VALUE")]
        set: Vec<String>,

        /// Restore defaults after applying overrides
        #[arg(long)]
        reset: bool,

        /// Save the final surface as PNG
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Remember the effect in preferences
        #[arg(long)]
        remember: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&LogConfig::for_cli(cli.verbose, cli.log_file.clone()))
        .map_err(|e| e.to_string())?;

    let catalog = EffectCatalog::builtin()?;

    match cli.command {
        Commands::List => list(&catalog),
        Commands::Schema { effect, markup } => {
            let schema = catalog
                .schema(&effect)
                .ok_or_else(|| format!("lightscript '{}' not found", effect))?;
            if markup {
                println!("{}", schema.to_markup());
            } else {
                println!("{}", schema.export_json()?);
            }
        }
        Commands::Run {
            effect,
            frames,
            set,
            reset,
            snapshot,
            remember,
        } => {
            let mut prefs = HostPreferences::load();
            let effect = effect
                .or_else(|| prefs.last_effect.clone())
                .unwrap_or_else(|| DEFAULT_EFFECT.to_string());
            run(catalog, &prefs, &effect, frames, &set, reset, snapshot)?;
            if remember {
                prefs.set_last_effect(&effect);
            }
        }
    }

    Ok(())
}

fn list(catalog: &EffectCatalog) {
    for category in catalog.categories() {
        println!("{}", category);
        for id in catalog.effects_in_category(category).unwrap_or(&[]) {
            if let Some(summary) = catalog.summary(id) {
                println!(
                    "  {:<16} {:<8} {:>2} controls  {}",
                    summary.id, summary.family, summary.control_count, summary.descriptor.name
                );
            }
        }
    }
}

/// Split `id=value`; the value is JSON when it parses, a string otherwise
fn parse_override(raw: &str) -> Result<(&str, Value), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{}'", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((id.trim(), value))
}

fn run(
    catalog: EffectCatalog,
    prefs: &HostPreferences,
    effect: &str,
    frames: u64,
    overrides: &[String],
    reset: bool,
    snapshot: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = HostConfig::from_preferences(prefs);
    let mut host = LightscriptHost::new(catalog, Box::new(MemoryStore::new()), Box::new(LogPanel), config);
    pollster::block_on(host.load(effect, Instant::now()))?;

    for raw in overrides {
        let (id, wire) = parse_override(raw)?;
        let definition = host
            .active_controls()
            .iter()
            .find(|c| c.id() == id)
            .cloned()
            .ok_or_else(|| format!("'{}' has no control '{}'", effect, id))?;
        let value: ControlValue = resolve(&definition, Some(&wire));
        host.on_control_change(id, value, Instant::now())?;
    }
    if reset {
        host.reset_to_defaults(Instant::now())?;
    }

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(prefs.target_fps.max(1)));
    let mut profiler = FrameProfiler::default();
    let mut drawn = 0u64;
    while drawn < frames {
        let now = Instant::now();
        profiler.mark_frame(now);
        let count = host.tick(now);
        if count == 0 {
            tracing::warn!(effect, state = ?host.active_state(), "No frame scheduled, stopping");
            break;
        }
        drawn += count as u64;
        std::thread::sleep(frame_interval.saturating_sub(now.elapsed()));
    }

    RunMetrics {
        effect: effect.to_string(),
        target_fps: prefs.target_fps,
        fps: profiler.fps(),
        frames_drawn: drawn,
        control_updates: host.applied_updates(),
        frame_stats: profiler.stats(),
    }
    .log();

    if let Some(path) = snapshot {
        let surface = host.surface().ok_or("no surface to save")?;
        surface.save_png(&path)?;
        tracing::info!(path = %path.display(), "Snapshot saved");
    }

    host.unload()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_override() {
        assert_eq!(parse_override("speed=8").unwrap(), ("speed", json!(8)));
        assert_eq!(parse_override("glow=false").unwrap(), ("glow", json!(false)));
        assert_eq!(parse_override("mode=Fire").unwrap(), ("mode", json!("Fire")));
        assert_eq!(parse_override("color=#ff0000").unwrap(), ("color", json!("#ff0000")));
        assert!(parse_override("speed").is_err());
    }
}
