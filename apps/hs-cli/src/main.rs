use clap::{Parser, Subcommand};
use hs_app::{AppResult, RunOptions, extract_channel, get_run_summary, list_runs, load_run};
use hs_results::RunMode;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_RUNS_DIR: &str = "runs";

#[derive(Parser)]
#[command(name = "hs-cli")]
#[command(about = "HybridSim CLI - hybrid continuous/discrete vehicle simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate scenario file syntax and values
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Run a scenario
    Run {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Pace the run against the wall clock
        #[arg(long)]
        realtime: bool,
        /// Simulated seconds per wall-clock second (implies --realtime)
        #[arg(long)]
        rate: Option<f64>,
        /// Run store directory
        #[arg(long, default_value = DEFAULT_RUNS_DIR)]
        out: PathBuf,
        /// Measure time spent in derivative evaluations
        #[arg(long)]
        timing: bool,
    },
    /// List stored runs
    Runs {
        /// Run store directory
        #[arg(default_value = DEFAULT_RUNS_DIR)]
        dir: PathBuf,
    },
    /// Show details of a stored run
    ShowRun {
        /// Run store directory
        dir: PathBuf,
        /// Run ID to display
        run_id: String,
    },
    /// Export one output channel of a run as CSV
    ExportSeries {
        /// Run store directory
        dir: PathBuf,
        /// Run ID
        run_id: String,
        /// Channel name (e.g., altitude_m, thrust_n, throttle)
        channel: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Run {
            scenario_path,
            realtime,
            rate,
            out,
            timing,
        } => {
            if timing {
                hs_core::enable_timing();
            }
            cmd_run(&scenario_path, realtime, rate, out)
        }
        Commands::Runs { dir } => cmd_runs(&dir),
        Commands::ShowRun { dir, run_id } => cmd_show_run(&dir, &run_id),
        Commands::ExportSeries {
            dir,
            run_id,
            channel,
            output,
        } => cmd_export_series(&dir, &run_id, &channel, output.as_deref()),
    }
}

fn cmd_validate(scenario_path: &Path) -> AppResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let scenario = hs_scenario::load_yaml(scenario_path)?;
    println!("✓ Scenario '{}' is valid", scenario.name);
    Ok(())
}

fn cmd_run(
    scenario_path: &Path,
    realtime: bool,
    rate: Option<f64>,
    out: PathBuf,
) -> AppResult<()> {
    let scenario = hs_scenario::load_yaml(scenario_path)?;
    println!("Running scenario: {}", scenario.name);

    let options = RunOptions {
        realtime: (realtime || rate.is_some()).then_some(true),
        rate,
        out_dir: Some(out.clone()),
    };
    tracing::debug!(?options, "run options");
    let response = hs_app::run_scenario(&scenario, options)?;

    println!("✓ Run completed: {}", response.run_id);
    println!(
        "  t = {:.3} .. {:.3} s, {} samples",
        response.manifest.t0, response.manifest.t_end, response.manifest.samples
    );
    if let (RunMode::Paced { rate }, Some(pacing)) = (&response.manifest.mode, &response.pacing) {
        println!(
            "  Paced at {:.2}x (effective {:.2}x), {} overruns",
            rate,
            pacing.effective_rate(),
            pacing.overruns
        );
    }
    if response.telemetry_frames > 0 {
        println!("  Telemetry frames: {}", response.telemetry_frames);
    }
    print!("{}", response.stats.summary());
    println!("  Stored in {}", out.display());
    Ok(())
}

fn cmd_runs(dir: &Path) -> AppResult<()> {
    let runs = list_runs(dir)?;
    if runs.is_empty() {
        println!("No runs found in {}", dir.display());
        return Ok(());
    }

    println!("Runs in {}:", dir.display());
    for run in runs {
        println!(
            "  {} - {} ({}, {} samples, {})",
            run.run_id, run.scenario, run.integrator, run.samples, run.timestamp
        );
    }
    Ok(())
}

fn cmd_show_run(dir: &Path, run_id: &str) -> AppResult<()> {
    let (manifest, records) = load_run(dir, run_id)?;
    let summary = get_run_summary(&manifest, &records)?;

    println!("Run: {}", manifest.run_id);
    println!("  Scenario: {}", manifest.scenario);
    println!("  Timestamp: {}", manifest.timestamp);
    println!("  Mode: {:?}", manifest.mode);
    println!("  Integrator: {}", manifest.integrator);
    println!(
        "  Time range: {:.3} - {:.3} s ({} records)",
        summary.time_range.0, summary.time_range.1, summary.record_count
    );
    if let Some(h) = summary.max_altitude_m {
        println!("  Max altitude: {:.3} m", h);
    }
    if let Some(h) = summary.final_altitude_m {
        println!("  Final altitude: {:.3} m", h);
    }
    println!(
        "  Steps: {} accepted, {} rejected, {} discrete modifications",
        manifest.stats.accepted_steps,
        manifest.stats.rejected_steps,
        manifest.stats.discrete_modifications
    );
    println!("  States:");
    for label in &manifest.state_labels {
        println!("    {}", label);
    }
    if let Some(first) = records.first() {
        let channels: Vec<&str> = first.channels.keys().map(String::as_str).collect();
        println!("  Channels: {}", channels.join(", "));
    }
    Ok(())
}

fn cmd_export_series(
    dir: &Path,
    run_id: &str,
    channel: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let (_manifest, records) = load_run(dir, run_id)?;
    let series = extract_channel(&records, channel);
    if series.is_empty() {
        return Err(hs_app::AppError::InvalidInput(format!(
            "run {} has no channel '{}'",
            run_id, channel
        )));
    }

    let mut csv = format!("time_s,{}\n", channel);
    for (t, val) in &series {
        csv.push_str(&format!("{},{}\n", t, val));
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!(
            "✓ Exported {} data points to {}",
            series.len(),
            path.display()
        );
    } else {
        print!("{}", csv);
    }

    Ok(())
}
