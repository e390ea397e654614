// Scenario Runner - Load and execute dense DMG scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/dense_single_ap.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/dense_single_ap.yaml --seed 0x1234... --csv --out traces/

mod dense_scenario;

use dense_scenario::{
    AssociationConfig, DenseScenarioConfig, DenseScenarioRunner, LinkConfig, ScheduledEvent,
};
use dmg_rust::{CsvTraceSink, OrchestratorConfig, OutputMode};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::env;
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Scenario file format
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    meta: ScenarioMeta,

    #[serde(default)]
    config: ScenarioConfig,

    /// Scripted association changes
    #[serde(default)]
    events: Vec<ScheduledEvent>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct ScenarioConfig {
    stations: u32,
    verbose: bool,
    orchestrator: OrchestratorConfig,
    link: LinkConfig,
    association: AssociationConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            stations: 10,
            verbose: false,
            orchestrator: OrchestratorConfig::default(),
            link: LinkConfig::default(),
            association: AssociationConfig::default(),
        }
    }
}

/// Command-line overrides applied on top of every scenario
#[derive(Debug, Default)]
struct Overrides {
    seed: Option<[u8; 32]>,
    csv: bool,
    out_dir: Option<PathBuf>,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX] [--csv] [--out DIR]",
            args[0]
        );
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/dense_single_ap.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        eprintln!("  {} scenarios/dense_single_ap.yaml --seed 0x123456... --csv", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    let overrides = parse_overrides(&args[2..]).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let result = if path.is_file() {
        run_scenario_file(path, &overrides)
    } else if path.is_dir() {
        run_scenario_directory(path, &overrides)
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_overrides(args: &[String]) -> Result<Overrides, Box<dyn Error>> {
    let mut overrides = Overrides::default();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => {
                let hex = args.next().ok_or("--seed needs a value")?;
                overrides.seed = Some(parse_seed_hex(hex)?);
            }
            "--csv" => overrides.csv = true,
            "--out" => {
                let dir = args.next().ok_or("--out needs a directory")?;
                overrides.out_dir = Some(PathBuf::from(dir));
            }
            other => return Err(format!("unknown argument '{}'", other).into()),
        }
    }
    Ok(overrides)
}

fn run_scenario_directory(dir: &Path, overrides: &Overrides) -> Result<(), Box<dyn Error>> {
    let mut scenarios = Vec::new();

    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let ext = path.extension().and_then(|s| s.to_str());
        if ext == Some("yaml") || ext == Some("yml") {
            scenarios.push(path);
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        return Err(format!("No .yaml files found in {}", dir.display()).into());
    }

    eprintln!("Found {} scenario(s) to run", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        eprintln!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        run_scenario_file(scenario_path, overrides)?;
    }
    Ok(())
}

fn run_scenario_file(path: &Path, overrides: &Overrides) -> Result<(), Box<dyn Error>> {
    let yaml_content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let scenario: ScenarioFile = serde_yaml::from_str(&yaml_content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

    let level = if scenario.config.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    // a directory run installs the logger once
    let _ = SimpleLogger::new().with_level(level).init();

    let name = scenario.meta.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scenario")
            .to_string()
    });
    log::info!("Loading scenario '{}' from {}", name, path.display());
    if let Some(ref desc) = scenario.meta.description {
        log::info!("{}", desc.trim());
    }

    let mut config = DenseScenarioConfig {
        stations: scenario.config.stations,
        seed: overrides.seed,
        orchestrator: scenario.config.orchestrator,
        link: scenario.config.link,
        association: scenario.config.association,
        events: scenario.events,
    };
    if overrides.csv {
        config.orchestrator.output_mode = OutputMode::Csv;
    }
    let plain = config.orchestrator.output_mode == OutputMode::Plain;

    let out_dir = overrides.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&out_dir)?;
    let traces = CsvTraceSink::create(&out_dir)?;

    let mut runner = DenseScenarioRunner::new(config, traces, io::stdout())?;
    let result = runner.run()?;

    // summary would break the CSV stream
    if plain {
        result.print_summary();
    }
    log::info!("Traces written to {}", out_dir.display());
    Ok(())
}

fn parse_seed_hex(hex: &str) -> Result<[u8; 32], Box<dyn Error>> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        if i >= 32 {
            break;
        }
        let byte_str = std::str::from_utf8(chunk)?;
        seed[i] = u8::from_str_radix(byte_str, 16)
            .map_err(|e| format!("Invalid hex seed: {}", e))?;
    }

    Ok(seed)
}
