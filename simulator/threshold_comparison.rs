// Retrain Threshold Comparison
//
// Runs the same dense scenario with several retrain thresholds and compares
// how many TXSS re-sweeps each one costs.
//
// Usage:
//   cargo run --example threshold_comparison

mod dense_scenario;

use dense_scenario::{DenseScenarioConfig, DenseScenarioRunner, ScenarioResult};
use dmg_rust::dmg_trace::NoOpTraceSink;
use dmg_rust::OutputMode;
use simple_logger::SimpleLogger;
use std::io;

const THRESHOLDS: [u16; 4] = [2, 5, 10, 20];

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .unwrap();

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  RETRAIN THRESHOLD COMPARISON                          ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let mut results: Vec<(u16, ScenarioResult)> = Vec::new();

    for threshold in THRESHOLDS {
        let mut config = DenseScenarioConfig {
            seed: Some([42u8; 32]),
            ..Default::default()
        };
        config.orchestrator.simulation_time_s = 5.0;
        config.orchestrator.retrain_threshold = threshold;
        config.orchestrator.output_mode = OutputMode::Csv;

        let mut runner = DenseScenarioRunner::new(config, NoOpTraceSink, io::sink())
            .unwrap_or_else(|e| {
                eprintln!("Failed to set up threshold {}: {}", threshold, e);
                std::process::exit(1);
            });

        match runner.run() {
            Ok(result) => results.push((threshold, result)),
            Err(e) => {
                eprintln!("Threshold {} failed: {}", threshold, e);
                std::process::exit(1);
            }
        }
    }

    println!(
        "{:<12}{:<12}{:<12}{:<16}",
        "Threshold", "Retrains", "Sweeps", "Aggregate Mbps"
    );
    for (threshold, result) in &results {
        println!(
            "{:<12}{:<12}{:<12}{:<16.3}",
            threshold,
            result.retrain_requests,
            result.sector_sweeps,
            result.aggregate_throughput_mbps()
        );
    }
}
