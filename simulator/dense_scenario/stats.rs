// Dense Scenario Statistics

use dmg_rust::dmg_interface::{seconds, SimTime};
use dmg_rust::LinkStatistics;

/// Outcome of one scenario run
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Random seed used
    pub seed_used: [u8; 32],

    pub stations: u32,

    /// Time of the last processed event
    pub end_time: SimTime,

    pub events_processed: u64,
    pub beacon_intervals: u64,
    pub associations: u64,
    pub deassociations: u64,
    pub sector_sweeps: u64,
    pub retrain_requests: usize,

    /// Final per-link statistics in pair order
    pub links: Vec<LinkStatistics>,
}

impl ScenarioResult {
    pub fn aggregate_throughput_mbps(&self) -> f64 {
        self.links.iter().map(|link| link.throughput_mbps).sum()
    }

    pub fn seed_hex(&self) -> String {
        self.seed_used.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║    DENSE DMG SCENARIO RESULTS                          ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Seed: 0x{}", self.seed_hex());
        println!("Stations: {}", self.stations);
        println!("Simulated: {:.3} s", seconds(self.end_time));
        println!("Events: {}", self.events_processed);
        println!();

        println!("═══ Link Layer ═══");
        println!("  Beacon Intervals: {}", self.beacon_intervals);
        println!("  Associations: {}", self.associations);
        println!("  Deassociations: {}", self.deassociations);
        println!("  Sector Sweeps: {}", self.sector_sweeps);
        println!("  Retrain Requests: {}", self.retrain_requests);
        println!();

        println!("═══ Application Layer ═══");
        println!("  Aggregate Throughput: {:.3} Mbps", self.aggregate_throughput_mbps());
        if let Some(best) = self
            .links
            .iter()
            .max_by(|a, b| a.throughput_mbps.total_cmp(&b.throughput_mbps))
        {
            println!("  Best Link: node {} at {:.3} Mbps", best.source, best.throughput_mbps);
        }
        let idle = self.links.iter().filter(|link| link.rx_bytes == 0).count();
        println!("  Idle Links: {}", idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(source: u32, throughput_mbps: f64) -> LinkStatistics {
        LinkStatistics {
            source,
            tx_packets: 0,
            tx_bytes: 0,
            rx_packets: 0,
            rx_bytes: 0,
            throughput_mbps,
        }
    }

    #[test]
    fn test_aggregate_and_seed() {
        let mut seed = [0u8; 32];
        seed[0] = 0xab;
        let result = ScenarioResult {
            seed_used: seed,
            stations: 2,
            end_time: 0,
            events_processed: 0,
            beacon_intervals: 0,
            associations: 0,
            deassociations: 0,
            sector_sweeps: 0,
            retrain_requests: 0,
            links: vec![link(1, 1.5), link(2, 2.5)],
        };
        assert_eq!(result.aggregate_throughput_mbps(), 4.0);
        assert!(result.seed_hex().starts_with("ab00"));
        assert_eq!(result.seed_hex().len(), 64);
    }
}
