// Dense Scenario Configuration

use dmg_rust::dmg_config::{parse_data_rate, OrchestratorConfig};
use dmg_rust::dmg_interface::{
    DmgError, NodeIndex, SimTime, BASE_COLLECTOR_PORT, NANOS_PER_MILLI,
};

/// Beacon interval of the coordinator, 1024 TU
pub const BEACON_INTERVAL: SimTime = 102_400_000;

/// One collector port per station, counted up from the base port
pub const MAX_STATIONS: u32 = (u16::MAX - BASE_COLLECTOR_PORT) as u32 + 1;

/// Extra time after the nominal end so the last sample tick still fires
pub const STOP_MARGIN: SimTime = 101 * NANOS_PER_MILLI;

// ============================================================================
// Main Configuration
// ============================================================================

/// One AP at node 0 and `stations` DMG STAs at nodes 1..=stations
#[derive(Debug, Clone)]
pub struct DenseScenarioConfig {
    pub stations: u32,

    /// Random seed for reproducibility
    pub seed: Option<[u8; 32]>,

    pub orchestrator: OrchestratorConfig,

    pub link: LinkConfig,

    pub association: AssociationConfig,

    /// Scripted association changes on top of the initial associations
    pub events: Vec<ScheduledEvent>,
}

/// Link behavior of the toy substrate
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Capacity shared by every station with a running generator
    pub capacity: String,

    /// Traffic is moved in steps of this many ms
    pub step_ms: u64,

    /// Mean and half-width of the uniform SNR draw (dB)
    pub snr_mean_db: f64,
    pub snr_spread_db: f64,

    /// A beacon-header sector sweep happens every N beacon intervals
    pub sweep_every: u32,

    pub sectors: u8,
    pub antennas: u8,

    /// Delay between a TXSS request and the sweep result (ms)
    pub txss_delay_ms: u64,
}

/// Initial association of every station
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Associate every station at startup
    pub auto: bool,
    pub start_ms: u64,
    pub spacing_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkAction {
    Associate,
    Deassociate,
}

/// A single scripted association change
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ScheduledEvent {
    pub at_ms: u64,
    pub action: LinkAction,
    pub station: NodeIndex,
}

impl Default for DenseScenarioConfig {
    fn default() -> Self {
        Self {
            stations: 10,
            seed: None,
            orchestrator: OrchestratorConfig::default(),
            link: LinkConfig::default(),
            association: AssociationConfig::default(),
            events: Vec::new(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            capacity: "2000Mbps".to_string(),
            step_ms: 1,
            snr_mean_db: 15.0,
            snr_spread_db: 5.0,
            sweep_every: 10,
            sectors: 32,
            antennas: 1,
            txss_delay_ms: 1,
        }
    }
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            auto: true,
            start_ms: 10,
            spacing_ms: 5,
        }
    }
}

impl DenseScenarioConfig {
    pub fn validate(&self) -> Result<(), DmgError> {
        self.orchestrator.validate()?;

        if self.stations == 0 {
            return Err(DmgError::InvalidConfig("need at least one station".into()));
        }
        if self.stations > MAX_STATIONS {
            return Err(DmgError::InvalidConfig(format!(
                "{} stations, at most {} fit the collector port range",
                self.stations, MAX_STATIONS
            )));
        }
        if self.link.step_ms == 0 {
            return Err(DmgError::InvalidConfig("traffic step must be positive".into()));
        }
        if self.link.sweep_every == 0 {
            return Err(DmgError::InvalidConfig("sweep period must be positive".into()));
        }
        if self.link.sectors == 0 || self.link.antennas == 0 {
            return Err(DmgError::InvalidConfig(
                "need at least one sector and antenna".into(),
            ));
        }
        if self.link.snr_spread_db < 0.0 {
            return Err(DmgError::InvalidConfig("SNR spread must not be negative".into()));
        }
        parse_data_rate(&self.link.capacity)?;

        for event in &self.events {
            if event.station == 0 || event.station > self.stations {
                return Err(DmgError::InvalidConfig(format!(
                    "scheduled event at {} ms names station {}, valid range is 1..={}",
                    event.at_ms, event.station, self.stations
                )));
            }
        }
        Ok(())
    }

    /// Time at which the substrate stops
    pub fn stop_time(&self) -> SimTime {
        self.orchestrator.simulation_time() + STOP_MARGIN
    }

    pub fn capacity_bps(&self) -> Result<u64, DmgError> {
        parse_data_rate(&self.link.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = DenseScenarioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity_bps().unwrap(), 2_000_000_000);
        assert_eq!(config.stop_time(), 10_101_000_000);
    }

    #[test]
    fn test_event_station_out_of_range() {
        let config = DenseScenarioConfig {
            stations: 2,
            events: vec![ScheduledEvent {
                at_ms: 100,
                action: LinkAction::Deassociate,
                station: 3,
            }],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmgError::InvalidConfig(_))));
    }

    #[test]
    fn test_station_count_bounded_by_ports() {
        let mut config = DenseScenarioConfig {
            stations: 60_000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmgError::InvalidConfig(_))));

        config.stations = MAX_STATIONS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scheduled_event_yaml() {
        let yaml = "- at_ms: 2500\n  action: deassociate\n  station: 4\n";
        let events: Vec<ScheduledEvent> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(events[0].action, LinkAction::Deassociate);
        assert_eq!(events[0].station, 4);
    }
}
