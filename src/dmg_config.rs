// Orchestrator configuration

use crate::dmg_interface::{
    from_seconds, ApplicationKind, DmgError, SimTime, NANOS_PER_MILLI, NANOS_PER_SECOND,
};

// ============================================================================
// Main Configuration
// ============================================================================

/// How status lines are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Fixed-width columns plus association notices and the final report
    Plain,
    /// Comma separated, status lines only
    Csv,
}

/// Knobs of the lifecycle and telemetry orchestrator
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Nominal simulation length in seconds (default: 10)
    pub simulation_time_s: f64,

    /// Throughput sampling period in ms (default: 100)
    pub sample_period_ms: u64,

    /// Beacon intervals between forced TXSS re-sweeps (default: 10)
    pub retrain_threshold: u16,

    /// Also trace SNR of QoS data frames (default: true)
    pub report_data_snr: bool,

    /// Status line format (default: plain)
    pub output_mode: OutputMode,

    /// Application installed on every station
    pub application: ApplicationConfig,
}

/// Traffic application settings
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application type (default: onoff)
    pub kind: ApplicationKind,

    /// Payload size in bytes (default: 1448)
    pub packet_size: u32,

    /// Offered rate, e.g. "300Mbps" (default: 300Mbps)
    pub data_rate: String,

    /// Bytes after which an OnOff generator stops, 0 for unlimited (default: 0)
    pub max_bytes: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            simulation_time_s: 10.0,
            sample_period_ms: 100,
            retrain_threshold: 10,
            report_data_snr: true,
            output_mode: OutputMode::Plain,
            application: ApplicationConfig::default(),
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            kind: ApplicationKind::OnOff,
            packet_size: 1448,
            data_rate: "300Mbps".to_string(),
            max_bytes: 0,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), DmgError> {
        if !(self.simulation_time_s > 0.0) {
            return Err(DmgError::InvalidConfig(
                "simulation time must be positive".into(),
            ));
        }
        if self.sample_period_ms == 0 {
            return Err(DmgError::InvalidConfig(
                "sample period must be positive".into(),
            ));
        }
        if self.retrain_threshold == 0 {
            return Err(DmgError::InvalidConfig(
                "retrain threshold must be positive".into(),
            ));
        }
        if self.application.packet_size == 0 {
            return Err(DmgError::InvalidConfig("packet size must be positive".into()));
        }
        parse_data_rate(&self.application.data_rate)?;
        Ok(())
    }

    pub fn simulation_time(&self) -> SimTime {
        from_seconds(self.simulation_time_s)
    }

    pub fn sample_period(&self) -> SimTime {
        self.sample_period_ms * NANOS_PER_MILLI
    }

    /// Generators are installed with a start after the nominal end so they
    /// stay dormant until an association starts them.
    pub fn dormant_start(&self) -> SimTime {
        self.simulation_time() + NANOS_PER_SECOND
    }

    pub fn data_rate_bps(&self) -> Result<u64, DmgError> {
        parse_data_rate(&self.application.data_rate)
    }
}

/// Parses rates written as `<number><unit>`, unit one of bps, Kbps, Mbps, Gbps
pub fn parse_data_rate(rate: &str) -> Result<u64, DmgError> {
    let rate = rate.trim();
    let split = rate
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| DmgError::InvalidConfig(format!("data rate '{}' has no unit", rate)))?;
    let (value, unit) = rate.split_at(split);

    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| DmgError::InvalidConfig(format!("bad data rate value '{}'", rate)))?;

    let multiplier = match unit {
        "bps" | "b/s" => 1.0,
        "Kbps" | "kbps" | "Kb/s" | "kb/s" => 1e3,
        "Mbps" | "mbps" | "Mb/s" | "mb/s" => 1e6,
        "Gbps" | "gbps" | "Gb/s" | "gb/s" => 1e9,
        _ => {
            return Err(DmgError::InvalidConfig(format!(
                "unknown data rate unit '{}'",
                unit
            )))
        }
    };

    if value <= 0.0 {
        return Err(DmgError::InvalidConfig(format!(
            "data rate '{}' must be positive",
            rate
        )));
    }

    Ok((value * multiplier).round() as u64)
}
