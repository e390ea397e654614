use std::fmt::Write as _;

use crate::dmg_config::OutputMode;
use crate::dmg_interface::{seconds, NodeIndex, SimTime};
use crate::dmg_pairs::TrafficPairs;

/// Column width of the plain status table
const COLUMN_WIDTH: usize = 12;

/// Significant digits of printed rates
const RATE_DIGITS: usize = 6;

/// Rates of one sampling tick, in pair registration order
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSample {
    pub time: SimTime,
    pub period: SimTime,
    pub rates: Vec<(NodeIndex, f64)>,
    pub total: f64,
}

/// Fixed-period application throughput sampler
///
/// Each tick turns the per-pair byte delta into Mbps. The scaling constant is
/// tied to the period (`period_ns / 1000`, i.e. `1e5` for 100 ms) so the unit
/// stays Mbps whatever period is configured.
pub struct ThroughputSampler {
    period: SimTime,
    next_fire: SimTime,
}

impl ThroughputSampler {
    pub fn new(period: SimTime) -> Self {
        Self {
            period,
            next_fire: period,
        }
    }

    pub fn period(&self) -> SimTime {
        self.period
    }

    /// When the next tick is due
    pub fn next_fire(&self) -> SimTime {
        self.next_fire
    }

    /// Divisor turning bytes-per-period into Mbps after the `* 8`
    pub fn scaling_constant(&self) -> f64 {
        self.period as f64 / 1_000.0
    }

    pub fn rate_mbps(&self, delta_bytes: u64) -> f64 {
        delta_bytes as f64 * 8.0 / self.scaling_constant()
    }

    /// Sample every pair and re-arm for the next period.
    ///
    /// The next fire time is the scheduled time of this tick plus one period,
    /// so late delivery of a tick never shifts the grid.
    pub fn sample(&mut self, pairs: &mut TrafficPairs, now: SimTime) -> ThroughputSample {
        let mut rates = Vec::with_capacity(pairs.len());
        let mut total = 0.0;

        for pair in pairs.iter_mut() {
            let delta = pair.take_rx_delta();
            let rate = self.rate_mbps(delta);
            pair.rate_sum += rate;
            total += rate;
            rates.push((pair.source, rate));
        }

        self.next_fire += self.period;
        while self.next_fire <= now {
            // ticks that were never delivered are lost, not replayed
            self.next_fire += self.period;
        }

        ThroughputSample {
            time: now,
            period: self.period,
            rates,
            total,
        }
    }
}

impl ThroughputSample {
    pub fn format(&self, mode: OutputMode) -> String {
        let mut line = String::new();
        match mode {
            OutputMode::Plain => {
                let from = seconds(self.time.saturating_sub(self.period));
                let duration = format!("{:.1} - {:.1}", from, seconds(self.time));
                let _ = write!(line, "{:<w$}", duration, w = COLUMN_WIDTH);
                for (_, rate) in &self.rates {
                    let _ = write!(line, "{:<w$}", format_rate(*rate), w = COLUMN_WIDTH);
                }
                let _ = write!(line, "{:<w$}", format_rate(self.total), w = COLUMN_WIDTH);
            }
            OutputMode::Csv => {
                let _ = write!(line, "{:.1}", seconds(self.time));
                for (_, rate) in &self.rates {
                    let _ = write!(line, ",{}", format_rate(*rate));
                }
                let _ = write!(line, ",{}", format_rate(self.total));
            }
        }
        line
    }
}

/// Six significant digits, fixed or scientific by magnitude, trailing zeros
/// dropped (`0.5792`, `299.884`, `1.23457e+06`). Keeps every rate inside its
/// table column.
pub fn format_rate(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let scientific = format!("{:.*e}", RATE_DIGITS - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return value.to_string(),
    };

    if exponent < -4 || exponent >= RATE_DIGITS as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    let decimals = (RATE_DIGITS as i32 - 1 - exponent) as usize;
    trim_fraction(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Title and column header of the plain status table
pub fn plain_header(pairs: usize) -> String {
    let mut header = String::from("Application Layer Throughput per Communicating Pair [Mbps]\n");
    let _ = write!(header, "{:<w$}", "Time [s]", w = COLUMN_WIDTH);
    for i in 1..=pairs {
        let _ = write!(header, "{:<w$}", format!("Pair ({})", i), w = COLUMN_WIDTH);
    }
    let _ = write!(header, "{:<w$}", "Total", w = COLUMN_WIDTH);
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmg_config::OrchestratorConfig;
    use crate::dmg_interface::{MacAddress, NANOS_PER_MILLI};
    use crate::dmg_memory_backend::MemTrafficInstaller;

    const PERIOD: SimTime = 100 * NANOS_PER_MILLI;

    fn two_pairs() -> (TrafficPairs, MemTrafficInstaller) {
        let mut pairs = TrafficPairs::new(&OrchestratorConfig::default()).unwrap();
        let mut installer = MemTrafficInstaller::new();
        let ap = MacAddress::from_index(1);
        pairs.register_pair(1, 0, ap, 9000, &mut installer).unwrap();
        pairs.register_pair(2, 0, ap, 9001, &mut installer).unwrap();
        (pairs, installer)
    }

    #[test]
    fn test_scaling_constant_for_default_period() {
        let sampler = ThroughputSampler::new(PERIOD);
        assert_eq!(sampler.scaling_constant(), 1e5);
        assert_eq!(sampler.rate_mbps(10_000), 10_000.0 * 8.0 / 1e5);
        assert_eq!(sampler.rate_mbps(0), 0.0);
    }

    #[test]
    fn test_two_pairs_one_idle() {
        let (mut pairs, installer) = two_pairs();
        let mut sampler = ThroughputSampler::new(PERIOD);

        // first tick: nothing yet
        let first = sampler.sample(&mut pairs, PERIOD);
        assert_eq!(first.total, 0.0);

        installer.collector(0, 9000).unwrap().borrow_mut().receive(10_000, 7);
        let sample = sampler.sample(&mut pairs, 2 * PERIOD);

        assert_eq!(sample.rates, vec![(1, 0.8), (2, 0.0)]);
        assert_eq!(sample.total, 0.8);
        assert_eq!(pairs.pair(1).unwrap().last_total_rx, 10_000);
        assert_eq!(pairs.pair(1).unwrap().rate_sum, 0.8);
    }

    #[test]
    fn test_delta_is_per_tick_not_cumulative() {
        let (mut pairs, installer) = two_pairs();
        let mut sampler = ThroughputSampler::new(PERIOD);
        let collector = installer.collector(0, 9001).unwrap();

        collector.borrow_mut().receive(25_000, 1);
        let a = sampler.sample(&mut pairs, PERIOD);
        collector.borrow_mut().receive(12_500, 1);
        let b = sampler.sample(&mut pairs, 2 * PERIOD);
        let c = sampler.sample(&mut pairs, 3 * PERIOD);

        assert_eq!(a.rates[1].1, 2.0);
        assert_eq!(b.rates[1].1, 1.0);
        assert_eq!(c.rates[1].1, 0.0);
        assert_eq!(pairs.pair(2).unwrap().rate_sum, 3.0);
    }

    #[test]
    fn test_rearm_does_not_drift() {
        let (mut pairs, _installer) = two_pairs();
        let mut sampler = ThroughputSampler::new(PERIOD);
        assert_eq!(sampler.next_fire(), PERIOD);

        // delivered late, next tick stays on the grid
        sampler.sample(&mut pairs, PERIOD + 3);
        assert_eq!(sampler.next_fire(), 2 * PERIOD);

        sampler.sample(&mut pairs, 2 * PERIOD);
        assert_eq!(sampler.next_fire(), 3 * PERIOD);
    }

    #[test]
    fn test_plain_and_csv_lines() {
        let sample = ThroughputSample {
            time: 2 * PERIOD,
            period: PERIOD,
            rates: vec![(1, 0.8), (2, 0.0)],
            total: 0.8,
        };

        assert_eq!(
            sample.format(OutputMode::Plain),
            "0.1 - 0.2   0.8         0           0.8         "
        );
        assert_eq!(sample.format(OutputMode::Csv), "0.2,0.8,0,0.8");
    }

    #[test]
    fn test_uneven_total_keeps_columns_aligned() {
        let (mut pairs, installer) = two_pairs();
        let mut sampler = ThroughputSampler::new(PERIOD);

        installer.collector(0, 9000).unwrap().borrow_mut().receive(1448, 1);
        installer.collector(0, 9001).unwrap().borrow_mut().receive(4 * 1448, 4);
        let sample = sampler.sample(&mut pairs, PERIOD);

        let line = sample.format(OutputMode::Plain);
        assert_eq!(line, "0.0 - 0.1   0.11584     0.46336     0.5792      ");
        assert_eq!(line.len(), 4 * COLUMN_WIDTH);

        assert_eq!(sample.format(OutputMode::Csv), "0.1,0.11584,0.46336,0.5792");
    }

    #[test]
    fn test_format_rate_six_significant_digits() {
        assert_eq!(format_rate(0.0), "0");
        assert_eq!(format_rate(2.0), "2");
        assert_eq!(format_rate(0.1 + 0.2), "0.3");
        assert_eq!(format_rate(299.88416), "299.884");
        assert_eq!(format_rate(1234567.0), "1.23457e+06");
        assert_eq!(format_rate(0.00001), "1e-05");
        assert_eq!(format_rate(-0.5), "-0.5");
    }

    #[test]
    fn test_plain_header() {
        let header = plain_header(2);
        let mut lines = header.lines();
        assert_eq!(
            lines.next(),
            Some("Application Layer Throughput per Communicating Pair [Mbps]")
        );
        assert_eq!(
            lines.next(),
            Some("Time [s]    Pair (1)    Pair (2)    Total       ")
        );
    }
}
