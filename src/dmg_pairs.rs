use indexmap::IndexMap;
use log::{debug, info};

use crate::dmg_config::OrchestratorConfig;
use crate::dmg_interface::{
    seconds, ApplicationKind, AssociationId, CollectorHandle, DmgError, GeneratorHandle,
    GeneratorSpec, MacAddress, NodeIndex, SimTime, TrafficInstaller,
};

// ============================================================================
// Traffic Pair
// ============================================================================

/// One communicating (source, destination) pair and its sampling state
pub struct TrafficPair {
    pub source: NodeIndex,
    pub destination: NodeIndex,
    pub collector_port: u16,
    pub generator: GeneratorHandle,
    pub collector: CollectorHandle,

    /// Collector byte count seen at the previous sample tick
    pub last_total_rx: u64,

    /// Sum of every per-tick rate (Mbps)
    pub rate_sum: f64,

    /// Time of the latest association; None until the station first associates
    pub start_time: Option<SimTime>,
}

impl TrafficPair {
    /// Received bytes since the previous tick; the stored count moves forward.
    pub(crate) fn take_rx_delta(&mut self) -> u64 {
        let total = self.collector.borrow().total_rx_bytes();
        let delta = total.saturating_sub(self.last_total_rx);
        self.last_total_rx = total;
        delta
    }
}

/// Summary of one link drained at teardown
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStatistics {
    pub source: NodeIndex,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// Throughput over the time the link was actually up (Mbps)
    pub throughput_mbps: f64,
}

// ============================================================================
// Lifecycle Manager
// ============================================================================

/// Owns every traffic pair and gates generators on association state
///
/// Generators are installed dormant (start after the nominal end, stop at the
/// nominal end). Only an association starts them and a de-association stops
/// them again; the pair itself lives until teardown so a station may
/// re-associate without being registered again.
pub struct TrafficPairs {
    pairs: IndexMap<NodeIndex, TrafficPair>,
    template: GeneratorTemplate,
}

#[derive(Clone, Debug)]
struct GeneratorTemplate {
    kind: ApplicationKind,
    payload_size: u32,
    data_rate_bps: u64,
    max_bytes: u64,
    start_at: SimTime,
    stop_at: SimTime,
}

impl TrafficPairs {
    pub fn new(config: &OrchestratorConfig) -> Result<Self, DmgError> {
        let template = GeneratorTemplate {
            kind: config.application.kind,
            payload_size: config.application.packet_size,
            data_rate_bps: config.data_rate_bps()?,
            max_bytes: config.application.max_bytes,
            start_at: config.dormant_start(),
            stop_at: config.simulation_time(),
        };

        Ok(Self {
            pairs: IndexMap::new(),
            template,
        })
    }

    /// Install a generator on `source` sending to `destination_address:collector_port`
    /// and a collector on `destination` listening on that port.
    pub fn register_pair(
        &mut self,
        source: NodeIndex,
        destination: NodeIndex,
        destination_address: MacAddress,
        collector_port: u16,
        installer: &mut dyn TrafficInstaller,
    ) -> Result<&TrafficPair, DmgError> {
        if self.pairs.contains_key(&source) {
            return Err(DmgError::DuplicatePair(source));
        }

        let spec = GeneratorSpec {
            kind: self.template.kind,
            destination: destination_address,
            port: collector_port,
            payload_size: self.template.payload_size,
            data_rate_bps: self.template.data_rate_bps,
            max_bytes: self.template.max_bytes,
            start_at: self.template.start_at,
            stop_at: self.template.stop_at,
        };

        let generator = installer.install_generator(source, &spec);
        let collector = installer.install_collector(destination, collector_port);

        debug!(
            "pair registered: node {} -> node {} port {}",
            source, destination, collector_port
        );

        let pair = TrafficPair {
            source,
            destination,
            collector_port,
            generator,
            collector,
            last_total_rx: 0,
            rate_sum: 0.0,
            start_time: None,
        };

        let pair: &TrafficPair = self.pairs.entry(source).or_insert(pair);
        Ok(pair)
    }

    pub fn on_associated(
        &mut self,
        source: NodeIndex,
        coordinator: MacAddress,
        aid: AssociationId,
        now: SimTime,
    ) -> Result<(), DmgError> {
        let pair = self
            .pairs
            .get_mut(&source)
            .ok_or(DmgError::UnknownPair(source))?;

        pair.start_time = Some(now);
        pair.generator.borrow_mut().start(now);

        info!(
            "node {} associated with {} (aid {}), traffic started at {:.6}s",
            source,
            coordinator,
            aid,
            seconds(now)
        );
        Ok(())
    }

    pub fn on_deassociated(
        &mut self,
        source: NodeIndex,
        coordinator: MacAddress,
        now: SimTime,
    ) -> Result<(), DmgError> {
        let pair = self
            .pairs
            .get_mut(&source)
            .ok_or(DmgError::UnknownPair(source))?;

        pair.generator.borrow_mut().stop(now);

        info!(
            "node {} deassociated from {}, traffic stopped at {:.6}s",
            source,
            coordinator,
            seconds(now)
        );
        Ok(())
    }

    pub fn pair(&self, source: NodeIndex) -> Option<&TrafficPair> {
        self.pairs.get(&source)
    }

    /// Pairs in registration order
    pub fn iter(&self) -> impl Iterator<Item = &TrafficPair> {
        self.pairs.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrafficPair> {
        self.pairs.values_mut()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Per-link totals; throughput is measured from each link's own start time
    pub fn link_statistics(&self, simulation_time: SimTime) -> Vec<LinkStatistics> {
        self.pairs
            .values()
            .map(|pair| {
                let generator = pair.generator.borrow();
                let collector = pair.collector.borrow();
                let rx_bytes = collector.total_rx_bytes();

                let active = seconds(simulation_time) - seconds(pair.start_time.unwrap_or(0));
                let throughput_mbps = if active > 0.0 {
                    rx_bytes as f64 * 8.0 / (active * 1e6)
                } else {
                    0.0
                };

                LinkStatistics {
                    source: pair.source,
                    tx_packets: generator.total_tx_packets(),
                    tx_bytes: generator.total_tx_bytes(),
                    rx_packets: collector.total_rx_packets(),
                    rx_bytes,
                    throughput_mbps,
                }
            })
            .collect()
    }
}
