// In-memory traffic applications and beamforming control
//
// Simple stand-ins for the host framework's applications. The generator
// produces whole packets at its configured rate while running; the collector
// just counts what it is handed. Used by the scenario substrate and by tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::dmg_interface::{
    ApplicationKind, BeamformingControl, CollectorHandle, GeneratorHandle, GeneratorSpec,
    MacAddress, NodeIndex, SimTime, TrafficCollector, TrafficGenerator, TrafficInstaller,
    NANOS_PER_SECOND,
};

// ============================================================================
// Generator
// ============================================================================

/// Packet generator driven by the substrate
///
/// `OnOff` releases packets at `data_rate_bps` until its max-byte budget is
/// used up; `Bulk` releases whatever the caller offers as link capacity and
/// has no budget. Packets are only released while the generator is started.
#[derive(Debug)]
pub struct MemTrafficGenerator {
    pub spec: GeneratorSpec,
    running: bool,
    /// Time up to which packets have been accounted for
    cursor: SimTime,
    /// Bits owed but not yet enough for a whole packet
    credit_bits: u64,
    tx_packets: u64,
    tx_bytes: u64,
}

impl MemTrafficGenerator {
    pub fn new(spec: GeneratorSpec) -> Self {
        Self {
            spec,
            running: false,
            cursor: 0,
            credit_bits: 0,
            tx_packets: 0,
            tx_bytes: 0,
        }
    }

    /// Release packets for the time span up to `now`.
    ///
    /// `capacity_bps` bounds what the link can carry; `Bulk` sends at exactly
    /// that, `OnOff` at the smaller of its own rate and the capacity.
    /// Returns the number of packets released.
    pub fn advance(&mut self, now: SimTime, capacity_bps: u64) -> u64 {
        if !self.running || now <= self.cursor {
            self.cursor = self.cursor.max(now);
            return 0;
        }

        let rate = match self.spec.kind {
            ApplicationKind::OnOff => self.spec.data_rate_bps.min(capacity_bps),
            ApplicationKind::Bulk => capacity_bps,
        };

        let elapsed = now - self.cursor;
        self.cursor = now;
        self.credit_bits += (rate as u128 * elapsed as u128 / NANOS_PER_SECOND as u128) as u64;

        let packet_bits = self.spec.payload_size as u64 * 8;
        let mut packets = self.credit_bits / packet_bits;
        if self.spec.kind == ApplicationKind::OnOff && self.spec.max_bytes > 0 {
            let left = self.spec.max_bytes.saturating_sub(self.tx_bytes);
            packets = packets.min(left / self.spec.payload_size as u64);
        }
        self.credit_bits -= packets * packet_bits;

        self.tx_packets += packets;
        self.tx_bytes += packets * self.spec.payload_size as u64;
        packets
    }
}

impl TrafficGenerator for MemTrafficGenerator {
    fn start(&mut self, now: SimTime) {
        if !self.running {
            self.running = true;
            self.cursor = now;
            self.credit_bits = 0;
        }
    }

    fn stop(&mut self, now: SimTime) {
        self.running = false;
        self.cursor = now;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn total_tx_packets(&self) -> u64 {
        self.tx_packets
    }

    fn total_tx_bytes(&self) -> u64 {
        self.tx_bytes
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Byte-counting sink
#[derive(Debug, Default)]
pub struct MemTrafficCollector {
    rx_bytes: u64,
    rx_packets: u64,
}

impl MemTrafficCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive(&mut self, bytes: u64, packets: u64) {
        self.rx_bytes += bytes;
        self.rx_packets += packets;
    }
}

impl TrafficCollector for MemTrafficCollector {
    fn total_rx_bytes(&self) -> u64 {
        self.rx_bytes
    }

    fn total_rx_packets(&self) -> u64 {
        self.rx_packets
    }
}

// ============================================================================
// Installer
// ============================================================================

/// Keeps concrete handles to everything it installed so the substrate can
/// drive generators and feed collectors.
#[derive(Default)]
pub struct MemTrafficInstaller {
    generators: BTreeMap<NodeIndex, Rc<RefCell<MemTrafficGenerator>>>,
    collectors: BTreeMap<(NodeIndex, u16), Rc<RefCell<MemTrafficCollector>>>,
}

impl MemTrafficInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generator(&self, source: NodeIndex) -> Option<Rc<RefCell<MemTrafficGenerator>>> {
        self.generators.get(&source).cloned()
    }

    pub fn collector(
        &self,
        destination: NodeIndex,
        port: u16,
    ) -> Option<Rc<RefCell<MemTrafficCollector>>> {
        self.collectors.get(&(destination, port)).cloned()
    }

    pub fn generators(&self) -> impl Iterator<Item = (&NodeIndex, &Rc<RefCell<MemTrafficGenerator>>)> {
        self.generators.iter()
    }
}

impl TrafficInstaller for MemTrafficInstaller {
    fn install_generator(&mut self, source: NodeIndex, spec: &GeneratorSpec) -> GeneratorHandle {
        let generator = Rc::new(RefCell::new(MemTrafficGenerator::new(spec.clone())));
        self.generators.insert(source, generator.clone());
        generator
    }

    fn install_collector(&mut self, destination: NodeIndex, port: u16) -> CollectorHandle {
        let collector = Rc::new(RefCell::new(MemTrafficCollector::new()));
        self.collectors.insert((destination, port), collector.clone());
        collector
    }
}

// ============================================================================
// Beamforming
// ============================================================================

/// Records every TXSS request
#[derive(Debug, Default)]
pub struct RecordingBeamforming {
    pub requests: Vec<(SimTime, MacAddress, MacAddress)>,
}

impl RecordingBeamforming {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BeamformingControl for RecordingBeamforming {
    fn initiate_txss(&mut self, station: MacAddress, peer: MacAddress, now: SimTime) {
        self.requests.push((now, station, peer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmg_interface::NANOS_PER_MILLI;

    fn spec(kind: ApplicationKind, max_bytes: u64) -> GeneratorSpec {
        GeneratorSpec {
            kind,
            destination: MacAddress::from_index(1),
            port: 9000,
            payload_size: 1000,
            data_rate_bps: 8_000_000,
            max_bytes,
            start_at: 0,
            stop_at: 0,
        }
    }

    #[test]
    fn test_idle_generator_sends_nothing() {
        let mut generator = MemTrafficGenerator::new(spec(ApplicationKind::OnOff, 0));
        assert_eq!(generator.advance(NANOS_PER_SECOND, u64::MAX), 0);
        assert_eq!(generator.total_tx_bytes(), 0);
    }

    #[test]
    fn test_onoff_sends_at_configured_rate() {
        let mut generator = MemTrafficGenerator::new(spec(ApplicationKind::OnOff, 0));
        generator.start(0);

        // 8 Mbps for 100 ms = 100_000 bytes = 100 packets of 1000
        assert_eq!(generator.advance(100 * NANOS_PER_MILLI, u64::MAX), 100);
        assert_eq!(generator.total_tx_bytes(), 100_000);

        // capped by the link
        assert_eq!(generator.advance(200 * NANOS_PER_MILLI, 800_000), 10);
    }

    #[test]
    fn test_onoff_stops_at_byte_budget() {
        let mut generator = MemTrafficGenerator::new(spec(ApplicationKind::OnOff, 5_500));
        generator.start(0);

        assert_eq!(generator.advance(NANOS_PER_MILLI, u64::MAX), 1);
        assert_eq!(generator.advance(10 * NANOS_PER_MILLI, u64::MAX), 4);
        assert_eq!(generator.advance(20 * NANOS_PER_MILLI, u64::MAX), 0);
        assert_eq!(generator.total_tx_bytes(), 5_000);
    }

    #[test]
    fn test_bulk_follows_capacity_without_budget() {
        let mut generator = MemTrafficGenerator::new(spec(ApplicationKind::Bulk, 5_500));
        generator.start(0);

        // 80 Mbps for 1 ms = 10 packets of 1000 bytes, budget ignored
        assert_eq!(generator.advance(NANOS_PER_MILLI, 80_000_000), 10);
        assert_eq!(generator.advance(2 * NANOS_PER_MILLI, 80_000_000), 10);
        assert_eq!(generator.total_tx_bytes(), 20_000);
    }

    #[test]
    fn test_stop_freezes_counters() {
        let mut generator = MemTrafficGenerator::new(spec(ApplicationKind::OnOff, 0));
        generator.start(0);
        generator.advance(10 * NANOS_PER_MILLI, u64::MAX);
        generator.stop(10 * NANOS_PER_MILLI);

        let sent = generator.total_tx_packets();
        assert_eq!(generator.advance(NANOS_PER_SECOND, u64::MAX), 0);
        assert_eq!(generator.total_tx_packets(), sent);

        generator.start(NANOS_PER_SECOND);
        assert_eq!(generator.advance(NANOS_PER_SECOND + NANOS_PER_MILLI, u64::MAX), 1);
    }
}
