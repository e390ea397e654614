use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// node index as assigned by the topology builder (AP first, then stations)
pub type NodeIndex = u32;

// simulated time in nanoseconds
pub type SimTime = u64;

pub type AssociationId = u16;
pub type SectorId = u8;
pub type AntennaId = u8;

pub const NANOS_PER_MILLI: SimTime = 1_000_000;
pub const NANOS_PER_SECOND: SimTime = 1_000_000_000;

/// Visualizers number the coordinator slot first, so every trace id is shifted.
pub const DISPLAY_ID_OFFSET: u32 = 1;

/// First collector port; pair `n` listens on `BASE_COLLECTOR_PORT + n`.
pub const BASE_COLLECTOR_PORT: u16 = 9000;

pub fn seconds(time: SimTime) -> f64 {
    time as f64 / NANOS_PER_SECOND as f64
}

pub fn from_seconds(secs: f64) -> SimTime {
    (secs * NANOS_PER_SECOND as f64).round() as SimTime
}

// ============================================================================
// Addresses
// ============================================================================

/// 48-bit hardware address of a DMG device
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Sequential addresses the way the host framework allocates them (`00:00:00:00:00:01`, ...)
    pub fn from_index(n: u64) -> Self {
        let b = n.to_be_bytes();
        MacAddress([b[2], b[3], b[4], b[5], b[6], b[7]])
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

// ============================================================================
// Link-layer vocabulary
// ============================================================================

/// Role a device plays in its BSS, as reported in the sweep trace ROLE column
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StationRole {
    DmgSta,
    DmgPcp,
    DmgAp,
    DmgAdhoc,
}

impl StationRole {
    /// Numeric code understood by the Q-D visualizer
    pub fn code(&self) -> u8 {
        match self {
            StationRole::DmgSta => 8,
            StationRole::DmgPcp => 9,
            StationRole::DmgAp => 10,
            StationRole::DmgAdhoc => 11,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        matches!(self, StationRole::DmgPcp | StationRole::DmgAp)
    }
}

/// MAC frame types reported on successful reception
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FrameType {
    DmgBeacon,
    SectorSweep,
    SectorSweepFeedback,
    SectorSweepAck,
    QosData,
    Ack,
    BlockAck,
    AssociationRequest,
    AssociationResponse,
    Other,
}

impl FrameType {
    /// Frames exchanged during beamforming training
    pub fn is_beamforming_training(&self) -> bool {
        matches!(
            self,
            FrameType::DmgBeacon
                | FrameType::SectorSweep
                | FrameType::SectorSweepFeedback
                | FrameType::SectorSweepAck
        )
    }
}

// ============================================================================
// Events
// ============================================================================

/// Link-layer notifications delivered to the orchestrator by the substrate
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Station finished association with a coordinator
    Associated {
        node: NodeIndex,
        station: MacAddress,
        coordinator: MacAddress,
        aid: AssociationId,
    },
    /// Station lost its association
    Deassociated {
        node: NodeIndex,
        station: MacAddress,
        coordinator: MacAddress,
    },
    /// Sector-level sweep finished on `reporter`
    SectorSweepCompleted {
        reporter: NodeIndex,
        role: StationRole,
        bssid: MacAddress,
        responder: MacAddress,
        trace_index: u32,
        sector: SectorId,
        antenna: AntennaId,
    },
    /// Beacon interval boundary (data transmission interval start) seen by a station
    BeaconIntervalStarted { station: MacAddress },
    /// Frame received without error
    FrameReceived {
        receiver: MacAddress,
        transmitter: MacAddress,
        frame: FrameType,
        snr: f64,
    },
}

// ============================================================================
// Errors
// ============================================================================

/// Wiring or configuration mistakes. None of these are recoverable: the caller
/// built the topology wrong and the run has to stop.
#[derive(Debug, Clone, PartialEq)]
pub enum DmgError {
    /// Address is not part of the topology
    UnknownAddress(MacAddress),

    /// Association event for a node without installed applications
    UnknownPair(NodeIndex),

    /// Node already has a traffic pair
    DuplicatePair(NodeIndex),

    /// Two devices share an address
    DuplicateAddress(MacAddress),

    /// Two devices share a node index
    DuplicateIndex(NodeIndex),

    /// Event names a node other than the station's registered one
    NodeMismatch {
        station: MacAddress,
        node: NodeIndex,
        registered: NodeIndex,
    },

    /// Configuration value out of range
    InvalidConfig(String),
}

impl fmt::Display for DmgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmgError::UnknownAddress(addr) => write!(f, "address {} is not registered", addr),
            DmgError::UnknownPair(node) => {
                write!(f, "could not find application for node {}", node)
            }
            DmgError::DuplicatePair(node) => {
                write!(f, "node {} already has a traffic pair", node)
            }
            DmgError::DuplicateAddress(addr) => write!(f, "address {} registered twice", addr),
            DmgError::DuplicateIndex(node) => write!(f, "node index {} registered twice", node),
            DmgError::NodeMismatch {
                station,
                node,
                registered,
            } => write!(
                f,
                "event for {} names node {}, registered as node {}",
                station, node, registered
            ),
            DmgError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for DmgError {}

// ============================================================================
// Substrate traits
// ============================================================================

/// Traffic source installed on a station
pub trait TrafficGenerator {
    fn start(&mut self, now: SimTime);

    fn stop(&mut self, now: SimTime);

    fn is_running(&self) -> bool;

    fn total_tx_packets(&self) -> u64;

    fn total_tx_bytes(&self) -> u64;
}

/// Byte-counting sink installed on the destination
pub trait TrafficCollector {
    /// Cumulative received bytes. Never decreases.
    fn total_rx_bytes(&self) -> u64;

    fn total_rx_packets(&self) -> u64;
}

pub type GeneratorHandle = Rc<RefCell<dyn TrafficGenerator>>;
pub type CollectorHandle = Rc<RefCell<dyn TrafficCollector>>;

/// Application type installed on the source
#[derive(Copy, Clone, PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationKind {
    /// Constant bit rate, always on once started
    OnOff,
    /// Sends as fast as the link accepts
    Bulk,
}

/// Everything the substrate needs to build a generator
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorSpec {
    pub kind: ApplicationKind,
    pub destination: MacAddress,
    pub port: u16,
    pub payload_size: u32,
    pub data_rate_bps: u64,
    /// 0 means unlimited
    pub max_bytes: u64,
    pub start_at: SimTime,
    pub stop_at: SimTime,
}

/// Installs applications on nodes
pub trait TrafficInstaller {
    fn install_generator(&mut self, source: NodeIndex, spec: &GeneratorSpec) -> GeneratorHandle;

    fn install_collector(&mut self, destination: NodeIndex, port: u16) -> CollectorHandle;
}

/// Out-of-schedule beamforming requests
pub trait BeamformingControl {
    /// Ask `station` to run a TXSS towards `peer` in the contention-based access period
    fn initiate_txss(&mut self, station: MacAddress, peer: MacAddress, now: SimTime);
}

/// Discards every request
pub struct NoOpBeamforming;

impl BeamformingControl for NoOpBeamforming {
    #[inline(always)]
    fn initiate_txss(&mut self, _station: MacAddress, _peer: MacAddress, _now: SimTime) {}
}
