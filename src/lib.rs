//! # dmg-orchestrator - Lifecycle and Telemetry for DMG (802.11ad) Scenarios
//!
//! Reacts to link-layer events of a dense single-coordinator DMG network and
//! keeps the application layer, beam re-training and the visualizer traces in
//! step with them.
//!
//! ## Core Components
//!
//! - **PeerRegistry**: hardware address to node index, built once at setup
//! - **TrafficPairs**: one dormant generator/collector pair per station, started
//!   on association and stopped on de-association
//! - **ThroughputSampler**: fixed-period per-pair and aggregate Mbps
//! - **RetrainTrigger**: out-of-schedule TXSS every N beacon intervals
//! - **Trace rows**: sector sweep and SNR CSV streams for the Q-D visualizer
//! - **Orchestrator**: dispatches the tagged [`Event`] to the owning component
//!
//! ## Usage with a Simulation Substrate
//!
//! The library never schedules anything itself. The substrate owns the clock
//! and passes `now` into every call:
//!
//! ```no_run
//! use dmg_rust::{MacAddress, Orchestrator, OrchestratorConfig, PeerRegistry};
//! use dmg_rust::dmg_memory_backend::{MemTrafficInstaller, RecordingBeamforming};
//! use dmg_rust::dmg_trace::CollectorTraceSink;
//!
//! let ap = MacAddress::from_index(1);
//! let sta = MacAddress::from_index(2);
//! let registry = PeerRegistry::build(vec![(ap, 0), (sta, 1)]).unwrap();
//!
//! let mut orchestrator = Orchestrator::new(
//!     OrchestratorConfig::default(),
//!     registry,
//!     CollectorTraceSink::new(),
//!     std::io::stdout(),
//! )
//! .unwrap();
//!
//! let mut installer = MemTrafficInstaller::new();
//! orchestrator.register_station(sta, ap, 0, &mut installer).unwrap();
//!
//! let first_sample = orchestrator.start();
//! // - feed link-layer events through orchestrator.handle(now, event, &mut beamforming)
//! // - call orchestrator.on_sample_tick(now) whenever a sample falls due
//! // - call orchestrator.finish() at teardown
//! # let _ = (first_sample, RecordingBeamforming::new());
//! ```
//!
//! ## Scenarios
//!
//! `simulator/` holds a small discrete-event substrate and the
//! `scenario_runner` binary that plays YAML scenario files against it.

pub mod dmg_config;
pub mod dmg_interface;
pub mod dmg_orchestrator;
pub mod dmg_pairs;
pub mod dmg_registry;
pub mod dmg_retrain;
pub mod dmg_sampler;
pub mod dmg_trace;

// In-memory substrate pieces
pub mod dmg_memory_backend;

// Re-export commonly used types
pub use dmg_config::{ApplicationConfig, OrchestratorConfig, OutputMode};
pub use dmg_interface::{
    BeamformingControl, DmgError, Event, FrameType, MacAddress, NodeIndex, SimTime, StationRole,
    TrafficCollector, TrafficGenerator, TrafficInstaller,
};
pub use dmg_orchestrator::Orchestrator;
pub use dmg_pairs::{LinkStatistics, TrafficPairs};
pub use dmg_registry::PeerRegistry;
pub use dmg_retrain::{RetrainRequest, RetrainTrigger};
pub use dmg_sampler::{ThroughputSample, ThroughputSampler};
pub use dmg_trace::{CsvTraceSink, TraceRecord, TraceSink};
