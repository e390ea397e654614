// Dense Scenario Runner
//
// Plays a single-AP DMG network against the orchestrator: stations associate,
// beacon intervals tick, sweeps complete, and in-memory generators move bytes
// to their collectors over a shared link.

use std::error::Error;
use std::io::Write;

use dmg_rust::dmg_interface::{
    DmgError, Event, FrameType, MacAddress, NodeIndex, SimTime, StationRole, TrafficGenerator,
    NANOS_PER_MILLI,
};
use dmg_rust::dmg_memory_backend::{MemTrafficInstaller, RecordingBeamforming};
use dmg_rust::{Orchestrator, PeerRegistry, TraceSink};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::{DenseScenarioConfig, LinkAction, BEACON_INTERVAL};
use super::event_queue::{EventQueue, SimEvent};
use super::stats::ScenarioResult;

/// Node index of the access point
pub const AP_INDEX: NodeIndex = 0;

/// Address of node `index`, allocated the way the host framework does
pub fn node_address(index: NodeIndex) -> MacAddress {
    MacAddress::from_index(index as u64 + 1)
}

struct SimStation {
    index: NodeIndex,
    address: MacAddress,
    associated: bool,
}

pub struct DenseScenarioRunner<S: TraceSink, O: Write> {
    config: DenseScenarioConfig,
    seed: [u8; 32],
    rng: StdRng,
    queue: EventQueue,

    orchestrator: Orchestrator<S, O>,
    installer: MemTrafficInstaller,
    beamforming: RecordingBeamforming,

    ap: MacAddress,
    capacity_bps: u64,
    stations: Vec<SimStation>,

    beacon_intervals: u64,
    trace_index: u32,
    events_processed: u64,
    associations: u64,
    deassociations: u64,
    sweeps: u64,
}

impl<S: TraceSink, O: Write> DenseScenarioRunner<S, O> {
    pub fn new(config: DenseScenarioConfig, traces: S, output: O) -> Result<Self, Box<dyn Error>> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });
        let rng = StdRng::from_seed(seed);

        let ap = node_address(AP_INDEX);
        let registry =
            PeerRegistry::build((AP_INDEX..=config.stations).map(|i| (node_address(i), i)))?;

        let mut orchestrator =
            Orchestrator::new(config.orchestrator.clone(), registry, traces, output)?;
        let mut installer = MemTrafficInstaller::new();

        let mut stations = Vec::with_capacity(config.stations as usize);
        for index in 1..=config.stations {
            let address = node_address(index);
            let app_number = u16::try_from(index - 1).map_err(|_| {
                DmgError::InvalidConfig(format!("station {} has no collector port", index))
            })?;
            orchestrator.register_station(address, ap, app_number, &mut installer)?;
            stations.push(SimStation {
                index,
                address,
                associated: false,
            });
        }

        let capacity_bps = config.capacity_bps()?;

        Ok(Self {
            config,
            seed,
            rng,
            queue: EventQueue::new(),
            orchestrator,
            installer,
            beamforming: RecordingBeamforming::new(),
            ap,
            capacity_bps,
            stations,
            beacon_intervals: 0,
            trace_index: 0,
            events_processed: 0,
            associations: 0,
            deassociations: 0,
            sweeps: 0,
        })
    }

    pub fn run(&mut self) -> Result<ScenarioResult, Box<dyn Error>> {
        self.schedule_initial_events();

        let stop_time = self.config.stop_time();
        let mut end_time = 0;

        while let Some((now, event)) = self.queue.pop() {
            self.events_processed += 1;
            end_time = now;

            match event {
                SimEvent::Stop => break,
                SimEvent::Associate(node) => self.associate(now, node)?,
                SimEvent::Deassociate(node) => self.deassociate(now, node)?,
                SimEvent::BeaconInterval => {
                    self.beacon_interval(now)?;
                    self.queue
                        .schedule(now + BEACON_INTERVAL, SimEvent::BeaconInterval);
                }
                SimEvent::SectorSweep(node) => self.sector_sweep(now, node)?,
                SimEvent::TrafficStep => {
                    self.traffic_step(now)?;
                    self.queue.schedule(
                        now + self.config.link.step_ms * NANOS_PER_MILLI,
                        SimEvent::TrafficStep,
                    );
                }
                SimEvent::SampleTick => {
                    let next = self.orchestrator.on_sample_tick(now);
                    self.queue.schedule(next, SimEvent::SampleTick);
                }
            }
        }

        if end_time < stop_time {
            warn!("event queue drained at {} ns before stop time", end_time);
        }

        let links = self.orchestrator.finish()?;

        info!(
            "scenario done: {} events, {} sweeps, {} retrain requests",
            self.events_processed,
            self.sweeps,
            self.orchestrator.retrain_requests()
        );

        Ok(ScenarioResult {
            seed_used: self.seed,
            stations: self.config.stations,
            end_time,
            events_processed: self.events_processed,
            beacon_intervals: self.beacon_intervals,
            associations: self.associations,
            deassociations: self.deassociations,
            sector_sweeps: self.sweeps,
            retrain_requests: self.orchestrator.retrain_requests(),
            links,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator<S, O> {
        &self.orchestrator
    }

    fn schedule_initial_events(&mut self) {
        let first_sample = self.orchestrator.start();
        self.queue.schedule(first_sample, SimEvent::SampleTick);
        self.queue.schedule(0, SimEvent::BeaconInterval);
        self.queue.schedule(
            self.config.link.step_ms * NANOS_PER_MILLI,
            SimEvent::TrafficStep,
        );

        let association = &self.config.association;
        if association.auto {
            for station in &self.stations {
                let at = association.start_ms
                    + (station.index as u64 - 1) * association.spacing_ms;
                self.queue
                    .schedule(at * NANOS_PER_MILLI, SimEvent::Associate(station.index));
            }
        }

        for scheduled in &self.config.events {
            let event = match scheduled.action {
                LinkAction::Associate => SimEvent::Associate(scheduled.station),
                LinkAction::Deassociate => SimEvent::Deassociate(scheduled.station),
            };
            self.queue.schedule(scheduled.at_ms * NANOS_PER_MILLI, event);
        }

        self.queue.schedule(self.config.stop_time(), SimEvent::Stop);
    }

    // ========================================================================
    // Link-layer behavior
    // ========================================================================

    fn associate(&mut self, now: SimTime, node: NodeIndex) -> Result<(), Box<dyn Error>> {
        let slot = (node - 1) as usize;
        if self.stations[slot].associated {
            debug!("station {} already associated at {} ns", node, now);
            return Ok(());
        }

        // beamforming training comes before association
        self.sector_sweep(now, node)?;

        self.stations[slot].associated = true;
        self.associations += 1;

        let event = Event::Associated {
            node,
            station: self.stations[slot].address,
            coordinator: self.ap,
            aid: node as u16,
        };
        self.orchestrator.handle(now, event, &mut self.beamforming)?;
        Ok(())
    }

    fn deassociate(&mut self, now: SimTime, node: NodeIndex) -> Result<(), Box<dyn Error>> {
        let slot = (node - 1) as usize;
        if !self.stations[slot].associated {
            debug!("station {} not associated at {} ns", node, now);
            return Ok(());
        }

        self.stations[slot].associated = false;
        self.deassociations += 1;

        let event = Event::Deassociated {
            node,
            station: self.stations[slot].address,
            coordinator: self.ap,
        };
        self.orchestrator.handle(now, event, &mut self.beamforming)?;
        Ok(())
    }

    fn beacon_interval(&mut self, now: SimTime) -> Result<(), Box<dyn Error>> {
        self.beacon_intervals += 1;
        let sweep_due = self.beacon_intervals % self.config.link.sweep_every as u64 == 0;

        for slot in 0..self.stations.len() {
            let (index, address, associated) = {
                let station = &self.stations[slot];
                (station.index, station.address, station.associated)
            };

            let snr = self.draw_snr();
            let beacon = Event::FrameReceived {
                receiver: address,
                transmitter: self.ap,
                frame: FrameType::DmgBeacon,
                snr,
            };
            self.orchestrator.handle(now, beacon, &mut self.beamforming)?;

            if !associated {
                continue;
            }

            let interval = Event::BeaconIntervalStarted { station: address };
            self.orchestrator.handle(now, interval, &mut self.beamforming)?;

            if sweep_due {
                self.sector_sweep(now, index)?;
            }
        }

        let txss_delay = self.config.link.txss_delay_ms * NANOS_PER_MILLI;
        let requests: Vec<_> = self.beamforming.requests.drain(..).collect();
        for (requested_at, station, peer) in requests {
            let node = self.orchestrator.registry().identity_of(&station)?;
            debug!("TXSS {} -> {} requested at {} ns", station, peer, requested_at);
            self.queue
                .schedule(requested_at + txss_delay, SimEvent::SectorSweep(node));
        }
        Ok(())
    }

    /// Sweep between station `node` and the AP, reported on both ends
    fn sector_sweep(&mut self, now: SimTime, node: NodeIndex) -> Result<(), Box<dyn Error>> {
        let station = node_address(node);
        self.sweeps += 1;

        let ends = [
            (node, StationRole::DmgSta, self.ap),
            (AP_INDEX, StationRole::DmgAp, station),
        ];
        for (reporter, role, responder) in ends {
            let sector = self.rng.gen_range(1..=self.config.link.sectors);
            let antenna = self.rng.gen_range(1..=self.config.link.antennas);
            let event = Event::SectorSweepCompleted {
                reporter,
                role,
                bssid: self.ap,
                responder,
                trace_index: self.trace_index,
                sector,
                antenna,
            };
            self.orchestrator.handle(now, event, &mut self.beamforming)?;
        }
        self.trace_index += 1;

        let frames = [
            (station, self.ap, FrameType::SectorSweep),
            (self.ap, station, FrameType::SectorSweepFeedback),
            (station, self.ap, FrameType::SectorSweepAck),
        ];
        for (receiver, transmitter, frame) in frames {
            let snr = self.draw_snr();
            let event = Event::FrameReceived {
                receiver,
                transmitter,
                frame,
                snr,
            };
            self.orchestrator.handle(now, event, &mut self.beamforming)?;
        }
        Ok(())
    }

    /// Move traffic of every running generator, sharing the link equally
    fn traffic_step(&mut self, now: SimTime) -> Result<(), Box<dyn Error>> {
        let mut deliveries = Vec::new();

        for (_, generator) in self.installer.generators() {
            let mut generator = generator.borrow_mut();
            let stop_at = generator.spec.stop_at;
            if generator.is_running() && now >= stop_at {
                generator.stop(stop_at);
            }
        }

        let active = self
            .installer
            .generators()
            .filter(|(_, generator)| generator.borrow().is_running())
            .count() as u64;
        let share = if active > 0 {
            self.capacity_bps / active
        } else {
            0
        };

        for (source, generator) in self.installer.generators() {
            let mut generator = generator.borrow_mut();
            let packets = generator.advance(now, share);
            if packets > 0 {
                let bytes = packets * generator.spec.payload_size as u64;
                deliveries.push((*source, generator.spec.port, packets, bytes));
            }
        }

        for (source, port, packets, bytes) in deliveries {
            if let Some(collector) = self.installer.collector(AP_INDEX, port) {
                collector.borrow_mut().receive(bytes, packets);
            }

            let snr = self.draw_snr();
            let event = Event::FrameReceived {
                receiver: self.ap,
                transmitter: node_address(source),
                frame: FrameType::QosData,
                snr,
            };
            self.orchestrator.handle(now, event, &mut self.beamforming)?;
        }
        Ok(())
    }

    fn draw_snr(&mut self) -> f64 {
        let mean = self.config.link.snr_mean_db;
        let spread = self.config.link.snr_spread_db;
        if spread > 0.0 {
            self.rng.gen_range(mean - spread..=mean + spread)
        } else {
            mean
        }
    }
}
