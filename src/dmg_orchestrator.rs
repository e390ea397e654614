use std::io::{self, Write};

use log::{debug, error, info};

use crate::dmg_config::{OrchestratorConfig, OutputMode};
use crate::dmg_interface::{
    BeamformingControl, DmgError, Event, MacAddress, NodeIndex, SimTime, TrafficInstaller,
    BASE_COLLECTOR_PORT,
};
use crate::dmg_pairs::{LinkStatistics, TrafficPairs};
use crate::dmg_registry::PeerRegistry;
use crate::dmg_retrain::RetrainTrigger;
use crate::dmg_sampler::{format_rate, plain_header, ThroughputSampler};
use crate::dmg_trace::{sector_sweep_row, signal_quality_row, TraceRecord, TraceSink};

/// Routes link-layer events to the component that owns the affected state
///
/// Every event is handled by exactly one component: association changes go to
/// the traffic pairs (and the retrain trigger's view of who is attached),
/// beacon intervals to the retrain trigger, sweeps and receptions to the
/// trace rows. The throughput sampler runs on its own timer through
/// [`Orchestrator::on_sample_tick`].
///
/// Status lines, association notices and the final report go to `output`;
/// trace rows go to `traces`.
pub struct Orchestrator<S: TraceSink, O: Write> {
    config: OrchestratorConfig,
    registry: PeerRegistry,
    pairs: TrafficPairs,
    retrain: RetrainTrigger,
    sampler: ThroughputSampler,
    traces: S,
    output: O,
    output_failed: bool,
    retrain_requests: usize,
}

impl<S: TraceSink, O: Write> Orchestrator<S, O> {
    pub fn new(
        config: OrchestratorConfig,
        registry: PeerRegistry,
        traces: S,
        output: O,
    ) -> Result<Self, DmgError> {
        config.validate()?;

        let pairs = TrafficPairs::new(&config)?;
        let retrain = RetrainTrigger::new(config.retrain_threshold)?;
        let sampler = ThroughputSampler::new(config.sample_period());

        Ok(Self {
            config,
            registry,
            pairs,
            retrain,
            sampler,
            traces,
            output,
            output_failed: false,
            retrain_requests: 0,
        })
    }

    /// Install the traffic pair `station -> coordinator` and a retrain counter
    /// for `station`. `app_number` picks the collector port.
    pub fn register_station(
        &mut self,
        station: MacAddress,
        coordinator: MacAddress,
        app_number: u16,
        installer: &mut dyn TrafficInstaller,
    ) -> Result<(), DmgError> {
        let source = self.registry.identity_of(&station)?;
        let destination = self.registry.identity_of(&coordinator)?;
        let port = BASE_COLLECTOR_PORT.checked_add(app_number).ok_or_else(|| {
            DmgError::InvalidConfig(format!(
                "application number {} puts the collector port past {}",
                app_number,
                u16::MAX
            ))
        })?;

        self.pairs
            .register_pair(source, destination, coordinator, port, installer)?;
        self.retrain.register(station);
        Ok(())
    }

    /// Print the status table header (plain mode only) and return when the
    /// first sample is due.
    pub fn start(&mut self) -> SimTime {
        info!(
            "orchestrating {} pairs, sampling every {} ms, retrain every {} intervals",
            self.pairs.len(),
            self.config.sample_period_ms,
            self.config.retrain_threshold
        );

        if self.config.output_mode == OutputMode::Plain {
            let header = plain_header(self.pairs.len());
            self.emit(&header);
        }
        self.sampler.next_fire()
    }

    pub fn handle(
        &mut self,
        now: SimTime,
        event: Event,
        beamforming: &mut dyn BeamformingControl,
    ) -> Result<(), DmgError> {
        match event {
            Event::Associated {
                node,
                station,
                coordinator,
                aid,
            } => {
                self.check_node(node, &station)?;
                if self.plain() {
                    self.emit(&format!(
                        "DMG STA {} associated with DMG PCP/AP {}, Association ID (AID) = {}",
                        station, coordinator, aid
                    ));
                }
                self.pairs.on_associated(node, coordinator, aid, now)?;
                self.retrain.on_associated(station, coordinator);
            }

            Event::Deassociated {
                node,
                station,
                coordinator,
            } => {
                self.check_node(node, &station)?;
                if self.plain() {
                    self.emit(&format!(
                        "DMG STA {} deassociated from DMG PCP/AP {}",
                        station, coordinator
                    ));
                }
                self.pairs.on_deassociated(node, coordinator, now)?;
                self.retrain.on_deassociated(station);
            }

            Event::SectorSweepCompleted {
                reporter,
                role,
                bssid,
                responder,
                trace_index,
                sector,
                antenna,
            } => {
                let row = sector_sweep_row(
                    &self.registry,
                    reporter,
                    &responder,
                    trace_index,
                    sector,
                    antenna,
                    role,
                    &bssid,
                    now,
                )?;
                self.traces.record(TraceRecord::SectorSweep(row));

                if self.plain() {
                    self.emit(&format!(
                        "DMG STA: {} Address: {} Sector ID: {} Antenna ID: {}",
                        reporter, responder, sector, antenna
                    ));
                }
            }

            Event::BeaconIntervalStarted { station } => {
                if let Some(request) = self.retrain.on_interval_started(station) {
                    beamforming.initiate_txss(request.station, request.coordinator, now);
                    self.retrain_requests += 1;
                }
            }

            Event::FrameReceived {
                receiver,
                transmitter,
                frame,
                snr,
            } => {
                let row = signal_quality_row(
                    receiver,
                    transmitter,
                    frame,
                    snr,
                    self.config.report_data_snr,
                    now,
                );
                if let Some(row) = row {
                    self.traces.record(TraceRecord::SignalQuality(row));
                }
            }
        }
        Ok(())
    }

    /// Sample throughput, print the status line and return when the next
    /// sample is due.
    pub fn on_sample_tick(&mut self, now: SimTime) -> SimTime {
        let sample = self.sampler.sample(&mut self.pairs, now);
        let line = sample.format(self.config.output_mode);
        self.emit(&line);
        debug!("sample at {} ns: total {} Mbps", now, sample.total);
        self.sampler.next_fire()
    }

    /// Drain final per-link statistics and flush everything.
    pub fn finish(&mut self) -> io::Result<Vec<LinkStatistics>> {
        let stats = self.pairs.link_statistics(self.config.simulation_time());

        if self.plain() {
            let mut report = String::from("\nApplication Layer Statistics:");
            for (link, s) in stats.iter().enumerate() {
                report.push_str(&format!(
                    "\nCommunication Link ({}) Statistics:\
                     \n  Tx Packets: {}\
                     \n  Tx Bytes:   {}\
                     \n  Rx Packets: {}\
                     \n  Rx Bytes:   {}\
                     \n  Throughput: {} Mbps",
                    link + 1,
                    s.tx_packets,
                    s.tx_bytes,
                    s.rx_packets,
                    s.rx_bytes,
                    format_rate(s.throughput_mbps)
                ));
            }
            self.emit(&report);
        }

        info!(
            "run finished: {} links, {} retrain requests",
            stats.len(),
            self.retrain_requests
        );

        self.traces.flush()?;
        self.output.flush()?;
        Ok(stats)
    }

    /// The node index carried by an event must be the station's own
    fn check_node(&self, node: NodeIndex, station: &MacAddress) -> Result<(), DmgError> {
        let registered = self.registry.identity_of(station)?;
        if registered != node {
            return Err(DmgError::NodeMismatch {
                station: *station,
                node,
                registered,
            });
        }
        Ok(())
    }

    fn plain(&self) -> bool {
        self.config.output_mode == OutputMode::Plain
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.output, "{}", line) {
            if !self.output_failed {
                error!("Error writing status output: {}", e);
                self.output_failed = true;
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn pairs(&self) -> &TrafficPairs {
        &self.pairs
    }

    pub fn retrain(&self) -> &RetrainTrigger {
        &self.retrain
    }

    pub fn traces(&self) -> &S {
        &self.traces
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn retrain_requests(&self) -> usize {
        self.retrain_requests
    }
}
