//! Trace rows for beamforming and link quality analysis
//!
//! Two independent streams are produced:
//!
//! - **sector sweep** (`slsResults.csv`): one row per completed SLS, ids
//!   shifted by [`crate::dmg_interface::DISPLAY_ID_OFFSET`] so the Q-D visualizer can keep slot 0
//!   for itself
//! - **signal quality** (`snrValues.csv`): SNR of received beamforming
//!   training frames, plus QoS data frames when asked for
//!
//! Row construction is pure; sinks decide where rows go.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::error;

use crate::dmg_interface::{
    AntennaId, DmgError, FrameType, MacAddress, NodeIndex, SectorId, SimTime, StationRole,
};
use crate::dmg_registry::{display_id, PeerRegistry};

pub const SECTOR_SWEEP_FILE: &str = "slsResults.csv";
pub const SIGNAL_QUALITY_FILE: &str = "snrValues.csv";

pub const SECTOR_SWEEP_HEADER: &str =
    "SRC_ID,DST_ID,TRACE_IDX,SECTOR_ID,ANTENNA_ID,ROLE,BSS_ID,Timestamp";
pub const SIGNAL_QUALITY_HEADER: &str = "TIME,SRC,DST,SNR";

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SectorSweepRow {
    pub source_id: u32,
    pub responder_id: u32,
    pub trace_index: u32,
    pub sector: SectorId,
    pub antenna: AntennaId,
    pub role: u8,
    pub bss_id: u32,
    pub timestamp: SimTime,
}

impl fmt::Display for SectorSweepRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{}",
            self.source_id,
            self.responder_id,
            self.trace_index,
            self.sector,
            self.antenna,
            self.role,
            self.bss_id,
            self.timestamp
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalQualityRow {
    pub timestamp: SimTime,
    pub transmitter: MacAddress,
    pub receiver: MacAddress,
    pub snr: f64,
}

impl fmt::Display for SignalQualityRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.timestamp, self.transmitter, self.receiver, self.snr
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceRecord {
    SectorSweep(SectorSweepRow),
    SignalQuality(SignalQualityRow),
}

/// Row for a completed sector sweep reported by node `reporter`
#[allow(clippy::too_many_arguments)]
pub fn sector_sweep_row(
    registry: &PeerRegistry,
    reporter: NodeIndex,
    responder: &MacAddress,
    trace_index: u32,
    sector: SectorId,
    antenna: AntennaId,
    role: StationRole,
    bssid: &MacAddress,
    now: SimTime,
) -> Result<SectorSweepRow, DmgError> {
    Ok(SectorSweepRow {
        source_id: display_id(reporter),
        responder_id: registry.display_id_of(responder)?,
        trace_index,
        sector,
        antenna,
        role: role.code(),
        bss_id: registry.display_id_of(bssid)?,
        timestamp: now,
    })
}

/// Row for a received frame, or None when the frame type is not traced
pub fn signal_quality_row(
    receiver: MacAddress,
    transmitter: MacAddress,
    frame: FrameType,
    snr: f64,
    report_data_snr: bool,
    now: SimTime,
) -> Option<SignalQualityRow> {
    let traced = frame.is_beamforming_training() || (frame == FrameType::QosData && report_data_snr);
    if !traced {
        return None;
    }

    Some(SignalQualityRow {
        timestamp: now,
        transmitter,
        receiver,
        snr,
    })
}

// ============================================================================
// Sinks
// ============================================================================

/// Consumer of trace rows
pub trait TraceSink {
    fn record(&mut self, record: TraceRecord);

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Drops everything
pub struct NoOpTraceSink;

impl TraceSink for NoOpTraceSink {
    #[inline(always)]
    fn record(&mut self, _record: TraceRecord) {}
}

/// Writes the two streams as CSV, header first
pub struct CsvTraceSink<W: Write> {
    sector_sweep: W,
    signal_quality: W,
    write_failed: bool,
}

impl CsvTraceSink<BufWriter<File>> {
    /// Create both trace files inside `dir`
    pub fn create<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref();
        let sector_sweep = BufWriter::new(File::create(dir.join(SECTOR_SWEEP_FILE))?);
        let signal_quality = BufWriter::new(File::create(dir.join(SIGNAL_QUALITY_FILE))?);
        Self::from_writers(sector_sweep, signal_quality)
    }
}

impl<W: Write> CsvTraceSink<W> {
    pub fn from_writers(mut sector_sweep: W, mut signal_quality: W) -> io::Result<Self> {
        writeln!(sector_sweep, "{}", SECTOR_SWEEP_HEADER)?;
        writeln!(signal_quality, "{}", SIGNAL_QUALITY_HEADER)?;

        Ok(Self {
            sector_sweep,
            signal_quality,
            write_failed: false,
        })
    }

    /// Flush and hand back the (sector sweep, signal quality) writers
    pub fn into_writers(mut self) -> (W, W) {
        let _ = self.sector_sweep.flush();
        let _ = self.signal_quality.flush();
        (self.sector_sweep, self.signal_quality)
    }
}

impl<W: Write> TraceSink for CsvTraceSink<W> {
    fn record(&mut self, record: TraceRecord) {
        let result = match &record {
            TraceRecord::SectorSweep(row) => writeln!(self.sector_sweep, "{}", row),
            TraceRecord::SignalQuality(row) => writeln!(self.signal_quality, "{}", row),
        };

        if let Err(e) = result {
            if !self.write_failed {
                error!("Error writing trace row: {}", e);
                self.write_failed = true;
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sector_sweep.flush()?;
        self.signal_quality.flush()
    }
}

/// Keeps rows in memory for programmatic analysis
#[derive(Default)]
pub struct CollectorTraceSink {
    pub records: Vec<TraceRecord>,
}

impl CollectorTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sector_sweeps(&self) -> impl Iterator<Item = &SectorSweepRow> {
        self.records.iter().filter_map(|r| match r {
            TraceRecord::SectorSweep(row) => Some(row),
            _ => None,
        })
    }

    pub fn signal_quality(&self) -> impl Iterator<Item = &SignalQualityRow> {
        self.records.iter().filter_map(|r| match r {
            TraceRecord::SignalQuality(row) => Some(row),
            _ => None,
        })
    }
}

impl TraceSink for CollectorTraceSink {
    fn record(&mut self, record: TraceRecord) {
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmg_interface::DISPLAY_ID_OFFSET;
    use tempfile::TempDir;

    fn registry(stations: u32) -> PeerRegistry {
        PeerRegistry::build((0..=stations).map(|i| (MacAddress::from_index(i as u64 + 1), i)))
            .unwrap()
    }

    #[test]
    fn test_sector_sweep_row_shifts_ids() {
        let registry = registry(10);
        let ap = MacAddress::from_index(1);

        let row = sector_sweep_row(&registry, 3, &ap, 17, 12, 1, StationRole::DmgSta, &ap, 123_456)
            .unwrap();

        assert_eq!(row.source_id, 4);
        assert_eq!(row.responder_id, 1);
        assert_eq!(row.bss_id, 1);
        assert_eq!(row.to_string(), "4,1,17,12,1,8,1,123456");
        assert_eq!(DISPLAY_ID_OFFSET, 1);
    }

    #[test]
    fn test_sector_sweep_unknown_responder_is_error() {
        let registry = registry(2);
        let stranger = MacAddress::from_index(50);
        let ap = MacAddress::from_index(1);

        let result =
            sector_sweep_row(&registry, 1, &stranger, 0, 1, 1, StationRole::DmgSta, &ap, 0);
        assert_eq!(result, Err(DmgError::UnknownAddress(stranger)));
    }

    #[test]
    fn test_signal_quality_filter() {
        let rx = MacAddress::from_index(1);
        let tx = MacAddress::from_index(2);

        for frame in [
            FrameType::DmgBeacon,
            FrameType::SectorSweep,
            FrameType::SectorSweepFeedback,
            FrameType::SectorSweepAck,
        ] {
            assert!(signal_quality_row(rx, tx, frame, 10.0, false, 0).is_some());
        }

        assert!(signal_quality_row(rx, tx, FrameType::QosData, 10.0, false, 0).is_none());
        assert!(signal_quality_row(rx, tx, FrameType::QosData, 10.0, true, 0).is_some());
        assert!(signal_quality_row(rx, tx, FrameType::Ack, 10.0, true, 0).is_none());
        assert!(signal_quality_row(rx, tx, FrameType::Other, 10.0, true, 0).is_none());
    }

    #[test]
    fn test_signal_quality_row_format() {
        let row = signal_quality_row(
            MacAddress::from_index(1),
            MacAddress::from_index(3),
            FrameType::SectorSweep,
            21.5,
            false,
            1_000_000,
        )
        .unwrap();
        assert_eq!(row.to_string(), "1000000,00:00:00:00:00:03,00:00:00:00:00:01,21.5");
    }

    #[test]
    fn test_csv_sink_writes_headers_then_rows() {
        let mut sink = CsvTraceSink::from_writers(Vec::new(), Vec::new()).unwrap();
        sink.record(TraceRecord::SignalQuality(SignalQualityRow {
            timestamp: 5,
            transmitter: MacAddress::from_index(2),
            receiver: MacAddress::from_index(1),
            snr: 3.25,
        }));

        let (sls, snr) = sink.into_writers();
        assert_eq!(String::from_utf8(sls).unwrap(), format!("{}\n", SECTOR_SWEEP_HEADER));
        assert_eq!(
            String::from_utf8(snr).unwrap(),
            "TIME,SRC,DST,SNR\n5,00:00:00:00:00:02,00:00:00:00:00:01,3.25\n"
        );
    }

    #[test]
    fn test_csv_sink_creates_both_files() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvTraceSink::create(dir.path()).unwrap();

        let registry = registry(1);
        let ap = MacAddress::from_index(1);
        let row = sector_sweep_row(&registry, 1, &ap, 0, 7, 1, StationRole::DmgSta, &ap, 99)
            .unwrap();
        sink.record(TraceRecord::SectorSweep(row));
        sink.flush().unwrap();

        let sls = std::fs::read_to_string(dir.path().join(SECTOR_SWEEP_FILE)).unwrap();
        let snr = std::fs::read_to_string(dir.path().join(SIGNAL_QUALITY_FILE)).unwrap();

        assert_eq!(
            sls,
            "SRC_ID,DST_ID,TRACE_IDX,SECTOR_ID,ANTENNA_ID,ROLE,BSS_ID,Timestamp\n2,1,0,7,1,8,1,99\n"
        );
        assert_eq!(snr, "TIME,SRC,DST,SNR\n");
    }

    #[test]
    fn test_csv_sink_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(CsvTraceSink::create(dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_collector_queries() {
        let mut sink = CollectorTraceSink::new();
        sink.record(TraceRecord::SignalQuality(SignalQualityRow {
            timestamp: 1,
            transmitter: MacAddress::from_index(2),
            receiver: MacAddress::from_index(1),
            snr: 1.0,
        }));
        assert_eq!(sink.signal_quality().count(), 1);
        assert_eq!(sink.sector_sweeps().count(), 0);
    }
}
