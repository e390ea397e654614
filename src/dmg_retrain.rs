use hashbrown::HashMap;
use log::debug;

use crate::dmg_interface::{DmgError, MacAddress};

/// Request for an out-of-schedule TXSS from `station` towards its coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrainRequest {
    pub station: MacAddress,
    pub coordinator: MacAddress,
}

#[derive(Debug, Clone, Copy, Default)]
struct RetrainState {
    counter: u16,
    coordinator: Option<MacAddress>,
}

/// Counts beacon intervals per station and asks for beam re-training every
/// `threshold` intervals.
///
/// Counting only happens while a station is associated. Intervals seen while
/// detached leave the counter exactly where it was, so association churn
/// neither advances nor resets it.
pub struct RetrainTrigger {
    threshold: u16,
    stations: HashMap<MacAddress, RetrainState>,
}

impl RetrainTrigger {
    pub fn new(threshold: u16) -> Result<Self, DmgError> {
        if threshold == 0 {
            return Err(DmgError::InvalidConfig(
                "retrain threshold must be positive".into(),
            ));
        }
        Ok(Self {
            threshold,
            stations: HashMap::new(),
        })
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// Create a zero counter for a station at setup time
    pub fn register(&mut self, station: MacAddress) {
        self.stations.insert(station, RetrainState::default());
    }

    pub fn on_associated(&mut self, station: MacAddress, coordinator: MacAddress) {
        self.stations.entry(station).or_default().coordinator = Some(coordinator);
    }

    pub fn on_deassociated(&mut self, station: MacAddress) {
        if let Some(state) = self.stations.get_mut(&station) {
            state.coordinator = None;
        }
    }

    pub fn is_associated(&self, station: &MacAddress) -> bool {
        self.stations
            .get(station)
            .map_or(false, |state| state.coordinator.is_some())
    }

    pub fn counter(&self, station: &MacAddress) -> Option<u16> {
        self.stations.get(station).map(|state| state.counter)
    }

    /// Beacon interval started at `station`
    pub fn on_interval_started(&mut self, station: MacAddress) -> Option<RetrainRequest> {
        let state = self.stations.get_mut(&station)?;
        let coordinator = state.coordinator?;

        state.counter += 1;
        if state.counter < self.threshold {
            return None;
        }

        state.counter = 0;
        debug!("retrain threshold reached for {}, TXSS towards {}", station, coordinator);
        Some(RetrainRequest {
            station,
            coordinator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sta() -> MacAddress {
        MacAddress::from_index(2)
    }

    fn ap() -> MacAddress {
        MacAddress::from_index(1)
    }

    #[test]
    fn test_threshold_three_fires_once_then_restarts() {
        let mut trigger = RetrainTrigger::new(3).unwrap();
        trigger.register(sta());
        trigger.on_associated(sta(), ap());

        assert_eq!(trigger.on_interval_started(sta()), None);
        assert_eq!(trigger.on_interval_started(sta()), None);
        assert_eq!(
            trigger.on_interval_started(sta()),
            Some(RetrainRequest {
                station: sta(),
                coordinator: ap()
            })
        );
        assert_eq!(trigger.counter(&sta()), Some(0));

        assert_eq!(trigger.on_interval_started(sta()), None);
        assert_eq!(trigger.counter(&sta()), Some(1));
    }

    #[test]
    fn test_unassociated_intervals_leave_counter_alone() {
        let mut trigger = RetrainTrigger::new(10).unwrap();
        trigger.register(sta());

        for _ in 0..25 {
            assert_eq!(trigger.on_interval_started(sta()), None);
        }
        assert_eq!(trigger.counter(&sta()), Some(0));

        trigger.on_associated(sta(), ap());
        for _ in 0..4 {
            trigger.on_interval_started(sta());
        }
        trigger.on_deassociated(sta());
        for _ in 0..25 {
            assert_eq!(trigger.on_interval_started(sta()), None);
        }
        assert_eq!(trigger.counter(&sta()), Some(4));

        // picks up where it left off
        trigger.on_associated(sta(), ap());
        for _ in 0..5 {
            assert_eq!(trigger.on_interval_started(sta()), None);
        }
        assert!(trigger.on_interval_started(sta()).is_some());
    }

    #[test]
    fn test_counter_never_reaches_threshold() {
        let mut trigger = RetrainTrigger::new(4).unwrap();
        trigger.on_associated(sta(), ap());

        let mut fired = 0;
        for _ in 0..100 {
            if trigger.on_interval_started(sta()).is_some() {
                fired += 1;
            }
            assert!(trigger.counter(&sta()).unwrap() < 4);
        }
        assert_eq!(fired, 25);
    }

    #[test]
    fn test_request_targets_current_coordinator() {
        let other_ap = MacAddress::from_index(9);
        let mut trigger = RetrainTrigger::new(1).unwrap();
        trigger.on_associated(sta(), ap());
        assert_eq!(trigger.on_interval_started(sta()).unwrap().coordinator, ap());

        trigger.on_deassociated(sta());
        trigger.on_associated(sta(), other_ap);
        assert_eq!(trigger.on_interval_started(sta()).unwrap().coordinator, other_ap);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(matches!(
            RetrainTrigger::new(0),
            Err(DmgError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_station_ignored() {
        let mut trigger = RetrainTrigger::new(1).unwrap();
        assert_eq!(trigger.on_interval_started(sta()), None);
        assert_eq!(trigger.counter(&sta()), None);
        assert!(!trigger.is_associated(&sta()));
    }
}
