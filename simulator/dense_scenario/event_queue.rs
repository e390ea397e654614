//! Time-ordered queue of substrate events.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use dmg_rust::dmg_interface::{NodeIndex, SimTime};

/// Things the substrate schedules for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// Station finishes association with the AP
    Associate(NodeIndex),
    /// Station loses its association
    Deassociate(NodeIndex),
    /// AP starts a beacon interval
    BeaconInterval,
    /// Station completes a sector sweep with the AP
    SectorSweep(NodeIndex),
    /// Move traffic of every running generator
    TrafficStep,
    /// Throughput sample falls due
    SampleTick,
    /// End of the run
    Stop,
}

/// Key for ordering events in the queue.
///
/// Events are ordered by time, then by insertion sequence so events scheduled
/// for the same instant run in FIFO order.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    pub time: SimTime,
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct EventQueue {
    events: BTreeMap<EventKey, SimEvent>,
    sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, time: SimTime, event: SimEvent) {
        let key = EventKey {
            time,
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.events.insert(key, event);
    }

    /// Earliest event, if any
    pub fn pop(&mut self) -> Option<(SimTime, SimEvent)> {
        self.events.pop_first().map(|(key, event)| (key.time, event))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key_ordering() {
        let earlier = EventKey {
            time: 1,
            sequence: 9,
        };
        let later = EventKey {
            time: 2,
            sequence: 0,
        };
        assert!(earlier < later);
    }

    #[test]
    fn test_same_time_is_fifo() {
        let mut queue = EventQueue::new();
        queue.schedule(50, SimEvent::SampleTick);
        queue.schedule(10, SimEvent::BeaconInterval);
        queue.schedule(50, SimEvent::Associate(3));
        queue.schedule(50, SimEvent::Stop);

        assert_eq!(queue.pop(), Some((10, SimEvent::BeaconInterval)));
        assert_eq!(queue.pop(), Some((50, SimEvent::SampleTick)));
        assert_eq!(queue.pop(), Some((50, SimEvent::Associate(3))));
        assert_eq!(queue.pop(), Some((50, SimEvent::Stop)));
        assert!(queue.is_empty());
    }
}
