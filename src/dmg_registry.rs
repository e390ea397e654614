use hashbrown::HashMap;
use std::collections::BTreeMap;

use crate::dmg_interface::{DmgError, MacAddress, NodeIndex, DISPLAY_ID_OFFSET};

/// Maps device addresses to the compact node indices used in trace output
///
/// Built once from every device in the topology (coordinator included) and
/// never changed afterwards. The mapping is a bijection: duplicates on
/// either side are rejected at build time.
///
/// # Example
/// ```rust
/// use dmg_rust::dmg_interface::MacAddress;
/// use dmg_rust::dmg_registry::PeerRegistry;
///
/// let ap = MacAddress::from_index(1);
/// let sta = MacAddress::from_index(2);
/// let registry = PeerRegistry::build(vec![(ap, 0), (sta, 1)]).unwrap();
///
/// assert_eq!(registry.identity_of(&sta), Ok(1));
/// assert_eq!(registry.display_id_of(&sta), Ok(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    by_address: HashMap<MacAddress, NodeIndex>,
    by_index: BTreeMap<NodeIndex, MacAddress>,
}

impl PeerRegistry {
    pub fn build<I>(devices: I) -> Result<Self, DmgError>
    where
        I: IntoIterator<Item = (MacAddress, NodeIndex)>,
    {
        let mut registry = Self::default();

        for (address, index) in devices {
            if registry.by_address.contains_key(&address) {
                return Err(DmgError::DuplicateAddress(address));
            }
            if registry.by_index.contains_key(&index) {
                return Err(DmgError::DuplicateIndex(index));
            }
            registry.by_address.insert(address, index);
            registry.by_index.insert(index, address);
        }

        Ok(registry)
    }

    /// Node index of a live participant
    pub fn identity_of(&self, address: &MacAddress) -> Result<NodeIndex, DmgError> {
        self.by_address
            .get(address)
            .copied()
            .ok_or(DmgError::UnknownAddress(*address))
    }

    /// Id as printed in the sweep trace
    pub fn display_id_of(&self, address: &MacAddress) -> Result<u32, DmgError> {
        self.identity_of(address).map(display_id)
    }

    pub fn address_of(&self, index: NodeIndex) -> Option<MacAddress> {
        self.by_index.get(&index).copied()
    }

    pub fn contains(&self, address: &MacAddress) -> bool {
        self.by_address.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

pub fn display_id(index: NodeIndex) -> u32 {
    index + DISPLAY_ID_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology(stations: u32) -> Vec<(MacAddress, NodeIndex)> {
        (0..=stations)
            .map(|i| (MacAddress::from_index(i as u64 + 1), i))
            .collect()
    }

    #[test]
    fn test_lookup_every_participant() {
        let devices = topology(10);
        let registry = PeerRegistry::build(devices.clone()).unwrap();

        assert_eq!(registry.len(), 11);
        for (address, index) in devices {
            assert_eq!(registry.identity_of(&address), Ok(index));
            assert_eq!(registry.address_of(index), Some(address));
        }
    }

    #[test]
    fn test_display_ids_offset_by_one_for_all_sizes() {
        for stations in 1..=16 {
            let registry = PeerRegistry::build(topology(stations)).unwrap();
            for index in 0..=stations {
                let address = registry.address_of(index).unwrap();
                assert_eq!(registry.display_id_of(&address), Ok(index + 1));
            }
        }
    }

    #[test]
    fn test_unknown_address_is_an_error() {
        let registry = PeerRegistry::build(topology(2)).unwrap();
        let stranger = MacAddress::from_index(99);

        assert!(!registry.contains(&stranger));
        assert_eq!(
            registry.identity_of(&stranger),
            Err(DmgError::UnknownAddress(stranger))
        );
    }

    #[test]
    fn test_rejects_duplicate_address() {
        let a = MacAddress::from_index(1);
        let result = PeerRegistry::build(vec![(a, 0), (a, 1)]);
        assert_eq!(result.unwrap_err(), DmgError::DuplicateAddress(a));
    }

    #[test]
    fn test_rejects_duplicate_index() {
        let result = PeerRegistry::build(vec![
            (MacAddress::from_index(1), 3),
            (MacAddress::from_index(2), 3),
        ]);
        assert_eq!(result.unwrap_err(), DmgError::DuplicateIndex(3));
    }
}
