/// Maximum number of distinct ports remembered per SRV target or backend.
pub const PORT_SET_CAPACITY: usize = 16;

/// Small fixed-capacity port set with find-or-insert semantics.
///
/// Slot indexes are stable for the lifetime of the set, so callers can keep
/// per-port counters in parallel arrays indexed by the returned slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortSet {
    ports: [u16; PORT_SET_CAPACITY],
    len: usize,
}

impl PortSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot index of `port`, inserting it if absent. `None` when the set is
    /// full and the port is not already a member.
    pub fn find_or_insert(&mut self, port: u16) -> Option<usize> {
        if let Some(i) = self.ports[..self.len].iter().position(|&p| p == port) {
            return Some(i);
        }
        if self.len == PORT_SET_CAPACITY {
            return None;
        }
        self.ports[self.len] = port;
        self.len += 1;
        Some(self.len - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, u16)> + '_ {
        self.ports[..self.len].iter().copied().enumerate()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_returns_stable_slots() {
        let mut set = PortSet::new();
        assert_eq!(set.find_or_insert(80), Some(0));
        assert_eq!(set.find_or_insert(443), Some(1));
        assert_eq!(set.find_or_insert(80), Some(0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut set = PortSet::new();
        for port in 1..=16 {
            assert!(set.find_or_insert(port).is_some());
        }
        assert_eq!(set.find_or_insert(17), None);
        assert_eq!(set.len(), PORT_SET_CAPACITY);
        // Existing members are still found when full.
        assert_eq!(set.find_or_insert(7), Some(6));
    }
}
