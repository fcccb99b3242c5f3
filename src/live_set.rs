use std::collections::HashSet;

/// Plate strings already emitted during the current capture session.
#[derive(Debug, Default)]
pub struct LiveSet {
    plates: HashSet<String>,
}

impl LiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the plate was not seen before in this session.
    pub fn insert(&mut self, plate: &str) -> bool {
        if self.plates.contains(plate) {
            return false;
        }
        self.plates.insert(plate.to_string())
    }

    pub fn contains(&self, plate: &str) -> bool {
        self.plates.contains(plate)
    }

    pub fn len(&self) -> usize {
        self.plates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    pub fn reset(&mut self) {
        self.plates.clear();
    }
}
