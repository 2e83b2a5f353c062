use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingLogEntry {
    pub epoch: u32,
    pub loss: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// Training log entries, unique by epoch and sorted ascending.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct TrainingLog {
    entries: Vec<TrainingLogEntry>,
}

impl TrainingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `incoming`, replacing any entry with the same epoch.
    pub fn merge(&mut self, incoming: TrainingLogEntry) {
        match self
            .entries
            .binary_search_by_key(&incoming.epoch, |entry| entry.epoch)
        {
            Ok(index) => self.entries[index] = incoming,
            Err(index) => self.entries.insert(index, incoming),
        }
    }

    pub fn entries(&self) -> &[TrainingLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
