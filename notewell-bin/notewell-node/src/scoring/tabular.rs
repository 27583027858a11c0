use std::collections::BTreeMap;

/// Column-major tabular inputs for the MF core scorer. The core works on
/// dense integer note ids; the adapter owns the UUID mapping and this module
/// never sees a UUID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingsTable {
    pub note_ids: Vec<i64>,
    pub rater_ids: Vec<i64>,
    pub helpfulness: Vec<f64>,
}

impl RatingsTable {
    pub fn len(&self) -> usize {
        self.note_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.note_ids.is_empty()
    }

    pub fn push(&mut self, note_id: i64, rater_id: i64, helpfulness: f64) {
        self.note_ids.push(note_id);
        self.rater_ids.push(rater_id);
        self.helpfulness.push(helpfulness);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteStatusTable {
    pub note_ids: Vec<i64>,
    pub current_status: Vec<String>,
}

impl NoteStatusTable {
    pub fn push(&mut self, note_id: i64, status: String) {
        self.note_ids.push(note_id);
        self.current_status.push(status);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserEnrollmentTable {
    pub participant_ids: Vec<i64>,
}

/// Note topics are accepted for interface parity with the core scorer but are
/// not populated yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteTopicsTable {
    pub note_ids: Vec<i64>,
}

/// Bidirectional mapping between entity UUID strings and the dense, sorted
/// 1-based integer ids the MF core requires. The mapping never leaks outside
/// the adapter.
#[derive(Debug, Clone, Default)]
pub struct IdMapping {
    forward: BTreeMap<String, i64>,
    reverse: BTreeMap<i64, String>,
}

impl IdMapping {
    /// Builds a mapping from a set of UUID strings. Ids are assigned in
    /// sorted order starting at 1, so the same input set always produces the
    /// same mapping.
    pub fn build<I: IntoIterator<Item = String>>(ids: I) -> Self {
        let mut unique: Vec<String> = ids.into_iter().collect();
        unique.sort();
        unique.dedup();

        let mut mapping = IdMapping::default();
        for (index, uuid) in unique.into_iter().enumerate() {
            let int_id = index as i64 + 1;
            mapping.forward.insert(uuid.clone(), int_id);
            mapping.reverse.insert(int_id, uuid);
        }
        mapping
    }

    pub fn to_int(&self, uuid: &str) -> Option<i64> {
        self.forward.get(uuid).copied()
    }

    pub fn to_uuid(&self, int_id: i64) -> Option<&str> {
        self.reverse.get(&int_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
