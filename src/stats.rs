/// Running statistics for one station, in tenths of a degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatRecord {
    pub sum: i64,
    pub count: u64,
    pub min: i16,
    pub max: i16,
}

impl StatRecord {
    /// No observations yet: min and max start at the opposite extremes.
    pub const EMPTY: Self = Self {
        sum: 0,
        count: 0,
        min: i16::MAX,
        max: i16::MIN,
    };

    #[inline]
    pub fn update(&mut self, value: i16) {
        self.count += 1;
        self.sum += value as i64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &StatRecord) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Arithmetic mean in degrees, if anything was recorded.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / 10. / self.count as f64)
    }
}

impl Default for StatRecord {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// A fresh table with one empty record per dictionary id.
pub fn table(len: usize) -> Vec<StatRecord> {
    vec![StatRecord::EMPTY; len]
}

/// Folds per-worker tables into one, element by element.
/// All tables must have the same length; the result does not depend on their order.
pub fn reduce(tables: impl IntoIterator<Item = Vec<StatRecord>>) -> Option<Vec<StatRecord>> {
    tables.into_iter().reduce(|mut merged, table| {
        debug_assert_eq!(merged.len(), table.len());
        for (into, from) in merged.iter_mut().zip(table.iter()) {
            into.merge(from);
        }
        merged
    })
}
