use crate::core::{
    pipeline::{RecordFilter, StageResult},
    record::Record,
};

/// Filters records whose header number lies inside an inclusive range.
///
/// Note the predicate direction: records *inside* `[lower_bound,
/// upper_bound]` are dropped, every other record passes through.
pub struct RecordNumberBetweenFilter {
    lower_bound: u64,
    upper_bound: u64,
}

impl RecordNumberBetweenFilter {
    pub fn new(lower_bound: u64, upper_bound: u64) -> Self {
        RecordNumberBetweenFilter {
            lower_bound,
            upper_bound,
        }
    }
}

impl<P> RecordFilter<P> for RecordNumberBetweenFilter {
    fn filter(&mut self, record: Record<P>) -> StageResult<P> {
        let number = record.header().number();
        if number >= self.lower_bound && number <= self.upper_bound {
            Ok(None)
        } else {
            Ok(Some(record))
        }
    }
}
