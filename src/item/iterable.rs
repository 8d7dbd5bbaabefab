use crate::core::io::{ReadResult, RecordReader};

/// Reads payloads from any in-memory collection or iterator.
///
/// # Example
///
/// ```
/// use batchflow::core::io::RecordReader;
/// use batchflow::item::IterableRecordReader;
///
/// let mut reader = IterableRecordReader::new(vec!["a", "b"]);
///
/// assert_eq!(reader.read().unwrap(), Some("a"));
/// assert_eq!(reader.read().unwrap(), Some("b"));
/// assert_eq!(reader.read().unwrap(), None);
/// ```
pub struct IterableRecordReader<It: Iterator> {
    items: It,
}

impl<It: Iterator> IterableRecordReader<It> {
    pub fn new(items: impl IntoIterator<IntoIter = It>) -> Self {
        IterableRecordReader {
            items: items.into_iter(),
        }
    }
}

impl<P, It: Iterator<Item = P>> RecordReader<P> for IterableRecordReader<It> {
    fn read(&mut self) -> ReadResult<P> {
        Ok(self.items.next())
    }

    fn source_name(&self) -> &str {
        "in-memory collection"
    }
}
