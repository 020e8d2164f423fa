use crate::domain::order::UserId;
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

/// One `user,order` row of an order import file.
///
/// The order number is kept raw; validation happens when it is registered.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OrderSubmission {
    pub user: UserId,
    pub order: String,
}

/// Reads order submissions from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<OrderSubmission>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    /// Creates a new `OrderReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes submissions.
    pub fn submissions(self) -> impl Iterator<Item = Result<OrderSubmission>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
