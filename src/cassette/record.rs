//! A named, cursor-bearing sequence of exchanges

use crate::mock::Exchange;
use crate::{PlaybackError, Result};

/// An ordered list of exchanges with a read cursor.
///
/// Records know nothing about HTTP or JSON; they are a cursor over opaque
/// [`Exchange`] values. The cursor always satisfies `0 <= index <= len`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    name: String,
    exchanges: Vec<Exchange>,
    index: usize,
}

impl Record {
    /// Create an empty record for recording.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exchanges: Vec::new(),
            index: 0,
        }
    }

    /// Create a record over existing exchanges with the cursor at 0.
    #[must_use]
    pub fn with_exchanges(name: impl Into<String>, exchanges: Vec<Exchange>) -> Self {
        Self {
            name: name.into(),
            exchanges,
            index: 0,
        }
    }

    /// Record name, unique within its cassette.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The exchange under the cursor; advances the cursor by one.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::EndOfRecord`] when the cursor is past the
    /// last exchange.
    pub fn read(&mut self) -> Result<&Exchange> {
        let exchange = self
            .exchanges
            .get(self.index)
            .ok_or_else(|| PlaybackError::EndOfRecord(self.name.clone()))?;
        self.index += 1;
        Ok(exchange)
    }

    /// Append an exchange at the tail and advance the cursor past it.
    pub fn write(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
        self.index = self.exchanges.len();
    }

    /// Reset the cursor to the start.
    pub fn rewind(&mut self) {
        self.index = 0;
    }

    /// Number of exchanges in the record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Whether the record holds no exchanges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// The exchanges in recording order.
    #[must_use]
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }
}
