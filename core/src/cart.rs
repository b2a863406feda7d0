//! Client-side staging list of related items with quantities.

use serde::Serialize;

use crate::error::ValidationError;
use crate::types::Record;

/// Smallest quantity a cart line can hold.
pub const MIN_AMOUNT: u32 = 1;

/// A related record staged with a quantity. Serializes as the record's
/// fields plus `amount`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub record: Record,
    pub amount: u32,
}

impl CartLine {
    pub fn new(mut record: Record, amount: u32) -> Self {
        record.remove("amount");
        Self { record, amount }
    }

    pub fn id(&self) -> Option<i64> {
        self.record.id()
    }

    /// The line as a display row, `amount` included.
    pub fn to_row(&self) -> Record {
        let mut row = self.record.clone();
        row.insert("amount", self.amount);
        row
    }
}

/// Ordered cart lines, unique by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id() == Some(id))
    }

    /// Stage `id`: bump the amount of an existing line, or copy the item out
    /// of `catalog` with amount 1. Returns the line's new amount.
    pub fn add(&mut self, id: i64, catalog: &[Record]) -> Result<u32, ValidationError> {
        if id == 0 {
            return Err(ValidationError::NoSelection);
        }
        if let Some(line) = self.lines.iter_mut().find(|line| line.id() == Some(id)) {
            line.amount = line.amount.saturating_add(1);
            return Ok(line.amount);
        }
        let record = catalog
            .iter()
            .find(|record| record.id() == Some(id))
            .ok_or(ValidationError::UnknownItem(id))?;
        self.lines.push(CartLine::new(record.clone(), 1));
        Ok(1)
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.id() != Some(id));
        self.lines.len() != before
    }

    /// Overwrite the amount of line `id` from raw input text. Non-numeric and
    /// non-positive input is rejected and resets the line to `MIN_AMOUNT`.
    pub fn set_amount(&mut self, id: i64, raw: &str) -> Result<u32, ValidationError> {
        let line = self
            .lines
            .iter_mut()
            .find(|line| line.id() == Some(id))
            .ok_or(ValidationError::UnknownCartLine(id))?;
        match parse_amount(raw) {
            Ok(amount) => {
                line.amount = amount;
                Ok(amount)
            }
            Err(err) => {
                line.amount = MIN_AMOUNT;
                Err(err)
            }
        }
    }

    /// Replace the contents, merging duplicate ids by summing amounts.
    pub fn seed(&mut self, lines: Vec<CartLine>) {
        self.lines.clear();
        for line in lines {
            match self.lines.iter_mut().find(|existing| existing.id() == line.id()) {
                Some(existing) => existing.amount = existing.amount.saturating_add(line.amount),
                None => self.lines.push(line),
            }
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn rows(&self) -> Vec<Record> {
        self.lines.iter().map(CartLine::to_row).collect()
    }
}

fn parse_amount(raw: &str) -> Result<u32, ValidationError> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => u32::try_from(value).map_err(|_| ValidationError::NonPositiveAmount(raw.to_string())),
        _ => Err(ValidationError::NonPositiveAmount(raw.to_string())),
    }
}
