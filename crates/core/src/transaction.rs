use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::money::Money;

/// Fields of a [`ParsedTransaction`] that carry a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Amount,
    Date,
    Description,
    Category,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Amount => write!(f, "amount"),
            Field::Date => write!(f, "date"),
            Field::Description => write!(f, "description"),
            Field::Category => write!(f, "category"),
        }
    }
}

/// Candidate transaction reconstructed from document text.
///
/// A parser never produces a record where both `amount` and `description`
/// are absent; see [`ParsedTransaction::is_usable`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub amount: Option<Money>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Per-field certainty in `[0, 1]`.
    pub confidence: Option<BTreeMap<Field, f32>>,
}

impl ParsedTransaction {
    pub fn is_usable(&self) -> bool {
        self.amount.is_some() || self.description.is_some()
    }

    /// Record a score for `field`, clamped to `[0, 1]`.
    pub fn set_confidence(&mut self, field: Field, score: f32) {
        self.confidence
            .get_or_insert_with(BTreeMap::new)
            .insert(field, score.clamp(0.0, 1.0));
    }

    pub fn confidence_of(&self, field: Field) -> Option<f32> {
        self.confidence.as_ref()?.get(&field).copied()
    }
}
