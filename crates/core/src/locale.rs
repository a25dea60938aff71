use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported document locales. Drives number separators, numeric date order,
/// and which built-in category dictionary is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Indonesian: `1.250.000,50`, day-first dates.
    #[default]
    Id,
    /// English (US): `1,250,000.50`, month-first dates.
    En,
}

impl Locale {
    pub fn decimal_separator(self) -> char {
        match self {
            Locale::Id => ',',
            Locale::En => '.',
        }
    }

    pub fn thousands_separator(self) -> char {
        match self {
            Locale::Id => '.',
            Locale::En => ',',
        }
    }

    /// Whether `a/b/yyyy` reads as day/month.
    pub fn day_first(self) -> bool {
        matches!(self, Locale::Id)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::Id => write!(f, "id"),
            Locale::En => write!(f, "en"),
        }
    }
}

impl std::str::FromStr for Locale {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" | "id-id" => Ok(Locale::Id),
            "en" | "en-us" => Ok(Locale::En),
            other => Err(format!("Unknown locale: '{other}'")),
        }
    }
}
