pub mod dictionary;
pub mod service;

pub use dictionary::{CategoryEntry, CategoryKeywordDictionary, DictionaryError};
pub use service::{
    CategorizationService, CategoryMatch, MatchSource, NullClassifier, SecondaryClassifier,
};
