use std::sync::Arc;

use crate::dictionary::CategoryKeywordDictionary;

/// Extension point consulted when no keyword rule matches.
///
/// Implementations must be pure with respect to the service: the same
/// description may be classified from several tasks at once.
pub trait SecondaryClassifier: Send + Sync {
    fn classify(&self, description: &str) -> Option<String>;
}

/// Baseline classifier: never has an opinion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClassifier;

impl SecondaryClassifier for NullClassifier {
    fn classify(&self, _description: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSource {
    /// Matched by the dictionary; carries the keyword that hit.
    Keyword(String),
    Classifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatch {
    pub category: String,
    pub source: MatchSource,
}

/// Rule-first categorizer with a pluggable fallback.
///
/// Holds no mutable state; clones share the dictionary and classifier.
#[derive(Clone)]
pub struct CategorizationService {
    dictionary: Arc<CategoryKeywordDictionary>,
    fallback: Arc<dyn SecondaryClassifier>,
}

impl CategorizationService {
    pub fn new(dictionary: CategoryKeywordDictionary) -> Self {
        Self::with_classifier(dictionary, NullClassifier)
    }

    pub fn with_classifier(
        dictionary: CategoryKeywordDictionary,
        classifier: impl SecondaryClassifier + 'static,
    ) -> Self {
        Self {
            dictionary: Arc::new(dictionary),
            fallback: Arc::new(classifier),
        }
    }

    pub fn dictionary(&self) -> &CategoryKeywordDictionary {
        &self.dictionary
    }

    pub fn categorize(&self, description: &str) -> Option<String> {
        self.categorize_detailed(description).map(|m| m.category)
    }

    /// First category, in dictionary order, with a keyword contained in the
    /// lowercased description; otherwise whatever the fallback says.
    pub fn categorize_detailed(&self, description: &str) -> Option<CategoryMatch> {
        let text = description.to_lowercase();
        for entry in self.dictionary.entries() {
            if let Some(kw) = entry.keywords.iter().find(|kw| text.contains(kw.as_str())) {
                return Some(CategoryMatch {
                    category: entry.name.clone(),
                    source: MatchSource::Keyword(kw.clone()),
                });
            }
        }
        self.fallback
            .classify(description)
            .map(|category| CategoryMatch { category, source: MatchSource::Classifier })
    }

    /// Categorize every description on its own task. Output order and length
    /// always match the input, whatever order the tasks finish in.
    pub async fn predict_batch<S: AsRef<str>>(&self, descriptions: &[S]) -> Vec<Option<String>> {
        let handles: Vec<_> = descriptions
            .iter()
            .map(|d| {
                let service = self.clone();
                let description = d.as_ref().to_string();
                tokio::spawn(async move { service.categorize(&description) })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(category) => results.push(category),
                Err(e) => {
                    tracing::warn!("categorization task {idx} failed: {e}");
                    results.push(None);
                }
            }
        }
        results
    }
}

impl std::fmt::Debug for CategorizationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategorizationService")
            .field("categories", &self.dictionary.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nota_core::Locale;

    fn indonesian() -> CategorizationService {
        CategorizationService::new(CategoryKeywordDictionary::builtin(Locale::Id))
    }

    fn dict(entries: &[(&str, &[&str])]) -> CategoryKeywordDictionary {
        CategoryKeywordDictionary::new(entries.iter().map(|(n, k)| (*n, k.to_vec()))).unwrap()
    }

    struct FixedClassifier(&'static str);

    impl SecondaryClassifier for FixedClassifier {
        fn classify(&self, _description: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn bill_payment_is_tagihan() {
        assert_eq!(indonesian().categorize("Pembayaran Listrik PLN").as_deref(), Some("Tagihan"));
    }

    #[test]
    fn restaurant_is_makanan() {
        assert_eq!(indonesian().categorize("Makan di Restoran Padang").as_deref(), Some("Makanan"));
    }

    #[test]
    fn substring_wins_despite_unrelated_prefix() {
        assert_eq!(indonesian().categorize("Topham Gojek").as_deref(), Some("Transportasi"));
    }

    #[test]
    fn short_keywords_do_not_fire_inside_other_words() {
        let id = indonesian();
        assert_eq!(id.categorize("Transfer Internasional").as_deref(), Some("Transfer"));
        assert_eq!(id.categorize("Payment through BCA"), None);
        assert_eq!(id.categorize("Biaya projek renovasi"), None);
        assert_eq!(id.categorize("Fotokopi dokumen"), None);
        assert_eq!(id.categorize("Dana konservasi"), None);

        let en = CategorizationService::new(CategoryKeywordDictionary::builtin(Locale::En));
        assert_eq!(en.categorize("Small fee"), None);
        assert_eq!(en.categorize("Incidental charge"), None);
    }

    #[test]
    fn spelled_out_phrases_still_match() {
        let id = indonesian();
        assert_eq!(id.categorize("Nasi Goreng Pak Kumis").as_deref(), Some("Makanan"));
        assert_eq!(id.categorize("Kedai Kopi Kulo").as_deref(), Some("Makanan"));
        assert_eq!(id.categorize("Ojek online ke kantor").as_deref(), Some("Transportasi"));
        assert_eq!(id.categorize("Tunjangan Hari Raya 2024").as_deref(), Some("Gaji"));
    }

    #[test]
    fn unknown_description_is_none() {
        assert_eq!(indonesian().categorize("Unknown Transaction 123"), None);
    }

    #[test]
    fn match_is_case_insensitive() {
        assert_eq!(indonesian().categorize("NETFLIX.COM").as_deref(), Some("Hiburan"));
        assert_eq!(indonesian().categorize("netflix.com").as_deref(), Some("Hiburan"));
    }

    #[test]
    fn dictionary_order_breaks_ties() {
        let first = CategorizationService::new(dict(&[("A", &["coffee"]), ("B", &["shop"])]));
        let second = CategorizationService::new(dict(&[("B", &["shop"]), ("A", &["coffee"])]));
        assert_eq!(first.categorize("Coffee Shop").as_deref(), Some("A"));
        assert_eq!(second.categorize("Coffee Shop").as_deref(), Some("B"));
    }

    #[test]
    fn detailed_reports_matching_keyword() {
        let m = indonesian().categorize_detailed("Top up GOPAY via Gojek").unwrap();
        assert_eq!(m.category, "Transportasi");
        assert_eq!(m.source, MatchSource::Keyword("gojek".to_string()));
    }

    #[test]
    fn classifier_is_consulted_only_without_rule_match() {
        let service = CategorizationService::with_classifier(
            dict(&[("Makanan", &["makan"])]),
            FixedClassifier("Lainnya"),
        );
        assert_eq!(service.categorize("makan siang").as_deref(), Some("Makanan"));
        let m = service.categorize_detailed("sesuatu").unwrap();
        assert_eq!(m.category, "Lainnya");
        assert_eq!(m.source, MatchSource::Classifier);
    }

    #[test]
    fn empty_dictionary_falls_through_to_classifier() {
        let service = CategorizationService::new(CategoryKeywordDictionary::default());
        assert_eq!(service.categorize("anything at all"), None);
    }

    #[tokio::test]
    async fn predict_batch_matches_categorize() {
        let service = indonesian();
        let result = service.predict_batch(&["Gaji Bulan Ini", "Netflix Subscription"]).await;
        assert_eq!(result, vec![Some("Gaji".to_string()), Some("Hiburan".to_string())]);
    }

    #[tokio::test]
    async fn predict_batch_preserves_order_and_length() {
        let service = indonesian();
        let inputs: Vec<String> = [
            "Indomaret Point",
            "Unknown Transaction 123",
            "Apotek K24",
            "Grab ride",
            "Transfer ke Budi",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let batch = service.predict_batch(&inputs).await;
        let sequential: Vec<_> = inputs.iter().map(|d| service.categorize(d)).collect();
        assert_eq!(batch.len(), inputs.len());
        assert_eq!(batch, sequential);
    }

    #[tokio::test]
    async fn predict_batch_empty_input() {
        let empty: [&str; 0] = [];
        assert!(indonesian().predict_batch(&empty).await.is_empty());
    }
}
