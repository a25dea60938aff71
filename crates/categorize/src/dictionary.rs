use nota_core::Locale;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse dictionary TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Category #{0} has an empty name")]
    EmptyName(usize),
}

/// One category and its keywords, in the order they were declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub keywords: Vec<String>,
}

/// On-disk shape: `[[category]]` tables, whose array order is the match order.
#[derive(Debug, Deserialize, Serialize)]
struct DictionaryFile {
    #[serde(default)]
    category: Vec<CategoryEntry>,
}

/// Ordered category → keyword mapping.
///
/// Iteration order is the tie-break when several categories match the same
/// description, so entries are kept in a `Vec` rather than a map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryKeywordDictionary {
    entries: Vec<CategoryEntry>,
}

impl CategoryKeywordDictionary {
    /// Build from `(category, keywords)` pairs. Keywords are lowercased and
    /// trimmed; blank keywords are dropped.
    pub fn new<I, S, K>(entries: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = (S, Vec<K>)>,
        S: Into<String>,
        K: AsRef<str>,
    {
        let mut normalized = Vec::new();
        for (idx, (name, keywords)) in entries.into_iter().enumerate() {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err(DictionaryError::EmptyName(idx));
            }
            let keywords = keywords
                .iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            normalized.push(CategoryEntry { name, keywords });
        }
        Ok(Self { entries: normalized })
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, DictionaryError> {
        let file: DictionaryFile = toml::from_str(toml_content)?;
        Self::new(file.category.into_iter().map(|e| (e.name, e.keywords)))
    }

    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// The dictionary shipped for `locale`.
    pub fn builtin(locale: Locale) -> Self {
        let table = match locale {
            Locale::Id => ID_CATEGORIES,
            Locale::En => EN_CATEGORIES,
        };
        Self {
            entries: table
                .iter()
                .map(|(name, keywords)| CategoryEntry {
                    name: (*name).to_string(),
                    keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Keywords are matched as substrings, so short tokens that hide inside common
// words ("nasi" in "internasional", "thr" in "through", "ojek" in "projek",
// "kopi" in "fotokopi") are spelled out as phrases.
const ID_CATEGORIES: &[(&str, &[&str])] = &[
    ("Gaji", &["gaji", "salary", "payroll", "tunjangan hari raya", "honorarium", "bonus"]),
    (
        "Makanan",
        &[
            "makan", "restoran", "resto", "warung", "kedai kopi", "kopi kenangan", "cafe",
            "bakso", "nasi goreng", "nasi padang", "nasi uduk", "gofood", "grabfood",
            "shopeefood", "food",
        ],
    ),
    (
        "Transportasi",
        &[
            "gojek", "grab", "ojek online", "ojol", "taksi", "taxi", "bensin", "pertamina", "parkir",
            "jalan tol", "krl", "mrt", "transjakarta", "kereta", "busway",
        ],
    ),
    (
        "Tagihan",
        &[
            "listrik", "pln", "pdam", "air minum", "internet", "indihome", "telkom",
            "pulsa", "wifi", "bpjs", "tagihan",
        ],
    ),
    (
        "Hiburan",
        &[
            "netflix", "spotify", "youtube", "disney", "bioskop", "cinema", "xxi", "game",
            "steam", "tiket konser",
        ],
    ),
    (
        "Belanja",
        &[
            "indomaret", "alfamart", "tokopedia", "shopee", "lazada", "supermarket",
            "belanja", "hypermart",
        ],
    ),
    (
        "Kesehatan",
        &["apotek", "kimia farma", "rumah sakit", "klinik", "dokter", "obat"],
    ),
    (
        "Pendidikan",
        &["sekolah", "kuliah", "kursus", "spp", "toko buku", "gramedia", "udemy"],
    ),
    ("Transfer", &["transfer", "trf"]),
];

const EN_CATEGORIES: &[(&str, &[&str])] = &[
    ("Income", &["salary", "payroll", "paycheck", "direct deposit"]),
    (
        "Food",
        &[
            "restaurant", "cafe", "coffee", "starbucks", "mcdonald", "pizza", "doordash",
            "ubereats", "grubhub",
        ],
    ),
    (
        "Transport",
        &["uber", "lyft", "taxi", "parking", "fuel", "gas station", "transit", "metro"],
    ),
    (
        "Bills",
        &["electric", "water bill", "internet", "comcast", "verizon", "utility", "insurance"],
    ),
    (
        "Entertainment",
        &["netflix", "spotify", "hulu", "disney", "cinema", "steam", "concert"],
    ),
    ("Shopping", &["amazon", "walmart", "target", "costco", "shopping mall"]),
    ("Health", &["pharmacy", "walgreens", "cvs", "clinic", "hospital", "dentist"]),
    ("Education", &["tuition", "course", "udemy", "bookstore"]),
];
