//! Paginated document access.
//!
//! The extractor only needs two things from a document library: how many
//! pages there are and the text items on a given page. Keeping that surface
//! narrow lets tests swap `lopdf` for in-memory fixtures.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error("Failed to open document: {0}")]
    Open(String),
    #[error("Failed to read page {page}: {reason}")]
    Page { page: u32, reason: String },
}

/// An opened document. Pages are numbered from 1.
pub trait PagedDocument {
    fn page_count(&self) -> u32;

    /// Text items of one page in content-stream order.
    fn page_items(&self, page: u32) -> Result<Vec<String>, DocumentError>;
}

/// Opens raw bytes as a [`PagedDocument`].
pub trait DocumentBackend: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PagedDocument>, DocumentError>;
}

// ── lopdf ────────────────────────────────────────────────────────────────────

/// PDF backend built on `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

struct LopdfDocument {
    doc: lopdf::Document,
    /// Page numbers as lopdf reports them, ascending.
    pages: Vec<u32>,
}

impl DocumentBackend for LopdfBackend {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PagedDocument>, DocumentError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| DocumentError::Open(e.to_string()))?;
        // BTreeMap keys, so already ascending.
        let pages = doc.get_pages().keys().copied().collect();
        Ok(Box::new(LopdfDocument { doc, pages }))
    }
}

impl PagedDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_items(&self, page: u32) -> Result<Vec<String>, DocumentError> {
        let number = page
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .copied()
            .ok_or_else(|| DocumentError::Page { page, reason: "no such page".to_string() })?;
        let text = self
            .doc
            .extract_text(&[number])
            .map_err(|e| DocumentError::Page { page, reason: e.to_string() })?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Deterministic document for tests and golden fixtures.
///
/// Each page is either its text items or `None` for a page that fails to read.
#[derive(Debug, Clone, Default)]
pub struct FixtureBackend {
    pages: Option<Vec<Option<Vec<String>>>>,
}

impl FixtureBackend {
    pub fn new(pages: Vec<Option<Vec<String>>>) -> Self {
        Self { pages: Some(pages) }
    }

    /// Convenience: every page readable, one item per `&str`.
    pub fn from_pages(pages: &[&[&str]]) -> Self {
        Self::new(
            pages
                .iter()
                .map(|items| Some(items.iter().map(|s| s.to_string()).collect()))
                .collect(),
        )
    }

    /// A backend that cannot open anything.
    pub fn corrupt() -> Self {
        Self { pages: None }
    }
}

struct FixtureDocument {
    pages: Vec<Option<Vec<String>>>,
}

impl DocumentBackend for FixtureBackend {
    fn open(&self, _bytes: &[u8]) -> Result<Box<dyn PagedDocument>, DocumentError> {
        match &self.pages {
            Some(pages) => Ok(Box::new(FixtureDocument { pages: pages.clone() })),
            None => Err(DocumentError::Open("fixture marked corrupt".to_string())),
        }
    }
}

impl PagedDocument for FixtureDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_items(&self, page: u32) -> Result<Vec<String>, DocumentError> {
        page.checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .and_then(Clone::clone)
            .ok_or_else(|| DocumentError::Page { page, reason: "unreadable fixture page".to_string() })
    }
}
