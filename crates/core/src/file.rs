use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Media types the pipeline knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
    Webp,
    Tiff,
}

impl MediaType {
    /// Parse a MIME string, ignoring case and parameters (`image/jpeg; q=1`).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(MediaType::Pdf),
            "image/png" => Some(MediaType::Png),
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/webp" => Some(MediaType::Webp),
            "image/tiff" => Some(MediaType::Tiff),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(MediaType::Pdf),
            "png" => Some(MediaType::Png),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "webp" => Some(MediaType::Webp),
            "tif" | "tiff" => Some(MediaType::Tiff),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
            MediaType::Tiff => "image/tiff",
        }
    }

    /// Paginated documents are read page by page; everything else goes to OCR.
    pub fn is_paginated(self) -> bool {
        matches!(self, MediaType::Pdf)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A caller-supplied upload, owned by the caller for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: Option<String>,
    /// Declared media type exactly as the caller reported it.
    pub media_type: String,
    /// Declared byte size.
    pub size: u64,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: None,
            media_type: media_type.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read a file from disk, guessing the media type from its extension.
    /// Unknown extensions are declared as `application/octet-stream` and left
    /// for the validator to reject.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::described_by(path, bytes.len() as u64, bytes))
    }

    /// Like [`from_path`](Self::from_path), but a file larger than
    /// `max_size` is not read: it comes back with its on-disk size and no
    /// bytes, so the validator rejects it as too large.
    pub async fn from_path_with_limit(path: &Path, max_size: u64) -> std::io::Result<Self> {
        let size = tokio::fs::metadata(path).await?.len();
        if size > max_size {
            return Ok(Self::described_by(path, size, Vec::new()));
        }
        Self::from_path(path).await
    }

    fn described_by(path: &Path, size: u64, bytes: Vec<u8>) -> Self {
        let media_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(MediaType::from_extension)
            .map(|m| m.mime().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
        Self { name, media_type, size, bytes }
    }

    pub fn parsed_media_type(&self) -> Option<MediaType> {
        MediaType::from_mime(&self.media_type)
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
            size: self.size,
        }
    }
}

/// What the controller remembers about a file: metadata only, never the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: Option<String>,
    pub media_type: String,
    pub size: u64,
}
