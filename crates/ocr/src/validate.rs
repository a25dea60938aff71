use nota_core::{MediaType, UploadedFile};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unsupported file type '{declared}'; allowed: {allowed}")]
    UnsupportedMediaType { declared: String, allowed: String },
    #[error("File is too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },
    #[error("File is empty")]
    Empty,
}

/// Cheap upfront checks run before any extraction work.
#[derive(Debug, Clone)]
pub struct FileValidator {
    allowed: Vec<MediaType>,
    max_size_bytes: u64,
}

impl FileValidator {
    pub fn new(allowed: Vec<MediaType>, max_size_bytes: u64) -> Self {
        Self { allowed, max_size_bytes }
    }

    /// Checks media type, then size, then emptiness; reports the first failure.
    pub fn validate(&self, file: &UploadedFile) -> Result<(), ValidationError> {
        let allowed = file
            .parsed_media_type()
            .is_some_and(|m| self.allowed.contains(&m));
        if !allowed {
            return Err(ValidationError::UnsupportedMediaType {
                declared: file.media_type.clone(),
                allowed: self
                    .allowed
                    .iter()
                    .map(|m| m.mime())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        if file.size > self.max_size_bytes {
            return Err(ValidationError::TooLarge { size: file.size, max: self.max_size_bytes });
        }
        if file.size == 0 || file.bytes.is_empty() {
            return Err(ValidationError::Empty);
        }
        Ok(())
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(
            vec![MediaType::Pdf, MediaType::Png, MediaType::Jpeg],
            10 * 1024 * 1024,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_type_within_limit() {
        let v = FileValidator::default();
        assert!(v.validate(&UploadedFile::new("application/pdf", vec![1; 64])).is_ok());
        assert!(v.validate(&UploadedFile::new("image/JPEG", vec![1; 64])).is_ok());
    }

    #[test]
    fn rejects_disallowed_type_with_reason() {
        let v = FileValidator::default();
        let err = v.validate(&UploadedFile::new("text/plain", vec![1; 8])).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedMediaType { .. }));
        let msg = err.to_string();
        assert!(msg.contains("text/plain"), "{msg}");
        assert!(msg.contains("application/pdf"), "{msg}");
    }

    #[test]
    fn known_but_not_allowed_type_is_rejected() {
        let v = FileValidator::new(vec![MediaType::Pdf], 100);
        assert!(matches!(
            v.validate(&UploadedFile::new("image/png", vec![1; 8])),
            Err(ValidationError::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn rejects_oversized_file() {
        let v = FileValidator::new(vec![MediaType::Png], 10);
        assert_eq!(
            v.validate(&UploadedFile::new("image/png", vec![0; 11])),
            Err(ValidationError::TooLarge { size: 11, max: 10 })
        );
        assert!(v.validate(&UploadedFile::new("image/png", vec![0; 10])).is_ok());
    }

    #[test]
    fn media_type_is_checked_before_size() {
        let v = FileValidator::new(vec![MediaType::Png], 10);
        assert!(matches!(
            v.validate(&UploadedFile::new("text/csv", vec![0; 100])),
            Err(ValidationError::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn declared_size_is_what_counts() {
        let v = FileValidator::new(vec![MediaType::Pdf], 10);
        let mut f = UploadedFile::new("application/pdf", vec![0; 4]);
        f.size = 4_000;
        assert!(matches!(v.validate(&f), Err(ValidationError::TooLarge { .. })));
    }

    #[tokio::test]
    async fn unread_oversized_file_is_too_large_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.pdf");
        std::fs::write(&path, vec![b'%'; 2048]).unwrap();

        let v = FileValidator::new(vec![MediaType::Pdf], 1024);
        let f = UploadedFile::from_path_with_limit(&path, 1024).await.unwrap();
        assert_eq!(v.validate(&f), Err(ValidationError::TooLarge { size: 2048, max: 1024 }));
    }

    #[test]
    fn rejects_empty_file() {
        let v = FileValidator::default();
        assert_eq!(
            v.validate(&UploadedFile::new("application/pdf", vec![])),
            Err(ValidationError::Empty)
        );
    }
}
