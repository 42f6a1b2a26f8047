//! Public URLs for objects kept in the hosted storage bucket.

use std::fmt;

use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage base url is not configured")]
    NotConfigured,
    #[error("invalid storage base url: {0}")]
    InvalidBase(String),
    #[error("invalid object path: {0}")]
    InvalidPath(String),
}

/// Folder an uploaded object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    ReportPhoto,
    Receipt,
    QuoteAttachment,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectKind::ReportPhoto => "reports",
            ObjectKind::Receipt => "receipts",
            ObjectKind::QuoteAttachment => "quotes",
        })
    }
}

#[derive(Debug, Clone)]
pub struct StorageService {
    base: Option<Url>,
    bucket: String,
}

/// Rejects blank paths, absolute paths, backslashes and `.`/`..` segments.
pub fn validate_path(path: &str) -> Result<&str, StorageError> {
    let invalid = || StorageError::InvalidPath(path.to_string());
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed.starts_with('/') || trimmed.contains('\\') {
        return Err(invalid());
    }
    if trimmed
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid());
    }
    Ok(trimmed)
}

/// Lowercase ASCII file name safe to use as an object key.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut out = String::with_capacity(base.len());
    for c in base.trim().chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' | '.' | '-' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            _ => '-',
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    let out = out.trim_matches(|c| c == '-' || c == '.').to_string();
    if out.is_empty() { "file".to_string() } else { out }
}

impl StorageService {
    pub fn new(base_url: Option<&str>, bucket: impl Into<String>) -> Result<Self, StorageError> {
        let base = base_url
            .map(|raw| Url::parse(raw).map_err(|e| StorageError::InvalidBase(e.to_string())))
            .transpose()?;
        Ok(Self {
            base,
            bucket: bucket.into(),
        })
    }

    /// `<kind>/<owner>/<sanitized name>`
    pub fn object_path(kind: ObjectKind, owner_id: Uuid, file_name: &str) -> String {
        format!("{}/{}/{}", kind, owner_id, sanitize_file_name(file_name))
    }

    /// `{base}/storage/v1/object/public/{bucket}/{path}`
    pub fn public_url(&self, path: &str) -> Result<String, StorageError> {
        let base = self.base.as_ref().ok_or(StorageError::NotConfigured)?;
        let path = validate_path(path)?;

        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidBase(base.to_string()))?;
            segments
                .pop_if_empty()
                .extend(["storage", "v1", "object", "public", self.bucket.as_str()])
                .extend(path.split('/'));
        }
        Ok(url.to_string())
    }
}
