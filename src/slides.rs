use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF-";
const DATA_URL_PREFIX: &str = "data:application/pdf;base64,";

#[derive(Debug, thiserror::Error)]
pub enum SlideError {
    #[error("Please select a valid PDF file")]
    NotPdf,
    #[error("The selected file is empty")]
    Empty,
    #[error("PDF parse error: {0}")]
    Extract(String),
    #[error("Invalid slide data: {0}")]
    DataUrl(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for SlideError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A file is accepted as slides when it has a `.pdf` extension and a PDF header.
pub fn ensure_pdf(file_name: &str, bytes: &[u8]) -> Result<(), SlideError> {
    if bytes.is_empty() {
        return Err(SlideError::Empty);
    }
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if ext != "pdf" || !bytes.starts_with(PDF_MAGIC) {
        return Err(SlideError::NotPdf);
    }
    Ok(())
}

/// Rendered width over page width, for the fitted render surface.
pub fn fit_scale(page_width: f64, max_width: f64) -> f64 {
    if page_width > 0.0 && page_width.is_finite() {
        max_width / page_width
    } else {
        1.0
    }
}

/// Text content of a slide deck, one entry per page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideDeck {
    pub file_name: String,
    pages: Vec<String>,
}

impl SlideDeck {
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Result<Self, SlideError> {
        ensure_pdf(file_name, bytes)?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| SlideError::Extract(e.to_string()))?;
        log::info!("Read {} pages from {}", pages.len(), file_name);
        Ok(Self {
            file_name: file_name.to_string(),
            pages,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, SlideError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("slides.pdf");
        Self::from_bytes(name, &bytes)
    }

    pub fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    /// 1-based page text.
    pub fn page_text(&self, page: u32) -> Option<&str> {
        let idx = usize::try_from(page.checked_sub(1)?).ok()?;
        self.pages.get(idx).map(|p| p.trim())
    }
}

/// Encode a locally picked PDF for the `uploadedSlide` session key.
pub fn to_data_url(bytes: &[u8]) -> String {
    format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(bytes))
}

pub fn from_data_url(url: &str) -> Result<Vec<u8>, SlideError> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| SlideError::DataUrl("missing data separator".into()))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(SlideError::DataUrl("not a base64 data URL".into()));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| SlideError::DataUrl(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_pdf() {
        assert!(ensure_pdf("week1.PDF", b"%PDF-1.7\n...").is_ok());
        assert!(matches!(ensure_pdf("week1.pdf", b""), Err(SlideError::Empty)));
        assert!(matches!(
            ensure_pdf("week1.pptx", b"%PDF-1.7"),
            Err(SlideError::NotPdf)
        ));
        assert!(matches!(
            ensure_pdf("week1.pdf", b"PK\x03\x04"),
            Err(SlideError::NotPdf)
        ));
    }

    #[test]
    fn test_data_url() {
        let url = to_data_url(b"%PDF-1.4");
        assert!(url.starts_with("data:application/pdf;base64,"));
        assert_eq!(from_data_url(&url).unwrap(), b"%PDF-1.4");
        assert!(from_data_url("https://example.com/a.pdf").is_err());
        assert!(from_data_url("data:application/pdf;base64,@@@").is_err());
    }

    #[test]
    fn test_fit_scale() {
        assert_eq!(fit_scale(600.0, 900.0), 1.5);
        assert_eq!(fit_scale(0.0, 900.0), 1.0);
    }

    #[test]
    fn test_page_text_is_one_based() {
        let deck = SlideDeck {
            file_name: "a.pdf".into(),
            pages: vec![" intro ".into(), "raft".into()],
        };
        assert_eq!(deck.page_count(), 2);
        assert_eq!(deck.page_text(1), Some("intro"));
        assert_eq!(deck.page_text(2), Some("raft"));
        assert_eq!(deck.page_text(0), None);
        assert_eq!(deck.page_text(3), None);
    }
}
