use crate::error::IngestError;
use lopdf::{Document, Object};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Per-page text plus the producer tag from the PDF info dictionary, which
/// the chunker carries as each chunk's category.
#[derive(Debug, Clone)]
pub struct ExtractedPdf {
    pub pages: Vec<PageText>,
    pub producer: Option<String>,
}

/// Parses uploaded PDF bytes and extracts text page by page. Pages with no
/// readable text are skipped; a document where every page is blank is a
/// parse failure, not an empty success.
pub fn extract_pdf(bytes: &[u8]) -> Result<ExtractedPdf, IngestError> {
    let document =
        Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(PageText {
                number: page_no,
                text,
            });
        }
    }

    if pages.is_empty() {
        return Err(IngestError::PdfParse(
            "pdf had no readable page text".to_string(),
        ));
    }

    Ok(ExtractedPdf {
        pages,
        producer: read_producer(&document),
    })
}

fn read_producer(document: &Document) -> Option<String> {
    let info = document.trailer.get(b"Info").ok()?;
    let info = match info {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };

    let producer = info.as_dict().ok()?.get(b"Producer").ok()?;
    match producer {
        Object::String(bytes, _) => {
            let value = String::from_utf8_lossy(bytes).trim().to_string();
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        }
        _ => None,
    }
}
