//! Turning uploaded bytes into [`Document`]s.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{RagError, Result};

/// Load an upload, choosing the loader from the file extension.
///
/// `.pdf` files go through [`load_pdf`]; everything else is read as UTF-8
/// text by [`load_text`].
pub fn load_document(bytes: &[u8], filename: &str) -> Result<Vec<Document>> {
    let is_pdf = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf { load_pdf(bytes, filename) } else { load_text(bytes, filename) }
}

/// Extract text from a PDF, one [`Document`] per page that has any text.
///
/// Documents are named `{filename}#page-{n}` and carry `source_name` and the
/// one-based `page_number`.
///
/// # Errors
///
/// Returns [`RagError::DocumentLoad`] if the bytes are not a readable PDF.
pub fn load_pdf(bytes: &[u8], filename: &str) -> Result<Vec<Document>> {
    if bytes.is_empty() {
        return Err(load_error(filename, "file is empty"));
    }

    // pdf-extract panics on some malformed inputs instead of returning an error.
    let pages =
        catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes)))
            .map_err(|_| load_error(filename, "PDF parser aborted on malformed input"))?
            .map_err(|e| load_error(filename, format!("failed to extract PDF text: {e}")))?;

    let mut documents = Vec::new();
    for (i, page) in pages.into_iter().enumerate() {
        let page_number = (i + 1) as u32;
        if page.trim().is_empty() {
            debug!(source = filename, page_number, "skipping page without text");
            continue;
        }
        documents.push(
            Document::new(format!("{filename}#page-{page_number}"), page.trim())
                .with_source_name(filename)
                .with_page_number(page_number),
        );
    }

    if documents.is_empty() {
        warn!(source = filename, "PDF contains no extractable text");
    }
    info!(source = filename, pages = documents.len(), "loaded PDF");
    Ok(documents)
}

/// Read a UTF-8 text file as a single [`Document`].
///
/// # Errors
///
/// Returns [`RagError::DocumentLoad`] if the bytes are not valid UTF-8.
pub fn load_text(bytes: &[u8], filename: &str) -> Result<Vec<Document>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| load_error(filename, format!("file is not valid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    info!(source = filename, chars = text.chars().count(), "loaded text document");
    Ok(vec![Document::new(filename, text).with_source_name(filename)])
}

fn load_error(filename: &str, message: impl Into<String>) -> RagError {
    RagError::DocumentLoad { source_name: filename.to_string(), message: message.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal valid PDF with one Helvetica text line per page.
    fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
        let page_count = lines.len();
        let font_id = 3 + page_count;
        let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 3 + i)).collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {page_count} >>", kids.join(" ")),
        ];
        for i in 0..page_count {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 {font_id} 0 R >> >> /Contents {} 0 R >>",
                font_id + 1 + i
            ));
        }
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());
        for line in lines {
            let content = format!("BT /F1 12 Tf 72 720 Td ({line}) Tj ET");
            objects.push(format!(
                "<< /Length {} >>\nstream\n{content}\nendstream",
                content.len()
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }
        let xref_at = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn each_pdf_page_becomes_its_own_document() {
        let pdf = pdf_with_pages(&["Alpha page one", "Bravo page two"]);
        let docs = load_pdf(&pdf, "two.pdf").unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "two.pdf#page-1");
        assert_eq!(docs[0].page_number, Some(1));
        assert_eq!(docs[0].text, "Alpha page one");
        assert_eq!(docs[1].id, "two.pdf#page-2");
        assert_eq!(docs[1].page_number, Some(2));
        assert_eq!(docs[1].text, "Bravo page two");
        assert!(docs.iter().all(|d| d.source_name.as_deref() == Some("two.pdf")));
    }

    #[test]
    fn blank_pages_keep_the_numbering_of_later_pages() {
        let pdf = pdf_with_pages(&["Cover", "", "Closing words"]);
        let docs = load_document(&pdf, "report.pdf").unwrap();

        let numbers: Vec<Option<u32>> = docs.iter().map(|d| d.page_number).collect();
        assert_eq!(numbers, vec![Some(1), Some(3)]);
        assert_eq!(docs[1].text, "Closing words");
    }

    #[test]
    fn text_files_become_one_document() {
        let docs = load_document(b"\xEF\xBB\xBFhello", "notes.txt").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "hello");
        assert_eq!(docs[0].source_name.as_deref(), Some("notes.txt"));
        assert_eq!(docs[0].page_number, None);
    }

    #[test]
    fn invalid_utf8_is_a_load_error() {
        let err = load_text(&[0xff, 0xfe, 0x00], "bad.txt").unwrap_err();
        assert!(matches!(err, RagError::DocumentLoad { .. }));
    }

    #[test]
    fn garbage_pdf_is_a_load_error() {
        let err = load_document(b"definitely not a pdf", "upload.PDF").unwrap_err();
        assert!(matches!(err, RagError::DocumentLoad { ref source_name, .. } if source_name == "upload.PDF"));
    }

    #[test]
    fn empty_pdf_is_a_load_error() {
        assert!(matches!(load_pdf(&[], "empty.pdf"), Err(RagError::DocumentLoad { .. })));
    }
}
