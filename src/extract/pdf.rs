//! PDF text extraction over in-memory bytes.

use super::ExtractError;

/// Extracts the text of every page of a PDF.
///
/// Pages whose text cannot be decoded are skipped rather than failing the
/// whole document; receipts are short and partial text is still usable.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::PdfLoad(e.to_string()))?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::test_support::pdf_with_text;
    use super::*;

    #[test]
    fn test_extract_text_from_valid_pdf() {
        let bytes = pdf_with_text("Invoice total 42.50 EUR");
        let text = extract_pdf_text(&bytes).unwrap();
        assert!(text.contains("Invoice total 42.50 EUR"));
    }

    #[test]
    fn test_corrupted_pdf_fails() {
        let result = extract_pdf_text(b"not a valid pdf");
        assert!(matches!(result, Err(ExtractError::PdfLoad(_))));
    }

    #[test]
    fn test_empty_bytes_fail() {
        assert!(extract_pdf_text(b"").is_err());
    }
}
