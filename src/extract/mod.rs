//! Content selection: which text from an email is the expense candidate.
//!
//! Policy: the first PDF attachment wins (any further attachments are
//! ignored); otherwise the plain-text body; otherwise the HTML body with
//! tags stripped; otherwise empty content marked `None`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::email::ParsedEmail;

pub mod pdf;

pub use pdf::extract_pdf_text;

/// Errors from extracting candidate expense text.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The PDF attachment could not be loaded.
    #[error("Failed to load PDF: {0}")]
    PdfLoad(String),
}

/// Where the extracted text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Attachment,
    Body,
    None,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Attachment => "attachment",
            ContentSource::Body => "body",
            ContentSource::None => "none",
        }
    }
}

/// Candidate expense text for one pipeline run. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub text: String,
    pub source: ContentSource,
}

impl ExtractedContent {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            source: ContentSource::None,
        }
    }
}

/// Selects the candidate expense text from a parsed email.
///
/// Redaction is applied by the caller after selection; this function only
/// decides which text to use.
pub fn extract_content(email: &ParsedEmail) -> Result<ExtractedContent, ExtractError> {
    if let Some(attachment) = email.attachments.iter().find(|a| a.is_pdf()) {
        let text = extract_pdf_text(&attachment.content)?;
        return Ok(ExtractedContent {
            text,
            source: ContentSource::Attachment,
        });
    }

    if let Some(text) = &email.text_body {
        return Ok(ExtractedContent {
            text: text.clone(),
            source: ContentSource::Body,
        });
    }

    if let Some(html) = &email.html_body {
        return Ok(ExtractedContent {
            text: strip_html(html),
            source: ContentSource::Body,
        });
    }

    Ok(ExtractedContent::empty())
}

/// Strips HTML tags and decodes the handful of entities that matter for
/// receipt text. Not a general HTML renderer.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                if in_tag {
                    in_tag = false;
                    // Tags act as word separators so "<td>42</td><td>USD"
                    // doesn't fuse into "42USD".
                    if !out.ends_with(char::is_whitespace) && !out.is_empty() {
                        out.push(' ');
                    }
                } else {
                    out.push('>');
                }
            }
            _ if in_tag => {}
            _ => out.push(c),
        }
    }

    out.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}
