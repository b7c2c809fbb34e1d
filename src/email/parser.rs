//! Email parsing: raw MIME bytes into a structured `ParsedEmail`.

use log::debug;
use mail_parser::{Message, MessageParser, MimeHeaders, PartType};

use super::error::{EmailParseError, Result};

/// An attachment extracted from an email.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// The attachment's filename (sanitized).
    pub filename: String,
    /// The attachment's MIME type.
    pub mime_type: String,
    /// The attachment's content.
    pub content: Vec<u8>,
}

impl Attachment {
    /// Whether this attachment is a PDF, by MIME type or filename extension.
    pub fn is_pdf(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case("application/pdf")
            || self.filename.to_ascii_lowercase().ends_with(".pdf")
    }
}

/// A fully parsed inbound email. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ParsedEmail {
    /// The Message-ID header, globally unique per message.
    pub message_id: String,
    /// The Subject header.
    pub subject: Option<String>,
    /// The From address, formatted as "Name <addr>" or bare address.
    pub from_address: String,
    /// The Date header in RFC3339 format.
    pub received_at: Option<String>,
    /// The plain-text body, if present.
    pub text_body: Option<String>,
    /// The HTML body, if present.
    pub html_body: Option<String>,
    /// Attachments in message order.
    pub attachments: Vec<Attachment>,
}

/// Parses raw email bytes into a `ParsedEmail`.
///
/// Fails if the bytes are not a decodable MIME message, or if the message
/// lacks the Message-ID or From headers the ledger depends on.
pub fn parse_email(raw: &[u8]) -> Result<ParsedEmail> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or(EmailParseError::Malformed)?;

    let message_id = message
        .message_id()
        .map(|s| s.to_string())
        .ok_or(EmailParseError::MissingMessageId)?;

    let from_address = message
        .from()
        .and_then(|addr| addr.first().map(format_address))
        .filter(|s| !s.is_empty())
        .ok_or(EmailParseError::MissingFrom)?;

    let subject = message.subject().map(|s| s.to_string());
    let received_at = message.date().map(|d| d.to_rfc3339());

    let text_body = first_body_part(&message, &message.text_body, |body| match body {
        PartType::Text(text) => Some(text.to_string()),
        _ => None,
    });
    let html_body = first_body_part(&message, &message.html_body, |body| match body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    });

    let attachments = collect_attachments(&message);

    debug!(
        "Parsed email message_id={} subject={:?} attachments={}",
        message_id,
        subject.as_deref().unwrap_or("(no subject)"),
        attachments.len()
    );

    Ok(ParsedEmail {
        message_id,
        subject,
        from_address,
        received_at,
        text_body,
        html_body,
        attachments,
    })
}

fn first_body_part<F>(message: &Message<'_>, part_ids: &[u32], pick: F) -> Option<String>
where
    F: Fn(&PartType<'_>) -> Option<String>,
{
    part_ids
        .first()
        .and_then(|&id| message.parts.get(id as usize))
        .and_then(|part| pick(&part.body))
}

/// Collects attachment parts in message order.
fn collect_attachments(message: &Message<'_>) -> Vec<Attachment> {
    let mut attachments = Vec::new();

    for &part_id in &message.attachments {
        let Some(part) = message.parts.get(part_id as usize) else {
            continue;
        };

        let content = match &part.body {
            PartType::Binary(data) | PartType::InlineBinary(data) => data.to_vec(),
            PartType::Text(text) => text.as_bytes().to_vec(),
            PartType::Html(html) => html.as_bytes().to_vec(),
            _ => continue,
        };

        let declared_mime = part.content_type().map(|ct| {
            if let Some(subtype) = ct.subtype() {
                format!("{}/{}", ct.ctype(), subtype)
            } else {
                ct.ctype().to_string()
            }
        });

        let filename = attachment_filename(part);

        // Fall back to guessing from the filename when the part carries no
        // Content-Type.
        let mime_type = declared_mime.unwrap_or_else(|| {
            mime_guess::from_path(&filename)
                .first()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string())
        });

        debug!(
            "Found attachment: {} ({}, {} bytes)",
            filename,
            mime_type,
            content.len()
        );

        attachments.push(Attachment {
            filename,
            mime_type,
            content,
        });
    }

    attachments
}

/// Gets a sanitized filename for an attachment part.
fn attachment_filename(part: &mail_parser::MessagePart<'_>) -> String {
    let raw = part
        .attachment_name()
        .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))
        .map(|s| s.to_string());

    match raw {
        Some(name) if !name.is_empty() => sanitize_filename(&name),
        _ => "attachment".to_string(),
    }
}

/// Formats an email address for display.
/// If the address has a display name, formats as "Name <email@example.com>".
/// Otherwise, returns just the email address.
fn format_address(addr: &mail_parser::Addr<'_>) -> String {
    if let Some(name) = addr.name() {
        format!("{} <{}>", name, addr.address().unwrap_or_default())
    } else {
        addr.address().unwrap_or_default().to_string()
    }
}

/// Sanitizes a filename to remove potentially dangerous characters.
fn sanitize_filename(filename: &str) -> String {
    let filename = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();

    let filename = filename.trim_matches(|c| c == '.' || c == ' ');

    if filename.is_empty() {
        "attachment".to_string()
    } else {
        filename.to_string()
    }
}
