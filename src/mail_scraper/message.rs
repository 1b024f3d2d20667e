use anyhow::Result;
use itertools::Itertools;
use log::error;
use mailparse::{parse_mail, DispositionType, MailHeaderMap, ParsedMail};
use regex::Regex;

use crate::mail_scraper::ScrapedMessage;

const BODY_PREVIEW_CHARS: usize = 200;

// Decode a fetched batch, dropping the messages that cannot be decoded. One
// broken message never aborts the others.
pub(crate) fn decode_batch(raws: impl IntoIterator<Item = (u32, Vec<u8>)>) -> Vec<ScrapedMessage> {
    raws.into_iter()
        .filter_map(|(id, raw)| match decode_message(&id.to_string(), &raw) {
            Ok(message) => Some(message),
            Err(e) => {
                error!("error decoding message {}: {}", id, e);
                None
            }
        })
        .collect()
}

// Decode one raw RFC 822 message into a scrape row
pub fn decode_message(id: &str, raw: &[u8]) -> Result<ScrapedMessage> {
    let parsed = parse_mail(raw)?;

    // Header decoding (encoded words included) is mailparse's job
    let subject = parsed
        .headers
        .get_first_value("Subject")
        .unwrap_or_else(|| "No Subject".to_string());
    let from = parsed.headers.get_first_value("From").unwrap_or_default();
    let date = parsed.headers.get_first_value("Date").unwrap_or_default();

    let body = truncate_body(&normalize_whitespace(&extract_text_body(&parsed)));

    let attachments = attachment_names(&parsed);
    let attachments = if attachments.is_empty() {
        "None".to_string()
    } else {
        attachments.iter().join(", ")
    };

    Ok(ScrapedMessage {
        id: id.to_string(),
        from,
        subject,
        date,
        body,
        attachments,
    })
}

// First text/plain part that is not an attachment, depth first. A single-part
// message with no such part falls back to its top-level payload, undecodable
// bytes replaced rather than dropped.
fn extract_text_body(mail: &ParsedMail) -> String {
    fn find_plain_part(part: &ParsedMail) -> Option<String> {
        if part.ctype.mimetype.eq_ignore_ascii_case("text/plain")
            && part.get_content_disposition().disposition != DispositionType::Attachment
        {
            if let Ok(body) = part.get_body() {
                return Some(body);
            }
        }

        part.subparts.iter().find_map(find_plain_part)
    }

    match find_plain_part(mail) {
        Some(body) => body,
        None if mail.subparts.is_empty() => mail
            .get_body()
            .unwrap_or_else(|_| {
                String::from_utf8_lossy(&mail.get_body_raw().unwrap_or_default()).into_owned()
            }),
        None => String::new(),
    }
}

// Filenames of every part marked as an attachment, in traversal order
fn attachment_names(mail: &ParsedMail) -> Vec<String> {
    fn collect_names(part: &ParsedMail, names: &mut Vec<String>) {
        let disposition = part.get_content_disposition();
        if disposition.disposition == DispositionType::Attachment {
            if let Some(filename) = disposition.params.get("filename") {
                names.push(filename.clone());
            }
        }

        for subpart in &part.subparts {
            collect_names(subpart, names);
        }
    }

    let mut names = Vec::new();
    collect_names(mail, &mut names);
    names
}

fn normalize_whitespace(text: &str) -> String {
    let whitespace = Regex::new(r"\s+").unwrap();
    whitespace.replace_all(text, " ").trim().to_string()
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > BODY_PREVIEW_CHARS {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{}...", preview)
    } else {
        body.to_string()
    }
}
