//! MIME decomposition of captured messages.
//!
//! Thin adapter over `mailparse`: the store only needs the subject, the
//! top-level content type and a flat, pre-order list of the sub-parts.
//!
//! Bodies are decoded leniently. A part whose transfer encoding is broken is
//! kept with its undecoded text rather than failing the whole message.

use mailparse::body::Body;
use mailparse::{DispositionType, MailHeaderMap, MailParseError, ParsedMail};

/// One node of the MIME tree, or the top-level message itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecomposedPart {
    pub cid: Option<String>,
    /// `None` when no Content-Type header was present.
    pub mime_type: Option<String>,
    pub is_attachment: bool,
    pub filename: Option<String>,
    pub charset: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decomposed {
    pub subject: Option<String>,
    /// The message as a whole. Never carries a cid.
    pub envelope: DecomposedPart,
    /// Every sub-part in pre-order, containers before their children;
    /// empty for single-part messages.
    pub parts: Vec<DecomposedPart>,
}

impl Decomposed {
    pub fn mime_type(&self) -> Option<&str> {
        self.envelope.mime_type.as_deref()
    }
}

/// Split a raw message into its envelope and sub-parts.
///
/// Only a malformed header block is an error.
pub fn decompose(raw: &[u8]) -> Result<Decomposed, MailParseError> {
    let parsed = mailparse::parse_mail(raw)?;

    let subject = parsed.headers.get_first_value("Subject");
    let mut envelope = part(&parsed);
    envelope.cid = None;

    let mut parts = Vec::new();
    for sub in &parsed.subparts {
        collect_parts(sub, &mut parts);
    }

    Ok(Decomposed {
        subject,
        envelope,
        parts,
    })
}

fn collect_parts(mail: &ParsedMail<'_>, out: &mut Vec<DecomposedPart>) {
    out.push(part(mail));
    for sub in &mail.subparts {
        collect_parts(sub, out);
    }
}

fn part(mail: &ParsedMail<'_>) -> DecomposedPart {
    // mailparse fills in defaults; only report what the headers declared.
    let content_type = mail.headers.get_first_value("Content-Type");
    let mime_type = content_type.as_ref().map(|_| mail.ctype.mimetype.clone());
    let charset = content_type.and_then(|_| mail.ctype.params.get("charset").cloned());

    let disposition = mail.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .or_else(|| mail.ctype.params.get("name"))
        .filter(|f| !f.is_empty())
        .cloned();
    let is_attachment =
        matches!(disposition.disposition, DispositionType::Attachment) || filename.is_some();

    let cid = mail
        .headers
        .get_first_value("Content-ID")
        .map(|v| unbracket(&v))
        .filter(|v| !v.is_empty());

    DecomposedPart {
        cid,
        mime_type,
        is_attachment,
        filename,
        charset,
        body: body_text(mail),
    }
}

/// Decoded body as text.
///
/// Only `text/*` goes through charset conversion; other leaves are decoded to
/// bytes and read as UTF-8. Containers keep their raw multipart body.
fn body_text(mail: &ParsedMail<'_>) -> String {
    if !mail.subparts.is_empty() {
        return String::from_utf8_lossy(undecoded(mail)).into_owned();
    }

    let decoded = if mail.ctype.mimetype.starts_with("text/") {
        mail.get_body()
    } else {
        mail.get_body_raw()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    };

    decoded.unwrap_or_else(|e| {
        log::debug!("Keeping undecoded {} body: {e}", mail.ctype.mimetype);
        String::from_utf8_lossy(undecoded(mail)).into_owned()
    })
}

fn undecoded<'a>(mail: &'a ParsedMail<'a>) -> &'a [u8] {
    match mail.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw(),
        Body::SevenBit(body) | Body::EightBit(body) => body.get_raw(),
        Body::Binary(body) => body.get_raw(),
    }
}

fn unbracket(value: &str) -> String {
    let v = value.trim();
    v.strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(v)
        .to_string()
}
