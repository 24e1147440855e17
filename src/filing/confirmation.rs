//! Confirmation token extraction.
//!
//! After submission the portal embeds the signed-request document in the
//! page as entity-escaped XML. The token is the text of its `f1` element.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, warn};

use super::surface::{Element, FormSurface};

/// Why no token could be read. None of these abort a batch.
#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("Confirmation payload element is not on the page")]
    ElementAbsent,
    #[error("Confirmation payload is empty")]
    PayloadEmpty,
    #[error("Failed to parse confirmation payload: {0}")]
    Parse(String),
    #[error("Confirmation payload has no f1 element")]
    TagAbsent,
    #[error("Confirmation payload f1 element is empty")]
    TagEmpty,
    #[error("Failed to read confirmation payload: {0}")]
    Surface(String),
}

const TOKEN_TAG: &[u8] = b"f1";

fn parse_err(e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Parse(e.to_string())
}

/// Parse an escaped payload into its token.
///
/// The token is the leading text of the first `f1` child of the root
/// element. Later `f1` elements and anything after a nested element are
/// ignored.
pub fn parse_token(payload: &str) -> Result<String, ExtractionError> {
    if payload.trim().is_empty() {
        return Err(ExtractionError::PayloadEmpty);
    }
    let xml = payload.replace("&lt;", "<").replace("&gt;", ">");
    let mut reader = Reader::from_str(&xml);

    let mut depth = 0usize;
    loop {
        match reader.read_event().map_err(parse_err)? {
            Event::Start(e) => {
                if depth == 1 && e.name().as_ref() == TOKEN_TAG {
                    return leading_text(&mut reader);
                }
                depth += 1;
            }
            Event::Empty(e) if depth == 1 && e.name().as_ref() == TOKEN_TAG => {
                return Err(ExtractionError::TagEmpty);
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => return Err(ExtractionError::TagAbsent),
            _ => {}
        }
    }
}

/// Text and CDATA up to the first child or the closing tag.
fn leading_text(reader: &mut Reader<&[u8]>) -> Result<String, ExtractionError> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(parse_err)? {
            Event::Text(e) => text.push_str(&e.unescape().map_err(parse_err)?),
            Event::CData(e) => text.push_str(&reader.decoder().decode(&e).map_err(parse_err)?),
            Event::Comment(_) | Event::PI(_) => {}
            Event::Eof => return Err(parse_err("payload ends inside the f1 element")),
            _ => break,
        }
    }

    let token = text.trim();
    if token.is_empty() {
        Err(ExtractionError::TagEmpty)
    } else {
        Ok(token.to_string())
    }
}

/// Read the payload from the page and parse it.
pub async fn read_token<S: FormSurface + ?Sized>(surface: &mut S) -> Result<String, ExtractionError> {
    let payload = surface
        .read_value(Element::ConfirmationPayload)
        .await
        .map_err(|e| ExtractionError::Surface(e.to_string()))?
        .ok_or(ExtractionError::ElementAbsent)?;
    parse_token(&payload)
}

/// Like [`read_token`], but failures are logged and become `None`.
pub async fn extract_token<S: FormSurface + ?Sized>(surface: &mut S) -> Option<String> {
    match read_token(surface).await {
        Ok(token) => {
            debug!(token = %token, "Extracted confirmation token");
            Some(token)
        }
        Err(e) => {
            warn!("No confirmation token: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filing::scripted::ScriptedSurface;

    #[test]
    fn test_escaped_payload() {
        let payload = "&lt;data&gt;&lt;f1&gt;ABC123&lt;/f1&gt;&lt;f2&gt;x&lt;/f2&gt;&lt;/data&gt;";
        assert_eq!(parse_token(payload).unwrap(), "ABC123");
    }

    #[test]
    fn test_token_is_trimmed() {
        let payload = ScriptedSurface::payload_for("  T-77 ");
        assert_eq!(parse_token(&payload).unwrap(), "T-77");
    }

    #[test]
    fn test_empty_tag_yields_no_token() {
        let result = parse_token("&lt;data&gt;&lt;f1&gt;&lt;/f1&gt;&lt;/data&gt;");
        assert!(matches!(
            result,
            Err(ExtractionError::TagEmpty) | Err(ExtractionError::TagAbsent)
        ));
        assert!(parse_token("<data><f1>   </f1></data>").is_err());
    }

    #[test]
    fn test_missing_tag() {
        assert_eq!(
            parse_token("<data><f2>x</f2></data>"),
            Err(ExtractionError::TagAbsent)
        );
    }

    #[test]
    fn test_first_f1_wins() {
        assert_eq!(
            parse_token("<data><f1>T-1</f1><f1>T-2</f1></data>").unwrap(),
            "T-1"
        );
        assert_eq!(
            parse_token("<data><f2><f1>NESTED</f1></f2><f1>T-3</f1></data>").unwrap(),
            "T-3"
        );
    }

    #[test]
    fn test_leading_text_before_child_element() {
        assert_eq!(
            parse_token("&lt;data&gt;&lt;f1&gt;T-5&lt;b&gt;x&lt;/b&gt;&lt;/f1&gt;&lt;/data&gt;").unwrap(),
            "T-5"
        );
        assert_eq!(
            parse_token("<data><f1><b>x</b>tail</f1></data>"),
            Err(ExtractionError::TagEmpty)
        );
    }

    #[test]
    fn test_cdata_attributes_and_entities() {
        assert_eq!(
            parse_token(r#"<data id="7"><f1 kind="talon"><![CDATA[ T-9 ]]></f1></data>"#).unwrap(),
            "T-9"
        );
        assert_eq!(parse_token("<data><f1>A&amp;B</f1></data>").unwrap(), "A&B");
        assert_eq!(
            parse_token("<data><f1/></data>"),
            Err(ExtractionError::TagEmpty)
        );
    }

    #[test]
    fn test_blank_and_malformed_payloads() {
        assert_eq!(parse_token("  "), Err(ExtractionError::PayloadEmpty));
        assert!(matches!(
            parse_token("&lt;data&gt;&lt;f1&gt;X&lt;/data&gt;"),
            Err(ExtractionError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_from_surface() {
        let mut surface = ScriptedSurface::new()
            .with_payload(ScriptedSurface::payload_for("TALON-1"))
            .with_missing_payload()
            .with_payload("");
        assert_eq!(extract_token(&mut surface).await.as_deref(), Some("TALON-1"));
        assert_eq!(
            read_token(&mut surface).await,
            Err(ExtractionError::ElementAbsent)
        );
        assert_eq!(extract_token(&mut surface).await, None);
    }
}
