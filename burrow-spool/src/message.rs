//! Spooled message records.
//!
//! A record is a short envelope header followed by the raw message:
//!
//! ```text
//! HELO:<client.example.com>
//! FROM:<alice@example.com>
//! TO:<bob@example.com>
//! TO:<carol@example.com>
//!
//! Subject: hello
//! ...
//! ```
//!
//! Lines are written with CRLF; either CRLF or LF is accepted when reading.
//! The first empty line ends the envelope and everything after it is the body.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::{DeliveryError, ParseError},
    types::SpooledMessageId,
};

const HELO: &str = "HELO:";
const FROM: &str = "FROM:";
const TO: &str = "TO:";

/// SMTP envelope for a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Name the client gave in `HELO`/`EHLO`
    pub helo: String,
    /// Reverse path; empty for the null sender
    pub from: String,
    pub to: Vec<String>,
}

impl Envelope {
    pub fn new(helo: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            helo: helo.into(),
            from: from.into(),
            to: Vec::new(),
        }
    }

    #[must_use]
    pub fn recipient(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    fn check(field: &'static str, value: &str) -> Result<(), DeliveryError> {
        if value.contains(['\r', '\n']) {
            Err(DeliveryError::InvalidEnvelope {
                field,
                value: value.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Encode the envelope header, including the terminating blank line.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidEnvelope`] if any field contains a
    /// line break.
    pub fn encode(&self) -> Result<Vec<u8>, DeliveryError> {
        Self::check("HELO", &self.helo)?;
        Self::check("FROM", &self.from)?;
        for to in &self.to {
            Self::check("TO", to)?;
        }

        let mut out = format!("{HELO}<{}>\r\n{FROM}<{}>\r\n", self.helo, self.from);
        for to in &self.to {
            out.push_str(TO);
            out.push('<');
            out.push_str(to);
            out.push_str(">\r\n");
        }
        out.push_str("\r\n");

        Ok(out.into_bytes())
    }
}

/// A message as accepted for delivery: envelope plus raw RFC 5322 data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpooledMessage {
    pub envelope: Envelope,
    pub data: Arc<[u8]>,
}

impl SpooledMessage {
    pub fn new(envelope: Envelope, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            envelope,
            data: data.into(),
        }
    }

    /// Encode the full record: envelope header then body.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidEnvelope`] if any envelope field
    /// contains a line break.
    pub fn encode(&self) -> Result<Vec<u8>, DeliveryError> {
        let mut out = self.envelope.encode()?;
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    /// Decode a record produced by [`SpooledMessage::encode`].
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the envelope is unterminated, contains an
    /// unknown or repeated line, or is not UTF-8.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut envelope = Envelope::default();
        let (mut seen_helo, mut seen_from) = (false, false);
        let mut rest = bytes;

        loop {
            let Some(end) = rest.iter().position(|&b| b == b'\n') else {
                return Err(ParseError::MissingSeparator);
            };
            let line = &rest[..end];
            rest = &rest[end + 1..];

            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                break;
            }

            let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
            if let Some(helo) = line.strip_prefix(HELO) {
                if std::mem::replace(&mut seen_helo, true) {
                    return Err(ParseError::Duplicate("HELO"));
                }
                envelope.helo = unwrap_path(helo);
            } else if let Some(from) = line.strip_prefix(FROM) {
                if std::mem::replace(&mut seen_from, true) {
                    return Err(ParseError::Duplicate("FROM"));
                }
                envelope.from = unwrap_path(from);
            } else if let Some(to) = line.strip_prefix(TO) {
                envelope.to.push(unwrap_path(to));
            } else {
                return Err(ParseError::UnexpectedLine(line.to_string()));
            }
        }

        Ok(Self {
            envelope,
            data: Arc::from(rest),
        })
    }
}

fn unwrap_path(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
        .to_string()
}

/// A message that has been published to the spool, as handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivered {
    pub id: SpooledMessageId,
    pub message: SpooledMessage,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn message() -> SpooledMessage {
        SpooledMessage::new(
            Envelope::new("client.example.com", "alice@example.com")
                .recipient("bob@example.com")
                .recipient("carol@example.com"),
            b"Subject: hi\r\n\r\nHello\r\n".as_slice(),
        )
    }

    #[test]
    fn test_encode_layout() {
        let encoded = message().encode().expect("valid envelope");
        assert_eq!(
            String::from_utf8(encoded).expect("utf8"),
            "HELO:<client.example.com>\r\n\
             FROM:<alice@example.com>\r\n\
             TO:<bob@example.com>\r\n\
             TO:<carol@example.com>\r\n\
             \r\n\
             Subject: hi\r\n\r\nHello\r\n"
        );
    }

    #[test]
    fn test_parse_encoded() {
        let original = message();
        let parsed = SpooledMessage::parse(&original.encode().expect("valid")).expect("parses");
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_accepts_bare_lf_and_null_sender() {
        let parsed = SpooledMessage::parse(b"HELO:<mx>\nFROM:<>\nTO:<bob@example.com>\n\nbody")
            .expect("parses");

        assert_eq!(parsed.envelope.helo, "mx");
        assert_eq!(parsed.envelope.from, "");
        assert_eq!(parsed.envelope.to, vec!["bob@example.com".to_string()]);
        assert_eq!(&*parsed.data, b"body");
    }

    #[test]
    fn test_body_keeps_blank_lines() {
        let parsed =
            SpooledMessage::parse(b"FROM:<a@b>\r\n\r\n\r\nfirst\r\n\r\nsecond").expect("parses");
        assert_eq!(&*parsed.data, b"\r\nfirst\r\n\r\nsecond");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            SpooledMessage::parse(b"FROM:<a@b>\r\nTO:<c@d>"),
            Err(ParseError::MissingSeparator)
        );
        assert_eq!(SpooledMessage::parse(b""), Err(ParseError::MissingSeparator));
        assert_eq!(
            SpooledMessage::parse(b"Subject: hi\r\n\r\n"),
            Err(ParseError::UnexpectedLine("Subject: hi".to_string()))
        );
        assert_eq!(
            SpooledMessage::parse(b"FROM:<a@b>\nFROM:<c@d>\n\n"),
            Err(ParseError::Duplicate("FROM"))
        );
        assert_eq!(
            SpooledMessage::parse(b"TO:<\xff>\n\n"),
            Err(ParseError::InvalidUtf8)
        );
    }

    #[test]
    fn test_line_breaks_rejected_in_envelope() {
        let message = SpooledMessage::new(
            Envelope::new("mx", "alice@example.com\r\nTO:<mallory@example.com>"),
            b"".as_slice(),
        );

        assert!(matches!(
            message.encode(),
            Err(DeliveryError::InvalidEnvelope { field: "FROM", .. })
        ));
    }
}
