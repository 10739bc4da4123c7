use std::{
    fmt::{self, Display},
    str::FromStr,
};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// SASL mechanisms a backend can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mechanism {
    Plain,
}

impl FromStr for Mechanism {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("PLAIN") {
            Ok(Self::Plain)
        } else {
            Err(AuthError::UnsupportedMechanism(s.to_string()))
        }
    }
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "PLAIN",
        })
    }
}

/// Decode a PLAIN response into `(user, password)`.
///
/// The response is `base64(authzid NUL authcid NUL passwd)`. The
/// authorization identity is not used; the authentication identity is
/// returned as the user.
///
/// # Errors
///
/// Returns [`AuthError::MalformedResponse`] if the response is not valid
/// base64, not UTF-8, or has fewer than three NUL separated fields.
pub fn decode_plain(response: &str) -> Result<(String, String), AuthError> {
    let raw = STANDARD
        .decode(response.trim())
        .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
    let text = String::from_utf8(raw).map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    let mut fields = text.split('\0');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(_authzid), Some(user), Some(pass)) => Ok((user.to_string(), pass.to_string())),
        _ => Err(AuthError::MalformedResponse(
            "expected authzid, authcid and password".to_string(),
        )),
    }
}
