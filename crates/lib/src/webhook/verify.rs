//! Subscription verification handshake.

use serde::Deserialize;

/// Query parameters sent by the platform when subscribing the endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

impl VerifyQuery {
    /// Build from decoded query pairs. A repeated key keeps its first value.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = VerifyQuery::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "hub.mode" => &mut query.mode,
                "hub.verify_token" => &mut query.verify_token,
                "hub.challenge" => &mut query.challenge,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

/// Outcome of a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Echo the challenge back with 200.
    Accepted(String),
    /// Mode/token present but wrong: 403.
    Rejected,
    /// Mode or token missing: nothing is written, so the response is an empty 200.
    Ignored,
}

/// Check a verification request against the configured secret.
pub fn verify(expected_token: &str, query: &VerifyQuery) -> Verification {
    let mode = query.mode.as_deref().unwrap_or("");
    let token = query.verify_token.as_deref().unwrap_or("");
    let challenge = query.challenge.as_deref().unwrap_or("");

    if mode.is_empty() || token.is_empty() {
        return Verification::Ignored;
    }
    if mode == "subscribe" && token == expected_token && !challenge.is_empty() {
        Verification::Accepted(challenge.to_string())
    } else {
        Verification::Rejected
    }
}
