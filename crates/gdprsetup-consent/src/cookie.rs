//! Consent cookie codec — `Cookie` header lookup and `Set-Cookie` rendering.
//!
//! The client script stores the consent map URI-encoded, the same way
//! `encodeURIComponent` does, so values are percent-decoded on read and
//! encoded again on write.

use chrono::{DateTime, Duration, Utc};

use crate::consent::{encode_consent, EffectiveConsent};
use crate::fingerprint::PolicyVersion;

/// Find `name` in a `Cookie` header and return its decoded value.
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| percent_decode(value.trim().trim_matches('"')))
}

/// A consent cookie ready to be written back to the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentCookie {
    pub name: String,
    /// Raw (unencoded) JSON value.
    pub value: String,
    pub expires_days: u32,
    pub path: String,
}

impl ConsentCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, expires_days: u32) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires_days,
            path: "/".into(),
        }
    }

    /// Cookie carrying `effective` under the name derived from `version`.
    pub fn for_consent(
        version: &PolicyVersion,
        effective: &EffectiveConsent,
        expires_days: u32,
    ) -> Self {
        let encoded = encode_consent(effective);
        Self::new(version.cookie_name(), encoded.as_json(), expires_days)
    }

    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(i64::from(self.expires_days))
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_set_cookie(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}={}; Expires={}; Path={}; SameSite=Lax",
            self.name,
            percent_encode(&self.value),
            self.expires_at(now).format("%a, %d %b %Y %H:%M:%S GMT"),
            self.path
        )
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
