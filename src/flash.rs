//! One-shot messages carried across a redirect in a cookie.

use base64::{Engine as _, engine::general_purpose};
use tower_cookies::Cookies;

use crate::cookies::{create_secure_cookie, removal_cookie};

const FLASH_COOKIE: &str = "flash";
/// Flashes are only meant to survive the next page view.
const FLASH_MAX_AGE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Danger,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: Level::Success, message: message.into() }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self { level: Level::Danger, message: message.into() }
    }
}

fn encode(flashes: &[Flash]) -> String {
    let joined = flashes
        .iter()
        .map(|f| format!("{}\t{}", f.level.as_str(), f.message.replace(['\t', '\n'], " ")))
        .collect::<Vec<_>>()
        .join("\n");
    general_purpose::URL_SAFE_NO_PAD.encode(joined)
}

fn decode(value: &str) -> Vec<Flash> {
    let Ok(bytes) = general_purpose::URL_SAFE_NO_PAD.decode(value) else {
        return Vec::new();
    };
    let Ok(text) = String::from_utf8(bytes) else {
        return Vec::new();
    };

    text.lines()
        .filter_map(|line| {
            let (level, message) = line.split_once('\t')?;
            let level = match level {
                "success" => Level::Success,
                "danger" => Level::Danger,
                _ => return None,
            };
            Some(Flash { level, message: message.to_string() })
        })
        .collect()
}

/// Queues a flash to be shown on the next rendered page.
pub fn push(cookies: &Cookies, flash: Flash) {
    let mut pending = cookies
        .get(FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default();
    pending.push(flash);
    cookies.add(create_secure_cookie(
        FLASH_COOKIE,
        encode(&pending),
        FLASH_MAX_AGE_SECS,
        true,
        false,
    ));
}

/// Takes every queued flash, clearing the cookie.
pub fn take(cookies: &Cookies) -> Vec<Flash> {
    let Some(cookie) = cookies.get(FLASH_COOKIE) else {
        return Vec::new();
    };
    cookies.remove(removal_cookie(FLASH_COOKIE));
    decode(cookie.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let flashes = vec![
            Flash::success("Registration successful!"),
            Flash::danger("Tabs\tand\nnewlines are flattened"),
        ];
        let decoded = decode(&encode(&flashes));
        assert_eq!(decoded[0], flashes[0]);
        assert_eq!(decoded[1].level, Level::Danger);
        assert_eq!(decoded[1].message, "Tabs and newlines are flattened");
    }

    #[test]
    fn test_garbage_cookie_yields_nothing() {
        assert!(decode("%%%not base64").is_empty());
        assert!(decode(&general_purpose::URL_SAFE_NO_PAD.encode("warning\tunknown level")).is_empty());
    }
}
