//! Cookie consent and SameSite enforcement applied to outgoing cookies.

use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderValue};
use std::collections::HashSet;

/// Cookie recording that the user accepted non-essential cookies
pub const CONSENT_COOKIE: &str = ".ConferenceTracker.Consent";

/// SameSite modes, ordered from least to most restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SameSite {
    /// No attribute written
    Unspecified,
    None,
    Lax,
    Strict,
}

impl SameSite {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => SameSite::None,
            "lax" => SameSite::Lax,
            "strict" => SameSite::Strict,
            _ => SameSite::Unspecified,
        }
    }

    fn attribute(&self) -> Option<&'static str> {
        match self {
            SameSite::Unspecified => None,
            SameSite::None => Some("SameSite=None"),
            SameSite::Lax => Some("SameSite=Lax"),
            SameSite::Strict => Some("SameSite=Strict"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentMode {
    /// Consent is treated as given; no cookie is withheld
    Granted,
    /// Non-essential cookies are withheld until the consent cookie is present
    Required,
}

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub consent: ConsentMode,
    pub minimum_same_site: SameSite,
    /// Cookies written regardless of consent
    pub essential_cookies: HashSet<String>,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            consent: ConsentMode::Granted,
            minimum_same_site: SameSite::Unspecified,
            essential_cookies: HashSet::new(),
        }
    }
}

impl CookiePolicy {
    /// Whether this request may receive non-essential cookies
    pub fn has_consent(&self, request_headers: &HeaderMap) -> bool {
        match self.consent {
            ConsentMode::Granted => true,
            ConsentMode::Required => {
                read_cookie(request_headers, CONSENT_COOKIE).as_deref() == Some("yes")
            }
        }
    }

    /// Rewrite the `Set-Cookie` headers of a response
    pub fn apply(&self, response_headers: &mut HeaderMap, has_consent: bool) {
        let cookies: Vec<String> = response_headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        if cookies.is_empty() {
            return;
        }

        response_headers.remove(SET_COOKIE);
        for cookie in cookies {
            let name = cookie_name(&cookie);
            if !has_consent && !self.essential_cookies.contains(name) {
                tracing::debug!(cookie = %name, "Cookie withheld without consent");
                continue;
            }
            let rewritten = self.enforce_same_site(&cookie);
            if let Ok(value) = HeaderValue::from_str(&rewritten) {
                response_headers.append(SET_COOKIE, value);
            }
        }
    }

    fn enforce_same_site(&self, cookie: &str) -> String {
        let mut current = SameSite::Unspecified;
        let mut attributes: Vec<&str> = Vec::new();

        for part in cookie.split(';').map(str::trim) {
            match part.split_once('=') {
                Some((key, value)) if key.trim().eq_ignore_ascii_case("samesite") => {
                    current = SameSite::parse(value);
                }
                _ => attributes.push(part),
            }
        }

        let effective = current.max(self.minimum_same_site);
        if let Some(attribute) = effective.attribute() {
            attributes.push(attribute);
        }
        attributes.join("; ")
    }
}

/// Read a cookie value from request headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

fn cookie_name(cookie: &str) -> &str {
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(name, _)| name.trim())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(SET_COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_minimum_none_marks_unspecified_cookies() {
        let policy = CookiePolicy {
            minimum_same_site: SameSite::None,
            ..CookiePolicy::default()
        };
        let mut headers = response_with(&["a=1; Path=/", "b=2; Path=/; SameSite=Lax"]);

        policy.apply(&mut headers, true);

        assert_eq!(
            set_cookies(&headers),
            vec!["a=1; Path=/; SameSite=None", "b=2; Path=/; SameSite=Lax"]
        );
    }

    #[test]
    fn test_stricter_minimum_upgrades_cookies() {
        let policy = CookiePolicy {
            minimum_same_site: SameSite::Strict,
            ..CookiePolicy::default()
        };
        let mut headers = response_with(&["a=1; SameSite=None; HttpOnly"]);

        policy.apply(&mut headers, true);

        assert_eq!(set_cookies(&headers), vec!["a=1; HttpOnly; SameSite=Strict"]);
    }

    #[test]
    fn test_required_consent_withholds_non_essential_cookies() {
        let policy = CookiePolicy {
            consent: ConsentMode::Required,
            minimum_same_site: SameSite::Unspecified,
            essential_cookies: [".Auth".to_string()].into_iter().collect(),
        };
        let request = HeaderMap::new();
        let mut headers = response_with(&["tracking=1", ".Auth=token"]);

        let consent = policy.has_consent(&request);
        policy.apply(&mut headers, consent);

        assert!(!consent);
        assert_eq!(set_cookies(&headers), vec![".Auth=token"]);
    }

    #[test]
    fn test_granted_consent_keeps_every_cookie() {
        let policy = CookiePolicy::default();
        assert!(policy.has_consent(&HeaderMap::new()));

        let mut headers = response_with(&["tracking=1"]);
        policy.apply(&mut headers, true);
        assert_eq!(set_cookies(&headers), vec!["tracking=1"]);
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::COOKIE,
            HeaderValue::from_static("first=1; .ConferenceTracker.Consent=yes"),
        );
        assert_eq!(read_cookie(&headers, CONSENT_COOKIE).as_deref(), Some("yes"));
        assert!(read_cookie(&headers, "missing").is_none());
    }
}
