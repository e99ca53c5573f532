//! Domain extraction, normalisation and comparison helpers.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::types::DomainMatchStrategy;

/// Browser application ids recognised out of the box. Detection is a
/// containment test, so `com.android.chrome` also covers its variants.
pub const DEFAULT_BROWSERS: &[&str] = &[
    "com.android.chrome",
    "org.mozilla.firefox",
    "com.microsoft.emmx",
    "com.opera.browser",
    "com.brave.browser",
    "com.kiwibrowser.browser",
    "com.UCMobile.intl",
    "mark.via.gp",
    "com.chrome.beta",
    "com.chrome.dev",
    "com.chrome.canary",
];

/// Public suffixes that take a third label to form a registrable domain.
const TWO_PART_SUFFIXES: &[&str] = &[
    "co.uk", "com.cn", "net.cn", "org.cn", "gov.cn", "ac.uk", "co.jp", "ne.jp", "or.jp", "com.au",
    "net.au", "org.au",
];

static URL_LIKE_TLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*\.(com|org|net|edu|gov|cn|io|app|co|uk|de|fr|jp|kr).*$").expect("Invalid regex")
});

static URL_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://([^/:?#\s]+)").expect("Invalid regex"));

static BARE_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9-]+\.[a-zA-Z]{2,})").expect("Invalid regex"));

static VALID_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]+\.[a-zA-Z]{2,}$").expect("Invalid regex"));

/// Trim, lowercase and strip leading `www.` / `m.` until nothing changes.
pub fn clean_domain(domain: &str) -> String {
    let mut current = domain.trim().to_lowercase();
    loop {
        let stripped = current
            .strip_prefix("www.")
            .or_else(|| current.strip_prefix("m."))
            .map(|rest| rest.trim().to_owned());
        match stripped {
            Some(next) => current = next,
            None => return current,
        }
    }
}

pub fn is_browser(requesting_id: &str, extra: &[String]) -> bool {
    DEFAULT_BROWSERS
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .any(|browser| requesting_id.contains(browser))
}

pub fn looks_like_url(text: &str) -> bool {
    text.contains("://") || URL_LIKE_TLD.is_match(text)
}

/// Host portion of a URL-ish string found in on-screen text.
pub fn domain_from_text(text: &str) -> Option<String> {
    let pattern: &Regex = if text.contains("://") {
        &URL_HOST
    } else {
        &BARE_DOMAIN
    };
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Guess a domain from a reverse-DNS application id by swapping its first
/// two labels (`com.example.app` -> `example.com`). Often wrong.
pub fn infer_domain_from_app_id(app_id: &str) -> Option<String> {
    let mut labels = app_id.split('.');
    let first = labels.next()?;
    let second = labels.next()?;
    let candidate = format!("{second}.{first}");
    VALID_DOMAIN.is_match(&candidate).then_some(candidate)
}

/// Capitalised last segment of an application id (`com.github.android` -> `Android`).
pub fn app_display_name(app_id: &str) -> String {
    let last = app_id.rsplit('.').next().unwrap_or_default();
    let mut chars = last.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Host of `url`; a scheme is optional.
pub fn host_of(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let host = host_port.split(':').next().unwrap_or(host_port);
    (!host.is_empty()).then(|| host.to_owned())
}

/// Registrable base domain of `url`, keeping three labels for known
/// two-part public suffixes.
pub fn base_domain(url: &str) -> Option<String> {
    let host = host_of(url)?;
    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    if n < 2 {
        return Some(host);
    }
    let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
    if n >= 3
        && TWO_PART_SUFFIXES
            .iter()
            .any(|suffix| suffix.eq_ignore_ascii_case(&last_two))
    {
        return Some(format!("{}.{}", labels[n - 3], last_two));
    }
    Some(last_two)
}

/// Compare a saved website with the request's domain under `strategy`.
///
/// Blank inputs never match.
pub fn domain_matches(saved: &str, target: &str, strategy: DomainMatchStrategy) -> bool {
    if saved.trim().is_empty() || target.trim().is_empty() {
        return false;
    }

    match strategy {
        DomainMatchStrategy::Never => false,
        DomainMatchStrategy::ExactMatch => saved.to_lowercase() == target.to_lowercase(),
        DomainMatchStrategy::StartsWith => {
            target.to_lowercase().starts_with(&saved.to_lowercase())
        }
        DomainMatchStrategy::Domain => match (host_of(saved), host_of(target)) {
            (Some(saved_host), Some(target_host)) => {
                let saved_host = saved_host.to_lowercase();
                let target_host = target_host.to_lowercase();
                target_host == saved_host || target_host.ends_with(&format!(".{saved_host}"))
            }
            _ => false,
        },
        DomainMatchStrategy::BaseDomain => match (base_domain(saved), base_domain(target)) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
            _ => false,
        },
        DomainMatchStrategy::Regex => regex_full_match(saved, target),
    }
}

fn regex_full_match(pattern: &str, target: &str) -> bool {
    match RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re.is_match(target),
        Err(err) => {
            tracing::warn!(category = "matching", pattern, error = %err, "invalid website pattern");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_domain_strips_prefixes_to_a_fixed_point() {
        assert_eq!(clean_domain("  WWW.Example.COM "), "example.com");
        assert_eq!(clean_domain("m.example.com"), "example.com");
        assert_eq!(clean_domain("www.m.example.com"), "example.com");
        assert_eq!(clean_domain("m.www.example.com"), "example.com");
        assert_eq!(clean_domain("www. www.example.com"), "example.com");
        for raw in ["www.www.m.site.org", " M.shop.io", "plain", ""] {
            let once = clean_domain(raw);
            assert_eq!(clean_domain(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn browser_detection_is_containment() {
        assert!(is_browser("com.android.chrome", &[]));
        assert!(is_browser("com.android.chrome.beta", &[]));
        assert!(!is_browser("com.example.app", &[]));
        assert!(is_browser("org.example.browser", &["org.example.browser".into()]));
    }

    #[test]
    fn tld_detection_covers_the_whole_single_line_text() {
        assert!(looks_like_url("Continue to shop.example.de now"));
        assert!(!looks_like_url("Sign in\nshop.example.de"));
        assert!(!looks_like_url("shop.example.de\n"));
        assert!(looks_like_url("Sign in\nhttps://shop.example.de"));
    }

    #[test]
    fn url_detection_and_host_extraction() {
        assert!(looks_like_url("https://accounts.example.org/login"));
        assert!(looks_like_url("login.example.com"));
        assert!(!looks_like_url("Sign in to continue"));

        assert_eq!(
            domain_from_text("https://accounts.example.org:8443/login?next=/").as_deref(),
            Some("accounts.example.org")
        );
        assert_eq!(
            domain_from_text("example.com/login").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn reverse_dns_inference() {
        assert_eq!(
            infer_domain_from_app_id("com.example.app").as_deref(),
            Some("example.com")
        );
        assert_eq!(infer_domain_from_app_id("single"), None);
        assert_eq!(infer_domain_from_app_id("com.my_app.x"), None);
    }

    #[test]
    fn display_name_capitalises_last_segment() {
        assert_eq!(app_display_name("com.github.android"), "Android");
        assert_eq!(app_display_name("com.example.bank"), "Bank");
        assert_eq!(app_display_name("com.example."), "");
    }

    #[test]
    fn host_extraction_handles_schemes_ports_and_paths() {
        assert_eq!(
            host_of("https://login.example.com/path").as_deref(),
            Some("login.example.com")
        );
        assert_eq!(host_of("example.com:8080").as_deref(), Some("example.com"));
        assert_eq!(host_of("http://user@example.com").as_deref(), Some("example.com"));
        assert_eq!(host_of("///"), None);
    }

    #[test]
    fn base_domain_respects_two_part_suffixes() {
        assert_eq!(base_domain("login.example.com").as_deref(), Some("example.com"));
        assert_eq!(base_domain("www.bbc.co.uk").as_deref(), Some("bbc.co.uk"));
        assert_eq!(base_domain("co.uk").as_deref(), Some("co.uk"));
        assert_eq!(base_domain("localhost").as_deref(), Some("localhost"));
    }

    #[test]
    fn strategies_compare_as_documented() {
        use DomainMatchStrategy::*;
        assert!(domain_matches("Example.com", "example.COM", ExactMatch));
        assert!(!domain_matches("example.com", "login.example.com", ExactMatch));

        assert!(domain_matches("example.com", "login.example.com", BaseDomain));
        assert!(!domain_matches("example.co.uk", "other.co.uk", BaseDomain));

        assert!(domain_matches("example.com", "a.b.example.com", Domain));
        assert!(!domain_matches("example.com", "badexample.com", Domain));

        assert!(domain_matches("https://example.com", "https://example.com/login", StartsWith));
        assert!(!domain_matches("example.com/login", "example.com", StartsWith));

        assert!(domain_matches(r".*\.example\.com", "LOGIN.example.com", Regex));
        assert!(!domain_matches(r"example", "example.com", Regex));
        assert!(!domain_matches("([unclosed", "example.com", Regex));

        assert!(!domain_matches("example.com", "example.com", Never));
        assert!(!domain_matches("  ", "example.com", BaseDomain));
    }
}
