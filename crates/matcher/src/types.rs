use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A saved credential record as handed over by the credential store.
///
/// The matcher only reads entries. Secret fields (`password`, `card_number`,
/// `card_cvv`) are accepted on input but never serialized back out, and
/// `Debug` redacts them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub website: String,
    /// Application id the entry was saved for, e.g. `com.github.android`.
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_holder: Option<String>,
    #[serde(default, skip_serializing)]
    pub card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_expiry: Option<String>,
    #[serde(default, skip_serializing)]
    pub card_cvv: Option<String>,
}

impl CredentialEntry {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    pub fn with_app(mut self, app_id: impl Into<String>, app_name: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self.app_name = app_name.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(
        mut self,
        address_line: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        self.address_line = Some(address_line.into());
        self.postal_code = Some(postal_code.into());
        self
    }

    pub fn with_card(
        mut self,
        holder: impl Into<String>,
        number: impl Into<String>,
        expiry: impl Into<String>,
        cvv: impl Into<String>,
    ) -> Self {
        self.card_holder = Some(holder.into());
        self.card_number = Some(number.into());
        self.card_expiry = Some(expiry.into());
        self.card_cvv = Some(cvv.into());
        self
    }
}

impl AsRef<CredentialEntry> for CredentialEntry {
    fn as_ref(&self) -> &CredentialEntry {
        self
    }
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const REDACTED: &str = "<redacted>";
        let secret = |value: Option<&String>| value.map(|_| REDACTED);
        f.debug_struct("CredentialEntry")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("website", &self.website)
            .field("app_id", &self.app_id)
            .field("app_name", &self.app_name)
            .field("phone", &self.phone)
            .field("address_line", &self.address_line)
            .field("postal_code", &self.postal_code)
            .field("card_holder", &self.card_holder)
            .field("card_number", &secret(self.card_number.as_ref()))
            .field("card_expiry", &self.card_expiry)
            .field("card_cvv", &secret(self.card_cvv.as_ref()))
            .finish()
    }
}

/// How a candidate was matched. Declaration order is sort priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    ExactPackage,
    ExactDomain,
    Subdomain,
    BaseDomain,
    FuzzyTitle,
    /// User-linked entry. Ranks last even though its confidence is high.
    Manual,
}

impl MatchType {
    /// Sort key; lower sorts first.
    pub fn priority(&self) -> u8 {
        match self {
            MatchType::ExactPackage => 1,
            MatchType::ExactDomain => 2,
            MatchType::Subdomain => 3,
            MatchType::BaseDomain => 4,
            MatchType::FuzzyTitle => 5,
            MatchType::Manual => 6,
        }
    }

    /// Fixed trust level reported as the result confidence.
    pub fn confidence(&self) -> f32 {
        match self {
            MatchType::ExactPackage => 1.0,
            MatchType::ExactDomain => 0.95,
            MatchType::Subdomain => 0.85,
            MatchType::BaseDomain => 0.75,
            MatchType::FuzzyTitle => 0.5,
            MatchType::Manual => 0.9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactPackage => "EXACT_PACKAGE",
            MatchType::ExactDomain => "EXACT_DOMAIN",
            MatchType::Subdomain => "SUBDOMAIN",
            MatchType::BaseDomain => "BASE_DOMAIN",
            MatchType::FuzzyTitle => "FUZZY_TITLE",
            MatchType::Manual => "MANUAL",
        }
    }

    /// Whether the match came from an identity-level signal (package or exact domain).
    pub fn is_exact(&self) -> bool {
        matches!(self, MatchType::ExactPackage | MatchType::ExactDomain)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a saved website is compared against the request's domain once plain
/// equality has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainMatchStrategy {
    /// Case-insensitive equality of the raw strings.
    ExactMatch,
    /// Registrable base domains are equal (`login.example.com` ~ `example.com`).
    #[default]
    BaseDomain,
    /// Target host equals the saved host or is a subdomain of it.
    Domain,
    /// Target starts with the saved value.
    StartsWith,
    /// Saved value is a case-insensitive pattern fully matching the target.
    Regex,
    /// Domain matching disabled.
    Never,
}

impl DomainMatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainMatchStrategy::ExactMatch => "EXACT_MATCH",
            DomainMatchStrategy::BaseDomain => "BASE_DOMAIN",
            DomainMatchStrategy::Domain => "DOMAIN",
            DomainMatchStrategy::StartsWith => "STARTS_WITH",
            DomainMatchStrategy::Regex => "REGEX",
            DomainMatchStrategy::Never => "NEVER",
        }
    }

    /// Classification and score a successful comparison yields, `None` for
    /// [`DomainMatchStrategy::Never`].
    pub fn outcome(&self) -> Option<(MatchType, f32)> {
        match self {
            DomainMatchStrategy::ExactMatch => Some((MatchType::ExactDomain, 0.95)),
            DomainMatchStrategy::BaseDomain => Some((MatchType::BaseDomain, 0.75)),
            DomainMatchStrategy::Domain => Some((MatchType::Subdomain, 0.85)),
            DomainMatchStrategy::StartsWith => Some((MatchType::Subdomain, 0.80)),
            DomainMatchStrategy::Regex => Some((MatchType::Subdomain, 0.70)),
            DomainMatchStrategy::Never => None,
        }
    }
}

impl fmt::Display for DomainMatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the request's domain came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractionMethod {
    #[serde(rename = "webDomain")]
    WebDomain,
    #[serde(rename = "nodeText")]
    NodeText,
    #[serde(rename = "contentDescription")]
    ContentDescription,
    #[serde(rename = "packageInference")]
    PackageInference,
    #[default]
    #[serde(rename = "none")]
    Unresolved,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::WebDomain => "webDomain",
            ExtractionMethod::NodeText => "nodeText",
            ExtractionMethod::ContentDescription => "contentDescription",
            ExtractionMethod::PackageInference => "packageInference",
            ExtractionMethod::Unresolved => "none",
        }
    }
}

/// One ranked entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub entry: CredentialEntry,
    pub match_type: MatchType,
    /// Strategy-specific relevance in `[0, 1]`.
    pub score: f32,
    pub reason: String,
}

impl MatchCandidate {
    pub fn new(
        entry: &CredentialEntry,
        match_type: MatchType,
        score: f32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entry: entry.clone(),
            match_type,
            score,
            reason: reason.into(),
        }
    }
}

impl AsRef<CredentialEntry> for MatchCandidate {
    fn as_ref(&self) -> &CredentialEntry {
        &self.entry
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDiagnostics {
    pub requesting_id: String,
    pub extracted_domain: Option<String>,
    pub total_entries: usize,
    pub matches_by_type: BTreeMap<MatchType, usize>,
    pub extraction_method: ExtractionMethod,
}

/// Output of a single [`crate::Matcher::find_matches`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Best first, unique by entry id, at most [`crate::MAX_MATCHES`].
    pub matches: Vec<MatchCandidate>,
    pub strategy: DomainMatchStrategy,
    /// Confidence of the top candidate's match type, `0.0` when empty.
    pub confidence: f32,
    pub diagnostics: MatchDiagnostics,
}

impl MatchResult {
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn best_match(&self) -> Option<&MatchCandidate> {
        self.matches.first()
    }

    pub fn group_by_match_type(&self) -> BTreeMap<MatchType, Vec<&MatchCandidate>> {
        let mut groups: BTreeMap<MatchType, Vec<&MatchCandidate>> = BTreeMap::new();
        for candidate in &self.matches {
            groups.entry(candidate.match_type).or_default().push(candidate);
        }
        groups
    }
}

/// Matcher-wide settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub strategy: DomainMatchStrategy,
    /// Browser application ids recognised on top of the built-in list.
    #[serde(default)]
    pub additional_browsers: Vec<String>,
}

impl MatcherConfig {
    pub fn with_strategy(mut self, strategy: DomainMatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.additional_browsers.iter().any(|b| b.trim().is_empty()) {
            return Err(MatchError::InvalidConfig(
                "additional_browsers must not contain blank ids".into(),
            ));
        }
        Ok(())
    }
}

/// Errors produced by the matching layer.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Invalid matcher configuration.
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_base_domain() {
        let cfg = MatcherConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.strategy, DomainMatchStrategy::BaseDomain);
    }

    #[test]
    fn blank_browser_id_rejected() {
        let cfg = MatcherConfig {
            additional_browsers: vec!["org.example.browser".into(), "  ".into()],
            ..MatcherConfig::default()
        };
        let err = cfg.validate().expect_err("config should be invalid");
        match err {
            MatchError::InvalidConfig(msg) => assert!(msg.contains("additional_browsers")),
        }
    }

    #[test]
    fn match_type_ordering_follows_priority() {
        let mut types = vec![
            MatchType::Manual,
            MatchType::FuzzyTitle,
            MatchType::ExactPackage,
            MatchType::BaseDomain,
            MatchType::Subdomain,
            MatchType::ExactDomain,
        ];
        types.sort();
        let priorities: Vec<u8> = types.iter().map(MatchType::priority).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn manual_outranks_fuzzy_on_confidence_only() {
        assert!(MatchType::Manual.confidence() > MatchType::FuzzyTitle.confidence());
        assert!(MatchType::Manual.priority() > MatchType::FuzzyTitle.priority());
    }

    #[test]
    fn strategy_serde_uses_upper_snake_names() {
        let cfg: MatcherConfig = serde_json::from_str(r#"{"strategy":"STARTS_WITH"}"#).unwrap();
        assert_eq!(cfg.strategy, DomainMatchStrategy::StartsWith);
        assert_eq!(
            serde_json::to_string(&DomainMatchStrategy::ExactMatch).unwrap(),
            "\"EXACT_MATCH\""
        );
    }

    #[test]
    fn secrets_never_leave_the_entry() {
        let entry = CredentialEntry::new(7, "Bank")
            .with_username("alice")
            .with_password("hunter2")
            .with_card("Alice", "4111111111111111", "12/30", "123");

        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("4111111111111111"));
        assert!(!json.contains("\"card_cvv\""));
        assert!(json.contains("12/30"));

        let debug = format!("{entry:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("4111"));
        assert!(debug.contains("alice"));
    }

    #[test]
    fn extraction_method_names() {
        assert_eq!(
            serde_json::to_string(&ExtractionMethod::PackageInference).unwrap(),
            "\"packageInference\""
        );
        assert_eq!(ExtractionMethod::Unresolved.as_str(), "none");
    }
}
