use std::collections::{BTreeMap, HashSet};

use crate::domain::{
    app_display_name, clean_domain, domain_from_text, domain_matches, infer_domain_from_app_id,
    is_browser, looks_like_url,
};
use crate::page::{PageContext, ViewNode};
use crate::types::{
    CredentialEntry, DomainMatchStrategy, ExtractionMethod, MatchCandidate, MatchDiagnostics,
    MatchError, MatchResult, MatchType, MatcherConfig,
};


/// Upper bound on candidates returned per request.
pub const MAX_MATCHES: usize = 10;

/// Ranks saved credentials against a fill request.
///
/// Stateless between calls; one instance can serve every request.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Rank `entries` for the application `requesting_id` using the
    /// configured strategy.
    pub fn find_matches<N: ViewNode>(
        &self,
        requesting_id: &str,
        page: &PageContext<N>,
        entries: &[CredentialEntry],
    ) -> MatchResult {
        self.find_matches_with(requesting_id, page, entries, self.config.strategy)
    }

    /// Same as [`Matcher::find_matches`] with an explicit strategy.
    pub fn find_matches_with<N: ViewNode>(
        &self,
        requesting_id: &str,
        page: &PageContext<N>,
        entries: &[CredentialEntry],
        strategy: DomainMatchStrategy,
    ) -> MatchResult {
        tracing::debug!(
            category = "matching",
            requesting_id,
            entries = entries.len(),
            strategy = %strategy,
            "starting credential matching"
        );

        let (domain, method) = self.extract_domain(requesting_id, page);
        match &domain {
            Some(d) => tracing::debug!(
                category = "matching",
                domain = %d,
                method = method.as_str(),
                "extracted domain"
            ),
            None => tracing::debug!(
                category = "matching",
                "no domain extracted, matching on application id only"
            ),
        }

        let candidates = collect_candidates(requesting_id, domain.as_deref(), entries, strategy);
        let matches = rank(candidates);
        let confidence = matches
            .first()
            .map(|c| c.match_type.confidence())
            .unwrap_or(0.0);

        let mut matches_by_type = BTreeMap::new();
        for candidate in &matches {
            *matches_by_type.entry(candidate.match_type).or_insert(0) += 1;
        }

        tracing::info!(
            category = "matching",
            requesting_id,
            matches = matches.len(),
            confidence,
            "credential matching finished"
        );

        MatchResult {
            matches,
            strategy,
            confidence,
            diagnostics: MatchDiagnostics {
                requesting_id: requesting_id.to_owned(),
                extracted_domain: domain,
                total_entries: entries.len(),
                matches_by_type,
                extraction_method: method,
            },
        }
    }

    /// The request's domain and how it was found; see the crate docs for
    /// the order sources are tried in.
    pub fn extract_domain<N: ViewNode>(
        &self,
        requesting_id: &str,
        page: &PageContext<N>,
    ) -> (Option<String>, ExtractionMethod) {
        let annotated = page.find_first(|node| {
            node.domain_annotation()
                .map(clean_domain)
                .filter(|d| !d.is_empty())
        });
        if let Some(domain) = annotated {
            return (Some(domain), ExtractionMethod::WebDomain);
        }

        if is_browser(requesting_id, &self.config.additional_browsers) {
            if let Some(domain) = page.find_first(|node| url_domain(node.text())) {
                return (Some(domain), ExtractionMethod::NodeText);
            }
            if let Some(domain) = page.find_first(|node| url_domain(node.content_description())) {
                return (Some(domain), ExtractionMethod::ContentDescription);
            }
        }

        if let Some(domain) = infer_domain_from_app_id(requesting_id) {
            let domain = clean_domain(&domain);
            if !domain.is_empty() {
                return (Some(domain), ExtractionMethod::PackageInference);
            }
        }

        (None, ExtractionMethod::Unresolved)
    }
}

fn url_domain(text: Option<&str>) -> Option<String> {
    let text = text?;
    if !looks_like_url(text) {
        return None;
    }
    domain_from_text(text)
        .map(|d| clean_domain(&d))
        .filter(|d| !d.is_empty())
}

fn collect_candidates(
    requesting_id: &str,
    domain: Option<&str>,
    entries: &[CredentialEntry],
    strategy: DomainMatchStrategy,
) -> Vec<MatchCandidate> {
    let display_name = app_display_name(requesting_id);
    entries
        .iter()
        .filter_map(|entry| match_entry(entry, requesting_id, domain, &display_name, strategy))
        .collect()
}

/// First applicable rule wins: package, then domain, then fuzzy title.
fn match_entry(
    entry: &CredentialEntry,
    requesting_id: &str,
    domain: Option<&str>,
    display_name: &str,
    strategy: DomainMatchStrategy,
) -> Option<MatchCandidate> {
    if !entry.app_id.trim().is_empty()
        && entry.app_id.to_lowercase() == requesting_id.to_lowercase()
    {
        return Some(MatchCandidate::new(
            entry,
            MatchType::ExactPackage,
            1.0,
            "Exact package name match",
        ));
    }

    if let Some(domain) = domain {
        if !entry.website.trim().is_empty() {
            if let Some(candidate) = match_domain(entry, domain, strategy) {
                return Some(candidate);
            }
        }
    }

    if !display_name.trim().is_empty()
        && entry
            .title
            .to_lowercase()
            .contains(&display_name.to_lowercase())
    {
        return Some(MatchCandidate::new(
            entry,
            MatchType::FuzzyTitle,
            0.5,
            "Fuzzy title match with app name",
        ));
    }

    None
}

fn match_domain(
    entry: &CredentialEntry,
    domain: &str,
    strategy: DomainMatchStrategy,
) -> Option<MatchCandidate> {
    if clean_domain(&entry.website) == clean_domain(domain) {
        return Some(MatchCandidate::new(
            entry,
            MatchType::ExactDomain,
            0.95,
            "Exact domain match",
        ));
    }

    let (match_type, score) = strategy.outcome()?;
    if !domain_matches(&entry.website, domain, strategy) {
        return None;
    }
    tracing::debug!(
        category = "matching",
        entry_id = entry.id,
        match_type = %match_type,
        "domain matched via strategy"
    );
    Some(MatchCandidate::new(
        entry,
        match_type,
        score,
        format!("Domain match using {strategy} strategy"),
    ))
}

/// Stable sort by (priority asc, score desc), keep the first candidate per
/// entry id, cap at [`MAX_MATCHES`].
fn rank(mut candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    candidates.sort_by(|a, b| {
        a.match_type
            .priority()
            .cmp(&b.match_type.priority())
            .then_with(|| b.score.total_cmp(&a.score))
    });

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.entry.id));
    candidates.truncate(MAX_MATCHES);
    candidates
}
