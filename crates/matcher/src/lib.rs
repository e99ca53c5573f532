//! # Autofill Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` decides which saved credentials are relevant to a fill request.
//! Given the requesting application id, the structure of the page or screen
//! it came from, and the candidate entries, it returns a ranked, deduplicated
//! list of at most [`MAX_MATCHES`] candidates plus diagnostics describing
//! how the decision was reached.
//!
//! The matcher holds no state between calls and never fails on well-formed
//! input: when no domain can be extracted it falls back to application-id
//! and title matching.
//!
//! ## Domain extraction
//!
//! First non-empty source wins:
//!
//! 1. a domain annotation anywhere in the page tree (`webDomain`)
//! 2. for known browsers, a URL in node text (`nodeText`)
//! 3. for known browsers, a URL in a content description (`contentDescription`)
//! 4. the reverse-DNS guess from the application id (`packageInference`)
//!
//! ## Core Types
//!
//! - [`CredentialEntry`]: read-only saved record; secrets never serialize.
//! - [`MatchType`]: classification with fixed priority and confidence.
//! - [`DomainMatchStrategy`]: how websites are compared once exact equality fails.
//! - [`MatchResult`]: ranked [`MatchCandidate`]s, confidence and [`MatchDiagnostics`].
//! - [`PageContext`] / [`ViewNode`]: the page tree the domain is extracted from.
//!
//! ## Example Usage
//!
//! ```
//! use matcher::{CredentialEntry, Matcher, MatcherConfig, MatchType, PageContext, PageNode};
//!
//! let matcher = Matcher::new(MatcherConfig::default()).expect("valid config");
//! let entries = vec![
//!     CredentialEntry::new(1, "GitHub")
//!         .with_username("octocat")
//!         .with_website("github.com"),
//! ];
//! let page: PageContext = PageContext::single(PageNode::new().with_domain("www.github.com"));
//!
//! let result = matcher.find_matches("com.android.chrome", &page, &entries);
//! assert_eq!(result.best_match().map(|c| c.match_type), Some(MatchType::ExactDomain));
//! assert_eq!(result.confidence, 0.95);
//! ```

pub mod domain;
mod engine;
pub mod page;
mod types;

pub use engine::{Matcher, MAX_MATCHES};
pub use page::{PageContext, PageNode, ViewNode};
pub use types::{
    CredentialEntry, DomainMatchStrategy, ExtractionMethod, MatchCandidate, MatchDiagnostics,
    MatchError, MatchResult, MatchType, MatcherConfig,
};
