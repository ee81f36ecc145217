//! Content references and candidate URL construction

use packop_common::config::{GatewayConfig, IPFS_SCHEME};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque identifier for card artwork
///
/// Either an `ipfs://<hash>` reference that must be translated through a
/// gateway, or a URL that is already retrievable as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentReference(String);

impl ContentReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reference uses the content-addressed scheme
    pub fn is_translatable(&self) -> bool {
        self.0.starts_with(IPFS_SCHEME)
    }

    /// Content hash with the scheme stripped (None for plain URLs)
    pub fn content_hash(&self) -> Option<&str> {
        self.0.strip_prefix(IPFS_SCHEME)
    }
}

impl std::fmt::Display for ContentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentReference {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContentReference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Gateway priority list, placeholder and retry backoff
#[derive(Debug, Clone)]
pub struct GatewayPolicy {
    /// Gateway base URLs, highest priority first
    pub mirrors: Vec<String>,
    /// Assumed-always-available image appended after the mirrors
    pub placeholder_url: String,
    /// Delay before the next candidate after a failed attempt
    pub backoff: Duration,
}

impl GatewayPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            mirrors: config.mirrors.clone(),
            placeholder_url: config.placeholder_url.clone(),
            backoff: config.backoff(),
        }
    }
}

impl Default for GatewayPolicy {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

/// Ordered, non-empty list of retrievable URLs for one reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateList(Vec<String>);

impl CandidateList {
    /// Build the candidates for a reference
    ///
    /// Translatable references get every mirror followed by the placeholder.
    /// Anything else passes through verbatim as the only candidate, with no
    /// placeholder appended.
    pub fn for_reference(reference: &ContentReference, policy: &GatewayPolicy) -> Self {
        match reference.content_hash() {
            Some(hash) => {
                let mut urls: Vec<String> = policy
                    .mirrors
                    .iter()
                    .map(|base| format!("{}{}", base, hash))
                    .collect();
                urls.push(policy.placeholder_url.clone());
                Self(urls)
            }
            None => Self(vec![reference.as_str().to_string()]),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for lists built by `for_reference`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> GatewayPolicy {
        GatewayPolicy {
            mirrors: vec![
                "https://a.example/ipfs/".to_string(),
                "https://b.example/ipfs/".to_string(),
                "https://c.example/ipfs/".to_string(),
            ],
            placeholder_url: "https://cdn.example/placeholder.png".to_string(),
            backoff: Duration::from_millis(300),
        }
    }

    #[test]
    fn test_translatable_reference_gets_mirrors_then_placeholder() {
        let reference = ContentReference::new("ipfs://QmHash1");
        let list = CandidateList::for_reference(&reference, &policy());

        let urls: Vec<&str> = list.iter().collect();
        assert_eq!(
            urls,
            vec![
                "https://a.example/ipfs/QmHash1",
                "https://b.example/ipfs/QmHash1",
                "https://c.example/ipfs/QmHash1",
                "https://cdn.example/placeholder.png",
            ]
        );
    }

    #[test]
    fn test_plain_url_passes_through_without_placeholder() {
        let reference = ContentReference::new("https://cards.example/42.png");
        let list = CandidateList::for_reference(&reference, &policy());

        assert_eq!(list.len(), 1);
        assert_eq!(list.get(0), Some("https://cards.example/42.png"));
        assert_eq!(list.last(), Some("https://cards.example/42.png"));
    }

    #[test]
    fn test_empty_reference_is_single_candidate() {
        let list = CandidateList::for_reference(&ContentReference::new(""), &policy());
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(0), Some(""));
    }

    #[test]
    fn test_content_hash_strips_scheme_only_once() {
        let reference = ContentReference::new("ipfs://bafy/ipfs://nested");
        assert!(reference.is_translatable());
        assert_eq!(reference.content_hash(), Some("bafy/ipfs://nested"));
        assert_eq!(ContentReference::new("https://x").content_hash(), None);
    }

    #[test]
    fn test_default_policy_yields_four_candidates() {
        let list =
            CandidateList::for_reference(&ContentReference::new("ipfs://Qm"), &GatewayPolicy::default());
        assert_eq!(list.len(), 4);
        assert_eq!(list.get(0), Some("https://cloudflare-ipfs.com/ipfs/Qm"));
        assert_eq!(list.get(1), Some("https://ipfs.io/ipfs/Qm"));
        assert_eq!(list.get(2), Some("https://dweb.link/ipfs/Qm"));
    }
}
