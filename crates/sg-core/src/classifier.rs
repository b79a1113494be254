//! URL Classifier
//!
//! Every URL the sweeper or an interceptor sees goes through here.
//! Evaluation order is fixed: allow list, block list, suspicious TLD,
//! random-hostname heuristic, default allow. Allow-listing is absolute.

use std::rc::Rc;

use crate::policy::PolicyStore;
use crate::types::{Classification, Reason, Verdict};
use crate::url::{extract_host, longest_alnum_run};

/// Stateless classifier over a shared policy.
#[derive(Debug, Clone)]
pub struct Classifier {
    policy: Rc<PolicyStore>,
}

impl Classifier {
    /// Create a classifier for the given policy.
    pub fn new(policy: Rc<PolicyStore>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    /// Classify a URL. Total: every input yields exactly one result.
    #[inline]
    pub fn classify(&self, url: &str) -> Classification {
        self.explain(url).classification
    }

    /// Classify a URL and report which step decided.
    pub fn explain(&self, url: &str) -> Verdict {
        let url = url.trim();
        if url.is_empty() {
            return Verdict::allow(Reason::Empty);
        }

        let lowered = url.to_lowercase();

        if let Some(entry) = self.policy.find_allow(&lowered) {
            return Verdict::allow(Reason::AllowListed(entry.to_string()));
        }

        if let Some(entry) = self.policy.find_block(&lowered) {
            return Verdict::block(Reason::BlockListed(entry.to_string()));
        }

        // Host heuristics only apply to URLs with an authority
        let host = match extract_host(&lowered) {
            Some(host) => host,
            None => return Verdict::allow(Reason::Default),
        };

        if let Some(tld) = self.policy.find_suspicious_tld(host) {
            return Verdict::block(Reason::SuspiciousTld(tld.to_string()));
        }

        if let Some(min_run) = self.policy.random_host_run() {
            if longest_alnum_run(host) >= min_run {
                return Verdict::block(Reason::RandomHost);
            }
        }

        Verdict::allow(Reason::Default)
    }

    /// Convenience for callers that only need a yes/no.
    #[inline]
    pub fn should_block(&self, url: &str) -> bool {
        self.classify(url).is_block()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Rc::new(PolicyStore::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyConfig, DEFAULT_RANDOM_HOST_RUN};

    fn classifier_with(config: PolicyConfig) -> Classifier {
        Classifier::new(Rc::new(PolicyStore::from_config(&config).unwrap()))
    }

    #[test]
    fn test_empty_is_allowed() {
        let c = Classifier::default();
        assert_eq!(c.explain("").reason, Reason::Empty);
        assert_eq!(c.classify("   "), Classification::Allow);
    }

    #[test]
    fn test_allow_list_wins_over_block_list() {
        let c = classifier_with(PolicyConfig {
            allow: vec!["admaven.com".into()],
            block: vec!["popads.net".into(), "admaven".into()],
            ..PolicyConfig::empty()
        });
        let verdict = c.explain("https://serve.admaven.com/tag.js?ref=popads.net");
        assert_eq!(verdict.classification, Classification::Allow);
        assert_eq!(verdict.reason, Reason::AllowListed("admaven.com".into()));
    }

    #[test]
    fn test_allow_list_wins_over_heuristics() {
        let c = classifier_with(PolicyConfig {
            allow: vec!["partner.click".into()],
            suspicious_tlds: vec![".click".into()],
            random_host_run: Some(15),
            ..PolicyConfig::empty()
        });
        assert_eq!(c.classify("https://partner.click/a"), Classification::Allow);
        assert_eq!(c.classify("https://abcdefghijklmnopqrst.partner.click/a"), Classification::Allow);
    }

    #[test]
    fn test_block_list_substring() {
        let c = Classifier::default();
        assert_eq!(c.classify("https://popads.net/pop.js"), Classification::Block);
        assert_eq!(c.classify("HTTPS://CDN.EXOCLICK.COM/AD"), Classification::Block);
        assert_eq!(
            c.explain("//a.adsterra.com/x").reason,
            Reason::BlockListed("adsterra.com".into())
        );
    }

    #[test]
    fn test_suspicious_tld() {
        let c = Classifier::default();
        let verdict = c.explain("https://redirector.top/go?id=1");
        assert_eq!(verdict.classification, Classification::Block);
        assert_eq!(verdict.reason, Reason::SuspiciousTld(".top".into()));
        // TLD text elsewhere in the URL is not a hostname match
        assert_eq!(c.classify("https://example.com/page.top"), Classification::Allow);
        assert_eq!(c.classify("https://clickbank.com/x"), Classification::Allow);
    }

    #[test]
    fn test_random_host_heuristic() {
        let c = classifier_with(PolicyConfig {
            random_host_run: Some(DEFAULT_RANDOM_HOST_RUN),
            ..PolicyConfig::default()
        });
        assert_eq!(
            c.explain("https://q8x7k2m9p4w1z6b3.example.com/r").reason,
            Reason::RandomHost
        );
        assert_eq!(c.classify("https://cdn-14chars-ok.example.com/"), Classification::Allow);

        // Off in the built-in policy
        let builtin = Classifier::default();
        assert_eq!(builtin.classify("https://q8x7k2m9p4w1z6b3.example.com/r"), Classification::Allow);
        assert_eq!(
            builtin.explain("https://abcdefghijklmnopqrst.supabase.co/auth/v1/authorize?provider=google").reason,
            Reason::Default
        );
    }

    #[test]
    fn test_builtin_policy_allows_own_player() {
        let verdict = Classifier::default().explain("https://megaplay.buzz/stream/s-2/12345/sub");
        assert_eq!(verdict.classification, Classification::Allow);
        assert_eq!(verdict.reason, Reason::AllowListed("megaplay.buzz".into()));
    }

    #[test]
    fn test_malformed_urls_fall_through_to_allow() {
        let c = Classifier::default();
        for url in ["not a url", "javascript:void(0)", "https://", "::::", "/relative/q8x7k2m9p4w1z6b3", "data:text/html,hi"] {
            assert_eq!(c.classify(url), Classification::Allow, "{url}");
        }
        // Substring rules still apply to unparseable strings
        assert_eq!(c.classify("see popads.net for details"), Classification::Block);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let c = Classifier::default();
        for url in ["https://popads.net/x", "https://admaven.com/x", "https://a.top", "", "%%%"] {
            assert_eq!(c.classify(url), c.classify(url));
        }
    }
}
