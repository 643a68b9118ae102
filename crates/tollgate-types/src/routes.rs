//! Route patterns and the price/route table.
//!
//! A [`RouteTable`] maps method + path patterns to the payment options that
//! unlock them. It is built once at server startup from static configuration
//! and read-only afterwards. A path that matches no rule requires no payment:
//! unmatched routes are free, not denied.

use http::Method;

use crate::proto::{PaymentOption, PaymentTerms};
use crate::scheme::SchemeKey;

/// A path pattern: an exact path or a wildcard-suffix prefix.
///
/// `"/weather"` matches only `/weather`. `"/premium/*"` matches `/premium`
/// and everything below it. An exact pattern always beats a wildcard; among
/// wildcards, the longest prefix wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// Matches one path exactly.
    Exact(String),
    /// Matches the stored prefix and any path below it.
    Prefix(String),
}

/// Route configuration errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The pattern is not a valid exact path or wildcard-suffix pattern.
    #[error("invalid route pattern: {0}")]
    InvalidPattern(String),
    /// The rule advertises no payment options.
    #[error("route {0} has an empty payment option set")]
    EmptyAccepts(String),
    /// Two options in one rule share a (scheme, network) pair.
    #[error("route {pattern} declares duplicate payment option: {key}")]
    DuplicateOption { pattern: String, key: SchemeKey },
}

impl RoutePattern {
    /// Parses a pattern string.
    ///
    /// Accepted forms: an absolute path (`/weather`) or an absolute path with
    /// a trailing wildcard segment (`/premium/*`). A `*` anywhere else is
    /// rejected.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::InvalidPattern(pattern.to_string()));
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            if prefix.contains('*') {
                return Err(RouteError::InvalidPattern(pattern.to_string()));
            }
            return Ok(RoutePattern::Prefix(prefix.to_string()));
        }
        if pattern.contains('*') {
            return Err(RouteError::InvalidPattern(pattern.to_string()));
        }
        Ok(RoutePattern::Exact(pattern.to_string()))
    }

    /// Whether `path` falls under this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(exact) => path == exact,
            RoutePattern::Prefix(prefix) => {
                path == prefix || (path.starts_with(prefix) && path.as_bytes()[prefix.len()] == b'/')
            }
        }
    }

    /// Ranking for most-specific-wins matching. Exact beats any prefix.
    fn specificity(&self) -> usize {
        match self {
            RoutePattern::Exact(_) => usize::MAX,
            RoutePattern::Prefix(prefix) => prefix.len(),
        }
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutePattern::Exact(exact) => write!(f, "{exact}"),
            RoutePattern::Prefix(prefix) => write!(f, "{prefix}/*"),
        }
    }
}

/// One gated route: a method + pattern and the options that unlock it.
///
/// Any one of `accepts` satisfies the rule. Declaration order is
/// authoritative for option selection; price never participates.
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// The HTTP method this rule applies to.
    pub method: Method,
    /// The path pattern.
    pub pattern: RoutePattern,
    /// Acceptable payment options, in declaration order.
    pub accepts: Vec<PaymentOption>,
    /// Human-readable description of the gated resource.
    pub description: String,
    /// MIME type of the gated resource.
    pub mime_type: String,
}

impl RouteRule {
    /// Starts a rule for `method` and `pattern` with no options yet.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPattern`] for a malformed pattern.
    pub fn new(method: Method, pattern: &str) -> Result<Self, RouteError> {
        Ok(Self {
            method,
            pattern: RoutePattern::parse(pattern)?,
            accepts: Vec::new(),
            description: String::new(),
            mime_type: "application/json".to_string(),
        })
    }

    /// Adds a payment option. Any registered option satisfies the rule.
    pub fn accept(mut self, option: PaymentOption) -> Self {
        self.accepts.push(option);
        self
    }

    /// Sets the resource description included in 402 responses.
    pub fn with_description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the resource MIME type (default: `application/json`).
    pub fn with_mime_type<M: Into<String>>(mut self, mime_type: M) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// The rule's options as advertised terms, in declaration order.
    pub fn terms(&self) -> Vec<PaymentTerms> {
        self.accepts
            .iter()
            .map(|option| PaymentTerms::advertise(option, &self.description, &self.mime_type))
            .collect()
    }
}

/// The price/route table: maps inbound routes to payment rules.
///
/// Built once at startup, read-only thereafter; safe to share across requests
/// behind an `Arc` without synchronization.
#[derive(Debug, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule to the table.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::EmptyAccepts`] if the rule has no options, or
    /// [`RouteError::DuplicateOption`] if two options share a
    /// (scheme, network) pair.
    pub fn add_route(&mut self, rule: RouteRule) -> Result<(), RouteError> {
        if rule.accepts.is_empty() {
            return Err(RouteError::EmptyAccepts(rule.pattern.to_string()));
        }
        for (i, option) in rule.accepts.iter().enumerate() {
            let key = option.key();
            if rule.accepts[..i].iter().any(|other| other.key() == key) {
                return Err(RouteError::DuplicateOption {
                    pattern: rule.pattern.to_string(),
                    key,
                });
            }
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Chaining variant of [`RouteTable::add_route`].
    pub fn and_route(mut self, rule: RouteRule) -> Result<Self, RouteError> {
        self.add_route(rule)?;
        Ok(self)
    }

    /// Finds the best-matching rule for an inbound request.
    ///
    /// Returns `None` when no rule matches, which means no payment is
    /// required and the request passes through untouched. An exact pattern
    /// beats any wildcard; among wildcards the longest prefix wins; ties go
    /// to the earlier declaration.
    pub fn route(&self, method: &Method, path: &str) -> Option<&RouteRule> {
        let mut best: Option<&RouteRule> = None;
        for rule in &self.rules {
            if rule.method != *method || !rule.pattern.matches(path) {
                continue;
            }
            match best {
                Some(current) if current.pattern.specificity() >= rule.pattern.specificity() => {}
                _ => best = Some(rule),
            }
        }
        best
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::MoneyAmount;

    fn option(network: &str) -> PaymentOption {
        PaymentOption::new(
            "exact",
            network,
            MoneyAmount::parse("0.001").unwrap(),
            "0xseller",
        )
    }

    fn rule(method: Method, pattern: &str) -> RouteRule {
        RouteRule::new(method, pattern)
            .unwrap()
            .accept(option("eip155:84532"))
    }

    #[test]
    fn pattern_parsing() {
        assert_eq!(
            RoutePattern::parse("/weather").unwrap(),
            RoutePattern::Exact("/weather".into())
        );
        assert_eq!(
            RoutePattern::parse("/premium/*").unwrap(),
            RoutePattern::Prefix("/premium".into())
        );
        assert!(RoutePattern::parse("weather").is_err());
        assert!(RoutePattern::parse("/a/*/b").is_err());
        assert!(RoutePattern::parse("/a*").is_err());
    }

    #[test]
    fn wildcard_matches_subtree_only() {
        let pattern = RoutePattern::parse("/premium/*").unwrap();
        assert!(pattern.matches("/premium"));
        assert!(pattern.matches("/premium/data"));
        assert!(pattern.matches("/premium/data/deep"));
        assert!(!pattern.matches("/premiumness"));
        assert!(!pattern.matches("/weather"));
    }

    #[test]
    fn exact_beats_wildcard_and_longest_prefix_wins() {
        let table = RouteTable::new()
            .and_route(rule(Method::GET, "/api/*"))
            .unwrap()
            .and_route(rule(Method::GET, "/api/premium/*"))
            .unwrap()
            .and_route(
                rule(Method::GET, "/api/premium/data").with_description("exact"),
            )
            .unwrap();

        let matched = table.route(&Method::GET, "/api/premium/data").unwrap();
        assert_eq!(matched.description, "exact");

        let matched = table.route(&Method::GET, "/api/premium/other").unwrap();
        assert_eq!(matched.pattern, RoutePattern::Prefix("/api/premium".into()));

        let matched = table.route(&Method::GET, "/api/misc").unwrap();
        assert_eq!(matched.pattern, RoutePattern::Prefix("/api".into()));
    }

    #[test]
    fn unmatched_method_or_path_is_free() {
        let table = RouteTable::new()
            .and_route(rule(Method::GET, "/weather"))
            .unwrap();
        assert!(table.route(&Method::POST, "/weather").is_none());
        assert!(table.route(&Method::GET, "/health").is_none());
    }

    #[test]
    fn empty_option_set_is_a_configuration_error() {
        let empty = RouteRule::new(Method::GET, "/weather").unwrap();
        let err = RouteTable::new().and_route(empty).unwrap_err();
        assert!(matches!(err, RouteError::EmptyAccepts(_)));
    }

    #[test]
    fn duplicate_scheme_network_pair_is_a_configuration_error() {
        let dup = RouteRule::new(Method::GET, "/weather")
            .unwrap()
            .accept(option("eip155:84532"))
            .accept(option("eip155:84532"));
        let err = RouteTable::new().and_route(dup).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateOption { .. }));
    }

    #[test]
    fn terms_carry_rule_metadata_in_declaration_order() {
        let rule = RouteRule::new(Method::GET, "/weather")
            .unwrap()
            .accept(option("eip155:84532"))
            .accept(option("solana:devnet"))
            .with_description("Weather data for any city");
        let terms = rule.terms();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].network, "eip155:84532");
        assert_eq!(terms[1].network, "solana:devnet");
        assert!(terms.iter().all(|t| t.description == "Weather data for any city"));
        assert!(terms.iter().all(|t| t.mime_type == "application/json"));
    }
}
