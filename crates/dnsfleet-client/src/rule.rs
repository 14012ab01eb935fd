// ============================================
// File: crates/dnsfleet-client/src/rule.rs
// ============================================
//! # Domain Rules
//!
//! Request types for the `/domains` family of endpoints. A rule is
//! addressed by its type (allow/deny), kind (exact/regex) and domain; any
//! of the three may be left out when listing.

use std::fmt;
use std::str::FromStr;

use dnsfleet_common::CommonError;
use serde::{Deserialize, Serialize};

// ============================================
// RuleType / RuleKind
// ============================================

/// Whether a rule allows or denies a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Allow-list entry.
    Allow,
    /// Deny-list entry.
    Deny,
}

impl RuleType {
    /// Path segment used by the node API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(CommonError::invalid_input(
                "type",
                format!("'{other}' is not one of allow, deny"),
            )),
        }
    }
}

/// Whether a rule matches a domain literally or as a regular expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Literal domain match.
    Exact,
    /// Regular expression match.
    Regex,
}

impl RuleKind {
    /// Path segment used by the node API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "regex" => Ok(Self::Regex),
            other => Err(CommonError::invalid_input(
                "kind",
                format!("'{other}' is not one of exact, regex"),
            )),
        }
    }
}

// ============================================
// Requests
// ============================================

/// Selects which rules to list. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRuleFilter {
    /// Restrict to allow or deny rules
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<RuleType>,
    /// Restrict to exact or regex rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RuleKind>,
    /// Restrict to one domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl DomainRuleFilter {
    /// Matches every rule.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Path segments below `/api/`, most specific form first.
    ///
    /// Empty domains are ignored.
    #[must_use]
    pub fn path_segments(&self) -> Vec<String> {
        let mut segments = vec!["domains".to_string()];
        if let Some(rule_type) = self.rule_type {
            segments.push(rule_type.to_string());
        }
        if let Some(kind) = self.kind {
            segments.push(kind.to_string());
        }
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            segments.push(domain.to_string());
        }
        segments
    }
}

/// Adds one or more domains under a type and kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDomainRule {
    /// Allow or deny
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Exact or regex
    pub kind: RuleKind,
    /// Domains or patterns to add
    pub domains: Vec<String>,
    /// Optional comment stored with the rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Group ids; empty means the node's default group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<i64>,
    /// Whether the rule is active
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AddDomainRule {
    /// Creates an enabled rule for `domains` with no comment.
    pub fn new<I, S>(rule_type: RuleType, kind: RuleKind, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rule_type,
            kind,
            domains: domains.into_iter().map(Into::into).collect(),
            comment: None,
            groups: Vec::new(),
            enabled: true,
        }
    }

    /// Attaches a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Path segments below `/api/`.
    #[must_use]
    pub fn path_segments(&self) -> Vec<String> {
        vec![
            "domains".to_string(),
            self.rule_type.to_string(),
            self.kind.to_string(),
        ]
    }

    /// Request body sent to the node.
    pub(crate) fn body(&self) -> AddDomainRuleBody<'_> {
        AddDomainRuleBody {
            domain: &self.domains,
            comment: self.comment.as_deref(),
            groups: &self.groups,
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AddDomainRuleBody<'a> {
    domain: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
    #[serde(skip_serializing_if = "<[i64]>::is_empty")]
    groups: &'a [i64],
    enabled: bool,
}

/// Removes one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDomainRule {
    /// Allow or deny
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Exact or regex
    pub kind: RuleKind,
    /// Domain or pattern to remove
    pub domain: String,
}

impl RemoveDomainRule {
    /// Creates a removal request.
    pub fn new(rule_type: RuleType, kind: RuleKind, domain: impl Into<String>) -> Self {
        Self {
            rule_type,
            kind,
            domain: domain.into(),
        }
    }

    /// Path segments below `/api/`.
    #[must_use]
    pub fn path_segments(&self) -> Vec<String> {
        vec![
            "domains".to_string(),
            self.rule_type.to_string(),
            self.kind.to_string(),
            self.domain.clone(),
        ]
    }
}

// ============================================
// Tests
// ============================================
