//! Capability claims.
//!
//! A principal's claims are stored as one comma-delimited string of
//! `group:action` entries. They are parsed once into a [`ClaimSet`] when a
//! caller is built; access checks only ever see the parsed form.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An action on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
}

impl Action {
    /// Every action, in a fixed order.
    pub const ALL: [Action; 3] = [Action::Read, Action::Write, Action::Delete];

    /// Wire name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "read" => Ok(Action::Read),
            "write" => Ok(Action::Write),
            "delete" => Ok(Action::Delete),
            _ => Err(()),
        }
    }
}

/// A single `group:action` capability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Claim {
    pub group: String,
    pub action: Action,
}

impl Claim {
    /// Create a claim.
    pub fn new(group: impl Into<String>, action: Action) -> Self {
        Self {
            group: group.into(),
            action,
        }
    }

    /// Parse one `group:action` entry.
    ///
    /// The action is taken after the last `:`, so group names may contain
    /// colons. Returns `None` for an empty group or an unknown action.
    pub fn parse(entry: &str) -> Option<Self> {
        let (group, action) = entry.trim().rsplit_once(':')?;
        let group = group.trim();
        if group.is_empty() {
            return None;
        }
        let action = action.trim().parse().ok()?;
        Some(Self::new(group, action))
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.action)
    }
}

/// The parsed set of claims a caller holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    claims: BTreeSet<Claim>,
}

impl ClaimSet {
    /// An empty claim set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the stored comma-delimited form. Invalid entries are ignored.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.map(|raw| raw.split(',').filter_map(Claim::parse).collect())
            .unwrap_or_default()
    }

    /// Whether the set holds exactly `group:action`.
    pub fn allows(&self, group: &str, action: Action) -> bool {
        self.claims.iter().any(|c| c.group == group && c.action == action)
    }

    /// Groups the caller may read, each once, in sorted order.
    pub fn readable_groups(&self) -> impl Iterator<Item = &str> {
        self.claims
            .iter()
            .filter(|c| c.action == Action::Read)
            .map(|c| c.group.as_str())
    }

    /// Add a claim.
    pub fn insert(&mut self, claim: Claim) -> bool {
        self.claims.insert(claim)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }
}

impl FromIterator<Claim> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self {
            claims: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .claims
            .iter()
            .map(Claim::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_parse() {
        assert_eq!(Claim::parse("g1:read"), Some(Claim::new("g1", Action::Read)));
        assert_eq!(Claim::parse(" g1 : write "), Some(Claim::new("g1", Action::Write)));
        assert_eq!(
            Claim::parse("org:team:delete"),
            Some(Claim::new("org:team", Action::Delete))
        );

        assert_eq!(Claim::parse("g1"), None);
        assert_eq!(Claim::parse(":read"), None);
        assert_eq!(Claim::parse("g1:admin"), None);
        assert_eq!(Claim::parse("g1:READ"), None);
        assert_eq!(Claim::parse(""), None);
    }

    #[test]
    fn test_claim_set_parse_ignores_junk() {
        let set = ClaimSet::parse(Some("g1:read, g2:write,,bogus, g1:read ,g3:read"));
        assert_eq!(set.len(), 3);
        assert!(set.allows("g1", Action::Read));
        assert!(set.allows("g2", Action::Write));
        assert!(!set.allows("g2", Action::Read));
        assert!(!set.allows("g1", Action::Delete));

        assert!(ClaimSet::parse(None).is_empty());
        assert!(ClaimSet::parse(Some("   ")).is_empty());
    }

    #[test]
    fn test_readable_groups() {
        let set = ClaimSet::parse(Some("b:read,a:read,a:write,c:delete"));
        let groups: Vec<_> = set.readable_groups().collect();
        assert_eq!(groups, vec!["a", "b"]);
    }

    #[test]
    fn test_claim_set_display() {
        let set: ClaimSet = [Claim::new("g2", Action::Write), Claim::new("g1", Action::Read)]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "g1:read,g2:write");
        assert_eq!(ClaimSet::parse(Some(&set.to_string())), set);
    }
}
