//! The item access rule.
//!
//! Ownership always wins. Otherwise access needs a `group:action` claim for
//! the item's group, and items without a group can only be reached by their
//! owner.

use tenantvault_core::Item;
use tracing::debug;

use crate::caller::Caller;
use crate::claim::Action;
use crate::error::{PermsError, Result};

/// Check if `caller` may perform `action` on `item`.
pub fn can_access(caller: &Caller, item: &Item, action: Action) -> bool {
    // Owner has full access
    if item.is_owned_by(&caller.user_id) {
        return true;
    }

    match item.group_id.as_deref() {
        Some(group) if !group.is_empty() => caller.claims.allows(group, action),
        _ => false,
    }
}

/// Like [`can_access`], but fails with `Forbidden`.
pub fn authorize(caller: &Caller, item: &Item, action: Action) -> Result<()> {
    if can_access(caller, item, action) {
        return Ok(());
    }
    debug!(
        user_id = %caller.user_id,
        item_id = %item.id,
        %action,
        "access denied"
    );
    Err(PermsError::Forbidden {
        item_id: item.id.clone(),
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{Claim, ClaimSet};
    use proptest::prelude::*;

    fn item(owner: &str, group: Option<&str>) -> Item {
        Item {
            id: "i-1".into(),
            created_by: Some(owner.into()),
            group_id: group.map(str::to_string),
            ..Default::default()
        }
    }

    fn caller(user_id: &str, claims: &str) -> Caller {
        Caller::new(user_id, "t-1").with_claims(ClaimSet::parse(Some(claims)))
    }

    #[test]
    fn test_access_table() {
        // (caller, claims, owner, group, action, expected)
        let cases = [
            ("a", "", "a", None, Action::Delete, true),
            ("a", "", "a", Some("g1"), Action::Write, true),
            ("b", "", "a", None, Action::Read, false),
            ("b", "g1:read", "a", None, Action::Read, false),
            ("b", "g1:read", "a", Some("g1"), Action::Read, true),
            ("b", "g1:read", "a", Some("g1"), Action::Write, false),
            ("b", "g1:write", "a", Some("g1"), Action::Write, true),
            ("b", "g1:delete", "a", Some("g1"), Action::Delete, true),
            ("b", "g2:read", "a", Some("g1"), Action::Read, false),
            ("b", "g1:read", "a", Some(""), Action::Read, false),
        ];

        for (user, claims, owner, group, action, expected) in cases {
            assert_eq!(
                can_access(&caller(user, claims), &item(owner, group), action),
                expected,
                "caller={} claims={:?} owner={} group={:?} action={}",
                user,
                claims,
                owner,
                group,
                action
            );
        }
    }

    #[test]
    fn test_item_without_owner() {
        let mut orphan = item("a", Some("g1"));
        orphan.created_by = None;
        assert!(!can_access(&caller("a", ""), &orphan, Action::Read));
        assert!(can_access(&caller("a", "g1:read"), &orphan, Action::Read));
    }

    #[test]
    fn test_authorize_reports_forbidden() {
        let err = authorize(&caller("b", ""), &item("a", None), Action::Write).unwrap_err();
        assert!(matches!(err, PermsError::Forbidden { action: Action::Write, .. }));
        assert_eq!(err.kind(), tenantvault_core::ErrorKind::Forbidden);
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop::sample::select(Action::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_access_rule(
            owner in "[ab]",
            user in "[ab]",
            group in prop::option::of("g[12]"),
            claims in prop::collection::vec(("g[12]", arb_action()), 0..4),
            action in arb_action(),
        ) {
            let set: ClaimSet = claims.iter().map(|(g, a)| Claim::new(g.clone(), *a)).collect();
            let caller = Caller::new(user.clone(), "t-1").with_claims(set);
            let item = item(&owner, group.as_deref());

            let expected = owner == user
                || group
                    .as_ref()
                    .map_or(false, |g| claims.iter().any(|(cg, ca)| cg == g && *ca == action));

            prop_assert_eq!(can_access(&caller, &item, action), expected);
        }
    }
}
