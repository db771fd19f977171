//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use tenantvault_core::{clean_tags, Item};
use tenantvault_perms::{Action, Claim, ClaimSet};

/// Generate an action.
pub fn action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Read), Just(Action::Write), Just(Action::Delete)]
}

/// Generate a group id usable inside a claim string.
pub fn group_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}".prop_map(String::from)
}

/// Generate a user id.
pub fn user_id() -> impl Strategy<Value = String> {
    "u-[a-z0-9]{1,8}".prop_map(String::from)
}

/// Generate a claim.
pub fn claim() -> impl Strategy<Value = Claim> {
    (group_id(), action()).prop_map(|(group, action)| Claim::new(group, action))
}

/// Generate a claim set of up to eight claims.
pub fn claim_set() -> impl Strategy<Value = ClaimSet> {
    prop::collection::vec(claim(), 0..8).prop_map(|claims| claims.into_iter().collect())
}

/// Generate a JSON scalar.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[ -~]{0,24}".prop_map(Value::String),
    ]
}

/// Generate a free-form payload object, nested up to two levels.
pub fn payload() -> impl Strategy<Value = Map<String, Value>> {
    let leaf = scalar();
    let value = leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    });
    prop::collection::btree_map("[a-zA-Z][a-zA-Z0-9]{0,7}", value, 0..6)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate a comma-joined tag string, possibly with blanks and repeats.
pub fn tags() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof![Just(" ".to_string()), "[a-z]{1,4}".prop_map(String::from)], 0..6)
        .prop_map(|parts| parts.join(","))
}

/// Generate a stored item with a plain payload.
pub fn item() -> impl Strategy<Value = Item> {
    (
        "[a-z0-9-]{1,16}",
        user_id(),
        prop::option::of(group_id()),
        prop::option::of(tags()),
        payload(),
    )
        .prop_map(|(id, owner, group_id, tags, payload)| Item {
            id,
            tenant_id: Some("acme".into()),
            created_by: Some(owner),
            group_id,
            tags: clean_tags(tags.as_deref()),
            payload: Some(Value::Object(payload)),
            ..Default::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantvault_perms::{can_access, Caller};

    proptest! {
        #[test]
        fn test_claim_set_text_roundtrip(claims in claim_set()) {
            let text = claims.to_string();
            prop_assert_eq!(ClaimSet::parse(Some(&text)), claims);
        }

        #[test]
        fn test_clean_tags_idempotent(raw in tags()) {
            let once = clean_tags(Some(&raw));
            let twice = clean_tags(once.as_deref());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_owner_always_has_access(item in item(), action in action(), claims in claim_set()) {
            let owner = item.created_by.clone().unwrap_or_default();
            let caller = Caller::new(owner, "acme").with_claims(claims);
            prop_assert!(can_access(&caller, &item, action));
        }

        #[test]
        fn test_ungrouped_items_are_owner_only(
            mut item in item(),
            action in action(),
            claims in claim_set(),
        ) {
            item.group_id = None;
            let caller = Caller::new("someone-else", "acme").with_claims(claims);
            prop_assert!(!can_access(&caller, &item, action));
        }
    }
}
