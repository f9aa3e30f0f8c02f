//! Property-based tests for policy evaluation
//!
//! Uses proptest to verify matcher and policy invariants across random inputs

use iam_engine::iam::{
    apply_context, evaluate_conditions, matches_one, resolve_path, ActionBasedPolicy, ConditionBlock,
    ConditionResolvers, IdentityBasedPolicy, Request, StatementRecord,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Text without `*`, `$`, `{` or `}`
fn literal() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9:/._ -]{0,24}"
}

proptest! {
    #[test]
    fn prop_literal_pattern_is_equality(pattern in literal(), candidate in literal()) {
        prop_assert_eq!(matches_one(&candidate, &pattern, None), candidate == pattern);
        prop_assert!(matches_one(&pattern, &pattern, None));
    }

    #[test]
    fn prop_star_matches_everything(candidate in ".{0,40}") {
        prop_assert!(matches_one(&candidate, "*", None));
    }

    #[test]
    fn prop_prefix_glob(prefix in literal(), rest in ".{0,24}") {
        let pattern = format!("{}*", prefix);
        let candidate = format!("{}{}", prefix, rest);
        prop_assert!(matches_one(&candidate, &pattern, None));
    }

    #[test]
    fn prop_apply_context_without_tokens_is_identity(pattern in literal(), id in 0u64..10_000) {
        let ctx = json!({ "user": { "id": id } });
        prop_assert_eq!(apply_context(&pattern, Some(&ctx)), pattern.clone());
        prop_assert_eq!(apply_context(&pattern, None), pattern);
    }

    #[test]
    fn prop_apply_context_is_idempotent(prefix in literal(), id in literal(), team in literal()) {
        let ctx = json!({ "user": { "id": id, "team": team } });
        let pattern = format!("{}${{user.id}}:${{user.team}}:${{user.missing}}*", prefix);
        let once = apply_context(&pattern, Some(&ctx));
        prop_assert_eq!(apply_context(&once, Some(&ctx)), once);
    }

    #[test]
    fn prop_interpolated_value_is_literal(id in "[a-z*]{1,8}", candidate in "[a-z*]{1,8}") {
        let ctx = json!({ "user": { "id": id.clone() } });
        let matched = matches_one(&format!("x:{}", candidate), "x:${user.id}", Some(&ctx));
        prop_assert_eq!(matched, candidate == id);
    }

    #[test]
    fn prop_resolve_path_missing_returns_default(key in "[a-z]{1,8}", default in any::<i64>()) {
        let root = json!({ "present": 1 });
        let fallback = json!(default);
        let path = format!("absent_{}.{}", key, key);
        prop_assert_eq!(resolve_path(&root, path.as_str(), Some(&fallback)), Some(&fallback));
        prop_assert_eq!(resolve_path(&root, path.as_str(), None), None);
    }

    #[test]
    fn prop_resolve_path_nested(a in "[a-z]{1,6}", b in "[a-z]{1,6}", value in any::<i64>()) {
        let mut inner = Map::new();
        inner.insert(b.clone(), json!(value));
        let mut outer = Map::new();
        outer.insert(a.clone(), Value::Object(inner));
        let root = Value::Object(outer);

        prop_assert_eq!(resolve_path(&root, format!("{}.{}", a, b).as_str(), None), Some(&json!(value)));
        prop_assert_eq!(resolve_path(&root, [a.as_str(), b.as_str()], None), Some(&json!(value)));
    }

    #[test]
    fn prop_evaluate_is_not_cannot_and_can(
        allow in prop::collection::vec("[a-c]{1,2}\\*?", 0..4),
        deny in prop::collection::vec("[a-c]{1,2}\\*?", 0..4),
        action in "[a-c]{1,3}",
    ) {
        let mut records = Vec::new();
        for pattern in &allow {
            records.push(StatementRecord::allow().action(pattern.as_str()));
        }
        for pattern in &deny {
            records.push(StatementRecord::deny().action(pattern.as_str()));
        }
        let policy = ActionBasedPolicy::new(records).unwrap();
        let request = Request::new(&action);

        prop_assert_eq!(policy.evaluate(&request), !policy.cannot(&request) && policy.can(&request));
        if policy.cannot(&request) {
            prop_assert!(!policy.evaluate(&request));
        }
    }

    #[test]
    fn prop_not_action_excludes(action in "[a-z]{1,10}") {
        let policy = IdentityBasedPolicy::new([
            StatementRecord::allow().not_action(["read"]).resource("*"),
        ])
        .unwrap();
        let request = Request::new(&action).resource("any");
        prop_assert_eq!(policy.can(&request), action != "read");
    }

    #[test]
    fn prop_conditions_are_conjunctive(age in 0i64..100, level in 0i64..10) {
        let block: ConditionBlock = serde_json::from_value(json!({
            "numericGreaterThanEquals": { "user.age": 18 },
            "numericLessThan": { "user.level": 5 }
        }))
        .unwrap();
        let ctx: Value = json!({ "user": { "age": age, "level": level } });
        let resolvers = ConditionResolvers::builtin();

        prop_assert_eq!(
            evaluate_conditions(Some(&block), Some(&ctx), &resolvers),
            age >= 18 && level < 5
        );
    }
}
