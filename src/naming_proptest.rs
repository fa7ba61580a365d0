//! Property-based tests for naming derivation.
//!
//! Random branch names, feature sets and env-file maps are generated to
//! check that identifiers stay usable as compose project names, namespaces
//! and env keys.

#[cfg(test)]
mod proptest_tests {
    use crate::envfile::parse_env_file;
    use crate::generator::template::{render, Variables};
    use crate::git::sanitize_branch;
    use crate::naming::derive_feature_set;
    use proptest::prelude::*;

    // ============================================================================
    // sanitize_branch property tests
    // ============================================================================

    proptest! {
        /// Property: output only contains ASCII alphanumerics and dashes
        #[test]
        fn sanitize_branch_output_is_dns_safe(input in ".*") {
            let result = sanitize_branch(&input);
            prop_assert!(
                result.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'),
                "sanitize_branch produced '{}' from '{}'",
                result,
                input
            );
        }

        /// Property: characters are replaced 1:1
        #[test]
        fn sanitize_branch_preserves_char_count(input in ".*") {
            prop_assert_eq!(sanitize_branch(&input).chars().count(), input.chars().count());
        }

        /// Property: sanitizing twice changes nothing
        #[test]
        fn sanitize_branch_is_idempotent(input in ".*") {
            let once = sanitize_branch(&input);
            prop_assert_eq!(sanitize_branch(&once), once.clone());
        }

        /// Property: typical branch names keep their shape
        #[test]
        fn sanitize_branch_maps_slashes(prefix in "[a-z]{1,8}", topic in "[a-z0-9-]{1,16}") {
            let result = sanitize_branch(&format!("{}/{}", prefix, topic));
            prop_assert_eq!(result, format!("{}-{}", prefix, topic));
        }
    }

    // ============================================================================
    // derive_feature_set property tests
    // ============================================================================

    proptest! {
        /// Property: with branch naming off the base always wins
        #[test]
        fn feature_set_ignores_branch_when_disabled(base in "[a-z]{1,10}", branch in "[a-z-]{0,20}") {
            prop_assert_eq!(derive_feature_set(&base, false, Some(&branch)), base);
        }

        /// Property: result is always either the base or the branch
        #[test]
        fn feature_set_is_base_or_branch(
            base in "[a-z]{1,10}",
            branch in proptest::option::of("[a-z-]{0,20}"),
            from_branch in any::<bool>()
        ) {
            let result = derive_feature_set(&base, from_branch, branch.as_deref());
            prop_assert!(result == base || Some(result.as_str()) == branch.as_deref());
        }

        /// Property: a distinct non-empty branch is used when enabled
        #[test]
        fn feature_set_uses_distinct_branch(base in "[a-z]{1,10}", branch in "[0-9]{1,10}") {
            prop_assert_eq!(derive_feature_set(&base, true, Some(&branch)), branch);
        }
    }

    // ============================================================================
    // env file and template property tests
    // ============================================================================

    proptest! {
        /// Property: values keep every `=` after the first
        #[test]
        fn parse_env_file_splits_on_first_equals(key in "[A-Z][A-Z0-9_]{0,10}", value in "[a-z0-9=]{0,20}") {
            let parsed = parse_env_file(&format!("{}={}\n", key, value));
            prop_assert_eq!(parsed.get(&key), Some(value.as_str()));
            prop_assert_eq!(parsed.len(), 1);
        }

        /// Property: text without placeholders renders unchanged
        #[test]
        fn render_without_placeholders_is_identity(text in "[a-zA-Z0-9 :\n-]*") {
            let rendered = render(&text, &Variables::new()).unwrap();
            prop_assert_eq!(rendered, text);
        }
    }
}
