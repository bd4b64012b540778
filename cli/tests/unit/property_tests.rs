//! Property-based tests for template expansion and scale ordering.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;
use serde_json::{Value, json};

use devrig_cli::application::services::scale::ScaleController;
use devrig_cli::domain::config::BalancerConfig;
use devrig_cli::domain::scale::{ScaleAction, ScaleOptions, ScaleTarget, target_for};
use devrig_cli::domain::template::{TemplateContext, resolve};

use crate::helpers::{FakeCluster, RecordingOpener, RecordingReporter, def, manifest, names};

const TOKENS: &[&str] = &[
    "system.name",
    "system.persistent_folders",
    "manifest.dir",
    "manifest.project_name",
    "balancer.default_domain",
    "balancer.port",
    "balancer.ip",
];

fn ctx() -> TemplateContext {
    TemplateContext::new("web", "shop", &BalancerConfig::default()).expect("context")
}

/// Directory names and domains, some carrying placeholder syntax.
fn context_value() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9._-]{1,12}",
        "[a-z${}]{0,4}\\$\\{[a-z.]{0,8}\\}?[a-z${}]{0,4}",
        "[a-z${}.-]{1,12}",
    ]
}

/// Option trees whose strings never contain a placeholder.
fn plain_tree() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 /._:{}-]{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strings mixing literal text and known placeholders.
fn templated_string() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-z0-9 ./-]{0,6}",
            prop::sample::select(TOKENS).prop_map(|t| format!("${{{t}}}")),
        ],
        0..8,
    )
    .prop_map(|parts| parts.concat())
}

// ============================================================================
// Template expansion
// ============================================================================

proptest! {
    /// A tree with no placeholders comes back unchanged.
    #[test]
    fn prop_plain_tree_is_unchanged(tree in plain_tree()) {
        let resolved = resolve(&tree, &ctx()).expect("no placeholders");
        prop_assert_eq!(resolved, tree);
    }

    /// Expansion leaves no placeholder behind and is idempotent.
    #[test]
    fn prop_resolution_is_idempotent(s in templated_string()) {
        let once = resolve(&json!({"command": s.clone(), "list": [s]}), &ctx()).expect("known tokens");
        let rendered = once["command"].as_str().expect("string").to_string();
        prop_assert!(!rendered.contains("${"), "left a placeholder: {}", rendered);
        prop_assert_eq!(&once["list"][0], &once["command"]);
        let twice = resolve(&once, &ctx()).expect("already resolved");
        prop_assert_eq!(twice, once);
    }

    /// Expansion stays idempotent whatever the context is built from: a
    /// context either refuses the values or yields a resolved tree that
    /// resolves to itself.
    #[test]
    fn prop_resolution_is_idempotent_for_any_context(
        s in templated_string(),
        dir in context_value(),
        host in context_value(),
    ) {
        let balancer = BalancerConfig { host, ..BalancerConfig::default() };
        let Ok(ctx) = TemplateContext::new("web", &dir, &balancer) else {
            prop_assert!(dir.contains("${") || dir.starts_with('{') || dir.ends_with('$')
                || balancer.host.contains("${") || balancer.host.starts_with('{') || balancer.host.ends_with('$'),
                "context refused values that contain no template syntax");
            return Ok(());
        };
        let once = resolve(&json!({"command": s}), &ctx).expect("known tokens");
        let rendered = once["command"].as_str().expect("string").to_string();
        prop_assert!(!rendered.contains("${"), "left a placeholder: {}", rendered);
        let twice = resolve(&once, &ctx).expect("already resolved");
        prop_assert_eq!(twice, once);
    }

    /// Unknown tokens are always rejected.
    #[test]
    fn prop_unknown_token_is_an_error(token in "[a-z]{1,8}\\.[a-z]{1,8}") {
        prop_assume!(!TOKENS.contains(&token.as_str()));
        let raw = json!({"command": format!("run ${{{token}}}")});
        prop_assert!(resolve(&raw, &ctx()).is_err());
    }
}

// ============================================================================
// Scale targets
// ============================================================================

proptest! {
    /// Stop targets zero whatever the defaults or explicit counts say.
    #[test]
    fn prop_stop_always_targets_zero(
        default in 0u32..10,
        explicit in prop::option::of(0u32..10),
        filtered in any::<bool>(),
        disabled in any::<bool>(),
    ) {
        let m = manifest(vec![def("web", json!({"scalable": {"default": default}, "disabled": disabled}))]);
        let system = &m.systems()[0];
        let mut opts = ScaleOptions { filtered, ..ScaleOptions::default() };
        if let Some(n) = explicit {
            opts.instances.insert("web".into(), n);
        }
        prop_assert_eq!(target_for(ScaleAction::Stop, system, &opts), ScaleTarget::Exact(0));
        if let Some(n) = explicit {
            prop_assert_eq!(target_for(ScaleAction::Start, system, &opts), ScaleTarget::Exact(n));
        }
    }

    /// Stop visits systems in exactly the reverse of start's order.
    #[test]
    fn prop_stop_reverses_start_order(count in 1usize..8, chained in any::<bool>()) {
        let defs = (0..count)
            .map(|i| {
                let depends: Vec<String> = if chained && i > 0 {
                    vec![format!("s{}", i - 1)]
                } else {
                    Vec::new()
                };
                def(&format!("s{i}"), json!({"depends": depends}))
            })
            .collect();
        let m = manifest(defs);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");

        let cluster = FakeCluster::with_running(&m, &[]);
        let (opener, reporter) = (RecordingOpener::default(), RecordingReporter::default());
        let ctl = ScaleController::new(&cluster, &cluster, &opener, &reporter, 80);
        runtime.block_on(async {
            ctl.start(&m, m.systems(), &ScaleOptions::default()).await.expect("start");
            ctl.stop(&m, m.systems(), &ScaleOptions::default()).await.expect("stop");
        });

        let calls = cluster.call_names();
        let (started, stopped) = calls.split_at(count);
        let all = names(m.systems());
        prop_assert_eq!(started, all.as_slice());
        let mut reversed = stopped.to_vec();
        reversed.reverse();
        prop_assert_eq!(reversed.as_slice(), started);
    }
}
