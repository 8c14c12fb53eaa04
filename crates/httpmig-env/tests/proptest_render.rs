// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for the `{{ }}` renderer's round-trip laws and
//! boundary behaviors.

use httpmig_env::{render, render_any, Env};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

fn arb_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _-]{0,16}"
}

fn arb_env() -> impl Strategy<Value = Env> {
    prop::collection::btree_map(arb_key(), arb_value(), 0..5).prop_map(Env::with_global)
}

proptest! {
    // `render_any(render_any(x, env), env) == render_any(x, env)` once the
    // output no longer contains `{{ }}` output text, which is guaranteed
    // here since every templated leaf substitutes a plain value string.
    #[test]
    fn render_any_is_idempotent_on_plain_values(env in arb_env(), key in arb_key()) {
        let body = serde_json::json!({
            "id": format!("{{{{.env.{key}}}}}"),
            "count": 3,
            "tags": [format!("{{{{.env.{key}}}}}"), "static"],
        });
        let once = render_any(&body, &env).unwrap();
        let twice = render_any(&once, &env).unwrap();
        prop_assert_eq!(once, twice);
    }

    // Any field reference not present in the env renders as an empty
    // string rather than failing the render.
    #[test]
    fn undefined_field_renders_empty(key in arb_key()) {
        let env = Env::default();
        let out = render(&format!("[{{{{.env.{key}}}}}]"), &env).unwrap();
        prop_assert_eq!(out, "[]");
    }

    // A plain (non-templated) value passed through `render` is returned
    // unchanged regardless of what the env contains.
    #[test]
    fn plain_text_passes_through_unchanged(env in arb_env(), text in "[a-zA-Z0-9 ]{0,24}") {
        let out = render(&text, &env).unwrap();
        prop_assert_eq!(out, text);
    }

    // Rendering the same template against the same env twice always
    // produces the same output: the renderer has no hidden mutable state.
    #[test]
    fn render_is_deterministic(env in arb_env(), key in arb_key()) {
        let template = format!("{{{{.env.{key}}}}}-suffix");
        let first = render(&template, &env).unwrap();
        let second = render(&template, &env).unwrap();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn empty_env_from_style_map_round_trips_through_render_any() {
    let env = Env::with_global(BTreeMap::new());
    let body = serde_json::json!({"static": "value", "n": 1, "flag": true, "nil": null});
    let out = render_any(&body, &env).unwrap();
    assert_eq!(out, body);
}
