//! Route synthesis integration tests
//!
//! Exercises the public routing surface end to end: compilation, conflict
//! detection, ordering, the two output modes, and the serialized rule shape
//! consumed by the serving layer.

use dockhand::{compile_route, synthesize_routes, BuildRule, RouteRule};
use regex::Regex;
use serde_json::json;

fn files(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[test]
fn literal_file_set_produces_literal_patterns() {
    let set = files(&["api/users.js", "api/teams/list.js"]);
    let routes = synthesize_routes(&set, &[], false).unwrap();

    for route in routes.iter().filter_map(|r| r.as_rule()) {
        assert!(!route.src.contains("([^/]+)"), "unexpected capture in {}", route.src);
    }
}

#[test]
fn compiled_route_round_trips_against_its_own_path() {
    let route = compile_route("api/[team]/members/[id].js");
    let regex = Regex::new(&route.rule.src).unwrap();

    let captures = regex.captures("/api/blue/members/7").unwrap();
    assert_eq!(&captures[1], "blue");
    assert_eq!(&captures[2], "7");
    assert_eq!(
        route.rule.dest.as_deref(),
        Some("/api/[team]/members/[id].js?team=$1&id=$2")
    );
}

#[test]
fn most_specific_route_wins() {
    let set = files(&["api/[y]/b.js", "api/a/[x].js", "api/a/b.js"]);
    let routes = synthesize_routes(&set, &[], false).unwrap();

    let dests: Vec<&str> = routes
        .iter()
        .filter_map(|r| r.as_rule())
        .filter_map(|r| r.dest.as_deref())
        .collect();
    assert_eq!(
        dests,
        vec!["/api/a/b.js", "/api/a/[x].js?x=$1", "/api/[y]/b.js?y=$1"]
    );

    // The literal sibling must shadow the dynamic one: a request for
    // /api/a/b matches the literal rule first.
    let literal = Regex::new(&routes[0].as_rule().unwrap().src).unwrap();
    let dynamic = Regex::new(&routes[1].as_rule().unwrap().src).unwrap();
    assert!(literal.is_match("/api/a/b"));
    assert!(dynamic.is_match("/api/a/b"));
}

#[test]
fn conflicting_placeholder_names_abort_synthesis() {
    let set = files(&["api/[id]/[id].js"]);
    let err = synthesize_routes(&set, &[], false).unwrap_err();
    assert_eq!(err.code(), "conflicting_path_segment");
    assert!(err.to_string().contains("api/[id]/[id].js"));
}

#[test]
fn ambiguous_siblings_abort_synthesis() {
    let set = files(&["api/[id].js", "api/[slug].js"]);
    let err = synthesize_routes(&set, &[], false).unwrap_err();
    assert_eq!(err.code(), "conflicting_file_path");
}

#[test]
fn compatible_dynamic_layouts_coexist() {
    let set = files(&["api/a/[id].js", "api/a/[id]/index.js"]);
    let routes = synthesize_routes(&set, &[], false).unwrap();
    // Both files compile plus the API catch-all.
    assert_eq!(routes.len(), 3);
}

#[test]
fn serialized_rule_list_matches_wire_shape() {
    let builders = vec![BuildRule {
        source_pattern: "public/**/*".to_string(),
        builder_id: "static".to_string(),
        config: json!({ "zeroConfig": true }).as_object().cloned().unwrap(),
    }];
    let set = files(&["api/user/[id].js"]);
    let routes = synthesize_routes(&set, &builders, true).unwrap();
    let value = serde_json::to_value(&routes).unwrap();

    assert_eq!(value[0], json!({ "handle": "miss" }));
    assert_eq!(value[1]["dest"], "/api/user/[id].js?id=$1");
    assert_eq!(value[1]["check"], true);
    assert_eq!(value[2], json!({ "src": "^/api(/.*)?$", "status": 404, "continue": true }));
    assert_eq!(value[3], json!({ "src": "/(.*)", "dest": "/public/$1", "check": true }));
}

#[test]
fn legacy_and_miss_modes_differ_only_in_phase_handling() {
    let set = files(&["api/user/[id].js"]);

    let legacy = synthesize_routes(&set, &[], false).unwrap();
    assert!(!legacy.iter().any(RouteRule::is_marker));

    let miss = synthesize_routes(&set, &[], true).unwrap();
    assert!(miss[0].is_marker());
    assert_eq!(legacy.len() + 1, miss.len());

    let legacy_srcs: Vec<&str> = legacy
        .iter()
        .filter_map(|r| r.as_rule())
        .map(|r| r.src.as_str())
        .collect();
    let miss_srcs: Vec<&str> = miss
        .iter()
        .filter_map(|r| r.as_rule())
        .map(|r| r.src.as_str())
        .collect();
    assert_eq!(legacy_srcs, miss_srcs);
}
