// Integration tests for client lookups, project selection, and the entity factories.
use std::collections::HashMap;
use std::sync::Arc;

use kechain::api::{
    Client, ErrorKind, KECHAIN_FORCE_ENV_USE, KECHAIN_SCOPE, KECHAIN_TOKEN, KECHAIN_URL, Method,
    ProjectRequest, Query, ReplayTransport, ScopeSelector,
};
use kechain::core::enums::{Category, ScopeStatus, WidgetType};
use kechain::models::{AnyEntity, Entity, EntityKind, Property};
use serde_json::json;

const SCOPE_ID: &str = "eeb0937b-da50-4eb2-8d74-f36259cca96e";
const PART_ID: &str = "6f7bc9f0-228e-4d3a-9dc0-ec5a75d73e1d";
const ACTIVITY_ID: &str = "1c0a2f1e-6f0b-4b59-9a3f-6c2d9a7e2a10";

fn session() -> (Arc<ReplayTransport>, Client) {
    let replay = Arc::new(ReplayTransport::new());
    let client = Client::offline(replay.clone());
    (replay, client)
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn project_request_prefers_explicit_values() {
    let request = ProjectRequest {
        url: Some("https://plm.example.com".into()),
        token: Some("explicit".into()),
        scope: Some("Bike Project".into()),
        status: Some(ScopeStatus::Active),
        ..ProjectRequest::new()
    };
    let lookup = env(&[(KECHAIN_TOKEN, "from-env"), (KECHAIN_SCOPE, "Other")]);
    let (config, selector) = request.resolve(lookup).expect("resolve");
    assert_eq!(config.token.as_deref(), Some("explicit"));
    assert_eq!(
        selector,
        ScopeSelector::NameWithStatus("Bike Project".into(), ScopeStatus::Active)
    );
}

#[test]
fn forced_env_ignores_explicit_values() {
    let request = ProjectRequest {
        url: Some("https://ignored.example.com".into()),
        token: Some("ignored".into()),
        scope: Some("Ignored".into()),
        ..ProjectRequest::new()
    };
    let lookup = env(&[
        (KECHAIN_FORCE_ENV_USE, "true"),
        (KECHAIN_URL, "https://plm.example.com"),
        (KECHAIN_TOKEN, "from-env"),
        (KECHAIN_SCOPE, "Bike Project"),
    ]);
    let (config, selector) = request.resolve(lookup).expect("resolve");
    assert_eq!(config.url, "https://plm.example.com");
    assert_eq!(config.token.as_deref(), Some("from-env"));
    assert_eq!(selector, ScopeSelector::Name("Bike Project".into()));

    let err = ProjectRequest::new()
        .resolve(env(&[(KECHAIN_FORCE_ENV_USE, "yes")]))
        .expect_err("missing url");
    assert_eq!(err.kind(), ErrorKind::Client);
}

#[test]
fn project_selection_queries_by_name_and_status() {
    let (replay, client) = session();
    replay.expect_results(
        Method::Get,
        "/api/scopes.json",
        vec![json!({"id": SCOPE_ID, "name": "Bike Project", "status": "ACTIVE"})],
    );
    let scope = client
        .project(&ScopeSelector::NameWithStatus(
            "Bike Project".into(),
            ScopeStatus::Active,
        ))
        .expect("scope");
    assert_eq!(scope.id(), SCOPE_ID);
    let request = &replay.requests()[0];
    assert_eq!(request.query_value("name"), Some("Bike Project"));
    assert_eq!(request.query_value("status"), Some("ACTIVE"));
}

#[test]
fn ambiguous_and_missing_lookups_are_distinct_errors() {
    let (replay, client) = session();
    replay
        .expect_results(Method::Get, "/api/scopes.json", vec![])
        .expect_results(
            Method::Get,
            "/api/scopes.json",
            vec![json!({"id": "a", "name": "Bike"}), json!({"id": "b", "name": "Bike"})],
        );
    let missing = client.scope(&Query::new().name("Bike")).expect_err("none");
    assert_eq!(missing.kind(), ErrorKind::NotFound);
    let ambiguous = client.scope(&Query::new().name("Bike")).expect_err("many");
    assert_eq!(ambiguous.kind(), ErrorKind::MultipleFound);
}

#[test]
fn part_payload_builds_property_variants() {
    let (replay, client) = session();
    replay.expect_results(
        Method::Get,
        "/api/parts.json",
        vec![json!({
            "id": PART_ID,
            "name": "Wheel",
            "category": "MODEL",
            "properties": [
                {"id": "p1", "name": "Diameter", "property_type": "FLOAT_VALUE", "value": 26.0},
                {"id": "p2", "name": "Manual", "property_type": "ATTACHMENT_VALUE"},
                {"id": "p3", "name": "Rim", "property_type": "SINGLE_SELECT_VALUE",
                 "value_options": {"value_choices": ["carbon", "alloy"]}},
                {"id": "p4", "name": "Hub", "property_type": "REFERENCE_VALUE"},
                {"id": "p5", "name": "Spokes", "property_type": "REFERENCES_VALUE"},
                {"id": "p6", "name": "Legacy", "property_type": "SOMETHING_NEW"}
            ]
        })],
    );
    let part = client.model(&Query::new().name("Wheel")).expect("model");
    assert_eq!(part.category(), Some(Category::Model));
    assert_eq!(replay.requests()[0].query_value("category"), Some("MODEL"));

    let variants: Vec<&str> = part
        .properties()
        .iter()
        .map(|property| match property {
            Property::Scalar(_) => "scalar",
            Property::Attachment(_) => "attachment",
            Property::SingleSelect(_) => "select",
            Property::Reference(_) => "reference",
            Property::MultiReference(_) => "references",
        })
        .collect();
    assert_eq!(
        variants,
        ["scalar", "attachment", "select", "reference", "references", "scalar"]
    );
    let rim = part.property("Rim").expect("by name");
    assert_eq!(
        rim.as_select_list().expect("select").options(),
        vec!["carbon", "alloy"]
    );
    assert_eq!(part.property("p1").expect("by id").value(), &json!(26.0));
    assert_eq!(
        part.property("Missing").expect_err("missing").kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn resolve_entity_dispatches_on_kind() {
    let (replay, client) = session();
    replay.expect_results(
        Method::Get,
        &format!("/api/widgets/{PART_ID}.json"),
        vec![json!({"id": PART_ID, "widget_type": "superGridWidget", "meta": {}})],
    );
    match client.resolve_entity(EntityKind::Widget, PART_ID).expect("entity") {
        AnyEntity::Widget(widget) => assert_eq!(widget.widget_type(), WidgetType::SuperGrid),
        other => panic!("expected a widget, got {:?}", other.kind()),
    }
}

#[test]
fn registered_schema_applies_to_listed_widgets() {
    let (replay, client) = session();
    client
        .register_widget_schema(
            WidgetType::Html,
            json!({
                "type": "object",
                "required": ["htmlContent"],
                "properties": {"htmlContent": {"type": "string"}}
            }),
        )
        .expect("register");
    replay
        .expect_results(
            Method::Get,
            "/api/widgets.json",
            vec![json!({"id": PART_ID, "widget_type": "HTML", "meta": {"htmlContent": "<p/>"}})],
        )
        .expect_results(
            Method::Get,
            "/api/widgets.json",
            vec![json!({"id": PART_ID, "widget_type": "HTML", "meta": {}})],
        );

    let widgets = client
        .widgets(&Query::new().activity(ACTIVITY_ID))
        .expect("widgets");
    assert_eq!(widgets.len(), 1);
    assert_eq!(replay.requests()[0].query_value("activity_id"), Some(ACTIVITY_ID));

    let err = client
        .widgets(&Query::new().activity(ACTIVITY_ID))
        .expect_err("missing htmlContent");
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
}
