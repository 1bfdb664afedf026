// Integration tests for reference pre-filters and excluded property models.
use std::sync::Arc;

use kechain::api::{Client, ErrorKind, Method, ReplayTransport};
use kechain::core::enums::FilterType;
use kechain::models::Property;
use serde_json::{Value, json};

const WHEEL_MODEL: &str = "6f7bc9f0-228e-4d3a-9dc0-ec5a75d73e1d";
const FRAME_MODEL: &str = "eeb0937b-da50-4eb2-8d74-f36259cca96e";
const REF_PROP: &str = "b3f4a6e2-2d0c-4a4d-9f62-3c1e7d8b5a90";
const REF_PATH: &str = "/api/properties/b3f4a6e2-2d0c-4a4d-9f62-3c1e7d8b5a90.json";

fn session() -> (Arc<ReplayTransport>, Client) {
    let replay = Arc::new(ReplayTransport::new());
    let client = Client::offline(replay.clone());
    (replay, client)
}

fn wheels_reference(client: &Client, options: Value) -> Property {
    Property::create(
        json!({
            "id": REF_PROP,
            "name": "Wheels",
            "category": "MODEL",
            "property_type": "REFERENCES_VALUE",
            "value": [WHEEL_MODEL],
            "value_options": options
        }),
        client,
    )
    .expect("reference property")
}

fn property_model(client: &Client, id: &str, property_type: &str, part_id: &str) -> Property {
    Property::create(
        json!({
            "id": id,
            "name": id,
            "category": "MODEL",
            "property_type": property_type,
            "part_id": part_id
        }),
        client,
    )
    .expect("property model")
}

#[test]
fn prefilters_are_persisted_and_read_back() {
    let (replay, client) = session();
    replay.expect(Method::Put, REF_PATH, 200, json!({}));
    let diameter = property_model(&client, "diameter", "FLOAT_VALUE", WHEEL_MODEL);
    let brand = property_model(&client, "brand", "CHAR_VALUE", WHEEL_MODEL);
    let mut property = wheels_reference(&client, json!({"prefilters": {"old": "1:exact"}}));

    property
        .as_multi_reference_mut()
        .expect("multi reference")
        .set_prefilters(
            &[&diameter, &brand],
            &[json!(26.5), json!("Mavic")],
            &[FilterType::GreaterThanEqual, FilterType::Contains],
            true,
        )
        .expect("set prefilters");

    let body = replay.writes()[0].body.clone().expect("body");
    assert_eq!(
        body["value_options"]["prefilters"],
        json!({"diameter": "26.5:gte", "brand": "Mavic:icontains"})
    );
    let stored = property.as_multi_reference().expect("multi reference").prefilters();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|prefilter| prefilter.property_id != "old"));
}

#[test]
fn length_mismatch_sends_nothing() {
    let (replay, client) = session();
    let diameter = property_model(&client, "diameter", "FLOAT_VALUE", WHEEL_MODEL);
    let mut property = wheels_reference(&client, json!({}));

    let err = property
        .as_multi_reference_mut()
        .expect("multi reference")
        .set_prefilters(&[&diameter], &[json!(1.0), json!(2.0)], &[FilterType::Exact], false)
        .expect_err("mismatch");
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert!(replay.requests().is_empty());
}

#[test]
fn foreign_property_model_is_rejected_with_index() {
    let (replay, client) = session();
    let diameter = property_model(&client, "diameter", "FLOAT_VALUE", WHEEL_MODEL);
    let tube = property_model(&client, "tube", "FLOAT_VALUE", FRAME_MODEL);
    let mut property = wheels_reference(&client, json!({}));

    let err = property
        .as_multi_reference_mut()
        .expect("multi reference")
        .set_prefilters(
            &[&diameter, &tube],
            &[json!(1.0), json!(2.0)],
            &[FilterType::Exact, FilterType::Exact],
            false,
        )
        .expect_err("foreign model");
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert_eq!(err.index(), Some(1));
    assert!(replay.requests().is_empty());
}

#[test]
fn excluded_models_merge_without_duplicates() {
    let (replay, client) = session();
    replay.expect(Method::Put, REF_PATH, 200, json!({}));
    let diameter = property_model(&client, "diameter", "FLOAT_VALUE", WHEEL_MODEL);
    let brand = property_model(&client, "brand", "CHAR_VALUE", WHEEL_MODEL);
    let mut property = wheels_reference(&client, json!({"propmodels_excl": ["diameter"]}));

    let reference = property.as_multi_reference_mut().expect("multi reference");
    reference
        .set_excluded_propmodels(&[&diameter, &brand], false)
        .expect("exclude");
    assert_eq!(
        reference.excluded_propmodels(),
        vec!["diameter".to_string(), "brand".to_string()]
    );
}

#[test]
fn instance_reference_cannot_carry_prefilters() {
    let (replay, client) = session();
    let diameter = property_model(&client, "diameter", "FLOAT_VALUE", WHEEL_MODEL);
    let mut property = Property::create(
        json!({
            "id": REF_PROP,
            "name": "Wheels",
            "category": "INSTANCE",
            "property_type": "REFERENCES_VALUE",
            "value": null
        }),
        &client,
    )
    .expect("reference instance");

    let reference = property.as_multi_reference_mut().expect("multi reference");
    let err = reference
        .set_prefilters(&[&diameter], &[json!(26.5)], &[FilterType::Exact], false)
        .expect_err("instance");
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert!(err.hint().is_some());
    let err = reference
        .set_excluded_propmodels(&[&diameter], false)
        .expect_err("instance");
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert!(replay.requests().is_empty());
}
