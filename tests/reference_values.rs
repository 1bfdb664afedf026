// Integration tests for reference property assignment against a scripted server.
use std::sync::Arc;

use kechain::api::{Client, ErrorKind, Method, ReplayTransport};
use kechain::models::{Entity, Part, Property};
use serde_json::{Value, json};

const WHEEL_MODEL: &str = "6f7bc9f0-228e-4d3a-9dc0-ec5a75d73e1d";
const FRAME_MODEL: &str = "eeb0937b-da50-4eb2-8d74-f36259cca96e";
const WHEEL_INSTANCE: &str = "1c0a2f1e-6f0b-4b59-9a3f-6c2d9a7e2a10";
const PROP: &str = "b3f4a6e2-2d0c-4a4d-9f62-3c1e7d8b5a90";
const PROP_PATH: &str = "/api/properties/b3f4a6e2-2d0c-4a4d-9f62-3c1e7d8b5a90.json";

fn session() -> (Arc<ReplayTransport>, Client) {
    let replay = Arc::new(ReplayTransport::new());
    let client = Client::offline(replay.clone());
    (replay, client)
}

fn part(client: &Client, id: &str, category: &str) -> Part {
    Part::from_json(json!({"id": id, "name": "Wheel", "category": category}), client).expect("part")
}

fn references(client: &Client, property_type: &str, value: Value) -> Property {
    Property::create(
        json!({
            "id": PROP,
            "name": "Wheels",
            "category": "MODEL",
            "property_type": property_type,
            "value": value
        }),
        client,
    )
    .expect("property")
}

fn sent_value(replay: &ReplayTransport) -> Value {
    let writes = replay.writes();
    let body = writes.last().and_then(|request| request.body.clone()).expect("body");
    body["value"].clone()
}

#[test]
fn multi_reference_assignment_forms_agree() {
    let (replay, client) = session();
    for _ in 0..5 {
        replay.expect(Method::Put, PROP_PATH, 200, json!({}));
    }
    let wheel = part(&client, WHEEL_MODEL, "MODEL");
    let frame = part(&client, FRAME_MODEL, "MODEL");
    let mut property = references(&client, "REFERENCES_VALUE", Value::Null);

    property.set_value(Value::Null).expect("null");
    assert_eq!(sent_value(&replay), Value::Null);
    assert_eq!(property.value(), &Value::Null);

    property.set_value(vec![&wheel, &frame]).expect("entities");
    let by_entity = sent_value(&replay);
    property.set_value(vec![WHEEL_MODEL, FRAME_MODEL]).expect("ids");
    let by_id = sent_value(&replay);
    assert_eq!(by_entity, by_id);
    assert_eq!(by_id, json!([WHEEL_MODEL, FRAME_MODEL]));

    property.set_value([&wheel]).expect("single element list");
    assert_eq!(property.reference_ids(), vec![WHEEL_MODEL.to_string()]);

    property.set_value(Vec::<&str>::new()).expect("empty list");
    assert_eq!(sent_value(&replay), Value::Null);
    assert!(property.as_multi_reference().and_then(|p| p.value()).is_none());
}

#[test]
fn multi_reference_rejects_bare_entity_and_bad_elements() {
    let (replay, client) = session();
    let wheel = part(&client, WHEEL_MODEL, "MODEL");
    let mut property = references(&client, "REFERENCES_VALUE", json!([FRAME_MODEL]));

    let err = property.set_value(&wheel).expect_err("bare entity");
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert!(err.hint().is_some());

    let err = property.set_value(json!([WHEEL_MODEL, 1])).expect_err("int element");
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert_eq!(err.index(), Some(1));

    let err = property.set_value(json!(["not-a-uuid"])).expect_err("bad id");
    assert_eq!(err.index(), Some(0));

    assert!(replay.requests().is_empty());
    assert_eq!(property.reference_ids(), vec![FRAME_MODEL.to_string()]);
}

#[test]
fn category_mismatch_is_rejected_before_sending() {
    let (replay, client) = session();
    let instance = part(&client, WHEEL_INSTANCE, "INSTANCE");
    let mut property = references(&client, "REFERENCE_VALUE", Value::Null);

    let err = property.set_value(&instance).expect_err("instance into model");
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert!(replay.requests().is_empty());
}

#[test]
fn single_reference_round_trips_and_resolves_lazily() {
    let (replay, client) = session();
    replay
        .expect(Method::Put, PROP_PATH, 200, json!({}))
        .expect_results(
            Method::Get,
            "/api/parts.json",
            vec![json!({"id": WHEEL_MODEL, "name": "Wheel", "category": "MODEL"})],
        );
    let wheel = part(&client, WHEEL_MODEL, "MODEL");
    let mut property = references(&client, "REFERENCE_VALUE", Value::Null);

    property.set_value(&wheel).expect("set");
    assert_eq!(sent_value(&replay), json!(WHEEL_MODEL));
    assert_eq!(replay.requests().len(), 1);

    let reference = property.as_reference_mut().expect("reference variant");
    let referenced = reference.referenced().expect("lookup").expect("some part");
    assert_eq!(referenced.id(), WHEEL_MODEL);
    let again = reference.referenced().expect("cached").expect("some part");
    assert_eq!(again.id(), WHEEL_MODEL);
    assert_eq!(replay.requests().len(), 2);

    let err = property.set_value(vec![&wheel]).expect_err("list into single");
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
}

#[test]
fn multi_reference_resolves_in_stored_order() {
    let (replay, client) = session();
    replay.expect_results(
        Method::Get,
        "/api/parts.json",
        vec![
            json!({"id": WHEEL_MODEL, "name": "Wheel", "category": "MODEL"}),
            json!({"id": FRAME_MODEL, "name": "Frame", "category": "MODEL"}),
        ],
    );
    let mut property = references(&client, "REFERENCES_VALUE", json!([FRAME_MODEL, WHEEL_MODEL]));
    let multi = property.as_multi_reference_mut().expect("multi reference");

    let parts = multi.referenced().expect("lookup");
    let ids: Vec<&str> = parts.iter().map(|part| part.id()).collect();
    assert_eq!(ids, vec![FRAME_MODEL, WHEEL_MODEL]);
    assert_eq!(
        replay.requests()[0].query_value("id__in"),
        Some(format!("{FRAME_MODEL},{WHEEL_MODEL}").as_str())
    );

    multi.referenced().expect("cached");
    assert_eq!(replay.requests().len(), 1);
}

#[test]
fn failed_write_keeps_previous_value() {
    let (replay, client) = session();
    replay.expect(Method::Put, PROP_PATH, 400, json!({"detail": "bad value"}));
    let mut property = references(&client, "REFERENCES_VALUE", json!([FRAME_MODEL]));

    let err = property.set_value(vec![WHEEL_MODEL]).expect_err("rejected");
    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.status(), Some(400));
    assert_eq!(property.reference_ids(), vec![FRAME_MODEL.to_string()]);
}
