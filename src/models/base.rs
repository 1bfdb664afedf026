//! Purpose: Shared plumbing for every server-side object wrapper.
//! Exports: `Base`, `Entity`, `EntityKind`, `ObjectRef`, `ValueInput`.
//! Role: Binds a payload's `id`/`name` to a client handle and defines the caller-side value vocabulary.
//! Invariants: Every entity keeps its raw source payload until the next refresh.
//! Invariants: `refresh` replaces the whole wrapper; nothing is patched field by field.
use crate::api::{Client, Resource};
use crate::core::enums::Category;
use crate::core::error::{Error, ErrorKind};
use crate::core::ident::is_uuid;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use serde_json::Value;
use std::fmt;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind {
    Scope,
    Part,
    Property,
    Activity,
    Widget,
    Service,
    ServiceExecution,
    User,
    Team,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Scope => "scope",
            EntityKind::Part => "part",
            EntityKind::Property => "property",
            EntityKind::Activity => "activity",
            EntityKind::Widget => "widget",
            EntityKind::Service => "service",
            EntityKind::ServiceExecution => "service execution",
            EntityKind::User => "user",
            EntityKind::Team => "team",
        }
    }

    pub fn item_resource(self, id: &str) -> Resource<'_> {
        match self {
            EntityKind::Scope => Resource::Scope(id),
            EntityKind::Part => Resource::Part(id),
            EntityKind::Property => Resource::Property(id),
            EntityKind::Activity => Resource::Activity(id),
            EntityKind::Widget => Resource::Widget(id),
            EntityKind::Service => Resource::Service(id),
            EntityKind::ServiceExecution => Resource::ServiceExecution(id),
            EntityKind::User => Resource::User(id),
            EntityKind::Team => Resource::Team(id),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct Base {
    id: String,
    name: Option<String>,
    json: Value,
    client: Client,
}

impl Base {
    pub(crate) fn from_json(kind: EntityKind, json: Value, client: &Client) -> ApiResult<Self> {
        let id = json
            .get("id")
            .or_else(|| json.get("pk"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::new(ErrorKind::Internal).with_message(format!("{kind} payload has no id"))
            })?;
        let name = json.get("name").and_then(Value::as_str).map(str::to_string);
        Ok(Self {
            id,
            name,
            json,
            client: client.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn set_field(&mut self, key: &str, value: Value) {
        if key == "name" {
            self.name = value.as_str().map(str::to_string);
        }
        if let Value::Object(map) = &mut self.json {
            map.insert(key.to_string(), value);
        }
    }
}

impl fmt::Debug for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// A typed wrapper around one KE-chain object.
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self>;

    fn base(&self) -> &Base;

    fn id(&self) -> &str {
        self.base().id()
    }

    fn name(&self) -> Option<&str> {
        self.base().name()
    }

    fn json(&self) -> &Value {
        self.base().json()
    }

    fn client(&self) -> &Client {
        self.base().client()
    }

    /// Re-fetches this object by id and replaces `self` in place.
    fn refresh(&mut self) -> ApiResult<()> {
        let client = self.client().clone();
        let json = client.reload(Self::KIND, self.id())?;
        self.refresh_from(json)
    }

    /// Rebuilds `self` from a payload the server already returned.
    fn refresh_from(&mut self, json: Value) -> ApiResult<()> {
        let client = self.client().clone();
        *self = Self::from_json(json, &client)?;
        Ok(())
    }

    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(Self::KIND, self.id())
    }
}

/// What a caller hands over when pointing at another object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectRef {
    pub kind: EntityKind,
    pub id: String,
    pub category: Option<Category>,
    pub model_id: Option<String>,
}

impl ObjectRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            category: None,
            model_id: None,
        }
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn with_model_id(mut self, model_id: Option<String>) -> Self {
        self.model_id = model_id;
        self
    }
}

/// Loosely-shaped input accepted by setters: objects, id strings, lists, or raw JSON.
///
/// Setters validate the shape they need and reject the rest with
/// `IllegalArgument` before anything is sent.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueInput {
    Null,
    Object(ObjectRef),
    Text(String),
    List(Vec<ValueInput>),
    Json(Value),
}

impl ValueInput {
    pub fn is_null(&self) -> bool {
        matches!(self, ValueInput::Null | ValueInput::Json(Value::Null))
    }

    /// Plain JSON rendering; objects collapse to their id.
    pub fn to_json(&self) -> Value {
        match self {
            ValueInput::Null => Value::Null,
            ValueInput::Object(object) => Value::String(object.id.clone()),
            ValueInput::Text(text) => Value::String(text.clone()),
            ValueInput::List(items) => Value::Array(items.iter().map(ValueInput::to_json).collect()),
            ValueInput::Json(value) => value.clone(),
        }
    }

    /// Lifts raw JSON strings and arrays into `Text` and `List`.
    pub(crate) fn normalized(self) -> ValueInput {
        match self {
            ValueInput::Json(value) => ValueInput::from(value),
            other => other,
        }
    }

    fn describe(&self) -> String {
        match self {
            ValueInput::Null => "null".to_string(),
            ValueInput::Object(object) => format!("{} {}", object.kind, object.id),
            ValueInput::Text(text) => format!("'{text}'"),
            ValueInput::List(_) => "a list".to_string(),
            ValueInput::Json(value) => value.to_string(),
        }
    }
}

impl From<Value> for ValueInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ValueInput::Null,
            Value::String(text) => ValueInput::Text(text),
            Value::Array(items) => ValueInput::List(items.into_iter().map(ValueInput::from).collect()),
            other => ValueInput::Json(other),
        }
    }
}

impl From<ObjectRef> for ValueInput {
    fn from(object: ObjectRef) -> Self {
        ValueInput::Object(object)
    }
}

impl From<&str> for ValueInput {
    fn from(text: &str) -> Self {
        ValueInput::Text(text.to_string())
    }
}

impl From<String> for ValueInput {
    fn from(text: String) -> Self {
        ValueInput::Text(text)
    }
}

impl From<&String> for ValueInput {
    fn from(text: &String) -> Self {
        ValueInput::Text(text.clone())
    }
}

impl From<bool> for ValueInput {
    fn from(value: bool) -> Self {
        ValueInput::Json(Value::Bool(value))
    }
}

impl From<i64> for ValueInput {
    fn from(value: i64) -> Self {
        ValueInput::Json(Value::from(value))
    }
}

impl From<f64> for ValueInput {
    fn from(value: f64) -> Self {
        ValueInput::Json(Value::from(value))
    }
}

impl<T: Into<ValueInput>> From<Option<T>> for ValueInput {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ValueInput::Null)
    }
}

impl<T: Into<ValueInput>> From<Vec<T>> for ValueInput {
    fn from(items: Vec<T>) -> Self {
        ValueInput::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<ValueInput>> From<&[T]> for ValueInput {
    fn from(items: &[T]) -> Self {
        ValueInput::List(items.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<ValueInput>, const N: usize> From<[T; N]> for ValueInput {
    fn from(items: [T; N]) -> Self {
        ValueInput::List(items.into_iter().map(Into::into).collect())
    }
}

/// Normalizes a list of objects of one kind (or their ids) into ids.
///
/// `Null` is the empty list. A bare object or id is rejected: the callers
/// of this helper replace whole lists.
pub(crate) fn collect_ids(input: ValueInput, kind: EntityKind, what: &str) -> ApiResult<Vec<String>> {
    let items = match input.normalized() {
        ValueInput::Null => return Ok(Vec::new()),
        ValueInput::List(items) => items,
        other => {
            return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                "{what} should be a list of {kind}s or ids, got {}",
                other.describe()
            )));
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item.normalized() {
            ValueInput::Object(object) if object.kind == kind => Ok(object.id),
            ValueInput::Text(id) if is_uuid(&id) => Ok(id),
            other => Err(Error::new(ErrorKind::IllegalArgument)
                .with_message(format!(
                    "{what} should contain {kind}s or ids, got {}",
                    other.describe()
                ))
                .with_index(index)),
        })
        .collect()
}

pub(crate) fn describe_input(input: &ValueInput) -> String {
    input.describe()
}

/// Decodes a payload into its wire struct, mapping failures to `Internal`.
pub(crate) fn decode<T: DeserializeOwned>(kind: EntityKind, json: &Value) -> ApiResult<T> {
    serde_json::from_value(json.clone()).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message(format!("invalid {kind} payload"))
            .with_source(err)
    })
}

/// Serde hook for defaulted fields the server sometimes sends as `null`.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Reads a string field straight from a payload; any other JSON type reads as absent.
pub(crate) fn str_field<'a>(json: &'a Value, key: &str) -> Option<&'a str> {
    json.get(key).and_then(Value::as_str)
}

/// Reads an id that the server spells either as a string or as `{"id": ..}`.
pub(crate) fn id_of(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Object(map)) => map
            .get("id")
            .or_else(|| map.get("pk"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Parses an optional enum field, logging (not failing on) values this client does not know.
pub(crate) fn lenient<T>(raw: Option<&str>, parse: fn(&str) -> Option<T>, field: &str) -> Option<T> {
    let raw = raw?;
    let parsed = parse(raw);
    if parsed.is_none() {
        tracing::warn!(field, value = raw, "unrecognized enum value in payload");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, ObjectRef, ValueInput, collect_ids, decode, id_of, null_default, str_field};
    use crate::core::error::ErrorKind;
    use serde_json::{Value, json};

    const ID_A: &str = "6f7bc9f0-228e-4d3a-9dc0-ec5a75d73e1d";
    const ID_B: &str = "eeb0937b-da50-4eb2-8d74-f36259cca96e";

    #[test]
    fn json_strings_become_text_and_arrays_become_lists() {
        let input = ValueInput::from(json!([ID_A, 15, null]));
        assert_eq!(
            input,
            ValueInput::List(vec![
                ValueInput::Text(ID_A.to_string()),
                ValueInput::Json(json!(15)),
                ValueInput::Null,
            ])
        );
        assert!(ValueInput::from(Value::Null).is_null());
        assert!(ValueInput::from(None::<&str>).is_null());
    }

    #[test]
    fn to_json_collapses_objects_to_ids() {
        let input = ValueInput::from(vec![
            ValueInput::from(ObjectRef::new(EntityKind::Part, ID_A)),
            ValueInput::from(ID_B),
        ]);
        assert_eq!(input.to_json(), json!([ID_A, ID_B]));
    }

    #[test]
    fn collect_ids_accepts_objects_and_uuid_strings() {
        let input = ValueInput::from(vec![
            ValueInput::from(ObjectRef::new(EntityKind::Property, ID_A)),
            ValueInput::from(ID_B),
        ]);
        let ids = collect_ids(input, EntityKind::Property, "inputs").expect("ids");
        assert_eq!(ids, vec![ID_A.to_string(), ID_B.to_string()]);
        assert!(collect_ids(ValueInput::Null, EntityKind::Property, "inputs")
            .expect("empty")
            .is_empty());
    }

    #[test]
    fn raw_json_strings_and_arrays_are_lifted() {
        assert_eq!(
            ValueInput::Json(json!(ID_A)).normalized(),
            ValueInput::Text(ID_A.to_string())
        );
        assert_eq!(ValueInput::Json(Value::Null).normalized(), ValueInput::Null);
        assert_eq!(ValueInput::Json(json!(3)).normalized(), ValueInput::Json(json!(3)));
        let ids = collect_ids(ValueInput::Json(json!([ID_A, ID_B])), EntityKind::Property, "inputs")
            .expect("ids");
        assert_eq!(ids, vec![ID_A.to_string(), ID_B.to_string()]);
    }

    #[test]
    fn collect_ids_rejects_wrong_kind_with_index() {
        let input = ValueInput::from(vec![
            ValueInput::from(ID_A),
            ValueInput::from(ObjectRef::new(EntityKind::Part, ID_B)),
        ]);
        let err = collect_ids(input, EntityKind::Property, "inputs").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        assert_eq!(err.index(), Some(1));
    }

    #[test]
    fn collect_ids_rejects_bare_id() {
        let err = collect_ids(ValueInput::from(ID_A), EntityKind::Property, "inputs")
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    }

    #[derive(serde::Deserialize)]
    struct Flags {
        #[serde(default, deserialize_with = "null_default")]
        enabled: bool,
        #[serde(default, deserialize_with = "null_default")]
        tags: Vec<String>,
    }

    #[test]
    fn null_default_treats_null_as_missing() {
        for payload in [json!({"enabled": null, "tags": null}), json!({})] {
            let flags: Flags = decode(EntityKind::Part, &payload).expect("flags");
            assert!(!flags.enabled);
            assert!(flags.tags.is_empty());
        }
        let flags: Flags = decode(EntityKind::Part, &json!({"enabled": true, "tags": ["a"]}))
            .expect("flags");
        assert!(flags.enabled);
        assert_eq!(flags.tags, vec!["a".to_string()]);
    }

    #[test]
    fn str_field_ignores_non_strings() {
        let payload = json!({"widget_type": 5, "title": "Wheels", "meta": null});
        assert_eq!(str_field(&payload, "widget_type"), None);
        assert_eq!(str_field(&payload, "meta"), None);
        assert_eq!(str_field(&payload, "missing"), None);
        assert_eq!(str_field(&payload, "title"), Some("Wheels"));
    }

    #[test]
    fn id_of_reads_strings_and_objects() {
        assert_eq!(id_of(Some(&json!(ID_A))), Some(ID_A.to_string()));
        assert_eq!(id_of(Some(&json!({"id": ID_B, "name": "Wheel"}))), Some(ID_B.to_string()));
        assert_eq!(id_of(Some(&json!(12))), None);
        assert_eq!(id_of(None), None);
    }
}
