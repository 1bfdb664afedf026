//! Purpose: The property family and its `property_type` factory.
//! Exports: `Property`, `PropertyData`, `ScalarProperty`, `AttachmentProperty`, `SelectListProperty`.
//! Role: Typed value holders attached to parts; every setter validates before it persists.
//! Invariants: A missing or unknown `property_type` yields `Property::Scalar`, never an error.
//! Invariants: Local value and options change only after the server accepted the update.
use super::base::{
    Base, Entity, EntityKind, ValueInput, decode, describe_input, id_of, lenient, str_field,
};
use super::part::Part;
use super::reference::{MultiReferenceProperty, ReferenceProperty};
use crate::api::{Client, Method, Resource};
use crate::core::enums::{Category, PropertyType};
use crate::core::error::{Error, ErrorKind};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

type ApiResult<T> = Result<T, Error>;

#[derive(Deserialize)]
struct RemoteProperty {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    value_options: Option<Value>,
    #[serde(default)]
    options: Option<Value>,
    #[serde(default)]
    part_id: Option<Value>,
    #[serde(default)]
    part: Option<Value>,
    #[serde(default)]
    model_id: Option<Value>,
    #[serde(default)]
    model: Option<Value>,
    #[serde(default)]
    scope_id: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    order: Option<i64>,
}

/// Fields shared by every property variant.
#[derive(Clone, Debug)]
pub struct PropertyData {
    base: Base,
    property_type: Option<PropertyType>,
    category: Option<Category>,
    value: Value,
    options: Map<String, Value>,
    part_id: Option<String>,
    model_id: Option<String>,
    scope_id: Option<String>,
    description: Option<String>,
    unit: Option<String>,
    order: Option<i64>,
}

impl PropertyData {
    pub(crate) fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        let remote: RemoteProperty = decode(EntityKind::Property, &json)?;
        let options = match remote.value_options.or(remote.options) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Ok(Self {
            property_type: lenient(
                str_field(&json, "property_type"),
                PropertyType::parse,
                "property_type",
            ),
            category: lenient(remote.category.as_deref(), Category::parse, "category"),
            value: remote.value,
            options,
            part_id: id_of(remote.part_id.as_ref()).or_else(|| id_of(remote.part.as_ref())),
            model_id: id_of(remote.model_id.as_ref()).or_else(|| id_of(remote.model.as_ref())),
            scope_id: id_of(remote.scope_id.as_ref()),
            description: remote.description,
            unit: remote.unit,
            order: remote.order,
            base: Base::from_json(EntityKind::Property, json, client)?,
        })
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn id(&self) -> &str {
        self.base.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.base.name()
    }

    pub fn client(&self) -> &Client {
        self.base.client()
    }

    pub fn property_type(&self) -> Option<PropertyType> {
        self.property_type
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn part_id(&self) -> Option<&str> {
        self.part_id.as_deref()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn order(&self) -> Option<i64> {
        self.order
    }

    pub(crate) fn label(&self) -> String {
        self.name().unwrap_or(self.id()).to_string()
    }

    fn put(&self, body: &Value, action: &str) -> ApiResult<()> {
        self.client().send(
            Method::Put,
            Resource::Property(self.id()),
            Some(body),
            200,
            action,
        )?;
        Ok(())
    }

    pub(crate) fn persist_value(&mut self, value: Value) -> ApiResult<()> {
        self.put(&json!({ "value": value }), "update property value")?;
        self.base.set_field("value", value.clone());
        self.value = value;
        Ok(())
    }

    pub(crate) fn persist_options(&mut self, options: Map<String, Value>) -> ApiResult<()> {
        let options = Value::Object(options);
        self.put(&json!({ "value_options": options }), "update property options")?;
        self.base.set_field("value_options", options.clone());
        if let Value::Object(map) = options {
            self.options = map;
        }
        Ok(())
    }
}

/// Fallback variant: text, numbers, booleans, links, datetimes.
#[derive(Clone, Debug)]
pub struct ScalarProperty {
    data: PropertyData,
}

impl ScalarProperty {
    pub fn data(&self) -> &PropertyData {
        &self.data
    }

    pub fn value(&self) -> &Value {
        self.data.value()
    }

    pub fn set_value(&mut self, input: impl Into<ValueInput>) -> ApiResult<()> {
        let value = scalar_json(input.into())?;
        check_scalar(self.data.property_type(), &value)?;
        self.data.persist_value(value)
    }
}

#[derive(Clone, Debug)]
pub struct AttachmentProperty {
    data: PropertyData,
}

impl AttachmentProperty {
    pub fn data(&self) -> &PropertyData {
        &self.data
    }

    /// Download location of the attachment, if any.
    pub fn value(&self) -> Option<&str> {
        self.data.value().as_str()
    }

    pub fn has_value(&self) -> bool {
        self.value().is_some()
    }

    pub fn filename(&self) -> Option<&str> {
        let value = self.value()?;
        value
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty())
    }

    pub fn clear(&mut self) -> ApiResult<()> {
        self.data.persist_value(Value::Null)
    }

    fn set_value(&mut self, input: ValueInput) -> ApiResult<()> {
        if input.is_null() {
            return self.clear();
        }
        Err(Error::new(ErrorKind::IllegalArgument)
            .with_message(format!(
                "cannot assign {} to attachment property '{}'",
                describe_input(&input),
                self.data.label()
            ))
            .with_hint("Attachments are uploaded, not assigned; only null clears them."))
    }
}

#[derive(Clone, Debug)]
pub struct SelectListProperty {
    data: PropertyData,
}

impl SelectListProperty {
    pub fn data(&self) -> &PropertyData {
        &self.data
    }

    pub fn value(&self) -> Option<&str> {
        self.data.value().as_str()
    }

    /// The selectable values (`value_choices`).
    pub fn options(&self) -> Vec<&str> {
        self.data
            .options()
            .get("value_choices")
            .and_then(Value::as_array)
            .map(|choices| choices.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn set_value(&mut self, input: impl Into<ValueInput>) -> ApiResult<()> {
        let value = scalar_json(input.into())?;
        if let Some(choice) = value.as_str() {
            let options = self.options();
            if !options.contains(&choice) {
                return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                    "'{choice}' is not a valid option of '{}'; expected one of {}",
                    self.data.label(),
                    options.join(", ")
                )));
            }
        } else if !value.is_null() {
            return Err(Error::new(ErrorKind::IllegalArgument)
                .with_message(format!("select list value must be a string, got {value}")));
        }
        self.data.persist_value(value)
    }

    /// Replaces the selectable values; only property models carry them.
    pub fn set_options(&mut self, choices: &[&str]) -> ApiResult<()> {
        if self.data.category() != Some(Category::Model) {
            return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                "options of '{}' can only be set on the property model",
                self.data.label()
            )));
        }
        let mut options = self.data.options().clone();
        options.insert("value_choices".to_string(), json!(choices));
        self.data.persist_options(options)
    }
}

/// A part attribute, specialized by `property_type`.
#[derive(Clone, Debug)]
pub enum Property {
    Scalar(ScalarProperty),
    Attachment(AttachmentProperty),
    SingleSelect(SelectListProperty),
    Reference(ReferenceProperty),
    MultiReference(MultiReferenceProperty),
}

impl Property {
    /// Factory: picks the variant for the payload's `property_type`.
    pub fn create(json: Value, client: &Client) -> ApiResult<Property> {
        let data = PropertyData::from_json(json, client)?;
        Ok(match data.property_type() {
            Some(PropertyType::AttachmentValue) => Property::Attachment(AttachmentProperty { data }),
            Some(PropertyType::SingleSelectValue) => {
                Property::SingleSelect(SelectListProperty { data })
            }
            Some(PropertyType::ReferenceValue) => Property::Reference(ReferenceProperty::new(data)),
            Some(PropertyType::ReferencesValue) => {
                Property::MultiReference(MultiReferenceProperty::new(data))
            }
            Some(
                PropertyType::CharValue
                | PropertyType::TextValue
                | PropertyType::BooleanValue
                | PropertyType::IntValue
                | PropertyType::FloatValue
                | PropertyType::DatetimeValue
                | PropertyType::LinkValue,
            ) => Property::Scalar(ScalarProperty { data }),
            None => {
                tracing::debug!(id = data.id(), "property without known type, using scalar");
                Property::Scalar(ScalarProperty { data })
            }
        })
    }

    pub fn data(&self) -> &PropertyData {
        match self {
            Property::Scalar(property) => &property.data,
            Property::Attachment(property) => &property.data,
            Property::SingleSelect(property) => &property.data,
            Property::Reference(property) => property.data(),
            Property::MultiReference(property) => property.data(),
        }
    }

    fn data_mut(&mut self) -> &mut PropertyData {
        match self {
            Property::Scalar(property) => &mut property.data,
            Property::Attachment(property) => &mut property.data,
            Property::SingleSelect(property) => &mut property.data,
            Property::Reference(property) => property.data_mut(),
            Property::MultiReference(property) => property.data_mut(),
        }
    }

    pub fn property_type(&self) -> Option<PropertyType> {
        self.data().property_type()
    }

    pub fn category(&self) -> Option<Category> {
        self.data().category()
    }

    /// The stored value as the server spells it.
    pub fn value(&self) -> &Value {
        self.data().value()
    }

    /// Validates `input` for this variant and persists it.
    pub fn set_value(&mut self, input: impl Into<ValueInput>) -> ApiResult<()> {
        let input = input.into();
        match self {
            Property::Scalar(property) => property.set_value(input),
            Property::Attachment(property) => property.set_value(input),
            Property::SingleSelect(property) => property.set_value(input),
            Property::Reference(property) => property.set_value(input),
            Property::MultiReference(property) => property.set_value(input),
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceProperty> {
        match self {
            Property::Reference(property) => Some(property),
            _ => None,
        }
    }

    pub fn as_reference_mut(&mut self) -> Option<&mut ReferenceProperty> {
        match self {
            Property::Reference(property) => Some(property),
            _ => None,
        }
    }

    pub fn as_multi_reference(&self) -> Option<&MultiReferenceProperty> {
        match self {
            Property::MultiReference(property) => Some(property),
            _ => None,
        }
    }

    pub fn as_multi_reference_mut(&mut self) -> Option<&mut MultiReferenceProperty> {
        match self {
            Property::MultiReference(property) => Some(property),
            _ => None,
        }
    }

    pub fn as_select_list(&self) -> Option<&SelectListProperty> {
        match self {
            Property::SingleSelect(property) => Some(property),
            _ => None,
        }
    }

    pub fn as_select_list_mut(&mut self) -> Option<&mut SelectListProperty> {
        match self {
            Property::SingleSelect(property) => Some(property),
            _ => None,
        }
    }

    pub fn as_attachment_mut(&mut self) -> Option<&mut AttachmentProperty> {
        match self {
            Property::Attachment(property) => Some(property),
            _ => None,
        }
    }

    /// Ids this property points at (empty for non-reference variants).
    pub fn reference_ids(&self) -> Vec<String> {
        match self {
            Property::Reference(property) => property.value().map(str::to_string).into_iter().collect(),
            Property::MultiReference(property) => property.value().map(<[String]>::to_vec).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn edit(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        unit: Option<&str>,
    ) -> ApiResult<()> {
        let mut body = Map::new();
        if let Some(name) = name {
            body.insert("name".into(), json!(name));
        }
        if let Some(description) = description {
            body.insert("description".into(), json!(description));
        }
        if let Some(unit) = unit {
            body.insert("unit".into(), json!(unit));
        }
        if body.is_empty() {
            return Ok(());
        }
        let data = self.data_mut();
        data.put(&Value::Object(body.clone()), "edit property")?;
        for (key, value) in body {
            match key.as_str() {
                "description" => data.description = value.as_str().map(str::to_string),
                "unit" => data.unit = value.as_str().map(str::to_string),
                _ => {}
            }
            data.base.set_field(&key, value);
        }
        Ok(())
    }

    pub fn delete(self) -> ApiResult<()> {
        self.client().send(
            Method::Delete,
            Resource::Property(self.id()),
            None,
            204,
            "delete property",
        )?;
        Ok(())
    }

    /// The part this property belongs to.
    pub fn part(&self) -> ApiResult<Part> {
        let part_id = self.data().part_id().ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("property '{}' has no part", self.data().label()))
        })?;
        self.client().part_by_id(part_id)
    }

    /// The property model this instance property was created from.
    pub fn model(&self) -> ApiResult<Property> {
        let model_id = self.data().model_id().ok_or_else(|| {
            Error::new(ErrorKind::IllegalArgument)
                .with_message(format!("property '{}' has no model", self.data().label()))
        })?;
        self.client().property(model_id)
    }
}

impl Entity for Property {
    const KIND: EntityKind = EntityKind::Property;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        Property::create(json, client)
    }

    fn base(&self) -> &Base {
        &self.data().base
    }
}

fn scalar_json(input: ValueInput) -> ApiResult<Value> {
    match input {
        ValueInput::Null => Ok(Value::Null),
        ValueInput::Text(text) => Ok(Value::String(text)),
        ValueInput::Json(value) => Ok(value),
        other => Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
            "expected a plain value, got {}",
            describe_input(&other)
        ))),
    }
}

/// Checks that a non-reference value fits the declared property type; null always fits.
pub(crate) fn check_scalar(property_type: Option<PropertyType>, value: &Value) -> ApiResult<()> {
    let Some(property_type) = property_type else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let fits = match property_type {
        PropertyType::CharValue
        | PropertyType::TextValue
        | PropertyType::LinkValue
        | PropertyType::SingleSelectValue => value.is_string(),
        PropertyType::BooleanValue => value.is_boolean(),
        PropertyType::IntValue => value.is_i64() || value.is_u64(),
        PropertyType::FloatValue => value.is_number(),
        PropertyType::DatetimeValue => value.as_str().is_some_and(is_datetime),
        PropertyType::AttachmentValue
        | PropertyType::ReferenceValue
        | PropertyType::ReferencesValue => true,
    };
    if fits {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::IllegalArgument)
            .with_message(format!("value {value} does not fit a {property_type} property")))
    }
}

/// RFC 3339 or ISO 8601 (date, local datetime, or offset datetime).
pub(crate) fn is_datetime(raw: &str) -> bool {
    OffsetDateTime::parse(raw, &Rfc3339).is_ok()
        || OffsetDateTime::parse(raw, &Iso8601::DEFAULT).is_ok()
        || PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT).is_ok()
        || Date::parse(raw, &Iso8601::DEFAULT).is_ok()
}
