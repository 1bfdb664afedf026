//! Purpose: Part models and part instances with their properties.
//! Exports: `Part`.
//! Role: Node of the product tree; owns its properties and navigates parent/children/model links.
//! Invariants: Properties are built through the property factory at construction.
//! Invariants: Only part models accept new properties.
use super::base::{
    Base, Entity, EntityKind, ObjectRef, ValueInput, decode, id_of, lenient, null_default,
};
use super::property::{Property, check_scalar};
use super::reference;
use crate::api::{Client, Method, Query, Resource, created_payload};
use crate::core::enums::{Category, Classification, Multiplicity, PropertyType};
use crate::core::error::{Error, ErrorKind};
use serde::Deserialize;
use serde_json::{Map, Value, json};

type ApiResult<T> = Result<T, Error>;

#[derive(Deserialize)]
struct RemotePart {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    multiplicity: Option<String>,
    #[serde(default)]
    parent_id: Option<Value>,
    #[serde(default)]
    parent: Option<Value>,
    #[serde(default)]
    model_id: Option<Value>,
    #[serde(default)]
    model: Option<Value>,
    #[serde(default)]
    scope_id: Option<Value>,
    #[serde(default)]
    scope: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    properties: Vec<Value>,
}

#[derive(Clone, Debug)]
pub struct Part {
    base: Base,
    category: Option<Category>,
    classification: Option<Classification>,
    multiplicity: Option<Multiplicity>,
    parent_id: Option<String>,
    model_id: Option<String>,
    scope_id: Option<String>,
    description: Option<String>,
    properties: Vec<Property>,
}

impl Entity for Part {
    const KIND: EntityKind = EntityKind::Part;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        let remote: RemotePart = decode(EntityKind::Part, &json)?;
        let properties = remote
            .properties
            .into_iter()
            .map(|property| Property::create(property, client))
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(Self {
            category: lenient(remote.category.as_deref(), Category::parse, "category"),
            classification: lenient(
                remote.classification.as_deref(),
                Classification::parse,
                "classification",
            ),
            multiplicity: lenient(
                remote.multiplicity.as_deref(),
                Multiplicity::parse,
                "multiplicity",
            ),
            parent_id: id_of(remote.parent_id.as_ref()).or_else(|| id_of(remote.parent.as_ref())),
            model_id: id_of(remote.model_id.as_ref()).or_else(|| id_of(remote.model.as_ref())),
            scope_id: id_of(remote.scope_id.as_ref()).or_else(|| id_of(remote.scope.as_ref())),
            description: remote.description,
            properties,
            base: Base::from_json(EntityKind::Part, json, client)?,
        })
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(EntityKind::Part, self.id())
            .with_category(self.category)
            .with_model_id(self.model_id.clone())
    }
}

impl From<&Part> for ValueInput {
    fn from(part: &Part) -> Self {
        ValueInput::Object(part.object_ref())
    }
}

impl From<Part> for ValueInput {
    fn from(part: Part) -> Self {
        ValueInput::Object(part.object_ref())
    }
}

impl Part {
    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn is_model(&self) -> bool {
        self.category == Some(Category::Model)
    }

    pub fn is_instance(&self) -> bool {
        self.category == Some(Category::Instance)
    }

    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    pub fn multiplicity(&self) -> Option<Multiplicity> {
        self.multiplicity
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
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

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn label(&self) -> &str {
        self.name().unwrap_or(self.id())
    }

    fn position(&self, key: &str) -> ApiResult<usize> {
        self.properties
            .iter()
            .position(|property| property.id() == key || property.name() == Some(key))
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("no property '{key}' on part '{}'", self.label()))
            })
    }

    /// Looks a property up by name or id.
    pub fn property(&self, key: &str) -> ApiResult<&Property> {
        let index = self.position(key)?;
        Ok(&self.properties[index])
    }

    pub fn property_mut(&mut self, key: &str) -> ApiResult<&mut Property> {
        let index = self.position(key)?;
        Ok(&mut self.properties[index])
    }

    pub fn children(&self) -> ApiResult<Vec<Part>> {
        let mut query = Query::new().parent(self.id());
        if let Some(category) = self.category {
            query = query.category(category);
        }
        self.client().parts(&query)
    }

    pub fn parent(&self) -> ApiResult<Option<Part>> {
        match &self.parent_id {
            Some(parent_id) => self.client().part_by_id(parent_id).map(Some),
            None => Ok(None),
        }
    }

    /// The part model an instance was created from.
    pub fn model(&self) -> ApiResult<Part> {
        if !self.is_instance() {
            return Err(Error::new(ErrorKind::IllegalArgument)
                .with_message(format!("part '{}' is not an instance", self.label())));
        }
        let model_id = self.model_id.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("part '{}' has no model", self.label()))
        })?;
        self.client().part_by_id(model_id)
    }

    pub fn instances(&self) -> ApiResult<Vec<Part>> {
        if !self.is_model() {
            return Err(Error::new(ErrorKind::IllegalArgument)
                .with_message(format!("part '{}' is not a model", self.label())));
        }
        let query = Query::new().model(self.id()).category(Category::Instance);
        self.client().parts(&query)
    }

    /// Creates a property on this part model and returns it.
    ///
    /// Reference defaults go through the same normalization as assignment;
    /// a single part given for a multi reference is wrapped into a list.
    pub fn add_property(
        &mut self,
        name: &str,
        property_type: PropertyType,
        default_value: impl Into<ValueInput>,
    ) -> ApiResult<Property> {
        if !self.is_model() {
            return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                "properties can only be added to part models, '{}' is not one",
                self.label()
            )));
        }
        let input = default_value.into();
        let value = if property_type.is_reference() {
            reference::default_value(property_type, input)?
        } else {
            let value = input.to_json();
            check_scalar(Some(property_type), &value)?;
            value
        };
        let body = json!({
            "name": name,
            "part_id": self.id(),
            "property_type": property_type.as_str(),
            "value": value,
            "value_options": {},
        });
        let response = self.client().send(
            Method::Post,
            Resource::PropertyCreate,
            Some(&body),
            201,
            "create property",
        )?;
        let property = Property::create(created_payload(response, "property")?, self.client())?;
        self.properties.push(property.clone());
        Ok(property)
    }

    pub fn edit(&mut self, name: Option<&str>, description: Option<&str>) -> ApiResult<()> {
        let mut body = Map::new();
        if let Some(name) = name {
            body.insert("name".into(), json!(name));
        }
        if let Some(description) = description {
            body.insert("description".into(), json!(description));
        }
        if body.is_empty() {
            return Ok(());
        }
        self.client().send(
            Method::Put,
            Resource::Part(self.id()),
            Some(&Value::Object(body.clone())),
            200,
            "edit part",
        )?;
        if let Some(description) = description {
            self.description = Some(description.to_string());
        }
        for (key, value) in body {
            self.base.set_field(&key, value);
        }
        Ok(())
    }

    pub fn delete(self) -> ApiResult<()> {
        self.client().send(
            Method::Delete,
            Resource::Part(self.id()),
            None,
            204,
            "delete part",
        )?;
        Ok(())
    }
}
