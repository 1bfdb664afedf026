//! Purpose: Single- and multi-reference properties and their input normalization.
//! Exports: `ReferenceProperty`, `MultiReferenceProperty`.
//! Role: Accepts parts, part ids, lists, or null; validates shape and category before persisting.
//! Invariants: Referenced parts are resolved lazily; assignment never looks ids up on the server.
//! Invariants: A multi reference stores `null` rather than an empty list.
use super::base::{Entity, EntityKind, ObjectRef, ValueInput, describe_input, id_of};
use super::part::Part;
use super::prefilter::{self, Prefilter};
use super::property::{Property, PropertyData};
use crate::api::Query;
use crate::core::enums::{Category, FilterType, PropertyType};
use crate::core::error::{Error, ErrorKind};
use crate::core::ident::is_uuid;
use serde_json::Value;

type ApiResult<T> = Result<T, Error>;

/// What an assigned part must satisfy.
struct ReferenceRules<'a> {
    category: Option<Category>,
    targets: Option<&'a [String]>,
}

impl ReferenceRules<'_> {
    fn check_part(&self, part: &ObjectRef) -> ApiResult<()> {
        if part.kind != EntityKind::Part {
            return Err(Error::new(ErrorKind::IllegalArgument)
                .with_message(format!("a reference must point at a part, got a {}", part.kind)));
        }
        match (self.category, part.category) {
            (Some(Category::Model), Some(Category::Instance)) => {
                return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                    "part {} is an instance; a property model references part models",
                    part.id
                )));
            }
            (Some(Category::Instance), Some(Category::Model)) => {
                return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                    "part {} is a model; a property instance references part instances",
                    part.id
                )));
            }
            _ => {}
        }
        if let (Some(targets), Some(model_id)) = (self.targets, part.model_id.as_deref()) {
            if !targets.is_empty() && !targets.iter().any(|target| target == model_id) {
                return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                    "part {} is not an instance of the referenced part model(s)",
                    part.id
                )));
            }
        }
        Ok(())
    }

    fn element(&self, input: ValueInput) -> ApiResult<String> {
        match input.normalized() {
            ValueInput::Object(part) => {
                self.check_part(&part)?;
                Ok(part.id)
            }
            ValueInput::Text(id) if is_uuid(&id) => Ok(id),
            ValueInput::Text(id) => Err(Error::new(ErrorKind::IllegalArgument)
                .with_message(format!("'{id}' is not a valid part id"))),
            other => Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                "expected a part or a part id, got {}",
                describe_input(&other)
            ))),
        }
    }

    fn single(&self, input: ValueInput) -> ApiResult<Option<String>> {
        let input = input.normalized();
        if input.is_null() {
            return Ok(None);
        }
        if let ValueInput::List(_) = input {
            return Err(Error::new(ErrorKind::IllegalArgument)
                .with_message("a single reference takes one part or part id, not a list"));
        }
        self.element(input).map(Some)
    }

    fn multi(&self, input: ValueInput) -> ApiResult<Option<Vec<String>>> {
        let items = match input.normalized() {
            ValueInput::Null => return Ok(None),
            ValueInput::List(items) => items,
            other => {
                return Err(Error::new(ErrorKind::IllegalArgument)
                    .with_message(format!(
                        "a multi reference takes a list of parts or part ids, got {}",
                        describe_input(&other)
                    ))
                    .with_hint("Wrap a single part in a list."));
            }
        };
        let ids = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.element(item).map_err(|err| err.with_index(index)))
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(if ids.is_empty() { None } else { Some(ids) })
    }
}

/// Normalizes the default value of a new reference property on a part model.
///
/// A single part or id given for a multi reference is wrapped into a list.
pub(crate) fn default_value(property_type: PropertyType, input: ValueInput) -> ApiResult<Value> {
    let rules = ReferenceRules {
        category: Some(Category::Model),
        targets: None,
    };
    match property_type {
        PropertyType::ReferenceValue => Ok(rules.single(input)?.map(Value::String).unwrap_or(Value::Null)),
        PropertyType::ReferencesValue => {
            let input = match input.normalized() {
                single @ (ValueInput::Object(_) | ValueInput::Text(_)) => ValueInput::List(vec![single]),
                other => other,
            };
            Ok(ids_json(rules.multi(input)?))
        }
        _ => Ok(input.to_json()),
    }
}

/// Pre-filters and exclusions live on the property model; instances inherit them.
fn require_model(data: &PropertyData, what: &str) -> ApiResult<()> {
    if data.category() == Some(Category::Model) {
        return Ok(());
    }
    Err(Error::new(ErrorKind::IllegalArgument)
        .with_message(format!(
            "{what} of '{}' can only be set on the property model",
            data.label()
        ))
        .with_hint("Call this on the reference property model of the part model."))
}

fn ids_json(ids: Option<Vec<String>>) -> Value {
    match ids {
        Some(ids) => Value::Array(ids.into_iter().map(Value::String).collect()),
        None => Value::Null,
    }
}

fn single_id(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.first().and_then(|item| id_of(Some(item))),
        other => id_of(Some(other)),
    }
}

fn many_ids(value: &Value) -> Option<Vec<String>> {
    let ids: Vec<String> = match value {
        Value::Null => return None,
        Value::Array(items) => items.iter().filter_map(|item| id_of(Some(item))).collect(),
        other => id_of(Some(other)).into_iter().collect(),
    };
    if ids.is_empty() { None } else { Some(ids) }
}

/// Part models a reference property may point into, read from its model.
fn targets_from_model(data: &PropertyData) -> ApiResult<Vec<String>> {
    match data.model_id() {
        Some(model_id) => Ok(data.client().property(model_id)?.reference_ids()),
        None => Ok(Vec::new()),
    }
}

fn target_instances(data: &PropertyData, targets: &[String]) -> ApiResult<Vec<Part>> {
    let mut choices = Vec::new();
    for target in targets {
        let query = Query::new().model(target).category(Category::Instance);
        choices.extend(data.client().parts(&query)?);
    }
    Ok(choices)
}

#[derive(Clone, Debug)]
pub struct ReferenceProperty {
    data: PropertyData,
    id: Option<String>,
    cached: Option<Part>,
    targets: Option<Vec<String>>,
}

impl ReferenceProperty {
    pub(crate) fn new(data: PropertyData) -> Self {
        let id = single_id(data.value());
        Self {
            data,
            id,
            cached: None,
            targets: None,
        }
    }

    pub fn data(&self) -> &PropertyData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut PropertyData {
        &mut self.data
    }

    /// The referenced part id.
    pub fn value(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_model(&self) -> bool {
        self.data.category() != Some(Category::Instance)
    }

    fn rules(&self) -> ReferenceRules<'_> {
        ReferenceRules {
            category: self.data.category(),
            targets: if self.is_model() { None } else { self.targets.as_deref() },
        }
    }

    /// Accepts null, a part, or a part id.
    pub fn set_value(&mut self, input: impl Into<ValueInput>) -> ApiResult<()> {
        let id = self.rules().single(input.into())?;
        let value = id.clone().map(Value::String).unwrap_or(Value::Null);
        self.data.persist_value(value)?;
        self.id = id;
        self.cached = None;
        Ok(())
    }

    /// The referenced part, fetched on first use.
    pub fn referenced(&mut self) -> ApiResult<Option<Part>> {
        if let Some(part) = &self.cached {
            return Ok(Some(part.clone()));
        }
        let Some(id) = &self.id else {
            return Ok(None);
        };
        let part = self.data.client().part_by_id(id)?;
        self.cached = Some(part.clone());
        Ok(Some(part))
    }

    pub fn target_models(&mut self) -> ApiResult<Vec<String>> {
        if self.is_model() {
            return Ok(self.id.iter().cloned().collect());
        }
        if let Some(targets) = &self.targets {
            return Ok(targets.clone());
        }
        let targets = targets_from_model(&self.data)?;
        self.targets = Some(targets.clone());
        Ok(targets)
    }

    /// Part instances that may be referenced.
    pub fn choices(&mut self) -> ApiResult<Vec<Part>> {
        let targets = self.target_models()?;
        target_instances(&self.data, &targets)
    }

    fn known_targets(&self) -> Option<Vec<String>> {
        if self.is_model() {
            self.id.clone().map(|id| vec![id])
        } else {
            self.targets.clone()
        }
    }

    pub fn prefilters(&self) -> Vec<Prefilter> {
        prefilter::read_prefilters(self.data.options())
    }

    pub fn set_prefilters(
        &mut self,
        property_models: &[&Property],
        values: &[Value],
        filter_types: &[FilterType],
        overwrite: bool,
    ) -> ApiResult<()> {
        require_model(&self.data, "pre-filters")?;
        let targets = self.known_targets();
        let options = prefilter::build_prefilters(
            self.data.options(),
            property_models,
            values,
            filter_types,
            targets.as_deref(),
            overwrite,
        )?;
        self.data.persist_options(options)
    }

    pub fn excluded_propmodels(&self) -> Vec<String> {
        prefilter::read_excluded(self.data.options())
    }

    pub fn set_excluded_propmodels(
        &mut self,
        property_models: &[&Property],
        overwrite: bool,
    ) -> ApiResult<()> {
        require_model(&self.data, "excluded property models")?;
        let targets = self.known_targets();
        let options = prefilter::build_excluded(
            self.data.options(),
            property_models,
            targets.as_deref(),
            overwrite,
        )?;
        self.data.persist_options(options)
    }
}

#[derive(Clone, Debug)]
pub struct MultiReferenceProperty {
    data: PropertyData,
    ids: Option<Vec<String>>,
    cached: Option<Vec<Part>>,
    targets: Option<Vec<String>>,
}

impl MultiReferenceProperty {
    pub(crate) fn new(data: PropertyData) -> Self {
        let ids = many_ids(data.value());
        Self {
            data,
            ids,
            cached: None,
            targets: None,
        }
    }

    pub fn data(&self) -> &PropertyData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut PropertyData {
        &mut self.data
    }

    /// The referenced part ids, in assignment order.
    pub fn value(&self) -> Option<&[String]> {
        self.ids.as_deref()
    }

    fn is_model(&self) -> bool {
        self.data.category() != Some(Category::Instance)
    }

    fn rules(&self) -> ReferenceRules<'_> {
        ReferenceRules {
            category: self.data.category(),
            targets: if self.is_model() { None } else { self.targets.as_deref() },
        }
    }

    /// Accepts null or a list whose elements are parts or part ids.
    pub fn set_value(&mut self, input: impl Into<ValueInput>) -> ApiResult<()> {
        let ids = self.rules().multi(input.into())?;
        self.data.persist_value(ids_json(ids.clone()))?;
        self.ids = ids;
        self.cached = None;
        Ok(())
    }

    /// The referenced parts in stored order, fetched on first use.
    pub fn referenced(&mut self) -> ApiResult<Vec<Part>> {
        if let Some(parts) = &self.cached {
            return Ok(parts.clone());
        }
        let Some(ids) = &self.ids else {
            return Ok(Vec::new());
        };
        let query = Query::new().param("id__in", ids.join(","));
        let mut parts = self.data.client().parts(&query)?;
        parts.sort_by_key(|part| {
            ids.iter()
                .position(|id| id == part.id())
                .unwrap_or(usize::MAX)
        });
        self.cached = Some(parts.clone());
        Ok(parts)
    }

    pub fn target_models(&mut self) -> ApiResult<Vec<String>> {
        if self.is_model() {
            return Ok(self.ids.clone().unwrap_or_default());
        }
        if let Some(targets) = &self.targets {
            return Ok(targets.clone());
        }
        let targets = targets_from_model(&self.data)?;
        self.targets = Some(targets.clone());
        Ok(targets)
    }

    pub fn choices(&mut self) -> ApiResult<Vec<Part>> {
        let targets = self.target_models()?;
        target_instances(&self.data, &targets)
    }

    fn known_targets(&self) -> Option<Vec<String>> {
        if self.is_model() {
            self.ids.clone()
        } else {
            self.targets.clone()
        }
    }

    pub fn prefilters(&self) -> Vec<Prefilter> {
        prefilter::read_prefilters(self.data.options())
    }

    /// Configures which instances are selectable, one filter per target property model.
    pub fn set_prefilters(
        &mut self,
        property_models: &[&Property],
        values: &[Value],
        filter_types: &[FilterType],
        overwrite: bool,
    ) -> ApiResult<()> {
        require_model(&self.data, "pre-filters")?;
        let targets = self.known_targets();
        let options = prefilter::build_prefilters(
            self.data.options(),
            property_models,
            values,
            filter_types,
            targets.as_deref(),
            overwrite,
        )?;
        self.data.persist_options(options)
    }

    pub fn excluded_propmodels(&self) -> Vec<String> {
        prefilter::read_excluded(self.data.options())
    }

    pub fn set_excluded_propmodels(
        &mut self,
        property_models: &[&Property],
        overwrite: bool,
    ) -> ApiResult<()> {
        require_model(&self.data, "excluded property models")?;
        let targets = self.known_targets();
        let options = prefilter::build_excluded(
            self.data.options(),
            property_models,
            targets.as_deref(),
            overwrite,
        )?;
        self.data.persist_options(options)
    }
}
