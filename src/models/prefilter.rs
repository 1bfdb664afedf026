//! Purpose: Encode, decode, and validate reference pre-filters and excluded property models.
//! Exports: `Prefilter`.
//! Role: Pure option-map transforms; the reference properties persist the result.
//! Invariants: Validation fails on the first offending entry, in input order, before any request.
//! Invariants: Stored filters map a property id to `"<value>:<operator>"`.
use super::property::{Property, is_datetime};
use crate::core::enums::{Category, FilterType, PropertyType};
use crate::core::error::{Error, ErrorKind};
use serde_json::{Map, Value};

type ApiResult<T> = Result<T, Error>;

const PREFILTERS: &str = "prefilters";
const EXCLUDED: &str = "propmodels_excl";

/// One stored filter on a target property model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Prefilter {
    pub property_id: String,
    pub value: String,
    pub filter_type: FilterType,
}

impl Prefilter {
    pub fn encode(&self) -> String {
        format!("{}:{}", self.value, self.filter_type)
    }

    /// Splits on the last `:` so values may themselves contain colons.
    pub fn decode(property_id: &str, raw: &str) -> Option<Self> {
        let (value, operator) = raw.rsplit_once(':')?;
        Some(Self {
            property_id: property_id.to_string(),
            value: value.to_string(),
            filter_type: FilterType::parse(operator)?,
        })
    }
}

pub(crate) fn read_prefilters(options: &Map<String, Value>) -> Vec<Prefilter> {
    let Some(stored) = options.get(PREFILTERS).and_then(Value::as_object) else {
        return Vec::new();
    };
    stored
        .iter()
        .filter_map(|(property_id, raw)| {
            let decoded = raw.as_str().and_then(|raw| Prefilter::decode(property_id, raw));
            if decoded.is_none() {
                tracing::warn!(property_id = property_id.as_str(), "skipping unreadable prefilter");
            }
            decoded
        })
        .collect()
}

pub(crate) fn read_excluded(options: &Map<String, Value>) -> Vec<String> {
    options
        .get(EXCLUDED)
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Returns `options` with the validated filters merged in (or replacing them when `overwrite`).
pub(crate) fn build_prefilters(
    options: &Map<String, Value>,
    property_models: &[&Property],
    values: &[Value],
    filter_types: &[FilterType],
    targets: Option<&[String]>,
    overwrite: bool,
) -> ApiResult<Map<String, Value>> {
    if property_models.len() != values.len() || values.len() != filter_types.len() {
        return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
            "pre-filter inputs must have equal lengths (property models: {}, values: {}, filter types: {})",
            property_models.len(),
            values.len(),
            filter_types.len()
        )));
    }

    let mut prefilters = if overwrite {
        Map::new()
    } else {
        options
            .get(PREFILTERS)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    };
    for (index, ((model, value), filter_type)) in property_models
        .iter()
        .zip(values)
        .zip(filter_types)
        .enumerate()
    {
        check_target(model, targets).map_err(|err| err.with_index(index))?;
        let encoded = encode_value(model, value).map_err(|err| err.with_index(index))?;
        let prefilter = Prefilter {
            property_id: model.data().id().to_string(),
            value: encoded,
            filter_type: *filter_type,
        };
        prefilters.insert(prefilter.property_id.clone(), Value::String(prefilter.encode()));
    }

    let mut updated = options.clone();
    updated.insert(PREFILTERS.to_string(), Value::Object(prefilters));
    Ok(updated)
}

pub(crate) fn build_excluded(
    options: &Map<String, Value>,
    property_models: &[&Property],
    targets: Option<&[String]>,
    overwrite: bool,
) -> ApiResult<Map<String, Value>> {
    let mut excluded = if overwrite {
        Vec::new()
    } else {
        read_excluded(options)
    };
    for (index, model) in property_models.iter().enumerate() {
        check_target(model, targets).map_err(|err| err.with_index(index))?;
        let id = model.data().id().to_string();
        if !excluded.contains(&id) {
            excluded.push(id);
        }
    }
    let mut updated = options.clone();
    updated.insert(
        EXCLUDED.to_string(),
        Value::Array(excluded.into_iter().map(Value::String).collect()),
    );
    Ok(updated)
}

fn check_target(model: &Property, targets: Option<&[String]>) -> ApiResult<()> {
    let data = model.data();
    if data.category() != Some(Category::Model) {
        return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
            "'{}' is not a property model",
            data.label()
        )));
    }
    if let (Some(targets), Some(part_id)) = (targets, data.part_id()) {
        if !targets.is_empty() && !targets.iter().any(|target| target == part_id) {
            return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                "property model '{}' does not belong to the referenced part model(s)",
                data.label()
            )));
        }
    }
    Ok(())
}

fn encode_value(model: &Property, value: &Value) -> ApiResult<String> {
    let property_type = model.data().property_type();
    let encoded = match (property_type, value) {
        (Some(PropertyType::FloatValue), Value::Number(number)) => Some(number.to_string()),
        (Some(PropertyType::IntValue), Value::Number(number))
            if number.is_i64() || number.is_u64() =>
        {
            Some(number.to_string())
        }
        (
            Some(
                PropertyType::CharValue
                | PropertyType::TextValue
                | PropertyType::LinkValue
                | PropertyType::SingleSelectValue,
            ),
            Value::String(text),
        ) => Some(text.clone()),
        (Some(PropertyType::BooleanValue), Value::Bool(flag)) => Some(flag.to_string()),
        (Some(PropertyType::DatetimeValue), Value::String(text)) if is_datetime(text) => {
            Some(text.clone())
        }
        _ => None,
    };
    if let Some(encoded) = encoded {
        return Ok(encoded);
    }
    let label = model.data().label();
    match property_type {
        Some(
            PropertyType::FloatValue
            | PropertyType::IntValue
            | PropertyType::CharValue
            | PropertyType::TextValue
            | PropertyType::LinkValue
            | PropertyType::SingleSelectValue
            | PropertyType::BooleanValue
            | PropertyType::DatetimeValue,
        ) => Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
            "pre-filter value {value} does not fit property '{label}'"
        ))),
        _ => Err(Error::new(ErrorKind::IllegalArgument)
            .with_message(format!("property '{label}' cannot be used as a pre-filter"))),
    }
}
