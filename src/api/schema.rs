//! Purpose: Compile and apply JSON schemas for widget `meta` blobs.
//! Exports: `MetaSchema`, `WidgetSchemas`.
//! Role: Validator collaborator for widgets; the client owns one registry.
//! Invariants: Lookups never touch the network; unknown widget types get the generic schema.
//! Invariants: A violation names the instance pointer and the failing schema rule.
use crate::core::enums::WidgetType;
use crate::core::error::{Error, ErrorKind};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

const GENERIC_META_SCHEMA: &str = include_str!("../schemas/widget_meta.json");

pub struct MetaSchema {
    raw: Value,
    compiled: JSONSchema,
}

impl fmt::Debug for MetaSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaSchema").field("raw", &self.raw).finish()
    }
}

impl MetaSchema {
    pub fn compile(raw: Value) -> Result<Self, Error> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&raw)
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message(format!("failed to compile widget meta schema: {err}"))
            })?;
        Ok(Self { raw, compiled })
    }

    /// The embedded schema every widget type falls back to.
    pub fn generic() -> Arc<MetaSchema> {
        static GENERIC: OnceLock<Arc<MetaSchema>> = OnceLock::new();
        GENERIC
            .get_or_init(|| {
                let raw: Value = serde_json::from_str(GENERIC_META_SCHEMA)
                    .expect("embedded widget meta schema is valid json");
                Arc::new(MetaSchema::compile(raw).expect("embedded widget meta schema compiles"))
            })
            .clone()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn validate(&self, meta: &Value) -> Result<(), Error> {
        let Err(errors) = self.compiled.validate(meta) else {
            return Ok(());
        };
        let mut first_pointer = None;
        let mut messages = Vec::new();
        for error in errors {
            let pointer = error.instance_path.to_string();
            let rule = error.schema_path.to_string();
            let location = if pointer.is_empty() { "/" } else { pointer.as_str() };
            messages.push(format!("{error} at '{location}' (rule: {rule})"));
            if first_pointer.is_none() {
                first_pointer = Some(location.to_string());
            }
        }
        let mut err = Error::new(ErrorKind::SchemaViolation).with_message(format!(
            "widget meta failed validation ({} error{}): {}",
            messages.len(),
            if messages.len() == 1 { "" } else { "s" },
            messages.join("; ")
        ));
        if let Some(pointer) = first_pointer {
            err = err.with_pointer(pointer);
        }
        Err(err)
    }
}

/// Widget type → schema registry with a generic fallback.
#[derive(Default)]
pub struct WidgetSchemas {
    schemas: Mutex<HashMap<WidgetType, Arc<MetaSchema>>>,
}

impl WidgetSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, widget_type: WidgetType, schema: MetaSchema) {
        lock(&self.schemas).insert(widget_type, Arc::new(schema));
    }

    pub fn lookup(&self, widget_type: WidgetType) -> Arc<MetaSchema> {
        lock(&self.schemas)
            .get(&widget_type)
            .cloned()
            .unwrap_or_else(MetaSchema::generic)
    }

    pub fn is_registered(&self, widget_type: WidgetType) -> bool {
        lock(&self.schemas).contains_key(&widget_type)
    }

    /// Registers every `{"widget_type": .., "schema": ..}` entry of a server listing.
    ///
    /// Entries with unknown widget types are skipped; a schema that fails to
    /// compile aborts the load and leaves earlier entries registered.
    pub fn load_listing(&self, entries: &[Value]) -> Result<usize, Error> {
        let mut loaded = 0;
        for entry in entries {
            let widget_type =
                WidgetType::from_discriminator(entry.get("widget_type").and_then(Value::as_str));
            if widget_type == WidgetType::Undefined {
                continue;
            }
            let Some(raw) = entry.get("schema") else {
                continue;
            };
            self.register(widget_type, MetaSchema::compile(raw.clone())?);
            loaded += 1;
        }
        Ok(loaded)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}
