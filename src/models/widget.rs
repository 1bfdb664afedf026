//! Purpose: Activity widgets, their `widget_type` factory, and meta validation.
//! Exports: `Widget`.
//! Role: UI panel configuration of a task; the meta blob is checked against its type's schema.
//! Invariants: `meta` is validated on construction and before every edit is sent.
//! Invariants: Unknown or missing `widget_type` yields `WidgetType::Undefined`, never an error.
use super::activity::Activity;
use super::base::{
    Base, Entity, EntityKind, ValueInput, collect_ids, decode, id_of, null_default, str_field,
};
use crate::api::{Client, Method, Query, Resource, created_payload};
use crate::core::enums::WidgetType;
use crate::core::error::Error;
use serde::Deserialize;
use serde_json::{Map, Value, json};

type ApiResult<T> = Result<T, Error>;

#[derive(Deserialize)]
struct RemoteWidget {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
    #[serde(default)]
    meta: Value,
    #[serde(default)]
    order: Option<i64>,
    #[serde(default)]
    activity_id: Option<Value>,
    #[serde(default)]
    activity: Option<Value>,
    #[serde(default)]
    parent_id: Option<Value>,
    #[serde(default)]
    parent: Option<Value>,
    #[serde(default)]
    scope_id: Option<Value>,
    #[serde(default, deserialize_with = "null_default")]
    has_subwidgets: bool,
    #[serde(default)]
    progress: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct Widget {
    base: Base,
    widget_type: WidgetType,
    title: Option<String>,
    reference: Option<String>,
    meta: Value,
    order: Option<i64>,
    activity_id: Option<String>,
    parent_id: Option<String>,
    scope_id: Option<String>,
    has_subwidgets: bool,
    progress: Option<f64>,
}

impl Widget {
    /// Factory: resolves the `widget_type` discriminator and validates `meta`.
    pub fn create(json: Value, client: &Client) -> ApiResult<Widget> {
        let discriminator = str_field(&json, "widget_type");
        let widget_type = WidgetType::from_discriminator(discriminator);
        if widget_type == WidgetType::Undefined {
            tracing::debug!(
                widget_type = discriminator.unwrap_or("<none>"),
                "unrecognized widget type, using undefined"
            );
        }
        let remote: RemoteWidget = decode(EntityKind::Widget, &json)?;
        client.widget_schema(widget_type).validate(&remote.meta)?;
        Ok(Self {
            widget_type,
            title: remote.title,
            reference: remote.reference,
            meta: remote.meta,
            order: remote.order,
            activity_id: id_of(remote.activity_id.as_ref())
                .or_else(|| id_of(remote.activity.as_ref())),
            parent_id: id_of(remote.parent_id.as_ref()).or_else(|| id_of(remote.parent.as_ref())),
            scope_id: id_of(remote.scope_id.as_ref()),
            has_subwidgets: remote.has_subwidgets,
            progress: remote.progress,
            base: Base::from_json(EntityKind::Widget, json, client)?,
        })
    }

    pub fn widget_type(&self) -> WidgetType {
        self.widget_type
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn meta(&self) -> &Value {
        &self.meta
    }

    pub fn order(&self) -> Option<i64> {
        self.order
    }

    pub fn activity_id(&self) -> Option<&str> {
        self.activity_id.as_deref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    pub fn has_subwidgets(&self) -> bool {
        self.has_subwidgets
    }

    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// Checks `meta` against this widget type's schema without storing it.
    pub fn validate_meta(&self, meta: &Value) -> ApiResult<()> {
        self.client().widget_schema(self.widget_type).validate(meta)
    }

    pub fn activity(&self) -> ApiResult<Option<Activity>> {
        match &self.activity_id {
            Some(activity_id) => self
                .client()
                .activity(&Query::new().id(activity_id))
                .map(Some),
            None => Ok(None),
        }
    }

    pub fn parent(&self) -> ApiResult<Option<Widget>> {
        match &self.parent_id {
            Some(parent_id) => self.client().widget(parent_id).map(Some),
            None => Ok(None),
        }
    }

    pub fn edit(&mut self, title: Option<&str>, meta: Option<Value>) -> ApiResult<()> {
        if let Some(meta) = &meta {
            self.validate_meta(meta)?;
        }
        let mut body = Map::new();
        if let Some(title) = title {
            body.insert("title".into(), json!(title));
        }
        if let Some(meta) = &meta {
            body.insert("meta".into(), meta.clone());
        }
        if body.is_empty() {
            return Ok(());
        }
        self.client().send(
            Method::Put,
            Resource::Widget(self.id()),
            Some(&Value::Object(body.clone())),
            200,
            "edit widget",
        )?;
        if let Some(title) = title {
            self.title = Some(title.to_string());
        }
        if let Some(meta) = meta {
            self.meta = meta;
        }
        for (key, value) in body {
            self.base.set_field(&key, value);
        }
        Ok(())
    }

    /// Replaces the property models this widget reads and writes.
    pub fn update_associations(
        &self,
        readable: impl Into<ValueInput>,
        writable: impl Into<ValueInput>,
    ) -> ApiResult<()> {
        let readable = collect_ids(readable.into(), EntityKind::Property, "readable models")?;
        let writable = collect_ids(writable.into(), EntityKind::Property, "writable models")?;
        let body = json!({
            "id": self.id(),
            "readable_model_properties_ids": readable,
            "writable_model_properties_ids": writable,
        });
        self.client().send(
            Method::Put,
            Resource::WidgetAssociations(self.id()),
            Some(&body),
            200,
            "update widget associations",
        )?;
        Ok(())
    }

    pub fn delete(self) -> ApiResult<()> {
        self.client().send(
            Method::Delete,
            Resource::Widget(self.id()),
            None,
            204,
            "delete widget",
        )?;
        Ok(())
    }
}

impl Entity for Widget {
    const KIND: EntityKind = EntityKind::Widget;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        Widget::create(json, client)
    }

    fn base(&self) -> &Base {
        &self.base
    }
}

impl Activity {
    /// Creates a widget on this activity after validating `meta`.
    pub fn create_widget(
        &self,
        widget_type: WidgetType,
        title: Option<&str>,
        meta: Value,
    ) -> ApiResult<Widget> {
        self.client().widget_schema(widget_type).validate(&meta)?;
        let body = json!({
            "activity": self.id(),
            "widget_type": widget_type.as_str(),
            "title": title,
            "meta": meta,
        });
        let response = self.client().send(
            Method::Post,
            Resource::Widgets,
            Some(&body),
            201,
            "create widget",
        )?;
        Widget::create(created_payload(response, "widget")?, self.client())
    }
}
