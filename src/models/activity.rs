//! Purpose: Activities (tasks and processes) and their widget/part associations.
//! Exports: `Activity`.
//! Role: Workflow node of a scope; hosts widgets and exposes the parts it is configured with.
//! Invariants: Only container activities (processes) have children.
//! Invariants: `configure` replaces both association lists in one request.
use super::base::{
    Base, Entity, EntityKind, ValueInput, collect_ids, decode, id_of, lenient, null_default,
};
use super::part::Part;
use super::widget::Widget;
use crate::api::{Client, Method, Query, Resource};
use crate::core::enums::{ActivityClassification, ActivityStatus, ActivityType};
use crate::core::error::{Error, ErrorKind};
use serde::Deserialize;
use serde_json::{Map, Value, json};

type ApiResult<T> = Result<T, Error>;

#[derive(Deserialize)]
struct RemoteActivity {
    #[serde(default)]
    activity_type: Option<String>,
    #[serde(default)]
    activity_class: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    scope_id: Option<Value>,
    #[serde(default)]
    scope: Option<Value>,
    #[serde(default)]
    parent_id: Option<Value>,
    #[serde(default)]
    container: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    association_id: Option<Value>,
    #[serde(default, deserialize_with = "null_default")]
    associations: Vec<Value>,
}

#[derive(Clone, Debug)]
pub struct Activity {
    base: Base,
    activity_type: Option<ActivityType>,
    status: Option<ActivityStatus>,
    classification: Option<ActivityClassification>,
    scope_id: Option<String>,
    parent_id: Option<String>,
    description: Option<String>,
    start_date: Option<String>,
    due_date: Option<String>,
    association_id: Option<String>,
    association_ids: Vec<String>,
}

impl Entity for Activity {
    const KIND: EntityKind = EntityKind::Activity;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        let remote: RemoteActivity = decode(EntityKind::Activity, &json)?;
        let raw_type = remote.activity_type.or(remote.activity_class);
        Ok(Self {
            activity_type: lenient(raw_type.as_deref(), ActivityType::parse, "activity_type"),
            status: lenient(remote.status.as_deref(), ActivityStatus::parse, "status"),
            classification: lenient(
                remote.classification.as_deref(),
                ActivityClassification::parse,
                "classification",
            ),
            scope_id: id_of(remote.scope_id.as_ref()).or_else(|| id_of(remote.scope.as_ref())),
            parent_id: id_of(remote.parent_id.as_ref())
                .or_else(|| id_of(remote.container.as_ref())),
            description: remote.description,
            start_date: remote.start_date,
            due_date: remote.due_date,
            association_id: id_of(remote.association_id.as_ref()),
            association_ids: remote
                .associations
                .iter()
                .filter_map(|association| id_of(Some(association)))
                .collect(),
            base: Base::from_json(EntityKind::Activity, json, client)?,
        })
    }

    fn base(&self) -> &Base {
        &self.base
    }
}

impl From<&Activity> for ValueInput {
    fn from(activity: &Activity) -> Self {
        ValueInput::Object(activity.object_ref())
    }
}

impl Activity {
    pub fn activity_type(&self) -> Option<ActivityType> {
        self.activity_type
    }

    pub fn status(&self) -> Option<ActivityStatus> {
        self.status
    }

    pub fn classification(&self) -> Option<ActivityClassification> {
        self.classification
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn start_date(&self) -> Option<&str> {
        self.start_date.as_deref()
    }

    pub fn due_date(&self) -> Option<&str> {
        self.due_date.as_deref()
    }

    /// Ids of the property associations (inputs and outputs) of this task.
    /// The association that `configure` writes to; tasks carry one, processes do not.
    pub fn association_id(&self) -> Option<&str> {
        self.association_id.as_deref()
    }

    pub fn association_ids(&self) -> &[String] {
        &self.association_ids
    }

    pub fn is_container(&self) -> bool {
        self.activity_type.is_some_and(ActivityType::is_container)
    }

    /// Parts associated with this activity, narrowed by `query`.
    pub fn parts(&self, query: &Query) -> ApiResult<Vec<Part>> {
        self.client().parts(&query.clone().activity(self.id()))
    }

    pub fn widgets(&self) -> ApiResult<Vec<Widget>> {
        self.client().widgets(&Query::new().activity(self.id()))
    }

    pub fn children(&self) -> ApiResult<Vec<Activity>> {
        if !self.is_container() {
            return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                "activity '{}' is not a process and has no children",
                self.name().unwrap_or(self.id())
            )));
        }
        self.client()
            .activities(&Query::new().param("parent_id", self.id()))
    }

    pub fn parent(&self) -> ApiResult<Option<Activity>> {
        match &self.parent_id {
            Some(parent_id) => self.client().activity(&Query::new().id(parent_id)).map(Some),
            None => Ok(None),
        }
    }

    /// Sets the readable (`inputs`) and writable (`outputs`) property models of this task.
    pub fn configure(
        &self,
        inputs: impl Into<ValueInput>,
        outputs: impl Into<ValueInput>,
    ) -> ApiResult<()> {
        let inputs = collect_ids(inputs.into(), EntityKind::Property, "inputs")?;
        let outputs = collect_ids(outputs.into(), EntityKind::Property, "outputs")?;
        let association_id = self.association_id.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!(
                    "activity '{}' has no association to configure",
                    self.name().unwrap_or(self.id())
                ))
                .with_hint("Reload the activity; only tasks carry an association_id.")
        })?;
        let body = json!({ "inputs": inputs, "outputs": outputs });
        self.client().send(
            Method::Put,
            Resource::Association(association_id),
            Some(&body),
            200,
            "configure activity",
        )?;
        Ok(())
    }

    pub fn delete_association(&mut self, association_id: &str) -> ApiResult<()> {
        if !self.association_ids.iter().any(|id| id == association_id) {
            return Err(Error::new(ErrorKind::NotFound).with_message(format!(
                "association {association_id} is not part of activity '{}'",
                self.name().unwrap_or(self.id())
            )));
        }
        self.client().send(
            Method::Delete,
            Resource::Association(association_id),
            None,
            204,
            "delete association",
        )?;
        self.association_ids.retain(|id| id != association_id);
        Ok(())
    }

    pub fn edit(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        status: Option<ActivityStatus>,
    ) -> ApiResult<()> {
        let mut body = Map::new();
        if let Some(name) = name {
            body.insert("name".into(), json!(name));
        }
        if let Some(description) = description {
            body.insert("description".into(), json!(description));
        }
        if let Some(status) = status {
            body.insert("status".into(), json!(status.as_str()));
        }
        if body.is_empty() {
            return Ok(());
        }
        self.client().send(
            Method::Put,
            Resource::Activity(self.id()),
            Some(&Value::Object(body.clone())),
            200,
            "edit activity",
        )?;
        if let Some(description) = description {
            self.description = Some(description.to_string());
        }
        if status.is_some() {
            self.status = status;
        }
        for (key, value) in body {
            self.base.set_field(&key, value);
        }
        Ok(())
    }
}
