//! Purpose: The KE-chain client handle shared by every entity wrapper.
//! Exports: `Client`, `Query`, `NewService`, `get_project`, `get_project_with`.
//! Role: Builds URLs, sends requests through a `Transport`, and turns envelopes into entities.
//! Invariants: Single-entity lookups fail with `NotFound`/`MultipleFound`, never pick arbitrarily.
//! Invariants: Cloning a `Client` shares the transport and the widget schema registry.
#![allow(clippy::result_large_err)]

use super::config::{ClientConfig, ProjectRequest, ScopeSelector};
use super::replay::ReplayTransport;
use super::routes::{Resource, build_url, normalize_base_url};
use super::schema::{MetaSchema, WidgetSchemas};
use super::transport::{HttpTransport, Method, Request, Response, Transport};
use crate::core::enums::{
    Category, ServiceEnvironmentVersion, ServiceScriptUser, ServiceType, WidgetType,
};
use crate::core::error::{Error, ErrorKind};
use crate::models::{
    Activity, AnyEntity, Entity, EntityKind, Part, Property, Scope, Service, ServiceExecution,
    Team, User, Widget,
};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: Url,
    transport: Arc<dyn Transport>,
    schemas: WidgetSchemas,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .finish()
    }
}

/// Filter parameters of a listing request, in insertion order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an earlier value for the same key.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn name(self, name: &str) -> Self {
        self.param("name", name)
    }

    pub fn id(self, id: &str) -> Self {
        self.param("id", id)
    }

    pub fn scope(self, scope_id: &str) -> Self {
        self.param("scope_id", scope_id)
    }

    pub fn category(self, category: Category) -> Self {
        self.param("category", category)
    }

    pub fn model(self, model_id: &str) -> Self {
        self.param("model", model_id)
    }

    pub fn parent(self, parent_id: &str) -> Self {
        self.param("parent", parent_id)
    }

    pub fn activity(self, activity_id: &str) -> Self {
        self.param("activity_id", activity_id)
    }

    pub fn status(self, status: impl fmt::Display) -> Self {
        self.param("status", status)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Fields of a service created through `Client::create_service`.
#[derive(Clone, Debug)]
pub struct NewService {
    pub name: String,
    pub scope_id: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub service_type: ServiceType,
    pub environment_version: ServiceEnvironmentVersion,
    pub run_as: ServiceScriptUser,
}

impl NewService {
    pub fn new(name: impl Into<String>, scope_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope_id: scope_id.into(),
            description: None,
            version: None,
            service_type: ServiceType::PythonScript,
            environment_version: ServiceEnvironmentVersion::Python35,
            run_as: ServiceScriptUser::KenodeUser,
        }
    }
}

impl Client {
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        let transport = HttpTransport::new(config)?;
        Self::with_transport(&config.url, Arc::new(transport))
    }

    pub fn with_transport(url: &str, transport: Arc<dyn Transport>) -> ApiResult<Self> {
        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url: normalize_base_url(url)?,
                transport,
                schemas: WidgetSchemas::new(),
            }),
        })
    }

    /// A client that never leaves the process; every request is served by `replay`.
    pub fn offline(replay: Arc<ReplayTransport>) -> Self {
        let base_url = Url::parse("http://localhost/").expect("static offline url parses");
        Self {
            inner: Arc::new(ClientInner {
                base_url,
                transport: replay,
                schemas: WidgetSchemas::new(),
            }),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn request(
        &self,
        method: Method,
        resource: Resource<'_>,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> ApiResult<Response> {
        let url = build_url(&self.inner.base_url, &resource, query)?;
        self.inner.transport.request(&Request {
            method,
            url: &url,
            body,
        })
    }

    /// Sends a request and requires exactly `expected` as the response status.
    pub(crate) fn send(
        &self,
        method: Method,
        resource: Resource<'_>,
        body: Option<&Value>,
        expected: u16,
        action: &str,
    ) -> ApiResult<Response> {
        let response = self.request(method, resource, &[], body)?;
        expect_status(response, expected, action)
    }

    /// The `results` of a listing; a non-200 status means nothing matched.
    pub fn fetch_results(&self, resource: Resource<'_>, query: &Query) -> ApiResult<Vec<Value>> {
        let response = self.request(Method::Get, resource, query.params(), None)?;
        if response.status != 200 {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("could not retrieve {}", describe_resource(&resource)))
                .with_status(response.status));
        }
        Ok(response.into_results())
    }

    fn fetch_many<T: Entity>(&self, resource: Resource<'_>, query: &Query) -> ApiResult<Vec<T>> {
        self.fetch_results(resource, query)?
            .into_iter()
            .map(|json| T::from_json(json, self))
            .collect()
    }

    fn fetch_one<T: Entity>(&self, resource: Resource<'_>, query: &Query) -> ApiResult<T> {
        let mut results = self.fetch_results(resource, query)?;
        match results.len() {
            0 => Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("No {} fits criteria", T::KIND))),
            1 => T::from_json(results.remove(0), self),
            _ => Err(Error::new(ErrorKind::MultipleFound)
                .with_message(format!("Multiple {}s fit criteria", T::KIND))),
        }
    }

    /// Re-fetches the raw payload of one entity by id.
    pub fn reload(&self, kind: EntityKind, id: &str) -> ApiResult<Value> {
        let response = self.request(Method::Get, kind.item_resource(id), &[], None)?;
        let status = response.status;
        if status != 200 {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("could not reload {kind} {id}"))
                .with_status(status));
        }
        response.into_first_result().ok_or_else(|| {
            Error::new(ErrorKind::NotFound).with_message(format!("could not reload {kind} {id}"))
        })
    }

    /// Fetches one entity by kind and id and builds its wrapper.
    pub fn resolve_entity(&self, kind: EntityKind, id: &str) -> ApiResult<AnyEntity> {
        let json = self.reload(kind, id)?;
        AnyEntity::create(kind, json, self)
    }

    pub fn widget_schema(&self, widget_type: WidgetType) -> Arc<MetaSchema> {
        self.inner.schemas.lookup(widget_type)
    }

    /// Whether a type-specific schema (registered or loaded) is known for `widget_type`.
    pub fn has_widget_schema(&self, widget_type: WidgetType) -> bool {
        self.inner.schemas.is_registered(widget_type)
    }

    pub fn register_widget_schema(&self, widget_type: WidgetType, raw: Value) -> ApiResult<()> {
        self.inner
            .schemas
            .register(widget_type, MetaSchema::compile(raw)?);
        Ok(())
    }

    /// Preloads the per-type meta schemas the server publishes.
    pub fn load_widget_schemas(&self) -> ApiResult<usize> {
        let results = self.fetch_results(Resource::WidgetSchemas, &Query::new())?;
        let loaded = self.inner.schemas.load_listing(&results)?;
        tracing::debug!(loaded, "loaded widget meta schemas");
        Ok(loaded)
    }

    pub fn scopes(&self, query: &Query) -> ApiResult<Vec<Scope>> {
        self.fetch_many(Resource::Scopes, query)
    }

    pub fn scope(&self, query: &Query) -> ApiResult<Scope> {
        self.fetch_one(Resource::Scopes, query)
    }

    pub fn scope_by_id(&self, id: &str) -> ApiResult<Scope> {
        self.scope(&Query::new().id(id))
    }

    /// Opens the scope a resolved project request points at.
    pub fn project(&self, selector: &ScopeSelector) -> ApiResult<Scope> {
        match selector {
            ScopeSelector::Id(id) => self.scope_by_id(id),
            ScopeSelector::Name(name) => self.scope(&Query::new().name(name)),
            ScopeSelector::NameWithStatus(name, status) => {
                self.scope(&Query::new().name(name).status(status))
            }
        }
    }

    pub fn parts(&self, query: &Query) -> ApiResult<Vec<Part>> {
        self.fetch_many(Resource::Parts, query)
    }

    /// One part instance unless the query names another category.
    pub fn part(&self, query: &Query) -> ApiResult<Part> {
        let query = match query.get("category") {
            Some(_) => query.clone(),
            None => query.clone().category(Category::Instance),
        };
        self.fetch_one(Resource::Parts, &query)
    }

    pub fn model(&self, query: &Query) -> ApiResult<Part> {
        self.fetch_one(Resource::Parts, &query.clone().category(Category::Model))
    }

    /// One part of any category, by id.
    pub fn part_by_id(&self, id: &str) -> ApiResult<Part> {
        self.fetch_one(Resource::Parts, &Query::new().id(id))
    }

    pub fn properties(&self, query: &Query) -> ApiResult<Vec<Property>> {
        self.fetch_many(Resource::Properties, query)
    }

    pub fn property(&self, id: &str) -> ApiResult<Property> {
        Property::from_json(self.reload(EntityKind::Property, id)?, self)
    }

    pub fn activities(&self, query: &Query) -> ApiResult<Vec<Activity>> {
        self.fetch_many(Resource::Activities, query)
    }

    pub fn activity(&self, query: &Query) -> ApiResult<Activity> {
        self.fetch_one(Resource::Activities, query)
    }

    pub fn widgets(&self, query: &Query) -> ApiResult<Vec<Widget>> {
        self.fetch_many(Resource::Widgets, query)
    }

    pub fn widget(&self, id: &str) -> ApiResult<Widget> {
        Widget::from_json(self.reload(EntityKind::Widget, id)?, self)
    }

    pub fn services(&self, query: &Query) -> ApiResult<Vec<Service>> {
        self.fetch_many(Resource::Services, query)
    }

    pub fn service(&self, query: &Query) -> ApiResult<Service> {
        self.fetch_one(Resource::Services, query)
    }

    pub fn create_service(&self, new: &NewService) -> ApiResult<Service> {
        let mut body = Map::new();
        body.insert("name".into(), json!(new.name));
        body.insert("scope".into(), json!(new.scope_id));
        body.insert("script_type".into(), json!(new.service_type.as_str()));
        body.insert("env_version".into(), json!(new.environment_version.as_str()));
        body.insert("run_as".into(), json!(new.run_as.as_str()));
        if let Some(description) = &new.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(version) = &new.version {
            body.insert("script_version".into(), json!(version));
        }
        let response = self.send(
            Method::Post,
            Resource::Services,
            Some(&Value::Object(body)),
            201,
            "create service",
        )?;
        let json = created_payload(response, "service")?;
        Service::from_json(json, self)
    }

    pub fn service_executions(&self, query: &Query) -> ApiResult<Vec<ServiceExecution>> {
        self.fetch_many(Resource::ServiceExecutions, query)
    }

    pub fn service_execution(&self, query: &Query) -> ApiResult<ServiceExecution> {
        self.fetch_one(Resource::ServiceExecutions, query)
    }

    pub fn users(&self, query: &Query) -> ApiResult<Vec<User>> {
        self.fetch_many(Resource::Users, query)
    }

    pub fn user(&self, query: &Query) -> ApiResult<User> {
        self.fetch_one(Resource::Users, query)
    }

    pub fn teams(&self, query: &Query) -> ApiResult<Vec<Team>> {
        self.fetch_many(Resource::Teams, query)
    }

    pub fn team(&self, query: &Query) -> ApiResult<Team> {
        self.fetch_one(Resource::Teams, query)
    }
}

/// Resolves `request` against the process environment and opens the scope.
pub fn get_project(request: &ProjectRequest) -> ApiResult<Scope> {
    get_project_with(request, |key| std::env::var(key).ok())
}

pub fn get_project_with<F>(request: &ProjectRequest, lookup: F) -> ApiResult<Scope>
where
    F: Fn(&str) -> Option<String>,
{
    let (config, selector) = request.resolve(lookup)?;
    let client = Client::from_config(&config)?;
    client.project(&selector)
}

pub(crate) fn expect_status(response: Response, expected: u16, action: &str) -> ApiResult<Response> {
    if response.status == expected {
        return Ok(response);
    }
    let status = response.status;
    let mut message = format!("Could not {action} ({status})");
    if let Some(detail) = response_detail(&response.body) {
        message.push_str(": ");
        message.push_str(&detail);
    }
    Err(Error::new(ErrorKind::Api)
        .with_message(message)
        .with_status(status))
}

/// The payload of a create response (envelope or bare object).
pub(crate) fn created_payload(response: Response, what: &str) -> ApiResult<Value> {
    response.into_first_result().ok_or_else(|| {
        Error::new(ErrorKind::Internal).with_message(format!("create {what} returned no payload"))
    })
}

fn response_detail(body: &Value) -> Option<String> {
    match body {
        Value::Null => None,
        Value::Object(map) => map
            .get("detail")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(body.to_string())),
        other => Some(other.to_string()),
    }
}

fn describe_resource(resource: &Resource<'_>) -> &'static str {
    match resource {
        Resource::Scopes | Resource::Scope(_) => "scopes",
        Resource::Parts | Resource::Part(_) => "parts",
        Resource::Properties | Resource::Property(_) | Resource::PropertyCreate => "properties",
        Resource::Activities | Resource::Activity(_) => "activities",
        Resource::Association(_) => "associations",
        Resource::Widgets
        | Resource::Widget(_)
        | Resource::WidgetAssociations(_)
        | Resource::WidgetSchemas => "widgets",
        Resource::Services | Resource::Service(_) | Resource::ServiceExecute(_) => "services",
        Resource::ServiceExecutions
        | Resource::ServiceExecution(_)
        | Resource::ServiceExecutionTerminate(_) => "service executions",
        Resource::Users | Resource::User(_) => "users",
        Resource::Teams | Resource::Team(_) => "teams",
    }
}

#[cfg(test)]
mod tests {
    use super::{Client, Query, expect_status};
    use crate::api::replay::ReplayTransport;
    use crate::api::transport::{Method, Response};
    use crate::core::error::ErrorKind;
    use crate::models::Entity;
    use serde_json::json;
    use std::sync::Arc;

    const SCOPE_ID: &str = "eeb0937b-da50-4eb2-8d74-f36259cca96e";

    #[test]
    fn query_param_replaces_existing_key() {
        let query = Query::new().name("Wheel").param("name", "Frame").scope(SCOPE_ID);
        assert_eq!(query.get("name"), Some("Frame"));
        assert_eq!(query.params().len(), 2);
    }

    #[test]
    fn expect_status_carries_status_and_detail() {
        let response = Response::new(403, json!({"detail": "Permission denied"}));
        let err = expect_status(response, 200, "update property").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.status(), Some(403));
        assert_eq!(
            err.message(),
            Some("Could not update property (403): Permission denied")
        );
    }

    #[test]
    fn single_lookup_distinguishes_none_and_many() {
        let replay = Arc::new(ReplayTransport::new());
        replay
            .expect_results(Method::Get, "/api/scopes.json", vec![])
            .expect_results(
                Method::Get,
                "/api/scopes.json",
                vec![
                    json!({"id": SCOPE_ID, "name": "Bike Project"}),
                    json!({"id": "a1b2", "name": "Bike Project"}),
                ],
            );
        let client = Client::offline(replay.clone());

        let err = client.scope(&Query::new().name("Bike Project")).expect_err("none");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), Some("No scope fits criteria"));

        let err = client.scope(&Query::new().name("Bike Project")).expect_err("many");
        assert_eq!(err.kind(), ErrorKind::MultipleFound);
        assert_eq!(replay.requests()[0].query_value("name"), Some("Bike Project"));
    }

    #[test]
    fn part_lookup_defaults_to_instances() {
        let replay = Arc::new(ReplayTransport::new());
        replay.expect_results(
            Method::Get,
            "/api/parts.json",
            vec![json!({"id": SCOPE_ID, "name": "Bike", "category": "INSTANCE"})],
        );
        let client = Client::offline(replay.clone());
        let part = client.part(&Query::new().name("Bike")).expect("part");
        assert_eq!(part.name(), Some("Bike"));
        assert_eq!(replay.requests()[0].query_value("category"), Some("INSTANCE"));
    }

    #[test]
    fn listing_failure_is_not_found_with_status() {
        let replay = Arc::new(ReplayTransport::new());
        let client = Client::offline(replay);
        let err = client.parts(&Query::new()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status(), Some(404));
    }
}
