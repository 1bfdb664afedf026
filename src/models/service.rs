//! Purpose: Scripts hosted in a scope and their executions.
//! Exports: `Service`, `ServiceExecution`.
//! Role: Thin wrappers over the service endpoints; execution is asynchronous on the server.
//! Invariants: `execute` succeeds only on 202 Accepted and returns the new execution.
//! Invariants: Terminating a finished execution is rejected locally.
use super::base::{Base, Entity, EntityKind, decode, id_of, lenient};
use crate::api::{Client, Method, Query, Resource, created_payload};
use crate::core::enums::{
    ServiceEnvironmentVersion, ServiceExecutionStatus, ServiceScriptUser, ServiceType,
};
use crate::core::error::{Error, ErrorKind};
use serde::Deserialize;
use serde_json::{Map, Value, json};

type ApiResult<T> = Result<T, Error>;

#[derive(Deserialize)]
struct RemoteService {
    #[serde(default)]
    script_type: Option<String>,
    #[serde(default)]
    env_version: Option<String>,
    #[serde(default)]
    run_as: Option<String>,
    #[serde(default)]
    script_version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    scope: Option<Value>,
    #[serde(default)]
    scope_id: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct Service {
    base: Base,
    service_type: Option<ServiceType>,
    environment_version: Option<ServiceEnvironmentVersion>,
    run_as: Option<ServiceScriptUser>,
    version: Option<String>,
    description: Option<String>,
    scope_id: Option<String>,
}

impl Entity for Service {
    const KIND: EntityKind = EntityKind::Service;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        let remote: RemoteService = decode(EntityKind::Service, &json)?;
        Ok(Self {
            service_type: lenient(remote.script_type.as_deref(), ServiceType::parse, "script_type"),
            environment_version: lenient(
                remote.env_version.as_deref(),
                ServiceEnvironmentVersion::parse,
                "env_version",
            ),
            run_as: lenient(remote.run_as.as_deref(), ServiceScriptUser::parse, "run_as"),
            version: remote.script_version,
            description: remote.description,
            scope_id: id_of(remote.scope_id.as_ref()).or_else(|| id_of(remote.scope.as_ref())),
            base: Base::from_json(EntityKind::Service, json, client)?,
        })
    }

    fn base(&self) -> &Base {
        &self.base
    }
}

impl Service {
    pub fn service_type(&self) -> Option<ServiceType> {
        self.service_type
    }

    pub fn environment_version(&self) -> Option<ServiceEnvironmentVersion> {
        self.environment_version
    }

    pub fn run_as(&self) -> Option<ServiceScriptUser> {
        self.run_as
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    /// Starts the service; the server answers before the script finishes.
    pub fn execute(&self) -> ApiResult<ServiceExecution> {
        let response = self.client().send(
            Method::Get,
            Resource::ServiceExecute(self.id()),
            None,
            202,
            "execute service",
        )?;
        ServiceExecution::from_json(created_payload(response, "service execution")?, self.client())
    }

    pub fn edit(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        version: Option<&str>,
    ) -> ApiResult<()> {
        let mut body = Map::new();
        if let Some(name) = name {
            body.insert("name".into(), json!(name));
        }
        if let Some(description) = description {
            body.insert("description".into(), json!(description));
        }
        if let Some(version) = version {
            body.insert("script_version".into(), json!(version));
        }
        if body.is_empty() {
            return Ok(());
        }
        self.client().send(
            Method::Put,
            Resource::Service(self.id()),
            Some(&Value::Object(body.clone())),
            200,
            "edit service",
        )?;
        if let Some(description) = description {
            self.description = Some(description.to_string());
        }
        if let Some(version) = version {
            self.version = Some(version.to_string());
        }
        for (key, value) in body {
            self.base.set_field(&key, value);
        }
        Ok(())
    }

    pub fn delete(self) -> ApiResult<()> {
        self.client().send(
            Method::Delete,
            Resource::Service(self.id()),
            None,
            204,
            "delete service",
        )?;
        Ok(())
    }

    pub fn executions(&self) -> ApiResult<Vec<ServiceExecution>> {
        self.client()
            .service_executions(&Query::new().param("service", self.id()))
    }
}

#[derive(Deserialize)]
struct RemoteServiceExecution {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    service: Option<Value>,
    #[serde(default)]
    service_id: Option<Value>,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    finished_at: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServiceExecution {
    base: Base,
    status: Option<ServiceExecutionStatus>,
    service_id: Option<String>,
    started_at: Option<String>,
    finished_at: Option<String>,
    username: Option<String>,
}

impl Entity for ServiceExecution {
    const KIND: EntityKind = EntityKind::ServiceExecution;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        let remote: RemoteServiceExecution = decode(EntityKind::ServiceExecution, &json)?;
        Ok(Self {
            status: lenient(remote.status.as_deref(), ServiceExecutionStatus::parse, "status"),
            service_id: id_of(remote.service_id.as_ref())
                .or_else(|| id_of(remote.service.as_ref())),
            started_at: remote.started_at,
            finished_at: remote.finished_at,
            username: remote.username,
            base: Base::from_json(EntityKind::ServiceExecution, json, client)?,
        })
    }

    fn base(&self) -> &Base {
        &self.base
    }
}

impl ServiceExecution {
    pub fn status(&self) -> Option<ServiceExecutionStatus> {
        self.status
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    pub fn started_at(&self) -> Option<&str> {
        self.started_at.as_deref()
    }

    pub fn finished_at(&self) -> Option<&str> {
        self.finished_at.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some_and(ServiceExecutionStatus::is_finished)
    }

    /// Asks the server to stop the execution, then reloads it.
    pub fn terminate(&mut self) -> ApiResult<()> {
        if self.is_finished() {
            return Err(Error::new(ErrorKind::IllegalArgument).with_message(format!(
                "service execution {} already finished",
                self.id()
            )));
        }
        self.client().send(
            Method::Get,
            Resource::ServiceExecutionTerminate(self.id()),
            None,
            202,
            "terminate service execution",
        )?;
        self.refresh()
    }

    pub fn service(&self) -> ApiResult<Service> {
        let service_id = self.service_id.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("service execution {} has no service", self.id()))
        })?;
        self.client().service(&Query::new().id(service_id))
    }
}
