//! Purpose: A KE-chain project (scope) and the lookups rooted at it.
//! Exports: `Scope`, `ScopeMember`.
//! Role: Entry object returned by `get_project`; narrows client listings to one scope.
//! Invariants: Every listing issued from a scope carries that scope's id.
//! Invariants: Membership is read from the payload; no extra request is made.
use super::activity::Activity;
use super::base::{Base, Entity, EntityKind, decode, id_of, lenient, null_default};
use super::part::Part;
use super::service::Service;
use super::team::Team;
use crate::api::{Client, NewService, Query};
use crate::core::enums::{ScopeCategory, ScopeStatus};
use crate::core::error::Error;
use serde::Deserialize;
use serde_json::Value;

type ApiResult<T> = Result<T, Error>;

#[derive(Deserialize)]
struct RemoteScope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    team: Option<Value>,
    #[serde(default, deserialize_with = "null_default")]
    members: Vec<RemoteMember>,
}

#[derive(Deserialize)]
struct RemoteMember {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    is_manager: bool,
    #[serde(default, deserialize_with = "null_default")]
    is_supervisor: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScopeMember {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub is_manager: bool,
    pub is_supervisor: bool,
}

#[derive(Clone, Debug)]
pub struct Scope {
    base: Base,
    status: Option<ScopeStatus>,
    category: Option<ScopeCategory>,
    description: Option<String>,
    start_date: Option<String>,
    due_date: Option<String>,
    team_id: Option<String>,
    members: Vec<ScopeMember>,
}

impl Entity for Scope {
    const KIND: EntityKind = EntityKind::Scope;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        let remote: RemoteScope = decode(EntityKind::Scope, &json)?;
        let members = remote
            .members
            .into_iter()
            .map(|member| ScopeMember {
                user_id: match member.user_id {
                    Some(Value::Number(number)) => Some(number.to_string()),
                    other => id_of(other.as_ref()),
                },
                username: member.username,
                is_manager: member.is_manager,
                is_supervisor: member.is_supervisor,
            })
            .collect();
        Ok(Self {
            status: lenient(remote.status.as_deref(), ScopeStatus::parse, "status"),
            category: lenient(remote.category.as_deref(), ScopeCategory::parse, "category"),
            description: remote.description,
            start_date: remote.start_date,
            due_date: remote.due_date,
            team_id: id_of(remote.team.as_ref()),
            members,
            base: Base::from_json(EntityKind::Scope, json, client)?,
        })
    }

    fn base(&self) -> &Base {
        &self.base
    }
}

impl Scope {
    pub fn status(&self) -> Option<ScopeStatus> {
        self.status
    }

    pub fn category(&self) -> Option<ScopeCategory> {
        self.category
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

    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    /// Members listed on the scope, optionally only managers.
    pub fn members(&self, managers_only: bool) -> Vec<&ScopeMember> {
        self.members
            .iter()
            .filter(|member| !managers_only || member.is_manager)
            .collect()
    }

    fn scoped(&self, query: &Query) -> Query {
        query.clone().scope(self.id())
    }

    pub fn parts(&self, query: &Query) -> ApiResult<Vec<Part>> {
        self.client().parts(&self.scoped(query))
    }

    pub fn part(&self, query: &Query) -> ApiResult<Part> {
        self.client().part(&self.scoped(query))
    }

    pub fn model(&self, query: &Query) -> ApiResult<Part> {
        self.client().model(&self.scoped(query))
    }

    pub fn activities(&self, query: &Query) -> ApiResult<Vec<Activity>> {
        self.client().activities(&self.scoped(query))
    }

    pub fn activity(&self, query: &Query) -> ApiResult<Activity> {
        self.client().activity(&self.scoped(query))
    }

    pub fn services(&self, query: &Query) -> ApiResult<Vec<Service>> {
        self.client().services(&self.scoped(query))
    }

    pub fn service(&self, query: &Query) -> ApiResult<Service> {
        self.client().service(&self.scoped(query))
    }

    /// Creates a python-script service in this scope.
    pub fn create_service(&self, name: &str) -> ApiResult<Service> {
        self.client().create_service(&NewService::new(name, self.id()))
    }

    pub fn team(&self) -> ApiResult<Option<Team>> {
        match &self.team_id {
            Some(team_id) => self.client().team(&Query::new().id(team_id)).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Scope;
    use crate::api::{Client, Method, Query, ReplayTransport};
    use crate::core::enums::ScopeStatus;
    use crate::models::Entity;
    use serde_json::json;
    use std::sync::Arc;

    const SCOPE_ID: &str = "eeb0937b-da50-4eb2-8d74-f36259cca96e";

    #[test]
    fn null_member_flags_read_as_false() {
        let replay = Arc::new(ReplayTransport::new());
        let scope = Scope::from_json(
            json!({
                "id": SCOPE_ID,
                "members": [{"user_id": 1, "is_manager": null, "is_supervisor": null}]
            }),
            &Client::offline(replay.clone()),
        )
        .expect("scope");
        assert_eq!(scope.members(false).len(), 1);
        assert!(scope.members(true).is_empty());

        let scope = Scope::from_json(
            json!({"id": SCOPE_ID, "members": null}),
            &Client::offline(replay),
        )
        .expect("scope");
        assert!(scope.members(false).is_empty());
    }

    fn scope(replay: &Arc<ReplayTransport>) -> Scope {
        Scope::from_json(
            json!({
                "id": SCOPE_ID,
                "name": "Bike Project",
                "status": "ACTIVE",
                "members": [
                    {"user_id": 1, "username": "anna", "is_manager": true},
                    {"user_id": 2, "username": "ben"}
                ]
            }),
            &Client::offline(replay.clone()),
        )
        .expect("scope")
    }

    #[test]
    fn members_filter_managers() {
        let replay = Arc::new(ReplayTransport::new());
        let scope = scope(&replay);
        assert_eq!(scope.status(), Some(ScopeStatus::Active));
        assert_eq!(scope.members(false).len(), 2);
        let managers = scope.members(true);
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].user_id.as_deref(), Some("1"));
    }

    #[test]
    fn listings_carry_the_scope_id() {
        let replay = Arc::new(ReplayTransport::new());
        replay.expect_results(Method::Get, "/api/parts.json", vec![]);
        let scope = scope(&replay);
        let parts = scope.parts(&Query::new().name("Wheel")).expect("parts");
        assert!(parts.is_empty());
        let request = &replay.requests()[0];
        assert_eq!(request.query_value("scope_id"), Some(SCOPE_ID));
        assert_eq!(request.query_value("name"), Some("Wheel"));
    }

    #[test]
    fn create_service_posts_to_scope() {
        let replay = Arc::new(ReplayTransport::new());
        replay.expect(
            Method::Post,
            "/api/services.json",
            201,
            json!({"results": [{"id": "svc-1", "name": "Checker", "script_type": "PYTHON SCRIPT"}]}),
        );
        let service = scope(&replay).create_service("Checker").expect("service");
        assert_eq!(service.name(), Some("Checker"));
        let body = replay.writes()[0].body.clone().expect("body");
        assert_eq!(body["scope"], json!(SCOPE_ID));
        assert_eq!(body["env_version"], json!("3.5"));
    }
}
