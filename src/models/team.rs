//! Purpose: Teams of users with roles, and the scopes they work in.
//! Exports: `Team`, `TeamMember`.
//! Role: Read wrapper over team payloads; membership is embedded in the payload.
//! Invariants: Members with an unrecognized role are kept with `role: None`.
//! Invariants: Role filtering never issues a request.
use super::base::{Base, Entity, EntityKind, decode, lenient, null_default};
use super::scope::Scope;
use crate::api::{Client, Query};
use crate::core::enums::TeamRole;
use crate::core::error::Error;
use serde::Deserialize;
use serde_json::Value;

type ApiResult<T> = Result<T, Error>;

#[derive(Deserialize)]
struct RemoteTeam {
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    members: Vec<RemoteTeamMember>,
}

#[derive(Deserialize)]
struct RemoteTeamMember {
    #[serde(default)]
    user: Option<Value>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TeamMember {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub role: Option<TeamRole>,
}

#[derive(Clone, Debug)]
pub struct Team {
    base: Base,
    description: Option<String>,
    members: Vec<TeamMember>,
}

impl Entity for Team {
    const KIND: EntityKind = EntityKind::Team;

    fn from_json(json: Value, client: &Client) -> ApiResult<Self> {
        let remote: RemoteTeam = decode(EntityKind::Team, &json)?;
        let members = remote
            .members
            .into_iter()
            .map(|member| TeamMember {
                user_id: match member.user {
                    Some(Value::String(id)) => Some(id),
                    Some(Value::Number(pk)) => Some(pk.to_string()),
                    _ => None,
                },
                username: member.username,
                role: lenient(member.role.as_deref(), TeamRole::parse, "role"),
            })
            .collect();
        Ok(Self {
            description: remote.description,
            members,
            base: Base::from_json(EntityKind::Team, json, client)?,
        })
    }

    fn base(&self) -> &Base {
        &self.base
    }
}

impl Team {
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Members, optionally only those holding `role`.
    pub fn members(&self, role: Option<TeamRole>) -> Vec<&TeamMember> {
        self.members
            .iter()
            .filter(|member| role.is_none() || member.role == role)
            .collect()
    }

    pub fn scopes(&self) -> ApiResult<Vec<Scope>> {
        self.client().scopes(&Query::new().param("team", self.id()))
    }
}
