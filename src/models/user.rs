//! Purpose: KE-chain user accounts.
//! Exports: `User`.
//! Role: Read-only wrapper; users are referenced by scopes and teams.
//! Invariants: `username` is always present on server payloads; `name` may not be.
//! Invariants: No write operations are exposed.
use super::base::{Base, Entity, EntityKind, decode};
use crate::api::Client;
use crate::core::error::Error;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct RemoteUser {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct User {
    base: Base,
    username: Option<String>,
    email: Option<String>,
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn from_json(json: Value, client: &Client) -> Result<Self, Error> {
        let remote: RemoteUser = decode(EntityKind::User, &json)?;
        let json = match json {
            // Users are keyed by a numeric pk on older servers.
            Value::Object(mut map) if !map.get("id").is_some_and(Value::is_string) => {
                if let Some(pk) = map.get("pk").or_else(|| map.get("id")).cloned() {
                    let id = match pk {
                        Value::String(id) => id,
                        other => other.to_string(),
                    };
                    map.insert("id".to_string(), Value::String(id));
                }
                Value::Object(map)
            }
            other => other,
        };
        Ok(Self {
            username: remote.username,
            email: remote.email,
            base: Base::from_json(EntityKind::User, json, client)?,
        })
    }

    fn base(&self) -> &Base {
        &self.base
    }
}

impl User {
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::User;
    use crate::api::{Client, ReplayTransport};
    use crate::models::Entity;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn numeric_pk_becomes_the_id() {
        let client = Client::offline(Arc::new(ReplayTransport::new()));
        let user = User::from_json(json!({"pk": 12, "username": "anna"}), &client).expect("user");
        assert_eq!(user.id(), "12");
        assert_eq!(user.username(), Some("anna"));
        assert_eq!(user.name(), None);
    }
}
