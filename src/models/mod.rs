//! Purpose: Typed wrappers for every KE-chain object and the construction entry point.
//! Exports: `AnyEntity`, `Entity`, `Base`, `ObjectRef`, `ValueInput`, and one type per object kind.
//! Role: Turns raw payloads into wrappers; wrappers validate before they write.
//! Invariants: Construction never touches the network.
//! Invariants: Unknown discriminators resolve to a fallback variant instead of failing.
#![allow(clippy::result_large_err)]

mod activity;
mod base;
mod part;
mod prefilter;
mod property;
mod reference;
mod scope;
mod service;
mod team;
mod user;
mod widget;

pub use activity::Activity;
pub use base::{Base, Entity, EntityKind, ObjectRef, ValueInput};
pub use part::Part;
pub use prefilter::Prefilter;
pub use property::{
    AttachmentProperty, Property, PropertyData, ScalarProperty, SelectListProperty,
};
pub use reference::{MultiReferenceProperty, ReferenceProperty};
pub use scope::{Scope, ScopeMember};
pub use service::{Service, ServiceExecution};
pub use team::{Team, TeamMember};
pub use user::User;
pub use widget::Widget;

use crate::api::Client;
use crate::core::error::Error;
use serde_json::Value;

/// Any wrapper, tagged by object kind.
#[derive(Clone, Debug)]
pub enum AnyEntity {
    Scope(Scope),
    Part(Part),
    Property(Property),
    Activity(Activity),
    Widget(Widget),
    Service(Service),
    ServiceExecution(ServiceExecution),
    User(User),
    Team(Team),
}

impl AnyEntity {
    /// Builds the wrapper for `kind`; properties and widgets go through their discriminator factories.
    pub fn create(kind: EntityKind, json: Value, client: &Client) -> Result<AnyEntity, Error> {
        Ok(match kind {
            EntityKind::Scope => AnyEntity::Scope(Scope::from_json(json, client)?),
            EntityKind::Part => AnyEntity::Part(Part::from_json(json, client)?),
            EntityKind::Property => AnyEntity::Property(Property::create(json, client)?),
            EntityKind::Activity => AnyEntity::Activity(Activity::from_json(json, client)?),
            EntityKind::Widget => AnyEntity::Widget(Widget::create(json, client)?),
            EntityKind::Service => AnyEntity::Service(Service::from_json(json, client)?),
            EntityKind::ServiceExecution => {
                AnyEntity::ServiceExecution(ServiceExecution::from_json(json, client)?)
            }
            EntityKind::User => AnyEntity::User(User::from_json(json, client)?),
            EntityKind::Team => AnyEntity::Team(Team::from_json(json, client)?),
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            AnyEntity::Scope(_) => EntityKind::Scope,
            AnyEntity::Part(_) => EntityKind::Part,
            AnyEntity::Property(_) => EntityKind::Property,
            AnyEntity::Activity(_) => EntityKind::Activity,
            AnyEntity::Widget(_) => EntityKind::Widget,
            AnyEntity::Service(_) => EntityKind::Service,
            AnyEntity::ServiceExecution(_) => EntityKind::ServiceExecution,
            AnyEntity::User(_) => EntityKind::User,
            AnyEntity::Team(_) => EntityKind::Team,
        }
    }

    pub fn base(&self) -> &Base {
        match self {
            AnyEntity::Scope(entity) => entity.base(),
            AnyEntity::Part(entity) => entity.base(),
            AnyEntity::Property(entity) => entity.base(),
            AnyEntity::Activity(entity) => entity.base(),
            AnyEntity::Widget(entity) => entity.base(),
            AnyEntity::Service(entity) => entity.base(),
            AnyEntity::ServiceExecution(entity) => entity.base(),
            AnyEntity::User(entity) => entity.base(),
            AnyEntity::Team(entity) => entity.base(),
        }
    }

    pub fn id(&self) -> &str {
        self.base().id()
    }
}

#[cfg(test)]
mod tests {
    use super::{AnyEntity, EntityKind};
    use crate::api::{Client, ReplayTransport};
    use crate::core::enums::WidgetType;
    use serde_json::json;
    use std::sync::Arc;

    const ID: &str = "6f7bc9f0-228e-4d3a-9dc0-ec5a75d73e1d";

    #[test]
    fn create_dispatches_on_kind() {
        let client = Client::offline(Arc::new(ReplayTransport::new()));
        let entity = AnyEntity::create(
            EntityKind::Widget,
            json!({"id": ID, "widget_type": "superGrid", "meta": {}}),
            &client,
        )
        .expect("widget");
        assert_eq!(entity.kind(), EntityKind::Widget);
        assert_eq!(entity.id(), ID);
        let AnyEntity::Widget(widget) = entity else {
            panic!("expected widget");
        };
        assert_eq!(widget.widget_type(), WidgetType::SuperGrid);
    }

    #[test]
    fn create_rejects_payload_without_id() {
        let client = Client::offline(Arc::new(ReplayTransport::new()));
        assert!(AnyEntity::create(EntityKind::User, json!({"username": "x"}), &client).is_err());
    }
}
