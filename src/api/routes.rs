//! Purpose: Closed routing table from resource kinds to KE-chain API URLs.
//! Exports: `Resource`, `build_url`, `normalize_base_url`.
//! Role: The only place URL paths are spelled; models name a `Resource` instead.
//! Invariants: Base URLs are http(s) origins without path, query, or fragment.
//! Invariants: Ids are pushed as single path segments (percent-encoded by `url`).
use crate::core::error::{Error, ErrorKind};
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resource<'a> {
    Scopes,
    Scope(&'a str),
    Parts,
    Part(&'a str),
    Properties,
    PropertyCreate,
    Property(&'a str),
    Activities,
    Activity(&'a str),
    Association(&'a str),
    Widgets,
    Widget(&'a str),
    WidgetAssociations(&'a str),
    WidgetSchemas,
    Services,
    Service(&'a str),
    ServiceExecute(&'a str),
    ServiceExecutions,
    ServiceExecution(&'a str),
    ServiceExecutionTerminate(&'a str),
    Users,
    User(&'a str),
    Teams,
    Team(&'a str),
}

impl Resource<'_> {
    fn segments(&self) -> Vec<String> {
        let item = |collection: &str, id: &str| {
            vec![
                "api".to_string(),
                collection.to_string(),
                format!("{id}.json"),
            ]
        };
        let action = |collection: &str, id: &str, action: &str| {
            vec![
                "api".to_string(),
                collection.to_string(),
                id.to_string(),
                action.to_string(),
            ]
        };
        let list = |collection: &str| vec!["api".to_string(), format!("{collection}.json")];

        match *self {
            Resource::Scopes => list("scopes"),
            Resource::Scope(id) => item("scopes", id),
            Resource::Parts => list("parts"),
            Resource::Part(id) => item("parts", id),
            Resource::Properties => list("properties"),
            Resource::PropertyCreate => vec![
                "api".to_string(),
                "properties".to_string(),
                "create_property".to_string(),
            ],
            Resource::Property(id) => item("properties", id),
            Resource::Activities => list("activities"),
            Resource::Activity(id) => item("activities", id),
            Resource::Association(id) => item("associations", id),
            Resource::Widgets => list("widgets"),
            Resource::Widget(id) => item("widgets", id),
            Resource::WidgetAssociations(id) => action("widgets", id, "update_associations"),
            Resource::WidgetSchemas => vec![
                "api".to_string(),
                "widgets".to_string(),
                "schemas".to_string(),
            ],
            Resource::Services => list("services"),
            Resource::Service(id) => item("services", id),
            Resource::ServiceExecute(id) => action("services", id, "execute"),
            Resource::ServiceExecutions => list("service_executions"),
            Resource::ServiceExecution(id) => item("service_executions", id),
            Resource::ServiceExecutionTerminate(id) => {
                action("service_executions", id, "terminate")
            }
            Resource::Users => list("users"),
            Resource::User(id) => item("users", id),
            Resource::Teams => list("teams"),
            Resource::Team(id) => item("teams", id),
        }
    }
}

pub fn normalize_base_url(raw: &str) -> ApiResult<Url> {
    let mut url = Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::Client)
            .with_message("invalid KE-chain url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Client).with_message("KE-chain url must use http or https scheme")
        );
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Client)
            .with_message("KE-chain url must not include a path")
            .with_hint("Use the site origin, e.g. https://<site>.ke-chain.com"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub fn build_url(base_url: &Url, resource: &Resource<'_>, query: &[(String, String)]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Client).with_message("KE-chain url cannot be a base")
        })?;
        path.clear();
        for segment in resource.segments() {
            path.push(&segment);
        }
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}
