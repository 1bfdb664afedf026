//! Purpose: `kechain` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs one library call, emits JSON on stdout.
//! Invariants: Successful commands print exactly one JSON document on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use kechain::api::{
    Client, ClientConfig, Error, ErrorKind, KECHAIN_PASSWORD, KECHAIN_TOKEN, KECHAIN_USERNAME,
    MetaSchema, ProjectRequest, Query, get_project_with, to_exit_code,
};
use kechain::core::enums::{Category, ScopeStatus, WidgetType};
use kechain::models::{Entity, Part, Widget};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Client)
                    .with_message(clap_error_summary(&err))
                    .with_hint(clap_error_hint(&err)));
            }
        },
    };

    init_tracing();
    let value = dispatch(cli.command, &cli.connection)?;
    emit_json(&value);
    Ok(RunOutcome::ok())
}

#[derive(Parser)]
#[command(
    name = "kechain",
    version,
    about = "Query and operate a KE-chain PLM server from the command line",
    help_template = r#"{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
"#,
    after_help = r#"CONNECTION
  Flags win over KECHAIN_URL, KECHAIN_TOKEN, KECHAIN_USERNAME, KECHAIN_PASSWORD.
  Set RUST_LOG=debug to trace requests on stderr.

EXAMPLES
  $ kechain scope --name "Bike Project"
  $ kechain parts --scope-id <uuid> --category model
  $ kechain widget-validate meta.json --widget-type superGrid --server"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug, Default)]
struct ConnectionArgs {
    #[arg(long, global = true, help = "KE-chain base url (default: $KECHAIN_URL)", value_hint = ValueHint::Url)]
    url: Option<String>,
    #[arg(long, global = true, help = "API token (default: $KECHAIN_TOKEN)")]
    token: Option<String>,
    #[arg(long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Show one scope (project) by name or id")]
    Scope {
        #[arg(long, help = "Scope name (default: $KECHAIN_SCOPE)")]
        name: Option<String>,
        #[arg(long, help = "Scope id (default: $KECHAIN_SCOPE_ID)")]
        id: Option<String>,
        #[arg(long, value_enum, help = "Only consider scopes with this status")]
        status: Option<StatusArg>,
        #[arg(long, help = "dotenv file with KECHAIN_* values; set variables win", value_hint = ValueHint::FilePath)]
        env_file: Option<PathBuf>,
    },
    #[command(about = "List parts, optionally narrowed to a scope")]
    Parts {
        #[arg(long, help = "Only parts in this scope")]
        scope_id: Option<String>,
        #[arg(long, help = "Exact part name")]
        name: Option<String>,
        #[arg(long, value_enum, help = "Model or instance parts")]
        category: Option<CategoryArg>,
        #[arg(long, help = "Only children of this part")]
        parent: Option<String>,
        #[arg(long, help = "Only instances of this model")]
        model: Option<String>,
    },
    #[command(about = "Show one part with its properties")]
    Part {
        #[arg(help = "Part id")]
        id: String,
    },
    #[command(about = "List the widgets of an activity")]
    Widgets {
        #[arg(long, help = "Activity id")]
        activity: String,
    },
    #[command(
        name = "widget-validate",
        about = "Validate a widget meta JSON file offline"
    )]
    WidgetValidate {
        #[arg(help = "Meta JSON file", value_hint = ValueHint::FilePath)]
        meta: PathBuf,
        #[arg(long, help = "Widget type discriminator; selects the server schema with --server")]
        widget_type: Option<String>,
        #[arg(long, help = "JSON schema file to validate against instead of the generic one", value_hint = ValueHint::FilePath)]
        schema: Option<PathBuf>,
        #[arg(long, conflicts_with = "schema", help = "Load the per-type schemas from the server first")]
        server: bool,
    },
    #[command(name = "service-execute", about = "Start a service and print the execution")]
    ServiceExecute {
        #[arg(help = "Service id")]
        id: String,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CategoryArg {
    Model,
    Instance,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Model => Category::Model,
            CategoryArg::Instance => Category::Instance,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StatusArg {
    Active,
    Closed,
    Template,
}

impl From<StatusArg> for ScopeStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Active => ScopeStatus::Active,
            StatusArg::Closed => ScopeStatus::Closed,
            StatusArg::Template => ScopeStatus::Template,
        }
    }
}

fn dispatch(command: Command, connection: &ConnectionArgs) -> Result<Value, Error> {
    match command {
        Command::Scope {
            name,
            id,
            status,
            env_file,
        } => {
            let request = ProjectRequest {
                url: connection.url.clone(),
                token: connection
                    .token
                    .clone()
                    .or_else(|| env_lookup(KECHAIN_TOKEN)),
                username: env_lookup(KECHAIN_USERNAME),
                password: env_lookup(KECHAIN_PASSWORD),
                scope: name,
                scope_id: id,
                status: status.map(ScopeStatus::from),
                check_certificates: connection.insecure.then_some(false),
                env_filename: env_file,
            };
            let scope = get_project_with(&request, env_lookup)?;
            Ok(scope.json().clone())
        }
        Command::Parts {
            scope_id,
            name,
            category,
            parent,
            model,
        } => {
            let client = connect(connection)?;
            let mut query = Query::new();
            if let Some(scope_id) = &scope_id {
                query = query.scope(scope_id);
            }
            if let Some(name) = &name {
                query = query.name(name);
            }
            if let Some(category) = category {
                query = query.category(category.into());
            }
            if let Some(parent) = &parent {
                query = query.parent(parent);
            }
            if let Some(model) = &model {
                query = query.model(model);
            }
            let parts = client.parts(&query)?;
            Ok(Value::Array(parts.iter().map(part_summary).collect()))
        }
        Command::Part { id } => {
            let part = connect(connection)?.part_by_id(&id)?;
            Ok(part_detail(&part))
        }
        Command::Widgets { activity } => {
            let widgets = connect(connection)?.widgets(&Query::new().activity(&activity))?;
            Ok(Value::Array(widgets.iter().map(widget_summary).collect()))
        }
        Command::WidgetValidate {
            meta,
            widget_type,
            schema,
            server,
        } => {
            let widget_type = WidgetType::from_discriminator(widget_type.as_deref());
            let source = match schema {
                Some(path) => SchemaSource::File(path),
                None if server => SchemaSource::Server(connect(connection)?),
                None => SchemaSource::Generic,
            };
            validate_widget_meta(&meta, widget_type, source)
        }
        Command::ServiceExecute { id } => {
            let client = connect(connection)?;
            let execution = client.service(&Query::new().id(&id))?.execute()?;
            Ok(execution.json().clone())
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn connect(connection: &ConnectionArgs) -> Result<Client, Error> {
    let mut config = match &connection.url {
        Some(url) => {
            let mut config = ClientConfig::new(url.clone());
            config.token = env_lookup(KECHAIN_TOKEN);
            config.username = env_lookup(KECHAIN_USERNAME);
            config.password = env_lookup(KECHAIN_PASSWORD);
            config
        }
        None => ClientConfig::from_env().map_err(|err| {
            err.with_hint("Pass --url or set KECHAIN_URL.")
        })?,
    };
    if let Some(token) = &connection.token {
        config.token = Some(token.clone());
    }
    if connection.insecure {
        config.check_certificates = false;
    }
    if !config.has_credentials() {
        return Err(Error::new(ErrorKind::Client)
            .with_message("no credentials to connect to KE-chain")
            .with_hint("Pass --token or set KECHAIN_TOKEN (or KECHAIN_USERNAME and KECHAIN_PASSWORD)."));
    }
    tracing::debug!(url = %config.url, verify = config.check_certificates, "connecting");
    Client::from_config(&config)
}

/// Where `widget-validate` takes its schema from.
enum SchemaSource {
    Generic,
    File(PathBuf),
    Server(Client),
}

fn validate_widget_meta(
    meta_path: &Path,
    widget_type: WidgetType,
    source: SchemaSource,
) -> Result<Value, Error> {
    let meta = read_json_file(meta_path, "widget meta")?;
    let (schema, label) = match source {
        SchemaSource::Generic => (MetaSchema::generic(), "generic"),
        SchemaSource::File(path) => (
            Arc::new(MetaSchema::compile(read_json_file(&path, "schema")?)?),
            "custom",
        ),
        SchemaSource::Server(client) => {
            let loaded = client.load_widget_schemas()?;
            tracing::debug!(loaded, widget_type = %widget_type, "server widget schemas");
            let label = if client.has_widget_schema(widget_type) {
                "server"
            } else {
                "generic"
            };
            (client.widget_schema(widget_type), label)
        }
    };
    schema.validate(&meta)?;
    Ok(json!({
        "valid": true,
        "widget_type": widget_type.as_str(),
        "schema": label,
    }))
}

fn read_json_file(path: &Path, what: &str) -> Result<Value, Error> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read {what} file {}", path.display()))
            .with_source(err)
    })?;
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::IllegalArgument)
            .with_message(format!("{what} file {} is not valid JSON", path.display()))
            .with_hint("Check the file with a JSON linter.")
            .with_source(err)
    })
}

fn part_summary(part: &Part) -> Value {
    json!({
        "id": part.id(),
        "name": part.name(),
        "category": part.category().map(|category| category.as_str()),
        "parent_id": part.parent_id(),
        "model_id": part.model_id(),
        "scope_id": part.scope_id(),
    })
}

fn part_detail(part: &Part) -> Value {
    let mut value = part_summary(part);
    let properties: Vec<Value> = part
        .properties()
        .iter()
        .map(|property| {
            let data = property.data();
            json!({
                "id": data.id(),
                "name": data.name(),
                "property_type": property.property_type().map(|kind| kind.as_str()),
                "value": property.value(),
                "unit": data.unit(),
            })
        })
        .collect();
    if let Value::Object(map) = &mut value {
        map.insert("description".to_string(), json!(part.description()));
        map.insert("properties".to_string(), Value::Array(properties));
    }
    value
}

fn widget_summary(widget: &Widget) -> Value {
    json!({
        "id": widget.id(),
        "widget_type": widget.widget_type().as_str(),
        "title": widget.title(),
        "order": widget.order(),
        "meta": widget.meta(),
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_json(value: &Value) {
    let rendered = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(text) => println!("{text}"),
        Err(err) => emit_error(
            &Error::new(ErrorKind::Internal)
                .with_message("json encode failed")
                .with_source(err),
        ),
    }
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Client => "client error".to_string(),
        ErrorKind::IllegalArgument => "illegal argument".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::MultipleFound => "multiple results found".to_string(),
        ErrorKind::Api => "api error".to_string(),
        ErrorKind::SchemaViolation => "schema violation".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(index) = err.index() {
        inner.insert("index".to_string(), json!(index));
    }
    if let Some(pointer) = err.pointer() {
        inner.insert("pointer".to_string(), json!(pointer));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(status) = err.status() {
        lines.push(format!("status: {status}"));
    }
    if let Some(pointer) = err.pointer() {
        lines.push(format!("at: {pointer}"));
    }
    for cause in error_causes(err) {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let command = usage.and_then(|usage| {
        let tokens: Vec<&str> = usage.split_whitespace().collect();
        let pos = tokens.iter().position(|t| *t == "kechain")?;
        tokens
            .get(pos + 1)
            .filter(|token| !token.starts_with(['-', '<', '[']))
            .map(|token| token.to_string())
    });
    match command {
        Some(command) => format!("Try `kechain {command} --help`."),
        None => "Try `kechain --help`.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, SchemaSource, error_json, error_text, validate_widget_meta};
    use clap::Parser;
    use kechain::api::{Client, Error, ErrorKind, Method, ReplayTransport};
    use kechain::core::enums::WidgetType;
    use serde_json::json;
    use std::sync::Arc;

    fn meta_file(dir: &std::path::Path, meta: &serde_json::Value) -> std::path::PathBuf {
        let path = dir.join("meta.json");
        std::fs::write(&path, meta.to_string()).expect("write meta");
        path
    }

    #[test]
    fn server_schema_is_picked_by_widget_type() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = meta_file(temp.path(), &json!({"collapsed": true}));
        let replay = Arc::new(ReplayTransport::new());
        let listing = vec![json!({
            "widget_type": "SUPERGRID",
            "schema": {"type": "object", "required": ["partModelId"]}
        })];
        replay
            .expect_results(Method::Get, "/api/widgets/schemas", listing.clone())
            .expect_results(Method::Get, "/api/widgets/schemas", listing);

        let client = Client::offline(replay.clone());
        let err = validate_widget_meta(&meta, WidgetType::SuperGrid, SchemaSource::Server(client))
            .expect_err("super grid needs a part model");
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);

        let client = Client::offline(replay);
        let report = validate_widget_meta(&meta, WidgetType::Html, SchemaSource::Server(client))
            .expect("html uses the generic schema");
        assert_eq!(report["schema"], json!("generic"));
        assert_eq!(report["widget_type"], json!("HTML"));
    }

    #[test]
    fn server_flag_conflicts_with_schema_file() {
        let result = Cli::try_parse_from([
            "kechain",
            "widget-validate",
            "meta.json",
            "--server",
            "--schema",
            "schema.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_connection_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["kechain", "part", "abc", "--url", "https://x", "--insecure"])
            .expect("parse");
        assert_eq!(cli.connection.url.as_deref(), Some("https://x"));
        assert!(cli.connection.insecure);
        assert!(matches!(cli.command, Command::Part { ref id } if id == "abc"));
    }

    #[test]
    fn error_json_carries_structured_fields() {
        let err = Error::new(ErrorKind::SchemaViolation)
            .with_message("bad meta")
            .with_pointer("/collapsed");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], json!("SchemaViolation"));
        assert_eq!(value["error"]["pointer"], json!("/collapsed"));
        assert!(value["error"].get("status").is_none());
    }

    #[test]
    fn error_text_falls_back_to_kind_message() {
        let text = error_text(&Error::new(ErrorKind::NotFound).with_status(404));
        assert!(text.starts_with("error: not found"));
        assert!(text.contains("status: 404"));
    }
}
