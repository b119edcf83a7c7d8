use std::process;

use contentlink::{
    application::{Client, ClientError, SpaceConfig},
    config::{self, Command, LoadError},
    domain::{FieldValue, Resource},
    infra::{error::InfraError, telemetry},
    query::Query,
};
use serde_json::{Map, Value as Json, json};
use thiserror::Error;
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("{}", .0.report())]
    Client(#[from] ClientError),
    #[error("failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_error(&error);
        process::exit(1);
    }
}

fn report_error(error: &CliError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "command failed");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "command failed");
    });
}

async fn run() -> Result<(), CliError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let (name, space) = settings.space(cli_args.space.as_deref())?;
    let client = Client::new(name, SpaceConfig::from(space))?;

    let summary = match cli_args.command {
        Command::Space => {
            let space = client.get_space(name).await?;
            summarize(&Resource::Space(space))
        }
        Command::Entry(args) => {
            let entry = client
                .get_entry(name, &args.id, args.locale.as_deref())
                .await?;
            summarize(&Resource::Entry(entry))
        }
        Command::Entries(args) => {
            let mut query = paged(Query::new(), args.page.limit, args.page.skip);
            if let Some(content_type) = args.content_type {
                query = query.content_type(content_type);
            }
            if let Some(locale) = args.locale {
                query = query.locale(locale);
            }
            let entries = client.get_entries(name, query).await?;
            summarize(&Resource::Array(entries))
        }
        Command::Asset(args) => {
            let asset = client
                .get_asset(name, &args.id, args.locale.as_deref())
                .await?;
            summarize(&Resource::Asset(asset))
        }
        Command::Assets(page) => {
            let assets = client
                .get_assets(name, paged(Query::new(), page.limit, page.skip))
                .await?;
            summarize(&Resource::Array(assets))
        }
        Command::ContentType(args) => {
            let content_type = client.get_content_type(name, &args.id).await?;
            summarize(&Resource::ContentType(content_type))
        }
        Command::ContentTypes => {
            let content_types = client.get_content_types(name, Query::new()).await?;
            summarize(&Resource::Array(content_types))
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn paged(mut query: Query, limit: Option<u32>, skip: Option<u32>) -> Query {
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    if let Some(skip) = skip {
        query = query.skip(skip);
    }
    query
}

fn summarize(resource: &Resource) -> Json {
    match resource {
        Resource::Space(space) => json!({
            "type": "Space",
            "id": space.id(),
            "name": space.name,
            "locales": space.locales.iter().map(|locale| &locale.code).collect::<Vec<_>>(),
            "default_locale": space.default_locale().map(|locale| &locale.code),
        }),
        Resource::Entry(entry) => {
            let fields: Map<String, Json> = entry
                .field_names()
                .filter_map(|name| {
                    entry
                        .raw_field(name)
                        .map(|value| (name.to_string(), summarize_field(value)))
                })
                .collect();
            json!({
                "type": "Entry",
                "id": entry.id(),
                "content_type": entry.content_type_id(),
                "locale": entry.locale(),
                "fields": fields,
            })
        }
        Resource::Asset(asset) => json!({
            "type": "Asset",
            "id": asset.id(),
            "title": asset.title,
            "url": asset.url(),
            "size": asset.size(),
        }),
        Resource::ContentType(content_type) => json!({
            "type": "ContentType",
            "id": content_type.id(),
            "name": content_type.name,
            "display_field": content_type.display_field,
            "fields": content_type.fields.iter().map(|field| &field.id).collect::<Vec<_>>(),
        }),
        Resource::Link(link) => link_summary(resource.id(), link.link_type().as_str()),
        Resource::Array(array) => json!({
            "type": "Array",
            "total": array.total,
            "skip": array.skip,
            "limit": array.limit,
            "items": array.iter().map(summarize).collect::<Vec<_>>(),
        }),
    }
}

fn summarize_field(value: &FieldValue) -> Json {
    match value {
        FieldValue::Json(raw) => raw.clone(),
        FieldValue::Link(link) => link_summary(link.id(), link.link_type().as_str()),
        FieldValue::Resource(resource) => link_summary(resource.id(), resource.kind().as_str()),
        FieldValue::List(items) => Json::Array(items.iter().map(summarize_field).collect()),
    }
}

fn link_summary(id: &str, link_type: &str) -> Json {
    json!({ "link": { "type": link_type, "id": id } })
}
