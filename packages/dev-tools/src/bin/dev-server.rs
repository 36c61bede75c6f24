//! Development HTTP Server Binary
//!
//! Serves the ContentForge REST API over an in-memory store. Without a
//! configuration file it serves a demo `geolocation` collection seeded with a
//! few documents.
//!
//! # Usage
//!
//! ```bash
//! # Demo content on port 3000
//! cargo run --bin dev-server
//!
//! # Own configuration
//! CONTENTFORGE_CONFIG=./content.json cargo run --bin dev-server
//! ```
//!
//! # Environment Variables
//!
//! - `CONTENTFORGE_CONFIG`: Configuration file (default: demo configuration)
//! - `CONTENTFORGE_PORT`: Server port (default: 3000)
//! - `CORS_ALLOW_ORIGIN`: Allowed origin (default: common Vite ports)
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//!
//! **DEVELOPMENT ONLY**: no authentication, data is lost on exit.

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use contentforge_core::config::ContentConfig;
use contentforge_core::http::{create_router, AppState};
use contentforge_core::services::{DocumentService, SaveParams};
use contentforge_core::{telemetry, EntityRegistry, MemoryStore, Record};

/// Demo configuration: one localized collection of geo points
fn demo_config() -> anyhow::Result<ContentConfig> {
    let config = json!({
        "collections": [{
            "slug": "geolocation",
            "labels": { "singular": "Geolocation", "plural": "Geolocations" },
            "versions": { "drafts": true },
            "fields": [
                { "name": "location", "type": "point" },
                { "name": "localizedPoint", "type": "point", "localized": true },
                {
                    "name": "points",
                    "type": "array",
                    "fields": [{ "name": "location", "type": "point" }]
                }
            ]
        }],
        "localization": { "locales": ["en", "es"], "defaultLocale": "en" }
    });

    let mut config: ContentConfig = serde_json::from_value(config)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Seed the demo collection
async fn seed(service: &DocumentService) -> anyhow::Result<()> {
    let places = [
        ([10.0, 20.0], [-118.24, 34.05]),
        ([-0.13, 51.51], [2.35, 48.86]),
        ([139.69, 35.69], [151.21, -33.87]),
    ];

    for (location, other) in places {
        let doc = service
            .create(
                "geolocation",
                record(json!({
                    "location": location,
                    "localizedPoint": location,
                    "points": [{ "location": location }, { "location": other }]
                })),
                SaveParams::default(),
            )
            .await?;

        service
            .update(
                "geolocation",
                &doc.id,
                record(json!({ "localizedPoint": other })),
                SaveParams {
                    draft: false,
                    locale: Some("es".to_string()),
                },
            )
            .await?;
    }

    tracing::info!("Seeded {} geolocation documents", places.len());
    Ok(())
}

/// CORS for local front-ends
fn cors_layer() -> CorsLayer {
    let default_origins = [
        "http://localhost:1420",
        "http://localhost:5173",
        "http://localhost:3001",
    ];

    let origins: Vec<HeaderValue> = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(custom) => match custom.parse::<HeaderValue>() {
            Ok(origin) => vec![origin],
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS_ALLOW_ORIGIN '{}'", custom);
                Vec::new()
            }
        },
        Err(_) => default_origins
            .iter()
            .filter_map(|origin| origin.parse::<HeaderValue>().ok())
            .collect(),
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers(Any)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("info");

    tracing::info!("ContentForge dev server");

    let (config, demo) = match ContentConfig::path_from_env() {
        Some(path) => (
            ContentConfig::load(&path).with_context(|| format!("loading {}", path.display()))?,
            false,
        ),
        None => (demo_config()?, true),
    };

    let registry = Arc::new(EntityRegistry::build(&config)?);
    let service = DocumentService::new(Arc::new(MemoryStore::new()), registry, &config).await?;
    if demo {
        seed(&service).await?;
    }

    let app = create_router(AppState::new(Arc::new(service))).layer(cors_layer());

    let addr = config.server.address();
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Development mode only, data is kept in memory");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
