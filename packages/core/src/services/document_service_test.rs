//! Tests for the document service

use super::*;
use crate::db::MemoryStore;
use serde_json::{json, Value};

fn config() -> ContentConfig {
    serde_json::from_value(json!({
        "collections": [
            {
                "slug": "posts",
                "fields": [
                    { "name": "title", "type": "text", "localized": true },
                    { "name": "category", "type": "select", "options": ["news", "blog"] },
                    { "name": "location", "type": "point" }
                ]
            },
            {
                "slug": "pages",
                "versions": { "drafts": true, "maxPerDoc": 3 },
                "fields": [
                    { "name": "title", "type": "text" },
                    { "name": "visibility", "type": "text" }
                ]
            },
            { "slug": "secrets", "access": { "read": false } },
            {
                "slug": "members",
                "access": { "read": { "status": { "equals": "public" } } },
                "fields": [{ "name": "status", "type": "text" }]
            }
        ],
        "globals": [{
            "slug": "settings",
            "versions": { "drafts": true },
            "fields": [{ "name": "siteName", "type": "text", "localized": true }]
        }],
        "localization": { "locales": ["en", "de"], "defaultLocale": "en" },
        "pagination": { "defaultLimit": 2, "maxLimit": 5 }
    }))
    .unwrap()
}

async fn service() -> DocumentService {
    let config = config();
    let registry = Arc::new(EntityRegistry::build(&config).unwrap());
    DocumentService::new(Arc::new(MemoryStore::new()), registry, &config)
        .await
        .unwrap()
}

fn data(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

fn read_in(locale: &str) -> ReadParams {
    ReadParams {
        locale: Some(locale.to_string()),
        ..Default::default()
    }
}

fn save_in(locale: &str) -> SaveParams {
    SaveParams {
        draft: false,
        locale: Some(locale.to_string()),
    }
}

fn draft() -> SaveParams {
    SaveParams {
        draft: true,
        locale: None,
    }
}

fn read_draft() -> ReadParams {
    ReadParams {
        draft: true,
        ..Default::default()
    }
}

fn where_params(clause: Value) -> FindParams {
    FindParams {
        where_clause: Some(clause),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_and_read_localized() {
    let service = service().await;

    let created = service
        .create("posts", data(json!({ "title": "Hello" })), SaveParams::default())
        .await
        .unwrap();
    assert_eq!(created.data["title"], "Hello");
    assert!(created.has_timestamps());

    let updated = service
        .update("posts", &created.id, data(json!({ "title": "Hallo" })), save_in("de"))
        .await
        .unwrap();
    assert_eq!(updated.data["title"], "Hallo");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);

    let en = service.find_by_id("posts", &created.id, read_in("en")).await.unwrap();
    assert_eq!(en.data["title"], "Hello");
    let de = service.find_by_id("posts", &created.id, read_in("de")).await.unwrap();
    assert_eq!(de.data["title"], "Hallo");
    let all = service.find_by_id("posts", &created.id, read_in("all")).await.unwrap();
    assert_eq!(all.data["title"], json!({ "en": "Hello", "de": "Hallo" }));
}

#[tokio::test]
async fn test_locale_fallback() {
    let service = service().await;
    let created = service
        .create("posts", data(json!({ "title": "Only English" })), SaveParams::default())
        .await
        .unwrap();

    let fallback = service.find_by_id("posts", &created.id, read_in("de")).await.unwrap();
    assert_eq!(fallback.data["title"], "Only English");

    let params = ReadParams {
        locale: Some("de".to_string()),
        fallback_locale: Some("none".to_string()),
        ..Default::default()
    };
    let strict = service.find_by_id("posts", &created.id, params).await.unwrap();
    assert_eq!(strict.data["title"], Value::Null);

    let unknown = service.find_by_id("posts", &created.id, read_in("fr")).await;
    assert!(matches!(unknown, Err(ContentServiceError::InvalidInput(_))));

    let write_all = service
        .create("posts", data(json!({ "title": "x" })), save_in("all"))
        .await;
    assert!(matches!(write_all, Err(ContentServiceError::InvalidInput(_))));
}

#[tokio::test]
async fn test_find_filters_in_locale() {
    let service = service().await;
    let post = service
        .create("posts", data(json!({ "title": "Hello", "category": "news" })), SaveParams::default())
        .await
        .unwrap();
    service
        .update("posts", &post.id, data(json!({ "title": "Hallo Welt" })), save_in("de"))
        .await
        .unwrap();
    service
        .create("posts", data(json!({ "title": "Other", "category": "blog" })), SaveParams::default())
        .await
        .unwrap();

    let mut params = where_params(json!({ "title": { "like": "welt hallo" } }));
    params.locale = Some("de".to_string());
    let found = service.find("posts", params).await.unwrap();
    assert_eq!(found.total_docs, 1);
    assert_eq!(found.docs[0].id, post.id);
    assert_eq!(found.docs[0].data["title"], "Hallo Welt");

    let english = service
        .find("posts", where_params(json!({ "title": { "equals": "Hallo Welt" } })))
        .await
        .unwrap();
    assert_eq!(english.total_docs, 0);

    let blog = service
        .find("posts", where_params(json!({ "category": { "in": ["blog"] } })))
        .await
        .unwrap();
    assert_eq!(blog.docs[0].data["title"], "Other");
}

#[tokio::test]
async fn test_invalid_where_is_rejected() {
    let service = service().await;

    let unknown_path = service
        .find("posts", where_params(json!({ "nope": { "equals": 1 } })))
        .await;
    assert!(matches!(unknown_path, Err(ContentServiceError::InvalidWhere(_))));

    let wrong_operator = service
        .find("posts", where_params(json!({ "title": { "near": [1, 2] } })))
        .await;
    assert!(matches!(wrong_operator, Err(ContentServiceError::InvalidWhere(_))));

    let bad_option = service
        .find("posts", where_params(json!({ "category": { "equals": "podcast" } })))
        .await;
    assert!(matches!(bad_option, Err(ContentServiceError::InvalidWhere(_))));

    let malformed = service
        .find("posts", where_params(json!({ "title": { "sounds_like": "x" } })))
        .await;
    assert!(matches!(malformed, Err(ContentServiceError::InvalidPredicate(_))));

    let unknown_collection = service.find("nope", FindParams::default()).await;
    assert!(matches!(
        unknown_collection,
        Err(ContentServiceError::EntityNotFound { kind: "collection", .. })
    ));
}

#[tokio::test]
async fn test_pagination_defaults_newest_first() {
    let service = service().await;
    for title in ["a", "b", "c"] {
        service
            .create("posts", data(json!({ "title": title })), SaveParams::default())
            .await
            .unwrap();
    }

    let first = service.find("posts", FindParams::default()).await.unwrap();
    let titles: Vec<&Value> = first.docs.iter().map(|d| &d.data["title"]).collect();
    assert_eq!(titles, vec!["c", "b"]);
    assert_eq!(first.total_docs, 3);
    assert_eq!(first.limit, 2);
    assert!(first.has_next_page);

    let sorted = service
        .find(
            "posts",
            FindParams {
                sort: SortKey::parse_list("title"),
                page: Some(2),
                limit: Some(50),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    // limit is capped at 5, so everything fits on page 1
    assert!(sorted.docs.is_empty());
    assert_eq!(sorted.limit, 5);
}

#[tokio::test]
async fn test_near_uses_estimated_count() {
    let service = service().await;
    let close = service
        .create("posts", data(json!({ "title": "close", "location": [10.0, 50.0] })), SaveParams::default())
        .await
        .unwrap();
    service
        .create("posts", data(json!({ "title": "far", "location": [100.0, 0.0] })), SaveParams::default())
        .await
        .unwrap();

    let found = service
        .find("posts", where_params(json!({ "location": { "near": [10.0, 50.0, 1000] } })))
        .await
        .unwrap();
    assert_eq!(found.docs.len(), 1);
    assert_eq!(found.docs[0].id, close.id);
    assert_eq!(found.total_docs, 2);
}

#[tokio::test]
async fn test_access_rules() {
    let service = service().await;

    let denied = service.find("secrets", FindParams::default()).await;
    assert!(matches!(denied, Err(ContentServiceError::Forbidden { .. })));

    let public = service
        .create("members", data(json!({ "status": "public" })), SaveParams::default())
        .await
        .unwrap();
    let private = service
        .create("members", data(json!({ "status": "private" })), SaveParams::default())
        .await
        .unwrap();

    let visible = service.find("members", FindParams::default()).await.unwrap();
    assert_eq!(visible.total_docs, 1);
    assert_eq!(visible.docs[0].id, public.id);

    let hidden = service
        .find_by_id("members", &private.id, ReadParams::default())
        .await;
    assert!(matches!(hidden, Err(ContentServiceError::DocumentNotFound { .. })));
}

#[tokio::test]
async fn test_draft_flow() {
    let service = service().await;

    let page = service
        .create("pages", data(json!({ "title": "v1" })), SaveParams::default())
        .await
        .unwrap();
    assert_eq!(page.data[STATUS_FIELD], "published");

    let saved = service
        .update("pages", &page.id, data(json!({ "title": "v2 draft" })), draft())
        .await
        .unwrap();
    assert_eq!(saved.data["title"], "v2 draft");
    assert_eq!(saved.data[STATUS_FIELD], "draft");

    let published = service
        .find_by_id("pages", &page.id, ReadParams::default())
        .await
        .unwrap();
    assert_eq!(published.data["title"], "v1");

    let drafted = service.find_by_id("pages", &page.id, read_draft()).await.unwrap();
    assert_eq!(drafted.id, page.id);
    assert_eq!(drafted.data["title"], "v2 draft");
    assert_eq!(drafted.data[STATUS_FIELD], "draft");

    // A second draft builds on the first one
    service
        .update("pages", &page.id, data(json!({ "visibility": "team" })), draft())
        .await
        .unwrap();
    let listed = service
        .find(
            "pages",
            FindParams {
                draft: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.docs[0].data["title"], "v2 draft");
    assert_eq!(listed.docs[0].data["visibility"], "team");

    // Publishing makes the drafts stale
    service
        .update("pages", &page.id, data(json!({ "title": "v3" })), SaveParams::default())
        .await
        .unwrap();
    let current = service.find_by_id("pages", &page.id, read_draft()).await.unwrap();
    assert_eq!(current.data["title"], "v3");
    assert_eq!(current.data[STATUS_FIELD], "published");
}

#[tokio::test]
async fn test_versions_are_pruned_and_queryable() {
    let service = service().await;
    let page = service
        .create("pages", data(json!({ "title": "v1" })), SaveParams::default())
        .await
        .unwrap();
    for title in ["d1", "d2"] {
        service
            .update("pages", &page.id, data(json!({ "title": title })), draft())
            .await
            .unwrap();
    }
    service
        .update("pages", &page.id, data(json!({ "title": "v2" })), SaveParams::default())
        .await
        .unwrap();

    let history = service.find_versions("pages", FindParams::default()).await.unwrap();
    assert_eq!(history.total_docs, 3);
    assert_eq!(history.docs[0].version["title"], "v2");
    assert_eq!(history.docs[0].parent.as_deref(), Some(page.id.as_str()));

    let drafts = service
        .find_versions(
            "pages",
            where_params(json!({ "version._status": { "equals": "draft" } })),
        )
        .await
        .unwrap();
    let titles: Vec<&Value> = drafts.docs.iter().map(|v| &v.version["title"]).collect();
    assert_eq!(titles, vec!["d2", "d1"]);

    let invalid = service
        .find_versions("pages", where_params(json!({ "version.nope": { "equals": 1 } })))
        .await;
    assert!(matches!(invalid, Err(ContentServiceError::InvalidWhere(_))));

    let unversioned = service.find_versions("posts", FindParams::default()).await;
    assert!(matches!(unversioned, Err(ContentServiceError::NotVersioned { .. })));
}

#[tokio::test]
async fn test_globals() {
    let service = service().await;

    let empty = service
        .find_global("settings", ReadParams::default())
        .await
        .unwrap();
    assert_eq!(Value::Object(empty), json!({ "globalType": "settings" }));

    let saved = service
        .save_global("settings", data(json!({ "siteName": "Site" })), SaveParams::default())
        .await
        .unwrap();
    assert_eq!(saved["siteName"], "Site");
    assert_eq!(saved[GLOBAL_TYPE_FIELD], "settings");

    service
        .save_global("settings", data(json!({ "siteName": "Draft" })), draft())
        .await
        .unwrap();
    let published = service
        .find_global("settings", ReadParams::default())
        .await
        .unwrap();
    assert_eq!(published["siteName"], "Site");
    let drafted = service.find_global("settings", read_draft()).await.unwrap();
    assert_eq!(drafted["siteName"], "Draft");

    service
        .save_global("settings", data(json!({ "siteName": "Seite" })), save_in("de"))
        .await
        .unwrap();
    let german = service.find_global("settings", read_in("de")).await.unwrap();
    assert_eq!(german["siteName"], "Seite");
    let english = service.find_global("settings", read_in("en")).await.unwrap();
    assert_eq!(english["siteName"], "Site");

    let versions = service
        .find_global_versions("settings", FindParams::default())
        .await
        .unwrap();
    assert_eq!(versions.total_docs, 3);
    assert!(versions.docs.iter().all(|v| v.parent.is_none()));

    let missing = service.find_global("nope", ReadParams::default()).await;
    assert!(matches!(
        missing,
        Err(ContentServiceError::EntityNotFound { kind: "global", .. })
    ));
}

#[tokio::test]
async fn test_where_schema_lookup() {
    let service = service().await;
    let schema = service.where_schema("posts").unwrap();
    assert_eq!(schema.name, "Post");
    assert!(schema.get("location").unwrap().allows(Operator::Near));
    assert!(service.where_schema("settings").is_err());
}
