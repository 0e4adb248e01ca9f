//! HTTP update API for zones and hosts.
//!
//! Thin JSON gateway over the store: `/domain` registers or drops zones,
//! `/host` sets or removes host records, `/dump`, `/stats`, and `/flush`
//! expose the remaining store operations. Boolean-ish parameters accept
//! JSON booleans and the strings `"true"`/`"false"`; `ttl` is seconds and
//! accepts a number or a digit string.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::debug;

use crate::metrics;
use crate::name;
use crate::store::{FieldPatch, RecordPatch, ZoneStore, MAX_TTL_MS};

/// Build the update API router. The caller supplies the store as state.
pub fn api_router() -> Router<ZoneStore> {
    Router::new()
        .route("/domain", post(domain))
        .route("/host", post(host))
        .route("/dump", get(dump))
        .route("/stats", get(stats))
        .route("/flush", post(flush))
        .fallback(not_found)
}

#[derive(Debug, Deserialize)]
struct DomainRequest {
    domain: Option<String>,
    remove: Option<Toggle>,
}

#[derive(Debug, Deserialize)]
struct HostRequest {
    host: Option<String>,
    a: Option<String>,
    aaaa: Option<String>,
    txt: Option<String>,
    mx: Option<String>,
    ttl: Option<TtlSeconds>,
    remove: Option<Toggle>,
    merge: Option<Toggle>,
}

/// Boolean-ish request parameter.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Toggle {
    Flag(bool),
    Text(String),
}

impl Toggle {
    /// Accepts JSON booleans plus the strings "true" and "false".
    fn as_bool(&self) -> Option<bool> {
        match self {
            Toggle::Flag(flag) => Some(*flag),
            Toggle::Text(s) if s == "true" => Some(true),
            Toggle::Text(s) if s == "false" => Some(false),
            Toggle::Text(_) => None,
        }
    }
}

/// TTL request parameter, in whole seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TtlSeconds {
    Count(u64),
    Text(String),
}

impl TtlSeconds {
    /// Seconds to milliseconds; `None` when unparseable or overflowing.
    fn to_millis(&self) -> Option<u64> {
        let seconds = match self {
            TtlSeconds::Count(n) => Some(*n),
            TtlSeconds::Text(s) => s.parse::<u64>().ok(),
        }?;
        seconds.checked_mul(1000)
    }
}

fn ok_response() -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "code": 200, "message": "OK" })),
    )
        .into_response()
}

fn bad_request(what: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "status": "error",
            "code": 400,
            "message": format!("Bad request ({what})"),
        })),
    )
        .into_response()
}

async fn not_found() -> Response {
    metrics::record_api_request("unknown", 404);
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "code": 404, "message": "Not found" })),
    )
        .into_response()
}

async fn domain(State(store): State<ZoneStore>, Json(req): Json<DomainRequest>) -> Response {
    let response = handle_domain(&store, req);
    metrics::record_api_request("/domain", response.status().as_u16());
    response
}

fn handle_domain(store: &ZoneStore, req: DomainRequest) -> Response {
    let Some(domain) = req.domain.filter(|d| name::valid_zone(d)) else {
        return bad_request("domain");
    };

    let remove = match req.remove.as_ref().map(Toggle::as_bool) {
        None => false,
        Some(Some(flag)) => flag,
        Some(None) => return bad_request("remove"),
    };

    if remove {
        if store.remove_zone(&domain) {
            ok_response()
        } else {
            bad_request("unable to remove domain")
        }
    } else {
        match store.add_zone(&domain) {
            Ok(()) => ok_response(),
            Err(err) => {
                debug!(domain = %domain, %err, "zone registration rejected");
                bad_request("unable to add domain")
            }
        }
    }
}

async fn host(State(store): State<ZoneStore>, Json(req): Json<HostRequest>) -> Response {
    let response = handle_host(&store, req);
    metrics::record_api_request("/host", response.status().as_u16());
    response
}

fn handle_host(store: &ZoneStore, req: HostRequest) -> Response {
    let Some(host) = req.host.filter(|h| name::valid_name(h)) else {
        return bad_request("host");
    };

    // An empty string is an explicit clear for any field; values validate
    // here so each bad field names itself in the response.
    let patch = RecordPatch {
        a: FieldPatch::from(req.a),
        aaaa: FieldPatch::from(req.aaaa),
        txt: FieldPatch::from(req.txt),
        mx: FieldPatch::from(req.mx),
    };
    if let FieldPatch::Set(value) = &patch.a {
        if value.parse::<Ipv4Addr>().is_err() {
            return bad_request("a");
        }
    }
    if let FieldPatch::Set(value) = &patch.aaaa {
        if value.parse::<Ipv6Addr>().is_err() {
            return bad_request("aaaa");
        }
    }
    if let FieldPatch::Set(value) = &patch.mx {
        if !name::valid_name(value) {
            return bad_request("mx");
        }
    }

    let ttl_ms = match req.ttl.as_ref().map(TtlSeconds::to_millis) {
        None => None,
        Some(Some(ms)) if (1..=MAX_TTL_MS).contains(&ms) => Some(ms),
        Some(_) => return bad_request("ttl"),
    };

    // Without an explicit remove flag, a request carrying no values is a
    // removal.
    let remove = match req.remove.as_ref().map(Toggle::as_bool) {
        None => !patch.has_value(),
        Some(Some(flag)) => flag,
        Some(None) => return bad_request("remove"),
    };
    let merge = match req.merge.as_ref().map(Toggle::as_bool) {
        None => false,
        Some(Some(flag)) => flag,
        Some(None) => return bad_request("merge"),
    };

    if remove {
        if patch.has_value() || ttl_ms.is_some() {
            return bad_request("conflicting params");
        }
        if store.remove_host(&host) {
            ok_response()
        } else {
            bad_request("unable to remove host")
        }
    } else {
        match store.set_host(&host, patch, ttl_ms, merge) {
            Ok(()) => ok_response(),
            Err(err) => {
                debug!(host = %host, %err, "host update rejected");
                bad_request("unable to add/update host")
            }
        }
    }
}

async fn dump(State(store): State<ZoneStore>) -> Response {
    metrics::record_api_request("/dump", 200);
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "code": 200, "data": store.dump() })),
    )
        .into_response()
}

async fn stats(State(store): State<ZoneStore>) -> Response {
    metrics::record_api_request("/stats", 200);
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "code": 200, "data": store.stats() })),
    )
        .into_response()
}

async fn flush(State(store): State<ZoneStore>) -> Response {
    store.flush();
    metrics::record_api_request("/flush", 200);
    ok_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app(store: &ZoneStore) -> Router {
        api_router().with_state(store.clone())
    }

    async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn test_domain_add_and_remove() {
        let store = ZoneStore::new();
        let app = test_app(&store);

        let (status, body) = post_json(&app, "/domain", r#"{"domain": "example.com"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["code"], 200);
        assert_eq!(body["message"], "OK");
        assert_eq!(store.zones_count(), 1);

        // String booleans are accepted.
        let (status, _) = post_json(
            &app,
            "/domain",
            r#"{"domain": "example.com", "remove": "true"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.zones_count(), 0);
    }

    #[tokio::test]
    async fn test_domain_rejects_bad_input() {
        let store = ZoneStore::new();
        let app = test_app(&store);

        let (status, body) = post_json(&app, "/domain", r#"{"domain": "-bad-"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Bad request (domain)");

        let (_, body) = post_json(&app, "/domain", r#"{}"#).await;
        assert_eq!(body["message"], "Bad request (domain)");

        let (_, body) = post_json(
            &app,
            "/domain",
            r#"{"domain": "example.com", "remove": "maybe"}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (remove)");

        let (_, body) = post_json(
            &app,
            "/domain",
            r#"{"domain": "nothere.com", "remove": true}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (unable to remove domain)");
    }

    #[tokio::test]
    async fn test_domain_add_conflict_maps_to_400() {
        let store = ZoneStore::new();
        store.add_zone("example.com").unwrap();
        let app = test_app(&store);

        let (status, body) =
            post_json(&app, "/domain", r#"{"domain": "sub.example.com"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Bad request (unable to add domain)");
    }

    #[tokio::test]
    async fn test_host_set_and_lookup_in_dump() {
        let store = ZoneStore::new();
        store.add_zone("example.com").unwrap();
        let app = test_app(&store);

        let (status, _) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "a": "192.0.2.1", "txt": "hello"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_json(&app, "/dump").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["data"]["hosts"][0]["name"], "www.example.com");
        assert_eq!(body["data"]["hosts"][0]["a"], "192.0.2.1");
        assert_eq!(body["data"]["zones"][0]["name"], "example.com");
    }

    #[tokio::test]
    async fn test_host_field_validation_names_the_field() {
        let store = ZoneStore::new();
        store.add_zone("example.com").unwrap();
        let app = test_app(&store);

        let (_, body) = post_json(&app, "/host", r#"{"host": "!!", "a": "192.0.2.1"}"#).await;
        assert_eq!(body["message"], "Bad request (host)");

        let (_, body) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "a": "999.0.2.1"}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (a)");

        let (_, body) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "aaaa": "192.0.2.1"}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (aaaa)");

        let (_, body) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "mx": "no spaces allowed"}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (mx)");
    }

    #[tokio::test]
    async fn test_host_ttl_parsing() {
        let store = ZoneStore::new();
        store.add_zone("example.com").unwrap();
        let app = test_app(&store);

        // Digit strings are seconds, same as numbers.
        let (status, _) = post_json(
            &app,
            "/host",
            r#"{"host": "a.example.com", "a": "192.0.2.1", "ttl": "30"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = post_json(
            &app,
            "/host",
            r#"{"host": "b.example.com", "a": "192.0.2.1", "ttl": 0}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (ttl)");

        // 2147484 seconds in milliseconds exceeds the 2^31-1 cap.
        let (_, body) = post_json(
            &app,
            "/host",
            r#"{"host": "c.example.com", "a": "192.0.2.1", "ttl": 2147484}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (ttl)");

        let (_, body) = post_json(
            &app,
            "/host",
            r#"{"host": "d.example.com", "a": "192.0.2.1", "ttl": "soon"}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (ttl)");
    }

    #[tokio::test]
    async fn test_host_remove_defaults_and_conflicts() {
        let store = ZoneStore::new();
        store.add_zone("example.com").unwrap();
        store
            .set_host(
                "www.example.com",
                RecordPatch {
                    a: FieldPatch::Set("192.0.2.1".to_string()),
                    ..Default::default()
                },
                None,
                false,
            )
            .unwrap();
        let app = test_app(&store);

        // remove=true alongside data is contradictory.
        let (_, body) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "a": "192.0.2.1", "remove": true}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (conflicting params)");

        // A bare host with no values defaults to removal.
        let (status, _) = post_json(&app, "/host", r#"{"host": "www.example.com"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.hosts_count(), 0);

        let (_, body) = post_json(&app, "/host", r#"{"host": "www.example.com"}"#).await;
        assert_eq!(body["message"], "Bad request (unable to remove host)");
    }

    #[tokio::test]
    async fn test_host_outside_zone_maps_to_400() {
        let store = ZoneStore::new();
        let app = test_app(&store);

        let (_, body) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "a": "192.0.2.1"}"#,
        )
        .await;
        assert_eq!(body["message"], "Bad request (unable to add/update host)");
    }

    #[tokio::test]
    async fn test_host_merge_and_clear() {
        let store = ZoneStore::new();
        store.add_zone("example.com").unwrap();
        let app = test_app(&store);

        post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "a": "192.0.2.1"}"#,
        )
        .await;
        let (status, _) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "txt": "hi", "merge": true}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&app, "/dump").await;
        assert_eq!(body["data"]["hosts"][0]["a"], "192.0.2.1");
        assert_eq!(body["data"]["hosts"][0]["txt"], "hi");

        // An empty string clears a field even under merge. Clears are not
        // values, so removal must be explicitly switched off.
        let (status, _) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "txt": "", "merge": "true", "remove": false}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&app, "/dump").await;
        assert_eq!(body["data"]["hosts"][0]["a"], "192.0.2.1");
        assert!(body["data"]["hosts"][0].get("txt").is_none());

        // The same request without the remove flag carries no values, so it
        // falls back to removal.
        let (status, _) = post_json(
            &app,
            "/host",
            r#"{"host": "www.example.com", "txt": "", "merge": true}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&app, "/dump").await;
        assert!(body["data"]["hosts"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_and_flush() {
        let store = ZoneStore::new();
        store.add_zone("example.com").unwrap();
        store
            .set_host(
                "www.example.com",
                RecordPatch {
                    a: FieldPatch::Set("192.0.2.1".to_string()),
                    ..Default::default()
                },
                None,
                false,
            )
            .unwrap();
        let app = test_app(&store);

        let (status, body) = get_json(&app, "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["zones"], 1);
        assert_eq!(body["data"]["hosts"], 1);
        assert_eq!(body["data"]["lookup"]["total"], 0);

        let (status, _) = post_json(&app, "/flush", r#"{}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.zones_count(), 0);
        assert_eq!(store.hosts_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let store = ZoneStore::new();
        let app = test_app(&store);

        let (status, body) = get_json(&app, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], 404);
        assert_eq!(body["message"], "Not found");
    }
}
