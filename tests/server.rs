use std::fs;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum_template::engine::Engine;
use axum_test::TestServer;

use soroban::counter::backend::{BackendCounter, StoreConfig};
use soroban::counter::{Counter, PublishedCounters, ScriptCounter};
use soroban::model::Counts;
use soroban::server::{create_router, App};
use soroban::widget;

fn docs_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("soroban-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("index.html"),
        "<html><body><h1>docs</h1></body></html>",
    )
    .unwrap();
    fs::write(dir.join("style.css"), "body { margin: 0 }").unwrap();
    dir
}

fn app(counter: Counter, docs: PathBuf) -> App {
    let engine = Engine::from(widget::templates().unwrap());
    App::new(engine, counter, docs)
}

async fn backend_server(name: &str) -> TestServer {
    let backend = BackendCounter::connect(&StoreConfig::ephemeral())
        .await
        .unwrap();
    let router = create_router(app(Counter::Backend(backend), docs_dir(name)));
    TestServer::new(router).unwrap()
}

fn script_server(name: &str) -> (TestServer, PublishedCounters) {
    let counters = PublishedCounters::default();
    let counter = Counter::Script(ScriptCounter::new(counters.clone()));
    let router = create_router(app(counter, docs_dir(name)));
    (TestServer::new(router).unwrap(), counters)
}

#[tokio::test]
async fn widget_fragment_counts_the_visit() {
    let server = backend_server("fragment").await;

    let response = server.get("/widget?path=/guide/intro").await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains(r#"id="view-count-site">1</span>"#));
    assert!(html.contains(r#"id="view-count-page">1</span>"#));
}

#[tokio::test]
async fn counts_endpoint_increments_per_request() {
    let server = backend_server("counts").await;

    let first: Counts = server.get("/counts?path=/guide/intro").await.json();
    let second: Counts = server.get("/counts?path=/guide/intro").await.json();

    assert_eq!(first, Counts { site: 1, page: 1 });
    assert_eq!(second, Counts { site: 2, page: 2 });
}

#[tokio::test]
async fn published_counters_reach_the_widget() {
    let (server, _counters) = script_server("publish");

    let response = server
        .post("/counters")
        .json(&serde_json::json!({ "site": { "pv": 42 }, "page": { "pv": 7 } }))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let html = server.get("/widget?path=/guide/intro").await.text();
    assert!(html.contains(r#"id="view-count-site">42</span>"#));
    assert!(html.contains(r#"id="view-count-page">7</span>"#));
}

#[tokio::test]
async fn silent_script_degrades_to_unknown() {
    let (server, _counters) = script_server("silent");

    let html = server.get("/widget?path=/guide/intro").await.text();

    assert_eq!(html.matches(widget::UNKNOWN).count(), 2);
}

#[tokio::test]
async fn backend_mode_rejects_pushed_counters() {
    let server = backend_server("reject").await;

    let response = server
        .post("/counters")
        .json(&serde_json::json!({ "site": { "pv": 1 }, "page": { "pv": 1 } }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn docs_pages_get_exactly_one_widget() {
    let server = backend_server("inject").await;

    let response = server.get("/").await;

    response.assert_status_ok();
    let html = response.text();
    assert_eq!(html.matches(r#"id="view-counter""#).count(), 1);

    let widget_at = html.find("view-counter").unwrap();
    let body_at = html.find("</body>").unwrap();
    assert!(widget_at < body_at, "widget sits inside the body");
}

#[tokio::test]
async fn assets_are_served_untouched() {
    let server = backend_server("assets").await;

    let response = server.get("/style.css").await;

    response.assert_status_ok();
    assert!(!response.text().contains("view-counter"));
}
