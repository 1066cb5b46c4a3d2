use std::sync::Arc;

use actix_web::{test, web, App};
use clap::Parser;
use community_feed::cache::{MemoryStore, SystemClock};
use community_feed::http::ReqwestClient;
use community_feed::{configure, AppState, Args};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn minutes_ago(minutes: i64) -> String {
    (chrono::Utc::now() - chrono::Duration::minutes(minutes)).to_rfc3339()
}

async fn upstream() -> MockServer {
    let server = MockServer::start().await;

    let topics: Vec<Value> = (0..10)
        .map(|i| {
            json!({
                "id": i,
                "slug": format!("topic-{i}"),
                "title": format!("Topic {i}"),
                "posts_count": i,
                "last_posted_at": minutes_ago(i * 20 + 10),
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "topic_list": { "topics": topics } })),
        )
        .mount(&server)
        .await;

    let statuses: Vec<Value> = (0..10)
        .map(|i| {
            json!({
                "id": i.to_string(),
                "url": format!("https://social.example/@dev/{i}"),
                "created_at": minutes_ago(i * 20),
                "content": format!("<p>Post <b>{i}</b></p>"),
                "account": { "username": "dev" },
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v1/timelines/tag/umbraco"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statuses))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/calendar.rss"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    server
}

fn args(base: &str) -> Args {
    Args::parse_from([
        "community-feed".to_string(),
        format!("--forum-url={base}/latest.json"),
        format!("--social-url={base}/api/v1/timelines/tag/umbraco"),
        format!("--calendar-url={base}/calendar.rss"),
    ])
}

fn state(base: &str) -> web::Data<AppState> {
    let http = ReqwestClient::new(None).expect("client");
    web::Data::new(
        AppState::new(
            args(base),
            Arc::new(MemoryStore::new()),
            Arc::new(http),
            Arc::new(SystemClock),
        )
        .expect("state"),
    )
}

#[actix_web::test]
async fn feed_merges_sources_newest_first() {
    let server = upstream().await;
    let app = test::init_service(App::new().app_data(state(&server.uri())).configure(configure)).await;

    let req = test::TestRequest::get().uri("/feed").to_request();
    let items: Vec<Value> = test::call_and_read_body_json(&app, req).await;

    assert_eq!(items.len(), 10);
    let sources: Vec<&str> = items.iter().map(|i| i["source"].as_str().unwrap()).collect();
    assert_eq!(
        sources,
        ["social", "forum", "social", "forum", "social", "forum", "social", "forum", "social", "forum"]
    );
    assert_eq!(items[0]["title"], "Post 0");
    assert_eq!(items[0]["meta"], "@dev • 0m ago");
    assert_eq!(items[1]["meta"], "10m ago • 0 replies");
}

#[actix_web::test]
async fn sections_report_failed_source() {
    let server = upstream().await;
    let app = test::init_service(App::new().app_data(state(&server.uri())).configure(configure)).await;

    let req = test::TestRequest::get().uri("/sections").to_request();
    let sections: Vec<Value> = test::call_and_read_body_json(&app, req).await;

    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0]["items"].as_array().unwrap().len(), 10);
    assert!(sections[0].get("empty_message").is_none());
    assert_eq!(sections[2]["source"], "calendar");
    assert_eq!(sections[2]["status"]["state"], "failed");
    assert_eq!(sections[2]["empty_message"], "Failed to load");
}

#[actix_web::test]
async fn rss_route_serves_escaped_feed() {
    let server = upstream().await;
    let app = test::init_service(App::new().app_data(state(&server.uri())).configure(configure)).await;

    let req = test::TestRequest::get().uri("/feed.rss").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/rss+xml"
    );
    assert!(resp.headers().contains_key("last-modified"));

    let body = test::read_body(resp).await;
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(body.matches("<item>").count(), 10);
    assert!(!body.contains("<b>"));
}

#[actix_web::test]
async fn navigation_follows_saved_settings() {
    let server = upstream().await;
    let app = test::init_service(App::new().app_data(state(&server.uri())).configure(configure)).await;

    let req = test::TestRequest::get()
        .uri("/navigate/admin?url=https%3A%2F%2Fexample.com%2Fabout")
        .to_request();
    let nav: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(nav["action"], "open");
    assert_eq!(nav["url"], "https://example.com/umbraco");
    assert_eq!(nav["new_tab"], true);

    let req = test::TestRequest::post()
        .uri("/settings")
        .set_json(json!({ "themeMode": "dark", "openInNewTab": false }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri("/navigate/root?url=https%3A%2F%2Fexample.com%2Fumbraco%2Fsection")
        .to_request();
    let nav: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(nav["url"], "https://example.com/");
    assert_eq!(nav["new_tab"], false);
    assert_eq!(nav["status"], "Navigating to root...");

    let req = test::TestRequest::get().uri("/settings").to_request();
    let settings: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(settings, json!({ "themeMode": "dark", "openInNewTab": false }));
}

#[actix_web::test]
async fn navigation_without_tab_is_bad_request() {
    let server = upstream().await;
    let app = test::init_service(App::new().app_data(state(&server.uri())).configure(configure)).await;

    let req = test::TestRequest::get().uri("/navigate/admin").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/navigate/elsewhere?url=https://example.com").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
}
