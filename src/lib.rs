use std::sync::Arc;
use std::time::SystemTime;

use actix_web::{
    get,
    http::{header, Method},
    post, route, web, HttpRequest, HttpResponse, Responder,
};
use chrono_tz::Tz;
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

pub mod aggregator;
pub mod cache;
pub mod custom_date;
pub mod database;
pub mod error;
pub mod formatter;
pub mod http;
pub mod navigation;
pub mod settings;
pub mod sources;
pub mod text;

use aggregator::{Aggregator, DEFAULT_LIMIT};
use cache::{CacheStore, Clock, KeyValueStore};
use error::FeedError;
use formatter::Formatter;
use http::HttpClient;
use navigation::{admin_target, root_target};
use settings::Settings;
use sources::{CalendarSource, ForumSource, SocialSource, Source, SourceAdapter};

#[derive(Parser, Debug, Clone)]
#[clap(about, version, author)]
pub struct Args {
    #[clap(short, long, default_value = "127.0.0.1")]
    pub ip: String,

    #[clap(short, long, default_value = "3000")]
    pub port: u16,

    /// Number of items in the merged feed
    #[clap(short, long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    #[clap(short, long, default_value = "data.sqlite")]
    pub db_path: String,

    #[clap(long, default_value = "https://forum.umbraco.com/latest.json")]
    pub forum_url: String,

    #[clap(
        long,
        default_value = "https://umbracocommunity.social/api/v1/timelines/tag/umbraco?limit=10"
    )]
    pub social_url: String,

    #[clap(long, default_value = "https://umbracalendar.com/feed")]
    pub calendar_url: String,

    /// Time zone for calendar dates that carry no offset
    #[clap(long, default_value = "UTC")]
    pub calendar_tz: String,

    #[clap(long, default_value = navigation::DEFAULT_ADMIN_PATH)]
    pub admin_path: String,

    #[clap(long, default_value_t = formatter::DEFAULT_TITLE_MAX_CHARS)]
    pub title_max_chars: usize,

    /// Request timeout; the HTTP client default applies when unset
    #[clap(long)]
    pub timeout_secs: Option<u64>,
}

pub struct AppState {
    pub config: Args,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub aggregator: Aggregator,
    pub formatter: Formatter,
}

impl AppState {
    pub fn new(
        config: Args,
        store: Arc<dyn KeyValueStore>,
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FeedError> {
        let tz: Tz = config
            .calendar_tz
            .parse()
            .map_err(|e| {
                FeedError::parse(format!("unknown time zone {}: {e}", config.calendar_tz))
            })?;

        let cache = CacheStore::with_clock(store.clone(), clock.clone());
        let adapter =
            |source: Box<dyn Source>| SourceAdapter::new(source, cache.clone(), http.clone());
        let aggregator = Aggregator::new(vec![
            adapter(Box::new(ForumSource::new(&config.forum_url)?)),
            adapter(Box::new(SocialSource::new(&config.social_url))),
            adapter(Box::new(CalendarSource::new(&config.calendar_url, tz))),
        ]);

        Ok(Self {
            formatter: Formatter::new(config.title_max_chars),
            config,
            store,
            clock,
            aggregator,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(feed)
        .service(feed_rss)
        .service(sections)
        .service(navigate)
        .service(get_settings)
        .service(save_settings);
}

#[get("/feed")]
async fn feed(app_data: web::Data<AppState>) -> impl Responder {
    let items = app_data.aggregator.aggregate(app_data.config.limit).await;
    let now = app_data.clock.now();
    HttpResponse::Ok().json(app_data.formatter.render_items(&items, now))
}

#[route("/feed.rss", method = "GET", method = "HEAD")]
async fn feed_rss(app_data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let items = app_data.aggregator.aggregate(app_data.config.limit).await;
    let now = app_data.clock.now();

    let link = format!("http://{}:{}/", app_data.config.ip, app_data.config.port);
    let rss = app_data.formatter.render_rss(&items, now, &link);

    create_response(&req, &rss, now.timestamp())
}

#[get("/sections")]
async fn sections(app_data: web::Data<AppState>) -> impl Responder {
    let outcomes = app_data.aggregator.collect().await;
    let now = app_data.clock.now();
    let rendered: Vec<_> = outcomes
        .iter()
        .map(|outcome| app_data.formatter.render_section(outcome, now))
        .collect();

    HttpResponse::Ok().json(rendered)
}

#[derive(Debug, Deserialize)]
struct NavigateQuery {
    url: Option<String>,
}

#[get("/navigate/{target}")]
async fn navigate(
    target: web::Path<String>,
    query: web::Query<NavigateQuery>,
    app_data: web::Data<AppState>,
) -> impl Responder {
    let settings = Settings::load(app_data.store.as_ref()).await;
    let current = query.url.as_deref();

    let result = match target.as_str() {
        "admin" => admin_target(current, &settings, &app_data.config.admin_path),
        "root" => root_target(current, &settings),
        other => {
            return HttpResponse::NotFound()
                .json(json!({ "error": format!("unknown navigation target {other}") }))
        }
    };

    match result {
        Ok(navigation) => HttpResponse::Ok().json(navigation),
        Err(e) => HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    }
}

#[get("/settings")]
async fn get_settings(app_data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(Settings::load(app_data.store.as_ref()).await)
}

#[post("/settings")]
async fn save_settings(
    settings: web::Json<Settings>,
    app_data: web::Data<AppState>,
) -> impl Responder {
    match settings.save(app_data.store.as_ref()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "Settings saved!" })),
        Err(e) => {
            error!("failed to save settings: {e}");
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to save settings" }))
        }
    }
}

fn create_response(req: &HttpRequest, body: &str, built_at: i64) -> HttpResponse {
    let last_modified = header::HttpDate::from(
        SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(built_at.max(0) as u64),
    );

    let mut response = HttpResponse::Ok();
    response.insert_header((header::CONTENT_TYPE, "application/rss+xml"));
    response.insert_header((header::LAST_MODIFIED, last_modified.to_string()));

    if req.method() == Method::HEAD {
        response
            .insert_header((header::CONTENT_LENGTH, body.len()))
            .finish()
    } else {
        response.body(body.to_string())
    }
}
