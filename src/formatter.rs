use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::custom_date::format_rfc822;
use crate::sources::{LoadStatus, SourceKind, SourceOutcome, UnifiedItem};
use crate::text::{escape_xml, truncate};

pub const DEFAULT_TITLE_MAX_CHARS: usize = 140;
pub const NO_POSTS: &str = "No posts found";
pub const FAILED_TO_LOAD: &str = "Failed to load";

const SEPARATOR: &str = " • ";

/// Relative label such as `5m ago`, `3h ago` or `2d ago`. Timestamps ahead of
/// `now` (upcoming events) read `in 5m`, `in 3h`, `in 2d`.
pub fn format_time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - timestamp;
    if elapsed < Duration::zero() {
        return format!("in {}", bucket(-elapsed));
    }
    format!("{} ago", bucket(elapsed))
}

fn bucket(span: Duration) -> String {
    let minutes = span.num_minutes();
    if minutes < 60 {
        format!("{minutes}m")
    } else if span.num_hours() < 24 {
        format!("{}h", span.num_hours())
    } else {
        format!("{}d", span.num_days())
    }
}

pub fn heading(source: SourceKind) -> &'static str {
    match source {
        SourceKind::Forum => "Forum",
        SourceKind::Social => "Mastodon",
        SourceKind::Calendar => "Events",
    }
}

/// Text-only view of an item. Nothing here is markup; consumers insert the
/// fields as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedItem {
    pub source: SourceKind,
    pub title: String,
    pub url: String,
    pub meta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedSection {
    pub source: SourceKind,
    pub heading: &'static str,
    pub status: LoadStatus,
    pub items: Vec<RenderedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct Formatter {
    title_max_chars: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_MAX_CHARS)
    }
}

impl Formatter {
    pub fn new(title_max_chars: usize) -> Self {
        Self { title_max_chars }
    }

    pub fn render_item(&self, item: &UnifiedItem, now: DateTime<Utc>) -> RenderedItem {
        RenderedItem {
            source: item.source,
            title: truncate(&item.title, self.title_max_chars),
            url: item.url.clone(),
            meta: meta_line(item, now),
            summary: item.summary.clone(),
        }
    }

    pub fn render_items(&self, items: &[UnifiedItem], now: DateTime<Utc>) -> Vec<RenderedItem> {
        items.iter().map(|item| self.render_item(item, now)).collect()
    }

    /// An empty section says why: nothing was published, or the source could
    /// not be loaded.
    pub fn render_section(&self, outcome: &SourceOutcome, now: DateTime<Utc>) -> RenderedSection {
        let empty_message = match (&outcome.status, outcome.items.is_empty()) {
            (_, false) => None,
            (LoadStatus::Failed(_), true) => Some(FAILED_TO_LOAD),
            (_, true) => Some(NO_POSTS),
        };

        RenderedSection {
            source: outcome.source,
            heading: heading(outcome.source),
            status: outcome.status.clone(),
            items: self.render_items(&outcome.items, now),
            empty_message,
        }
    }

    pub fn render_rss(&self, items: &[UnifiedItem], now: DateTime<Utc>, link: &str) -> String {
        let mut entries = String::new();
        for item in items {
            entries.push_str(&self.render_rss_item(item, now));
        }

        let app_name = env!("CARGO_PKG_NAME");
        let app_version = env!("CARGO_PKG_VERSION");

        format!(
            r#"<?xml version='1.0' encoding='UTF-8'?>
<rss version="2.0">
<channel>
    <title>Community activity</title>
    <link>{link}</link>
    <description>Latest forum topics, posts and events</description>
    <lastBuildDate>{build_date}</lastBuildDate>
    <generator>{app_name} v{app_version}</generator>
    <docs>http://www.rssboard.org/rss-specification</docs>
    {entries}
</channel>
</rss>"#,
            link = escape_xml(link),
            build_date = format_rfc822(now),
            app_name = app_name,
            app_version = app_version,
            entries = entries,
        )
    }

    fn render_rss_item(&self, item: &UnifiedItem, now: DateTime<Utc>) -> String {
        let rendered = self.render_item(item, now);
        let pub_date = item
            .timestamp
            .map(|ts| format!("\n            <pubDate>{}</pubDate>", format_rfc822(ts)))
            .unwrap_or_default();

        format!(
            r#"<item>
            <title>{title}</title>
            <link>{url}</link>
            <description>{description}</description>
            <category>{category}</category>
            <guid isPermaLink="true">{url}</guid>{pub_date}
        </item>
        "#,
            title = escape_xml(&rendered.title),
            url = escape_xml(&rendered.url),
            description = escape_xml(rendered.summary.as_deref().unwrap_or(&rendered.meta)),
            category = item.source,
            pub_date = pub_date,
        )
    }
}

fn meta_line(item: &UnifiedItem, now: DateTime<Utc>) -> String {
    let Some(timestamp) = item.timestamp else {
        return item.meta.clone();
    };
    let when = format_time_ago(timestamp, now);

    match item.source {
        SourceKind::Forum => format!("{when}{SEPARATOR}{}", item.meta),
        SourceKind::Social | SourceKind::Calendar => format!("{}{SEPARATOR}{when}", item.meta),
    }
}
