use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Source, SourceKind, UnifiedItem, MAX_ITEMS_PER_SOURCE};
use crate::custom_date::parse_timestamp;
use crate::error::FeedError;
use crate::text::strip_markup;

pub const SOCIAL_CACHE_KEY: &str = "mastodonPosts";

#[derive(Debug, Deserialize)]
struct Status {
    url: Option<String>,
    content: String,
    created_at: String,
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    username: String,
}

/// Posts from a Mastodon tag timeline (`/api/v1/timelines/tag/{tag}`).
pub struct SocialSource {
    endpoint: String,
}

impl SocialSource {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

fn status_to_item(status: Status) -> Result<UnifiedItem, FeedError> {
    let url = status
        .url
        .ok_or_else(|| FeedError::parse("status without url"))?;
    let timestamp = parse_timestamp(&status.created_at)
        .ok_or_else(|| FeedError::parse(format!("bad created_at {}", status.created_at)))?;

    Ok(UnifiedItem {
        source: SourceKind::Social,
        timestamp: Some(timestamp),
        title: strip_markup(&status.content),
        url,
        meta: format!("@{}", status.account.username),
        summary: None,
    })
}

impl Source for SocialSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Social
    }

    fn cache_key(&self) -> &str {
        SOCIAL_CACHE_KEY
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse(&self, body: &str) -> Result<Vec<UnifiedItem>, FeedError> {
        let json: Value = serde_json::from_str(body)?;
        let statuses = json
            .as_array()
            .ok_or_else(|| FeedError::parse("timeline is not an array"))?;

        let items = statuses
            .iter()
            .take(MAX_ITEMS_PER_SOURCE)
            .filter_map(|raw| {
                let item = Status::deserialize(raw)
                    .map_err(FeedError::from)
                    .and_then(status_to_item);
                match item {
                    Ok(item) => Some(item),
                    Err(e) => {
                        debug!("skipping status {}: {e}", raw["id"]);
                        None
                    }
                }
            })
            .collect();

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn source() -> SocialSource {
        SocialSource::new("https://umbracocommunity.social/api/v1/timelines/tag/umbraco?limit=10")
    }

    #[test]
    fn normalizes_statuses_to_plain_text() {
        let body = r#"[
            {
                "id": "113",
                "url": "https://umbracocommunity.social/@jane/113",
                "created_at": "2026-10-15T11:55:00.000Z",
                "content": "<p>Shipped a new package for <a href=\"https://umbracocommunity.social/tags/umbraco\" class=\"mention hashtag\">#<span>umbraco</span></a> &amp; friends</p><p><script>x()</script></p>",
                "account": { "username": "jane" }
            }
        ]"#;

        let items = source().parse(body).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.meta, "@jane");
        assert_eq!(item.url, "https://umbracocommunity.social/@jane/113");
        assert_eq!(
            item.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 10, 15, 11, 55, 0).unwrap())
        );
        assert!(item.title.starts_with("Shipped a new package for #umbraco & friends"));
        assert!(!item.title.contains('<'));
        assert!(!item.title.contains('>'));
    }

    #[test]
    fn skips_statuses_missing_fields() {
        let body = r#"[
            { "id": "1", "url": null, "created_at": "2026-10-15T11:55:00Z", "content": "x", "account": { "username": "a" } },
            { "id": "2", "url": "https://s/2", "created_at": "garbage", "content": "x", "account": { "username": "a" } },
            { "id": "3", "url": "https://s/3", "created_at": "2026-10-15T11:55:00Z", "content": "kept", "account": { "username": "b" } },
            { "id": "4", "url": "https://s/4", "created_at": "2026-10-15T11:55:00Z", "content": "no account" }
        ]"#;

        let items = source().parse(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "kept");
    }

    #[test]
    fn non_array_body_is_a_parse_error() {
        let err = source().parse(r#"{"error":"rate limited"}"#).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }
}
