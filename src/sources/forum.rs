use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{Source, SourceKind, UnifiedItem, MAX_ITEMS_PER_SOURCE};
use crate::custom_date::parse_timestamp;
use crate::error::FeedError;

pub const FORUM_CACHE_KEY: &str = "forumPosts";

#[derive(Debug, Deserialize)]
struct Topic {
    id: u64,
    slug: String,
    title: String,
    last_posted_at: Option<String>,
    bumped_at: Option<String>,
    #[serde(default)]
    posts_count: u64,
}

/// Latest topics from a Discourse forum (`/latest.json`).
pub struct ForumSource {
    endpoint: String,
    origin: String,
}

impl ForumSource {
    pub fn new(endpoint: &str) -> Result<Self, FeedError> {
        let url = Url::parse(endpoint)
            .map_err(|e| FeedError::parse(format!("bad forum url {endpoint}: {e}")))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            origin: url.origin().ascii_serialization(),
        })
    }

    fn topic_to_item(&self, topic: Topic) -> Result<UnifiedItem, FeedError> {
        let timestamp = topic
            .last_posted_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| topic.bumped_at.as_deref().and_then(parse_timestamp))
            .ok_or_else(|| FeedError::parse("topic without a readable activity date"))?;

        Ok(UnifiedItem {
            source: SourceKind::Forum,
            timestamp: Some(timestamp),
            url: format!("{}/t/{}/{}", self.origin, topic.slug, topic.id),
            title: topic.title,
            meta: format!("{} replies", topic.posts_count),
            summary: None,
        })
    }
}

impl Source for ForumSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Forum
    }

    fn cache_key(&self) -> &str {
        FORUM_CACHE_KEY
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse(&self, body: &str) -> Result<Vec<UnifiedItem>, FeedError> {
        let json: Value = serde_json::from_str(body)?;
        let topics = json["topic_list"]["topics"]
            .as_array()
            .ok_or_else(|| FeedError::parse("missing topic_list.topics"))?;

        let items = topics
            .iter()
            .take(MAX_ITEMS_PER_SOURCE)
            .filter_map(|raw| {
                let item = Topic::deserialize(raw)
                    .map_err(FeedError::from)
                    .and_then(|topic| self.topic_to_item(topic));
                match item {
                    Ok(item) => Some(item),
                    Err(e) => {
                        debug!("skipping forum topic {}: {e}", raw["id"]);
                        None
                    }
                }
            })
            .collect();

        Ok(items)
    }
}
