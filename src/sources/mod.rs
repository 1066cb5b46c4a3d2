//! Source adapters.
//!
//! Every adapter follows the same flow: look in the cache, otherwise fetch the
//! source's endpoint, normalize the body into [`UnifiedItem`]s and cache the
//! normalized items. Failures stay inside the adapter and come out as an empty
//! [`SourceOutcome`] marked `Failed`, so one broken source never hides the
//! others.

pub mod calendar;
pub mod forum;
pub mod social;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::FeedError;
use crate::http::HttpClient;

pub use calendar::CalendarSource;
pub use forum::ForumSource;
pub use social::SocialSource;

/// Upper bound on records taken from a single source response.
pub const MAX_ITEMS_PER_SOURCE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Forum,
    Social,
    Calendar,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Forum => "forum",
            SourceKind::Social => "social",
            SourceKind::Calendar => "calendar",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedItem {
    pub source: SourceKind,
    /// `None` only for calendar entries without a readable start date.
    pub timestamp: Option<DateTime<Utc>>,
    pub title: String,
    pub url: String,
    pub meta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

pub trait Source: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn cache_key(&self) -> &str;
    fn endpoint(&self) -> &str;

    /// Normalizes a successful response body. Malformed records are skipped;
    /// an error means the body as a whole could not be read.
    fn parse(&self, body: &str) -> Result<Vec<UnifiedItem>, FeedError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum LoadStatus {
    Fresh,
    Cached,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: SourceKind,
    pub items: Vec<UnifiedItem>,
    pub status: LoadStatus,
}

impl SourceOutcome {
    pub fn failed(source: SourceKind, err: &FeedError) -> Self {
        Self {
            source,
            items: Vec::new(),
            status: LoadStatus::Failed(err.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, LoadStatus::Failed(_))
    }
}

pub struct SourceAdapter {
    source: Box<dyn Source>,
    cache: CacheStore,
    http: Arc<dyn HttpClient>,
}

impl SourceAdapter {
    pub fn new(source: Box<dyn Source>, cache: CacheStore, http: Arc<dyn HttpClient>) -> Self {
        Self {
            source,
            cache,
            http,
        }
    }

    pub async fn fetch_items(&self) -> SourceOutcome {
        let kind = self.source.kind();
        let key = self.source.cache_key();

        if let Some(items) = self.cache.get::<Vec<UnifiedItem>>(key).await {
            debug!("{kind}: {} items from cache", items.len());
            return SourceOutcome {
                source: kind,
                items,
                status: LoadStatus::Cached,
            };
        }

        match self.fetch_fresh().await {
            Ok(items) => {
                info!("{kind}: fetched {} items", items.len());
                self.cache.set(key, &items).await;
                SourceOutcome {
                    source: kind,
                    items,
                    status: LoadStatus::Fresh,
                }
            }
            Err(e) => {
                warn!("{kind}: failed to load {}: {e}", self.source.endpoint());
                SourceOutcome::failed(kind, &e)
            }
        }
    }

    async fn fetch_fresh(&self) -> Result<Vec<UnifiedItem>, FeedError> {
        let response = self.http.get(self.source.endpoint()).await?;
        if !response.is_success() {
            return Err(FeedError::HttpStatus {
                status: response.status,
            });
        }

        self.source.parse(&response.body)
    }
}
