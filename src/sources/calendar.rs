use std::borrow::Cow;

use chrono_tz::Tz;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{Source, SourceKind, UnifiedItem, MAX_ITEMS_PER_SOURCE};
use crate::custom_date::{format_event_date, parse_event_date};
use crate::error::FeedError;
use crate::text::{escape_xml, strip_markup};

pub const CALENDAR_CACHE_KEY: &str = "calendarEvents";
pub const DATE_PLACEHOLDER: &str = "Date TBA";

/// Local name of the namespaced start-date tag, e.g. `<ev:startdate>`.
const START_DATE_TAG: &str = "startdate";

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

lazy_static! {
    static ref CHANNEL: Selector = Selector::parse("channel").unwrap();
    static ref ITEM: Selector = Selector::parse("item").unwrap();
    static ref TITLE: Selector = Selector::parse("title").unwrap();
    static ref LINK: Selector = Selector::parse("link").unwrap();
    static ref GUID: Selector = Selector::parse("guid").unwrap();
    static ref DESCRIPTION: Selector = Selector::parse("description").unwrap();
}

/// Upcoming events from an RSS calendar feed.
pub struct CalendarSource {
    endpoint: String,
    tz: Tz,
}

impl CalendarSource {
    /// `tz` is used for start dates that carry no offset.
    pub fn new(endpoint: &str, tz: Tz) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            tz,
        }
    }

    fn item_to_event(&self, item: ElementRef) -> Option<UnifiedItem> {
        let title = element_text(item, &TITLE)?;
        let url = link_text(item).or_else(|| element_text(item, &GUID))?;
        let summary = element_text(item, &DESCRIPTION)
            .map(|d| strip_markup(&d))
            .filter(|d| !d.is_empty());

        let serialized = item.html();
        let timestamp = scan_namespaced_tag(&serialized, START_DATE_TAG).and_then(|raw| {
            parse_event_date(raw, self.tz)
                .map_err(|e| debug!("event {title:?}: {e}"))
                .ok()
        });

        let meta = match timestamp {
            Some(ts) => format_event_date(ts, self.tz),
            None => DATE_PLACEHOLDER.to_string(),
        };

        Some(UnifiedItem {
            source: SourceKind::Calendar,
            timestamp,
            title,
            url,
            meta,
            summary,
        })
    }
}

impl Source for CalendarSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Calendar
    }

    fn cache_key(&self) -> &str {
        CALENDAR_CACHE_KEY
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse(&self, body: &str) -> Result<Vec<UnifiedItem>, FeedError> {
        let document = Html::parse_document(&escape_cdata(body));
        if document.select(&CHANNEL).next().is_none() {
            return Err(FeedError::parse("feed has no channel element"));
        }

        let items = document
            .select(&ITEM)
            .take(MAX_ITEMS_PER_SOURCE)
            .filter_map(|item| {
                let event = self.item_to_event(item);
                if event.is_none() {
                    debug!("skipping calendar item without title or link");
                }
                event
            })
            .collect();

        Ok(items)
    }
}

fn element_text(parent: ElementRef, selector: &Selector) -> Option<String> {
    let text = parent.select(selector).next()?.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// The document is read with an HTML parser, which treats `<link>` as a void
/// element: the url ends up in the text node right after it.
fn link_text(item: ElementRef) -> Option<String> {
    let link = item.select(&LINK).next()?;

    let inner = link.text().collect::<String>();
    if !inner.trim().is_empty() {
        return Some(inner.trim().to_string());
    }

    link.next_sibling()
        .and_then(|node| node.value().as_text().map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty())
}

/// HTML parsing drops CDATA sections, so their content is turned into escaped
/// text before the feed is parsed.
fn escape_cdata(xml: &str) -> Cow<'_, str> {
    if !xml.contains(CDATA_OPEN) {
        return Cow::Borrowed(xml);
    }

    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(start) = rest.find(CDATA_OPEN) {
        out.push_str(&rest[..start]);
        let inner = &rest[start + CDATA_OPEN.len()..];
        let end = inner.find(CDATA_CLOSE).unwrap_or(inner.len());
        out.push_str(&escape_xml(&inner[..end]));
        rest = inner.get(end + CDATA_CLOSE.len()..).unwrap_or("");
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Finds the text of the first `<prefix:local_name>` tag in a serialized
/// fragment. Namespaced tags are not reachable through selectors.
fn scan_namespaced_tag<'a>(fragment: &'a str, local_name: &str) -> Option<&'a str> {
    let mut rest = fragment;
    while let Some(open) = rest.find('<') {
        let tag = &rest[open + 1..];
        let name_end = tag.find(|c: char| c == '>' || c.is_whitespace())?;
        let name = &tag[..name_end];

        let is_match = !name.starts_with('/')
            && name
                .split_once(':')
                .is_some_and(|(_, local)| local.eq_ignore_ascii_case(local_name));

        if is_match {
            let body = &tag[tag.find('>')? + 1..];
            let value = body[..body.find('<').unwrap_or(body.len())].trim();
            if !value.is_empty() {
                return Some(value);
            }
        }

        rest = &tag[name_end..];
    }
    None
}
