use serde::Serialize;
use url::Url;

use crate::error::NavigationError;
use crate::settings::Settings;

pub const DEFAULT_ADMIN_PATH: &str = "/umbraco";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Navigation {
    Open {
        url: String,
        new_tab: bool,
        /// Only set when the current tab is reused.
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    AlreadyThere {
        status: String,
    },
}

fn parse_current(current_url: Option<&str>) -> Result<Url, NavigationError> {
    let current = current_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(NavigationError::NoActiveTab)?;

    let url = Url::parse(current).map_err(|e| NavigationError::InvalidUrl {
        url: current.to_string(),
        reason: e.to_string(),
    })?;

    if !url.origin().is_tuple() {
        return Err(NavigationError::OpaqueOrigin(current.to_string()));
    }
    Ok(url)
}

fn open(url: String, settings: &Settings, status: &str) -> Navigation {
    Navigation::Open {
        url,
        new_tab: settings.open_in_new_tab,
        status: (!settings.open_in_new_tab).then(|| status.to_string()),
    }
}

/// Where the admin toggle goes from `current_url`.
pub fn admin_target(
    current_url: Option<&str>,
    settings: &Settings,
    admin_path: &str,
) -> Result<Navigation, NavigationError> {
    let current = parse_current(current_url)?;
    let admin_path = format!("/{}", admin_path.trim_matches('/'));

    if current.path().starts_with(&admin_path) {
        return Ok(Navigation::AlreadyThere {
            status: "Already on Umbraco admin".to_string(),
        });
    }

    let target = format!("{}{admin_path}", current.origin().ascii_serialization());
    Ok(open(target, settings, "Navigating to Umbraco..."))
}

pub fn root_target(
    current_url: Option<&str>,
    settings: &Settings,
) -> Result<Navigation, NavigationError> {
    let current = parse_current(current_url)?;
    let target = format!("{}/", current.origin().ascii_serialization());
    Ok(open(target, settings, "Navigating to root..."))
}
