//! Router configuration

use serde::{Deserialize, Serialize};

use crate::navigation::QueryParamsHandling;
use crate::Result;
use waymark_state::{ComponentId, ParamsInheritanceStrategy};

/// What to do when asked to navigate to the URL that is already committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnSameUrlNavigation {
    #[default]
    Ignore,
    Reload,
}

/// When the location is written during a navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlUpdateStrategy {
    /// After the navigation commits.
    #[default]
    Deferred,
    /// As soon as the navigation starts.
    Eager,
}

/// How the location is put back after a navigation fails or is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanceledNavigationResolution {
    /// Overwrite the current entry with the committed URL.
    #[default]
    Replace,
    /// Move back through history to the entry of the committed page.
    Computed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedUrlPolicy {
    /// Navigate to `/` instead.
    #[default]
    Root,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub on_same_url_navigation: OnSameUrlNavigation,
    pub params_inheritance_strategy: ParamsInheritanceStrategy,
    pub url_update_strategy: UrlUpdateStrategy,
    pub canceled_navigation_resolution: CanceledNavigationResolution,
    pub malformed_url: MalformedUrlPolicy,
    /// Used when the navigation extras do not name a handling.
    pub default_query_params_handling: QueryParamsHandling,
    /// Component rendered by the root route.
    pub root_component: Option<ComponentId>,
}

impl RouterConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
