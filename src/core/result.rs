//! Presentation-facing result items and the per-item action menu.

use crate::core::quote::Quote;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultKind {
    Quote,
    Prompt,
    Searching,
    NoResults,
    EmptyWatchlist,
    StorageUnavailable,
}

/// Direction marker derived from the sign of the estimated change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Icon {
    Up,
    Down,
    Flat,
}

impl Icon {
    pub fn for_change(change_percent: f64) -> Self {
        if change_percent > 0.0 {
            Icon::Up
        } else if change_percent < 0.0 {
            Icon::Down
        } else {
            Icon::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub kind: ResultKind,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub icon: Option<Icon>,
    pub code: Option<String>,
}

impl SearchResult {
    fn sentinel(kind: ResultKind, title: &str, description: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description: description.to_string(),
            url: None,
            icon: None,
            code: None,
        }
    }

    pub fn prompt() -> Self {
        Self::sentinel(
            ResultKind::Prompt,
            "Enter a fund name or code",
            "Names match by substring, codes must be exact",
        )
    }

    pub fn searching() -> Self {
        Self::sentinel(
            ResultKind::Searching,
            "Searching, please wait",
            "Try again if the list does not load",
        )
    }

    pub fn no_results() -> Self {
        Self::sentinel(
            ResultKind::NoResults,
            "No results",
            "Please check the fund name or code",
        )
    }

    pub fn empty_watchlist() -> Self {
        Self::sentinel(
            ResultKind::EmptyWatchlist,
            "Watchlist is empty",
            "Search for a fund and save it to watch it here",
        )
    }

    pub fn storage_unavailable(err: impl Display) -> Self {
        Self::sentinel(
            ResultKind::StorageUnavailable,
            "Local storage is unavailable",
            &err.to_string(),
        )
    }

    pub fn is_sentinel(&self) -> bool {
        self.kind != ResultKind::Quote
    }
}

impl From<Quote> for SearchResult {
    fn from(quote: Quote) -> Self {
        Self {
            kind: ResultKind::Quote,
            title: quote.title(),
            description: quote.description(),
            icon: Some(Icon::for_change(quote.change_percent)),
            url: Some(quote.detail_url),
            code: Some(quote.code),
        }
    }
}

/// Actions offered for a single selected fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Save,
    Remove,
    Open,
}

impl Display for ItemAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ItemAction::Save => "save",
                ItemAction::Remove => "remove",
                ItemAction::Open => "open",
            }
        )
    }
}

impl FromStr for ItemAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "save" => Ok(ItemAction::Save),
            "remove" => Ok(ItemAction::Remove),
            "open" => Ok(ItemAction::Open),
            _ => Err(anyhow::anyhow!("Invalid action: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub action: ItemAction,
    pub code: String,
    pub label: String,
}

/// The menu for a selected fund: toggle its watch state, or open its page.
pub fn item_actions(code: &str, watched: bool) -> Vec<MenuItem> {
    let toggle = if watched {
        MenuItem {
            action: ItemAction::Remove,
            code: code.to_string(),
            label: format!("Remove {code} from watchlist"),
        }
    } else {
        MenuItem {
            action: ItemAction::Save,
            code: code.to_string(),
            label: format!("Save {code} to watchlist"),
        }
    };
    let open = MenuItem {
        action: ItemAction::Open,
        code: code.to_string(),
        label: format!("Open details for {code}"),
    };
    vec![toggle, open]
}
