//! Live valuation quotes and the provider abstraction that fetches them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub code: String,
    pub display_name: String,
    pub change_percent: f64,
    pub estimated_net_value: String,
    pub previous_net_value: String,
    pub valuation_time: Option<String>,
    pub detail_url: String,
}

impl Quote {
    /// Estimated change with an explicit `+` for gains, e.g. `+1.23%`.
    pub fn formatted_change(&self) -> String {
        // `-0.00` upstream parses to negative zero; show it unsigned.
        let change = if self.change_percent == 0.0 {
            0.0
        } else {
            self.change_percent
        };
        if change > 0.0 {
            format!("+{change:.2}%")
        } else {
            format!("{change:.2}%")
        }
    }

    pub fn title(&self) -> String {
        format!("{}【{}】", self.display_name, self.formatted_change())
    }

    pub fn description(&self) -> String {
        format!(
            "Estimated NAV: {}\tPrevious NAV: {}",
            self.estimated_net_value, self.previous_net_value
        )
    }
}

/// Result of looking up a single fund.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteFetchOutcome {
    Found(Quote),
    /// The upstream answered but carried no quote for the code.
    NotFound,
    /// Network, status, timeout or payload failure.
    TransientError(String),
}

impl QuoteFetchOutcome {
    pub fn into_quote(self) -> Option<Quote> {
        match self {
            QuoteFetchOutcome::Found(quote) => Some(quote),
            _ => None,
        }
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, code: &str) -> QuoteFetchOutcome;

    /// Page with details for `code`; does not touch the network.
    fn detail_url(&self, code: &str) -> String;
}
