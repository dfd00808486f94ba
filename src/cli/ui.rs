use crate::core::result::{Icon, ResultKind, SearchResult};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Arrow cell coloured by direction; gains are red and losses green, as quoted
/// on mainland exchanges.
pub fn icon_cell(icon: Option<Icon>) -> Cell {
    match icon {
        Some(Icon::Up) => Cell::new("▲").fg(Color::Red),
        Some(Icon::Down) => Cell::new("▼").fg(Color::Green),
        Some(Icon::Flat) => Cell::new("•").fg(Color::DarkGrey),
        None => Cell::new(""),
    }
}

/// Renders a result list. A single sentinel is printed as a message, not a table.
pub fn render_results(results: &[SearchResult]) -> String {
    if let [only] = results
        && only.is_sentinel()
    {
        let title = match only.kind {
            ResultKind::StorageUnavailable | ResultKind::NoResults => {
                style_text(&only.title, StyleType::Error)
            }
            _ => style_text(&only.title, StyleType::Title),
        };
        return format!("{}\n{}", title, style_text(&only.description, StyleType::Subtle));
    }

    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell(""),
        header_cell("Code"),
        header_cell("Fund"),
        header_cell("Valuation"),
        header_cell("Details"),
    ]);

    for result in results {
        table.add_row(vec![
            icon_cell(result.icon),
            Cell::new(result.code.as_deref().unwrap_or("")),
            Cell::new(&result.title),
            Cell::new(&result.description),
            Cell::new(result.url.as_deref().unwrap_or("")).fg(Color::DarkGrey),
        ]);
    }

    table.to_string()
}

/// Creates a spinner shown while a query is in flight.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sentinel_is_a_message() {
        let text = render_results(&[SearchResult::no_results()]);
        assert!(text.contains("No results"));
        assert!(!text.contains("Valuation"));
    }

    #[test]
    fn test_quotes_render_as_table() {
        let result = SearchResult {
            kind: ResultKind::Quote,
            title: "易方达消费行业股票【+1.23%】".to_string(),
            description: "Estimated NAV: 3.1503\tPrevious NAV: 3.1120".to_string(),
            url: Some("http://fund.eastmoney.com/110022.html?spm=search".to_string()),
            icon: Some(Icon::Up),
            code: Some("110022".to_string()),
        };
        let text = render_results(&[result]);
        assert!(text.contains("Valuation"));
        assert!(text.contains("110022"));
        assert!(text.contains("+1.23%"));
    }
}
