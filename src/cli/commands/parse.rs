//! Parse command implementation.
//!
//! Prints what the name parser and query builder make of a name.

use colored::Colorize;

use crate::core::parser::{extract_year_hint, is_special, parse_date, parse_episode, parse_period_and_part, parse_season};
use crate::core::query::{clean_series_query, is_bad_query};

fn show<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Field/value rows describing one name.
pub fn describe(name: &str) -> Vec<(&'static str, String)> {
    let facts = parse_episode(name);
    let query = clean_series_query(name);
    let (period, part) = parse_period_and_part(name);
    vec![
        ("season", show(facts.season)),
        ("episode", show(facts.episode)),
        ("tagged", facts.already_tagged.to_string()),
        ("quality", facts.quality_tail),
        ("folder season", show(parse_season(name))),
        ("date", show(parse_date(name))),
        ("period", show(period.map(|p| format!("{} (part rank {})", p, part)))),
        ("special", is_special(name).to_string()),
        ("year hint", show(extract_year_hint(name))),
        (
            "query",
            if is_bad_query(&query) {
                format!("{} (unusable)", query)
            } else {
                query
            },
        ),
    ]
}

/// Print the parse of every name.
pub fn parse_names(names: &[String]) {
    for name in names {
        println!("{}", name.bold().cyan());
        for (field, value) in describe(name) {
            println!("  {:<14} {}", format!("{}:", field).bold(), value);
        }
        println!();
    }
}
