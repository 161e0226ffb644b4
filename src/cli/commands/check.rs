//! Check command implementation.

use colored::Colorize;

use crate::models::config::Config;
use crate::preflight;

/// Run every preflight check and print the results. Returns whether all passed.
pub async fn check(config: &Config) -> bool {
    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(config).await;
    preflight::print_results(&results);
    println!();

    let passed = preflight::all_passed(&results);
    if passed {
        println!("{}", "[OK] All checks passed".green());
    }
    passed
}
