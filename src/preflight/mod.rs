//! Preflight checks module.

mod ai;
mod alist;
mod tmdb;

use colored::Colorize;

use crate::models::config::{Backend, Config};

/// Result of a preflight check.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    pub fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn fail(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }
}

/// Run all preflight checks for `config`.
pub async fn run_preflight_checks(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    results.push(check_roots(config));

    match config.library.backend {
        Backend::Alist => results.extend(alist::check(&config.alist, &config.library.roots).await),
        Backend::Local => results.push(check_local_root(config)),
    }

    results.push(tmdb::check(&config.tmdb).await);

    // The assistant is optional; only check it when it would be used.
    if config.ai.is_active() {
        results.push(ai::check(&config.ai).await);
    }

    results
}

fn check_roots(config: &Config) -> CheckResult {
    if config.library.roots.is_empty() && config.library.auto_roots {
        CheckResult::ok(
            "Library roots",
            &format!("auto ({} / {})", config.library.root_regex, config.library.categories.join(",")),
        )
    } else if config.library.roots.is_empty() {
        CheckResult::fail(
            "Library roots",
            "none configured",
            "Pass --roots, --auto-roots or set TV_ROOTS (comma separated)",
        )
    } else {
        CheckResult::ok("Library roots", &config.library.roots.join(", "))
    }
}

fn check_local_root(config: &Config) -> CheckResult {
    match &config.library.local_root {
        Some(root) if root.is_dir() => CheckResult::ok("Local backend", &root.display().to_string()),
        Some(root) => CheckResult::fail(
            "Local backend",
            &format!("{} is not a directory", root.display()),
            "Point --local-root at the mounted library",
        ),
        None => CheckResult::fail(
            "Local backend",
            "local root not configured",
            "Pass --local-root or set [library].local_root",
        ),
    }
}

/// Print preflight check results.
pub fn print_results(results: &[CheckResult]) {
    for result in results {
        if result.success {
            println!(
                "{} {}: {}",
                "[OK]".green(),
                result.name.bold(),
                result.message
            );
        } else {
            println!(
                "{} {}: {}",
                "[FAIL]".red(),
                result.name.bold(),
                result.message
            );
            if let Some(ref hint) = result.hint {
                println!("  {} {}", "->".yellow(), hint);
            }
        }
    }
}

/// Check if all preflight checks passed.
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_root_checks() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.library.backend = Backend::Local;
        assert!(!check_local_root(&config).success);

        config.library.local_root = Some(tmp.path().to_path_buf());
        assert!(check_local_root(&config).success);
        assert!(!check_roots(&config).success);
        config.library.auto_roots = true;
        assert!(check_roots(&config).success);

        config.library.roots = vec!["/tv".to_string()];
        assert!(all_passed(&[check_roots(&config), check_local_root(&config)]));
    }
}
