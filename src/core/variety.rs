//! Episode numbering for variety-style files.
//!
//! Variety shows are often published as `第3期上`, `第3期下` or date-stamped
//! files with no episode marker at all. The planner orders such files per
//! season and hands out the lowest episode numbers not already taken by
//! explicitly numbered files.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::parser::{parse_date, parse_episode, parse_period_and_part, parse_season, is_special};
use crate::models::media::{DirEntry, PlannedEpisode};
use crate::utils::chinese::{normalize_spaces, to_halfwidth};
use crate::utils::fs::{basename, is_video_file};

/// Planned episode per `(scan dir, file name)`.
pub type VarietyPlan = HashMap<(String, String), PlannedEpisode>;

/// Sort key; `None` sorts after every known value.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OrderKey {
    period: Option<u32>,
    part: u8,
    date: Option<u32>,
    name: String,
}

fn unknown_last(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        unknown_last(self.period, other.period)
            .then(self.part.cmp(&other.part))
            .then(unknown_last(self.date, other.date))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Candidate {
    key: OrderKey,
    dir: String,
    name: String,
    special: bool,
}

/// Plan episode numbers for video files that carry no episode marker.
///
/// `listings` holds each scan directory with its current children. A
/// directory's season comes from `season_hints`, then from its own name,
/// then `default_season`. Specials (by file or directory name) go to season 0
/// and are ordered by date only. Files with neither a period number nor a
/// date are left out of the plan.
pub fn plan_variety_episodes(
    listings: &[(String, Vec<DirEntry>)],
    season_hints: &HashMap<String, u32>,
    default_season: u32,
) -> VarietyPlan {
    let mut candidates: BTreeMap<u32, Vec<Candidate>> = BTreeMap::new();
    let mut used: HashMap<u32, HashSet<u32>> = HashMap::new();

    for (dir, entries) in listings {
        let dir_name = basename(dir);
        let season_guess = season_hints
            .get(dir)
            .copied()
            .or_else(|| parse_season(dir_name.trim()))
            .unwrap_or(default_season);

        for entry in entries.iter().filter(|e| !e.is_dir && is_video_file(&e.name)) {
            if let Some(ep) = parse_episode(&entry.name).episode {
                used.entry(season_guess).or_default().insert(ep);
                continue;
            }

            let (period, part) = parse_period_and_part(&entry.name);
            let date = parse_date(&entry.name);
            if period.is_none() && date.is_none() {
                continue;
            }

            let special = is_special(&entry.name) || is_special(&dir_name);
            let name = normalize_spaces(&to_halfwidth(&entry.name)).to_lowercase();
            let (season, key) = if special {
                (
                    0,
                    OrderKey {
                        period: None,
                        part: 0,
                        date,
                        name,
                    },
                )
            } else {
                (
                    season_guess,
                    OrderKey {
                        period,
                        part,
                        date,
                        name,
                    },
                )
            };

            candidates.entry(season).or_default().push(Candidate {
                key,
                dir: dir.clone(),
                name: entry.name.clone(),
                special,
            });
        }
    }

    let mut plan = VarietyPlan::new();
    for (season, mut bucket) in candidates {
        bucket.sort_by(|a, b| a.key.cmp(&b.key));
        let taken = used.entry(season).or_default();
        let mut next = 1;
        for candidate in bucket {
            while taken.contains(&next) {
                next += 1;
            }
            taken.insert(next);
            plan.insert(
                (candidate.dir, candidate.name),
                PlannedEpisode {
                    season,
                    episode: next,
                    is_special: candidate.special,
                },
            );
            next += 1;
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(dir: &str, files: &[&str]) -> (String, Vec<DirEntry>) {
        (
            dir.to_string(),
            files.iter().map(|f| DirEntry::file(*f)).collect(),
        )
    }

    fn planned(plan: &VarietyPlan, dir: &str, name: &str) -> Option<(u32, u32, bool)> {
        plan.get(&(dir.to_string(), name.to_string()))
            .map(|p| (p.season, p.episode, p.is_special))
    }

    #[test]
    fn test_periods_and_parts_are_ordered() {
        let listings = vec![listing(
            "/tv/奔跑吧",
            &["第2期上.mp4", "第1期下.mp4", "第1期上.mp4", "第2期下.mp4"],
        )];
        let plan = plan_variety_episodes(&listings, &HashMap::new(), 1);
        assert_eq!(planned(&plan, "/tv/奔跑吧", "第1期上.mp4"), Some((1, 1, false)));
        assert_eq!(planned(&plan, "/tv/奔跑吧", "第1期下.mp4"), Some((1, 2, false)));
        assert_eq!(planned(&plan, "/tv/奔跑吧", "第2期上.mp4"), Some((1, 3, false)));
        assert_eq!(planned(&plan, "/tv/奔跑吧", "第2期下.mp4"), Some((1, 4, false)));
    }

    #[test]
    fn test_skips_explicitly_numbered_episodes() {
        let listings = vec![listing(
            "/tv/Show/第二季",
            &["E01.mp4", "E02.mp4", "20240105.mp4", "20240112.mp4"],
        )];
        let plan = plan_variety_episodes(&listings, &HashMap::new(), 1);
        assert_eq!(planned(&plan, "/tv/Show/第二季", "20240105.mp4"), Some((2, 3, false)));
        assert_eq!(planned(&plan, "/tv/Show/第二季", "20240112.mp4"), Some((2, 4, false)));
        assert_eq!(planned(&plan, "/tv/Show/第二季", "E01.mp4"), None);
    }

    #[test]
    fn test_specials_go_to_season_zero_by_date() {
        let listings = vec![listing(
            "/tv/Show",
            &["花絮 2024-03-02.mp4", "花絮 2024-01-20.mp4", "第1期 20240101.mp4"],
        )];
        let hints = HashMap::from([("/tv/Show".to_string(), 3)]);
        let plan = plan_variety_episodes(&listings, &hints, 1);
        assert_eq!(planned(&plan, "/tv/Show", "花絮 2024-01-20.mp4"), Some((0, 1, true)));
        assert_eq!(planned(&plan, "/tv/Show", "花絮 2024-03-02.mp4"), Some((0, 2, true)));
        assert_eq!(planned(&plan, "/tv/Show", "第1期 20240101.mp4"), Some((3, 1, false)));
    }

    #[test]
    fn test_unplannable_files_are_left_out() {
        let listings = vec![listing("/tv/Show", &["片头.mp4", "readme.txt"])];
        assert!(plan_variety_episodes(&listings, &HashMap::new(), 1).is_empty());
    }

    #[test]
    fn test_unknown_period_sorts_last() {
        let a = OrderKey {
            period: Some(9),
            part: 0,
            date: None,
            name: "z".to_string(),
        };
        let b = OrderKey {
            period: None,
            part: 0,
            date: Some(20240101),
            name: "a".to_string(),
        };
        assert!(a < b);
    }
}
