//! Promotion eligibility (Apprentice -> Sentinel)
//!
//! Pure decision over a loaded record. The verdict carries the observed
//! values so a caller can explain a rejection. Recording the role change is
//! left to an external process.

use serde::{Deserialize, Serialize};

use crate::config::PromotionThresholds;
use crate::record::{ContributorRecord, Role};

/// Why a contributor is not eligible. Every failing rule is listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shortfall {
    NotApprentice,
    Blocked,
    TooFewPullRequests,
    LowAverageLines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub eligible: bool,
    pub current_role: Role,
    pub blocked: bool,
    pub total_prs: u64,
    pub avg_lines_changed: f64,
    pub required_prs: u64,
    pub required_avg_lines: f64,
    pub shortfalls: Vec<Shortfall>,
}

/// Outcome of a promotion check. A missing record is its own outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromotionCheck {
    NotOnboarded,
    Evaluated(Verdict),
}

impl PromotionCheck {
    pub fn is_eligible(&self) -> bool {
        matches!(self, PromotionCheck::Evaluated(v) if v.eligible)
    }
}

pub fn evaluate(record: &ContributorRecord, thresholds: &PromotionThresholds) -> Verdict {
    let status = &record.status;
    let stats = &record.stats;

    let mut shortfalls = Vec::new();
    if status.current_role != Role::Apprentice {
        shortfalls.push(Shortfall::NotApprentice);
    }
    if status.blocked {
        shortfalls.push(Shortfall::Blocked);
    }
    if stats.total_prs < thresholds.promotion_pr_count {
        shortfalls.push(Shortfall::TooFewPullRequests);
    }
    if stats.avg_lines_changed.is_nan() || stats.avg_lines_changed < thresholds.min_avg_lines {
        shortfalls.push(Shortfall::LowAverageLines);
    }

    Verdict {
        eligible: shortfalls.is_empty(),
        current_role: status.current_role.clone(),
        blocked: status.blocked,
        total_prs: stats.total_prs,
        avg_lines_changed: stats.avg_lines_changed,
        required_prs: thresholds.promotion_pr_count,
        required_avg_lines: thresholds.min_avg_lines,
        shortfalls,
    }
}

/// Evaluate an optional record, mapping absence to `NotOnboarded`.
pub fn check_promotion(
    record: Option<&ContributorRecord>,
    thresholds: &PromotionThresholds,
) -> PromotionCheck {
    match record {
        Some(record) => PromotionCheck::Evaluated(evaluate(record, thresholds)),
        None => PromotionCheck::NotOnboarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PullRequestEntry;

    fn thresholds() -> PromotionThresholds {
        PromotionThresholds {
            promotion_pr_count: 5,
            min_avg_lines: 30.0,
        }
    }

    fn record_with(total_prs: u64, avg: f64) -> ContributorRecord {
        let mut record = ContributorRecord::create(
            1,
            "alice",
            "123456789012345678",
            "0x1234567890abcdef1234567890abcdef12345678",
            PullRequestEntry::new(1, "org/repo"),
        );
        record.stats.total_prs = total_prs;
        record.stats.avg_lines_changed = avg;
        record
    }

    #[test]
    fn test_eligible_apprentice() {
        let verdict = evaluate(&record_with(5, 40.0), &thresholds());
        assert!(verdict.eligible);
        assert!(verdict.shortfalls.is_empty());
        assert_eq!(verdict.total_prs, 5);
        assert_eq!(verdict.avg_lines_changed, 40.0);
    }

    #[test]
    fn test_blocked_not_eligible() {
        let mut record = record_with(5, 40.0);
        record.status.blocked = true;
        let verdict = evaluate(&record, &thresholds());
        assert!(!verdict.eligible);
        assert_eq!(verdict.shortfalls, vec![Shortfall::Blocked]);
    }

    #[test]
    fn test_sentinel_never_eligible() {
        let mut record = record_with(50, 400.0);
        record.status.current_role = Role::Sentinel;
        let verdict = evaluate(&record, &thresholds());
        assert!(!verdict.eligible);
        assert_eq!(verdict.shortfalls, vec![Shortfall::NotApprentice]);
    }

    #[test]
    fn test_unknown_role_not_eligible() {
        let mut record = record_with(5, 40.0);
        record.status.current_role = Role::Other("Maintainer".into());
        assert!(!evaluate(&record, &thresholds()).eligible);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        assert!(evaluate(&record_with(5, 30.0), &thresholds()).eligible);
        let verdict = evaluate(&record_with(4, 29.9), &thresholds());
        assert_eq!(
            verdict.shortfalls,
            vec![Shortfall::TooFewPullRequests, Shortfall::LowAverageLines]
        );
    }

    #[test]
    fn test_missing_record_is_not_onboarded() {
        let check = check_promotion(None, &thresholds());
        assert_eq!(check, PromotionCheck::NotOnboarded);
        assert!(!check.is_eligible());
    }

    #[test]
    fn test_present_record_is_evaluated() {
        let record = record_with(5, 40.0);
        assert!(check_promotion(Some(&record), &thresholds()).is_eligible());
    }
}
