use crate::config::{ExitPolicy, FeedConfig, TieBreak};
use serde::{Deserialize, Serialize};

/// One item's visibility as measured in a single observation callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityReport {
    pub item_id: String,
    pub is_intersecting: bool,
    /// Fraction of the item's box inside the viewport, 0..=1
    pub ratio: f64,
}

impl VisibilityReport {
    pub fn new<S: Into<String>>(item_id: S, is_intersecting: bool, ratio: f64) -> Self {
        Self {
            item_id: item_id.into(),
            is_intersecting,
            ratio,
        }
    }
}

/// Decides which single feed item is active from a batch of visibility reports.
///
/// Pure: `(current, reports) -> next`. At most one id is ever returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPolicy {
    threshold: f64,
    tie_break: TieBreak,
    exit_policy: ExitPolicy,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self::new(0.5, TieBreak::HighestRatio, ExitPolicy::KeepLast)
    }
}

impl PlaybackPolicy {
    pub fn new(threshold: f64, tie_break: TieBreak, exit_policy: ExitPolicy) -> Self {
        Self {
            threshold,
            tie_break,
            exit_policy,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            config.visibility_threshold,
            config.tie_break,
            config.exit_policy,
        )
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A report qualifies when it intersects and meets the visibility threshold
    pub fn qualifies(&self, report: &VisibilityReport) -> bool {
        report.is_intersecting && report.ratio >= self.threshold
    }

    /// Compute the next active item id
    pub fn decide(&self, current: Option<&str>, reports: &[VisibilityReport]) -> Option<String> {
        let qualifying = reports.iter().filter(|r| self.qualifies(r));

        let winner = match self.tie_break {
            TieBreak::LastQualifying => qualifying.last(),
            // `>=` hands equal ratios to the later report
            TieBreak::HighestRatio => qualifying.fold(None, |best: Option<&VisibilityReport>, r| {
                match best {
                    Some(b) if b.ratio > r.ratio => Some(b),
                    _ => Some(r),
                }
            }),
        };

        if let Some(report) = winner {
            return Some(report.item_id.clone());
        }

        if self.exit_policy == ExitPolicy::Clear {
            if let Some(active) = current {
                let left_view = reports
                    .iter()
                    .any(|r| r.item_id == active && !r.is_intersecting);
                if left_view {
                    return None;
                }
            }
        }

        current.map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: &str, intersecting: bool, ratio: f64) -> VisibilityReport {
        VisibilityReport::new(id, intersecting, ratio)
    }

    fn last_qualifying() -> PlaybackPolicy {
        PlaybackPolicy::new(0.5, TieBreak::LastQualifying, ExitPolicy::KeepLast)
    }

    #[test]
    fn test_last_qualifying_report_wins() {
        let reports = vec![report("A", true, 0.6), report("B", true, 0.7)];

        assert_eq!(
            last_qualifying().decide(None, &reports),
            Some("B".to_string())
        );
        assert_eq!(
            PlaybackPolicy::default().decide(None, &reports),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_below_threshold_keeps_current() {
        let policy = PlaybackPolicy::default();
        let reports = vec![report("A", true, 0.4)];

        assert_eq!(policy.decide(Some("Z"), &reports), Some("Z".to_string()));
        assert_eq!(policy.decide(None, &reports), None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = PlaybackPolicy::default();
        assert_eq!(
            policy.decide(None, &[report("A", true, 0.5)]),
            Some("A".to_string())
        );
    }

    #[test]
    fn test_not_intersecting_never_qualifies() {
        let policy = PlaybackPolicy::default();
        assert_eq!(policy.decide(None, &[report("A", false, 0.9)]), None);
    }

    #[test]
    fn test_highest_ratio_beats_order() {
        let reports = vec![report("A", true, 0.9), report("B", true, 0.6)];

        assert_eq!(
            PlaybackPolicy::default().decide(None, &reports),
            Some("A".to_string())
        );
        assert_eq!(
            last_qualifying().decide(None, &reports),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_equal_ratios_go_to_later_report() {
        let reports = vec![report("A", true, 0.5), report("B", true, 0.5)];
        assert_eq!(
            PlaybackPolicy::default().decide(None, &reports),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_keep_last_when_active_leaves() {
        let policy = PlaybackPolicy::default();
        let reports = vec![report("A", false, 0.0)];
        assert_eq!(policy.decide(Some("A"), &reports), Some("A".to_string()));
    }

    #[test]
    fn test_clear_when_active_leaves() {
        let policy = PlaybackPolicy::new(0.5, TieBreak::HighestRatio, ExitPolicy::Clear);

        assert_eq!(policy.decide(Some("A"), &[report("A", false, 0.0)]), None);
        // Still partially visible: not cleared
        assert_eq!(
            policy.decide(Some("A"), &[report("A", true, 0.2)]),
            Some("A".to_string())
        );
        // Another item's exit does not touch the active one
        assert_eq!(
            policy.decide(Some("A"), &[report("B", false, 0.0)]),
            Some("A".to_string())
        );
        // A qualifying item takes over in the same batch
        assert_eq!(
            policy.decide(
                Some("A"),
                &[report("A", false, 0.0), report("B", true, 1.0)]
            ),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_empty_batch_is_identity() {
        let policy = PlaybackPolicy::default();
        assert_eq!(policy.decide(Some("A"), &[]), Some("A".to_string()));
        assert_eq!(policy.decide(None, &[]), None);
    }

    #[test]
    fn test_never_more_than_one_active() {
        let policy = PlaybackPolicy::default();
        let ratios = [0.0, 0.3, 0.5, 0.51, 0.99, 1.0];
        for (i, a) in ratios.iter().enumerate() {
            for b in ratios.iter().skip(i) {
                let reports = vec![
                    report("A", *a > 0.0, *a),
                    report("B", *b > 0.0, *b),
                    report("C", true, 1.0 - *a),
                ];
                let next = policy.decide(None, &reports);
                if let Some(id) = next {
                    assert!(reports.iter().any(|r| r.item_id == id && policy.qualifies(r)));
                }
            }
        }
    }
}
