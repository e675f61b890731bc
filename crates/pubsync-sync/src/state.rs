use std::fmt;

use pubsync_types::Category;
use serde::{Deserialize, Serialize};

/// Phase of one synchronization pass.
///
/// Phases advance strictly in order: templates are rewritten against the
/// addresses resolved for stylesheets and assets, so no category may be
/// processed early. Any working phase may fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    FetchingAssets,
    FetchingStylesheets,
    FetchingTemplates,
    Aggregating,
    Publishing,
    Succeeded,
    Failed,
}

impl SyncPhase {
    pub fn fetching(category: Category) -> Self {
        match category {
            Category::Assets => Self::FetchingAssets,
            Category::Stylesheets => Self::FetchingStylesheets,
            Category::Templates => Self::FetchingTemplates,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn can_transition_to(&self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (*self, next),
            (Idle, FetchingAssets)
                | (FetchingAssets, FetchingStylesheets)
                | (FetchingStylesheets, FetchingTemplates)
                | (FetchingTemplates, Aggregating)
                | (Aggregating, Publishing)
                | (Publishing, Succeeded)
                | (Idle | FetchingAssets | FetchingStylesheets | FetchingTemplates, Failed)
                | (Aggregating | Publishing, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingAssets => "fetching_assets",
            Self::FetchingStylesheets => "fetching_stylesheets",
            Self::FetchingTemplates => "fetching_templates",
            Self::Aggregating => "aggregating",
            Self::Publishing => "publishing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: [SyncPhase; 7] = [
        SyncPhase::Idle,
        SyncPhase::FetchingAssets,
        SyncPhase::FetchingStylesheets,
        SyncPhase::FetchingTemplates,
        SyncPhase::Aggregating,
        SyncPhase::Publishing,
        SyncPhase::Succeeded,
    ];

    #[test]
    fn phases_advance_strictly_in_order() {
        for pair in ORDER.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            assert!(!pair[1].can_transition_to(pair[0]));
        }
        assert!(!SyncPhase::FetchingAssets.can_transition_to(SyncPhase::FetchingTemplates));
        assert!(!SyncPhase::Idle.can_transition_to(SyncPhase::Publishing));
    }

    #[test]
    fn working_phases_may_fail_terminal_ones_may_not() {
        for phase in &ORDER[..6] {
            assert!(phase.can_transition_to(SyncPhase::Failed));
        }
        assert!(!SyncPhase::Succeeded.can_transition_to(SyncPhase::Failed));
        assert!(!SyncPhase::Failed.can_transition_to(SyncPhase::FetchingAssets));
        assert!(SyncPhase::Failed.is_terminal());
    }

    #[test]
    fn fetching_phase_per_category() {
        let phases: Vec<_> = Category::ORDERED.iter().map(|c| SyncPhase::fetching(*c)).collect();
        assert_eq!(phases, ORDER[1..4].to_vec());
    }
}
