//! Leaderboard, bin landing counters and floating score labels.

use std::{collections::HashMap, time::Duration};

use galton_board_core::{ImageRef, LeaderboardEntry, ScoreLabel};

/// Accumulated score per identity, kept in first-credit order.
#[derive(Clone, Debug, Default)]
pub(crate) struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
    index: HashMap<String, usize>,
}

impl Leaderboard {
    /// Adds `score` to `owner`, creating the entry on first credit.
    ///
    /// The avatar recorded with the first credit is kept.
    pub(crate) fn credit(&mut self, owner: &str, avatar: &ImageRef, score: u32) {
        let position = match self.index.get(owner) {
            Some(position) => *position,
            None => {
                let position = self.entries.len();
                self.entries.push(LeaderboardEntry {
                    owner: owner.to_owned(),
                    score: 0,
                    avatar: avatar.clone(),
                });
                let _ = self.index.insert(owner.to_owned(), position);
                position
            }
        };

        if let Some(entry) = self.entries.get_mut(position) {
            entry.score = entry.score.saturating_add(u64::from(score));
        }
    }

    pub(crate) fn score_for(&self, owner: &str) -> Option<u64> {
        self.index
            .get(owner)
            .and_then(|position| self.entries.get(*position))
            .map(|entry| entry.score)
    }

    /// Entries ordered by descending score; ties keep first-credit order.
    pub(crate) fn sorted(&self) -> Vec<LeaderboardEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|left, right| right.score.cmp(&left.score));
        sorted
    }
}

/// Landing counter for each bin.
#[derive(Clone, Debug)]
pub(crate) struct BinHistory {
    counts: Vec<u64>,
}

impl BinHistory {
    pub(crate) fn new(bins: usize) -> Self {
        Self {
            counts: vec![0; bins],
        }
    }

    pub(crate) fn record(&mut self, bin: usize) {
        if let Some(count) = self.counts.get_mut(bin) {
            *count = count.saturating_add(1);
        }
    }

    /// Landings recorded for `bin`, zero when the bin does not exist.
    pub(crate) fn count(&self, bin: usize) -> u64 {
        self.counts.get(bin).copied().unwrap_or(0)
    }

    pub(crate) fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub(crate) fn reset(&mut self) {
        self.counts.iter_mut().for_each(|count| *count = 0);
    }

    pub(crate) fn as_slice(&self) -> &[u64] {
        &self.counts
    }
}

/// Live score labels, oldest first.
#[derive(Clone, Debug)]
pub(crate) struct ScoreLabels {
    labels: Vec<ScoreLabel>,
    lifetime: Duration,
}

impl ScoreLabels {
    pub(crate) fn new(lifetime: Duration) -> Self {
        Self {
            labels: Vec::new(),
            lifetime,
        }
    }

    pub(crate) fn push(&mut self, label: ScoreLabel) {
        self.labels.push(label);
    }

    /// Removes every label older than the configured lifetime.
    pub(crate) fn expire(&mut self, now: Duration) {
        let lifetime = self.lifetime;
        self.labels
            .retain(|label| !label.is_expired(now, lifetime));
    }

    pub(crate) fn as_slice(&self) -> &[ScoreLabel] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galton_board_core::BinColor;

    #[test]
    fn leaderboard_accumulates_and_keeps_first_avatar() {
        let mut board = Leaderboard::default();
        board.credit("ada", &ImageRef::new("first.png"), 10);
        board.credit("ada", &ImageRef::new("second.png"), 5);
        board.credit("bob", &ImageRef::new("bob.png"), 1);

        assert_eq!(board.score_for("ada"), Some(15));
        assert_eq!(board.score_for("bob"), Some(1));
        assert_eq!(board.score_for("eve"), None);
        let sorted = board.sorted();
        assert_eq!(sorted[0].avatar, ImageRef::new("first.png"));
    }

    #[test]
    fn leaderboard_sort_is_stable_for_ties() {
        let mut board = Leaderboard::default();
        board.credit("first", &ImageRef::new("a"), 5);
        board.credit("second", &ImageRef::new("b"), 25);
        board.credit("third", &ImageRef::new("c"), 5);

        let order: Vec<String> = board.sorted().into_iter().map(|entry| entry.owner).collect();
        assert_eq!(order, vec!["second", "first", "third"]);
    }

    #[test]
    fn bin_history_counts_and_resets() {
        let mut history = BinHistory::new(3);
        history.record(0);
        history.record(2);
        history.record(2);
        history.record(7);

        assert_eq!(history.as_slice(), &[1, 0, 2]);
        assert_eq!(history.count(2), 2);
        assert_eq!(history.count(9), 0);
        assert_eq!(history.total(), 3);

        history.reset();
        assert_eq!(history.total(), 0);
        assert_eq!(history.as_slice().len(), 3);
    }

    #[test]
    fn labels_expire_after_their_lifetime() {
        let mut labels = ScoreLabels::new(Duration::from_millis(1_000));
        for (index, created) in [0u64, 400, 900].into_iter().enumerate() {
            labels.push(ScoreLabel {
                x: index as f32,
                y: 0.0,
                color: BinColor::from_rgb(1, 2, 3),
                created_at: Duration::from_millis(created),
                label: "+1".to_owned(),
            });
        }

        labels.expire(Duration::from_millis(1_000));
        assert_eq!(labels.as_slice().len(), 3);

        labels.expire(Duration::from_millis(1_401));
        let remaining: Vec<f32> = labels.as_slice().iter().map(|label| label.x).collect();
        assert_eq!(remaining, vec![2.0]);
    }
}
