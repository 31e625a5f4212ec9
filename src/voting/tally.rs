use crate::models::{Profile, Vote, WinnerResult};
use std::collections::HashMap;

/// Per-candidate vote counts for one match and category.
///
/// Candidates are kept in the order their first counted vote was seen, and
/// only candidates with at least one vote are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    entries: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl VoteTally {
    fn increment(&mut self, user_id: &str) {
        match self.index.get(user_id) {
            Some(&pos) => self.entries[pos].1 += 1,
            None => {
                self.index.insert(user_id.to_string(), self.entries.len());
                self.entries.push((user_id.to_string(), 1));
            }
        }
    }

    pub fn get(&self, user_id: &str) -> Option<u32> {
        self.index.get(user_id).map(|&pos| self.entries[pos].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(id, count)| (id.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of votes counted.
    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, count)| count).sum()
    }
}

/// Counts votes per candidate.
///
/// Votes are counted in casting order (`created_at`, input order for equal
/// timestamps) so that the tally order, and with it the tie-break in
/// [`resolve_winner`], does not depend on how the caller fetched them.
pub fn tally(votes: &[Vote]) -> VoteTally {
    let mut ordered: Vec<&Vote> = votes.iter().collect();
    ordered.sort_by_key(|vote| vote.created_at);

    let mut result = VoteTally::default();
    for vote in ordered {
        result.increment(&vote.voted_user_id);
    }
    result
}

/// Picks the plurality winner.
///
/// Ties go to the candidate that appears first in the tally, i.e. the one
/// whose earliest vote was cast first.
pub fn resolve_winner(tally: &VoteTally) -> Option<(String, u32)> {
    let mut best: Option<(&str, u32)> = None;
    for (user_id, count) in tally.iter() {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((user_id, count)),
        }
    }
    best.map(|(user_id, count)| (user_id.to_string(), count))
}

/// Attaches the winner's profile. A winner without a resolvable profile is
/// not displayable and yields `None`.
pub fn build_winner_view<F>(winner: Option<(String, u32)>, lookup: F) -> Option<WinnerResult>
where
    F: FnOnce(&str) -> Option<Profile>,
{
    let (user_id, vote_count) = winner?;
    let profile = lookup(&user_id)?;
    Some(WinnerResult {
        user_id,
        vote_count,
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoteCategory;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::cell::Cell;

    fn votes_for(candidates: &[&str]) -> Vec<Vote> {
        let start = Utc.with_ymd_and_hms(2026, 10, 10, 23, 0, 0).unwrap();
        candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| Vote {
                match_id: "m1".to_string(),
                voter_id: format!("voter{}", i),
                voted_user_id: candidate.to_string(),
                category: VoteCategory::Craque,
                created_at: start + Duration::minutes(i as i64),
            })
            .collect()
    }

    fn ana(id: &str) -> Option<Profile> {
        Some(Profile {
            id: id.to_string(),
            full_name: "Ana".to_string(),
            avatar_url: None,
        })
    }

    #[test]
    fn empty_input_has_no_winner() {
        let t = tally(&[]);
        assert!(t.is_empty());
        assert_eq!(resolve_winner(&t), None);
    }

    #[test]
    fn every_vote_is_counted_once() {
        let votes = votes_for(&["A", "B", "A", "C", "A", "B"]);
        let t = tally(&votes);
        assert_eq!(t.total() as usize, votes.len());
        assert_eq!(t.get("A"), Some(3));
        assert_eq!(t.get("B"), Some(2));
        assert_eq!(t.get("C"), Some(1));
        assert_eq!(t.get("D"), None);
    }

    #[test]
    fn clear_winner_is_independent_of_input_order() {
        let mut votes = votes_for(&["B", "A", "A", "C", "A"]);
        let expected = Some(("A".to_string(), 3));
        assert_eq!(resolve_winner(&tally(&votes)), expected);

        votes.reverse();
        assert_eq!(resolve_winner(&tally(&votes)), expected);

        votes.rotate_left(2);
        assert_eq!(resolve_winner(&tally(&votes)), expected);
    }

    #[test]
    fn tie_goes_to_the_earliest_cast_vote() {
        let votes = votes_for(&["A", "B"]);
        assert_eq!(resolve_winner(&tally(&votes)), Some(("A".to_string(), 1)));

        // Same votes handed over in reverse: casting time still decides.
        let reversed: Vec<Vote> = votes.iter().rev().cloned().collect();
        assert_eq!(resolve_winner(&tally(&reversed)), Some(("A".to_string(), 1)));
    }

    #[test]
    fn later_candidate_must_strictly_exceed_to_win() {
        let votes = votes_for(&["B", "A", "A", "B", "C"]);
        assert_eq!(resolve_winner(&tally(&votes)), Some(("B".to_string(), 2)));
    }

    #[test]
    fn no_winner_skips_the_lookup() {
        let called = Cell::new(false);
        let view = build_winner_view(None, |id| {
            called.set(true);
            ana(id)
        });
        assert!(view.is_none());
        assert!(!called.get());
    }

    #[test]
    fn missing_profile_suppresses_the_winner() {
        let view = build_winner_view(Some(("A".to_string(), 3)), |_| None);
        assert!(view.is_none());
    }

    #[test]
    fn end_to_end_winner_view() {
        let votes = votes_for(&["A", "A", "B"]);
        let t = tally(&votes);
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![("A", 2), ("B", 1)]);

        let winner = resolve_winner(&t);
        assert_eq!(winner, Some(("A".to_string(), 2)));

        let view = build_winner_view(winner, ana).unwrap();
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({
                "user_id": "A",
                "vote_count": 2,
                "profile": { "full_name": "Ana", "avatar_url": null }
            })
        );
    }
}
