use crate::db::{MatchFilter, MatchRepository, ProfileRepository, SortOrder, VoteRepository};
use crate::error::Result;
use crate::models::{Match, VoteCategory, WinnerResult};
use crate::voting::{build_winner_view, resolve_winner, tally};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MatchResults {
    pub craque: Option<WinnerResult>,
    pub bagre: Option<WinnerResult>,
}

/// What a player sees on `/pelada painel`.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub last_match: Option<Match>,
    pub next_match: Option<Match>,
    pub matches_played: usize,
    /// Winners of `last_match`; both are `None` when there is no last match.
    pub craque: Option<WinnerResult>,
    pub bagre: Option<WinnerResult>,
}

/// Winner of one match and category. Votes are fetched first; the profile is
/// only looked up once a winner is known.
pub async fn match_winner<R>(
    repo: &R,
    match_id: &str,
    category: VoteCategory,
) -> Result<Option<WinnerResult>>
where
    R: VoteRepository + ProfileRepository + ?Sized,
{
    let votes = repo.votes_for(match_id, category).await?;
    let winner = resolve_winner(&tally(&votes));

    let profile = match &winner {
        Some((user_id, _)) => repo.profile(user_id).await?,
        None => None,
    };

    let view = build_winner_view(winner, |_| profile);
    debug!(
        "{} of match {}: {}",
        category,
        match_id,
        view.as_ref().map(|w| w.user_id.as_str()).unwrap_or("none")
    );
    Ok(view)
}

pub async fn match_results<R>(repo: &R, match_id: &str) -> Result<MatchResults>
where
    R: VoteRepository + ProfileRepository + ?Sized,
{
    Ok(MatchResults {
        craque: match_winner(repo, match_id, VoteCategory::Craque).await?,
        bagre: match_winner(repo, match_id, VoteCategory::Bagre).await?,
    })
}

pub async fn load_dashboard<R>(repo: &R, user_id: &str, now: DateTime<Utc>) -> Result<Dashboard>
where
    R: MatchRepository + VoteRepository + ProfileRepository + ?Sized,
{
    let played = repo
        .matches_for_user(
            user_id,
            MatchFilter {
                before: Some(now),
                order: SortOrder::Descending,
                ..Default::default()
            },
        )
        .await?;

    let next_match = repo
        .matches_for_user(
            user_id,
            MatchFilter {
                // a match kicking off right now counts as played
                after: Some(now + Duration::seconds(1)),
                order: SortOrder::Ascending,
                limit: Some(1),
                ..Default::default()
            },
        )
        .await?
        .into_iter()
        .next();

    let matches_played = played.len();
    let last_match = played.into_iter().next();

    // Winners are only looked up for the last played match
    let MatchResults { craque, bagre } = match &last_match {
        Some(m) => match_results(repo, &m.id).await?,
        None => MatchResults { craque: None, bagre: None },
    };

    Ok(Dashboard {
        last_match,
        next_match,
        matches_played,
        craque,
        bagre,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::PelaError;
    use crate::models::{Group, Profile, RsvpStatus, Vote};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRepo {
        matches: Vec<Match>,
        votes: Vec<Vote>,
        profiles: HashMap<String, Profile>,
        profile_lookups: Mutex<Vec<String>>,
        fail_votes: bool,
    }

    #[async_trait]
    impl MatchRepository for FakeRepo {
        async fn matches_for_user(&self, _user_id: &str, filter: MatchFilter) -> Result<Vec<Match>> {
            let mut found: Vec<Match> = self
                .matches
                .iter()
                .filter(|m| filter.before.map_or(true, |b| m.scheduled_at <= b))
                .filter(|m| filter.after.map_or(true, |a| m.scheduled_at >= a))
                .cloned()
                .collect();
            found.sort_by_key(|m| m.scheduled_at);
            if filter.order == SortOrder::Descending {
                found.reverse();
            }
            if let Some(limit) = filter.limit {
                found.truncate(limit as usize);
            }
            Ok(found)
        }
    }

    #[async_trait]
    impl VoteRepository for FakeRepo {
        async fn votes_for(&self, match_id: &str, category: VoteCategory) -> Result<Vec<Vote>> {
            if self.fail_votes {
                return Err(PelaError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self
                .votes
                .iter()
                .filter(|v| v.match_id == match_id && v.category == category)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl ProfileRepository for FakeRepo {
        async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
            self.profile_lookups.lock().unwrap().push(user_id.to_string());
            Ok(self.profiles.get(user_id).cloned())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn game(id: &str, days_from_now: i64) -> Match {
        Match {
            id: id.to_string(),
            group_id: "g".to_string(),
            location: "Arena".to_string(),
            scheduled_at: now() + Duration::days(days_from_now),
            channel_id: None,
            results_announced: false,
        }
    }

    fn vote(match_id: &str, voter: &str, voted: &str, category: VoteCategory, minute: i64) -> Vote {
        Vote {
            match_id: match_id.to_string(),
            voter_id: voter.to_string(),
            voted_user_id: voted.to_string(),
            category,
            created_at: now() - Duration::days(1) + Duration::minutes(minute),
        }
    }

    fn profile(id: &str, name: &str) -> (String, Profile) {
        (
            id.to_string(),
            Profile {
                id: id.to_string(),
                full_name: name.to_string(),
                avatar_url: None,
            },
        )
    }

    #[tokio::test]
    async fn no_votes_means_no_winner_and_no_profile_lookup() {
        let repo = FakeRepo::default();
        let winner = match_winner(&repo, "m1", VoteCategory::Craque).await.unwrap();
        assert!(winner.is_none());
        assert!(repo.profile_lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn winner_profile_is_fetched_once() {
        let repo = FakeRepo {
            votes: vec![
                vote("m1", "v1", "A", VoteCategory::Craque, 0),
                vote("m1", "v2", "A", VoteCategory::Craque, 1),
                vote("m1", "v3", "B", VoteCategory::Craque, 2),
            ],
            profiles: HashMap::from([profile("A", "Ana"), profile("B", "Bia")]),
            ..Default::default()
        };

        let winner = match_winner(&repo, "m1", VoteCategory::Craque).await.unwrap().unwrap();
        assert_eq!(winner.user_id, "A");
        assert_eq!(winner.vote_count, 2);
        assert_eq!(winner.profile.full_name, "Ana");
        assert_eq!(*repo.profile_lookups.lock().unwrap(), vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn deleted_winner_yields_no_result() {
        let repo = FakeRepo {
            votes: vec![vote("m1", "v1", "ghost", VoteCategory::Bagre, 0)],
            ..Default::default()
        };
        assert!(match_winner(&repo, "m1", VoteCategory::Bagre).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repository_failures_propagate() {
        let repo = FakeRepo { fail_votes: true, ..Default::default() };
        assert!(matches!(
            match_winner(&repo, "m1", VoteCategory::Craque).await,
            Err(PelaError::Database(_))
        ));
    }

    #[tokio::test]
    async fn dashboard_uses_the_most_recent_played_match() {
        let repo = FakeRepo {
            matches: vec![game("old", -14), game("last", -1), game("next", 6), game("later", 13)],
            votes: vec![
                vote("old", "v1", "B", VoteCategory::Craque, 0),
                vote("last", "v1", "A", VoteCategory::Craque, 0),
                vote("last", "v2", "B", VoteCategory::Bagre, 1),
            ],
            profiles: HashMap::from([profile("A", "Ana"), profile("B", "Bia")]),
            ..Default::default()
        };

        let dashboard = load_dashboard(&repo, "A", now()).await.unwrap();
        assert_eq!(dashboard.last_match.unwrap().id, "last");
        assert_eq!(dashboard.next_match.unwrap().id, "next");
        assert_eq!(dashboard.matches_played, 2);

        assert_eq!(dashboard.craque.unwrap().profile.full_name, "Ana");
        assert_eq!(dashboard.bagre.unwrap().profile.full_name, "Bia");
    }

    #[tokio::test]
    async fn new_player_gets_an_empty_dashboard() {
        let repo = FakeRepo::default();
        let dashboard = load_dashboard(&repo, "A", now()).await.unwrap();
        assert!(dashboard.last_match.is_none());
        assert!(dashboard.next_match.is_none());
        assert_eq!(dashboard.matches_played, 0);
        assert!(dashboard.craque.is_none());
        assert!(dashboard.bagre.is_none());
    }

    #[tokio::test]
    async fn pipeline_runs_against_sqlite() {
        let db = Database::in_memory().await.unwrap();
        let group = Group::new("guild".into(), "Quinta".into(), "ana".into());
        db.create_group(&group).await.unwrap();

        let played = Match::new(group.id.clone(), "Arena".into(), now() - Duration::hours(3), None);
        db.create_match(&played).await.unwrap();
        for player in ["ana", "bia", "caio"] {
            db.set_rsvp(&played.id, player, RsvpStatus::Confirmed).await.unwrap();
            let (_, p) = profile(player, &player.to_uppercase());
            db.upsert_profile(&p).await.unwrap();
        }

        // bia and caio tie with one vote each; bia's vote was cast first
        db.cast_vote(&vote(&played.id, "ana", "bia", VoteCategory::Craque, 5)).await.unwrap();
        db.cast_vote(&vote(&played.id, "bia", "caio", VoteCategory::Craque, 9)).await.unwrap();

        let dashboard = load_dashboard(&db, "ana", now()).await.unwrap();
        assert_eq!(dashboard.matches_played, 1);
        let craque = dashboard.craque.unwrap();
        assert_eq!((craque.user_id.as_str(), craque.vote_count), ("bia", 1));
        assert_eq!(craque.profile.full_name, "BIA");
        assert!(dashboard.bagre.is_none());
    }

    #[tokio::test]
    async fn dashboard_serializes_winners_at_the_top_level() {
        let repo = FakeRepo {
            matches: vec![game("last", -1)],
            votes: vec![vote("last", "v1", "A", VoteCategory::Craque, 0)],
            profiles: HashMap::from([profile("A", "Ana")]),
            ..Default::default()
        };

        let dashboard = load_dashboard(&repo, "A", now()).await.unwrap();
        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["matches_played"], 1);
        assert_eq!(json["craque"]["profile"]["full_name"], "Ana");
        assert!(json["bagre"].is_null());
        assert!(json.get("results").is_none());
    }
}
