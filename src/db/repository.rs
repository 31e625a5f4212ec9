use super::{from_db_time, match_from_row, to_db_time, Database};
use crate::error::Result;
use crate::models::{Match, Profile, RsvpStatus, Vote, VoteCategory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Narrows the matches returned for a player. Both bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<u32>,
}

#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Matches the user confirmed presence for, ordered by kickoff time.
    async fn matches_for_user(&self, user_id: &str, filter: MatchFilter) -> Result<Vec<Match>>;
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Votes of one match and category, oldest first.
    async fn votes_for(&self, match_id: &str, category: VoteCategory) -> Result<Vec<Vote>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>>;
}

#[async_trait]
impl MatchRepository for Database {
    async fn matches_for_user(&self, user_id: &str, filter: MatchFilter) -> Result<Vec<Match>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT m.id, m.group_id, m.location, m.scheduled_at, m.channel_id, m.results_announced
            FROM matches m
            JOIN match_participants p ON p.match_id = m.id
            WHERE p.user_id = "#,
        );
        query.push_bind(user_id.to_string());
        query.push(" AND p.status = ");
        query.push_bind(RsvpStatus::Confirmed.as_str());

        if let Some(before) = filter.before {
            query.push(" AND m.scheduled_at <= ");
            query.push_bind(to_db_time(&before));
        }
        if let Some(after) = filter.after {
            query.push(" AND m.scheduled_at >= ");
            query.push_bind(to_db_time(&after));
        }

        query.push(match filter.order {
            SortOrder::Ascending => " ORDER BY m.scheduled_at ASC",
            SortOrder::Descending => " ORDER BY m.scheduled_at DESC",
        });

        if let Some(limit) = filter.limit {
            query.push(" LIMIT ");
            query.push_bind(limit);
        }

        query
            .build()
            .fetch_all(self.pool())
            .await?
            .iter()
            .map(match_from_row)
            .collect()
    }
}

#[async_trait]
impl VoteRepository for Database {
    async fn votes_for(&self, match_id: &str, category: VoteCategory) -> Result<Vec<Vote>> {
        sqlx::query(
            r#"
            SELECT match_id, voter_id, voted_user_id, created_at
            FROM votes
            WHERE match_id = ? AND category = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(match_id)
        .bind(category.as_str())
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(|row| {
            Ok(Vote {
                match_id: row.get("match_id"),
                voter_id: row.get("voter_id"),
                voted_user_id: row.get("voted_user_id"),
                category,
                created_at: from_db_time(&row.get::<String, _>("created_at"))?,
            })
        })
        .collect()
    }
}

#[async_trait]
impl ProfileRepository for Database {
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.get_profile(user_id).await
    }
}
