mod repository;

pub use repository::{MatchFilter, MatchRepository, ProfileRepository, SortOrder, VoteRepository};

use crate::error::{PelaError, Result};
use crate::models::{
    Group, GroupRole, Match, Membership, Profile, RsvpStatus, Transaction, TransactionKind, Vote,
};
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};

pub struct Database {
    pool: SqlitePool,
}

// Fixed-width UTC timestamps so that text comparison in SQL is chronological.
pub(crate) fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn from_db_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PelaError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

impl Database {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self> {
        // Create database if it doesn't exist
        if !db_url.contains(":memory:") && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        // Connect to the database
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;

        // Initialize schema
        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory database.
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        let statements = [
            // Display names and avatars, keyed by Discord user id
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                avatar_url TEXT,
                updated_at TEXT NOT NULL
            );
            "#,
            // Group names are unique within a guild
            r#"
            CREATE TABLE IF NOT EXISTS player_groups (
                id TEXT PRIMARY KEY,
                guild_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (guild_id, name)
            );
            "#,
            // Membership with the admin/member role
            r#"
            CREATE TABLE IF NOT EXISTS group_members (
                group_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                joined_at TEXT NOT NULL,
                PRIMARY KEY (group_id, user_id),
                FOREIGN KEY (group_id) REFERENCES player_groups(id) ON DELETE CASCADE
            );
            "#,
            // Scheduled matches and where their results get posted
            r#"
            CREATE TABLE IF NOT EXISTS matches (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                location TEXT NOT NULL,
                scheduled_at TEXT NOT NULL,
                channel_id TEXT,
                results_announced BOOLEAN NOT NULL DEFAULT FALSE,
                FOREIGN KEY (group_id) REFERENCES player_groups(id) ON DELETE CASCADE
            );
            "#,
            // RSVPs
            r#"
            CREATE TABLE IF NOT EXISTS match_participants (
                match_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (match_id, user_id),
                FOREIGN KEY (match_id) REFERENCES matches(id) ON DELETE CASCADE
            );
            "#,
            // One craque and one bagre vote per voter and match
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                match_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                voted_user_id TEXT NOT NULL,
                category TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (match_id, voter_id, category),
                FOREIGN KEY (match_id) REFERENCES matches(id) ON DELETE CASCADE
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS votes_by_match_category ON votes (match_id, category);
            "#,
            // Group cash book, amounts in cents
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (group_id) REFERENCES player_groups(id) ON DELETE CASCADE
            );
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(pool).await?;
        }

        Ok(())
    }

    // --- Profiles ---

    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, avatar_url, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET full_name = excluded.full_name, avatar_url = excluded.avatar_url, updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(to_db_time(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts a profile only if the user has none yet, so a name chosen with
    /// `/pelada perfil` is not overwritten by the Discord username.
    pub async fn ensure_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, avatar_url, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET avatar_url = excluded.avatar_url
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(to_db_time(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let row = sqlx::query("SELECT id, full_name, avatar_url FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Profile {
            id: row.get("id"),
            full_name: row.get("full_name"),
            avatar_url: row.get("avatar_url"),
        }))
    }

    // --- Groups ---

    /// Creates the group and makes its creator the first admin.
    pub async fn create_group(&self, group: &Group) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Insert the group, mapping a duplicate name to a user error
        let inserted = sqlx::query(
            r#"
            INSERT INTO player_groups (id, guild_id, name, created_by, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&group.id)
        .bind(&group.guild_id)
        .bind(&group.name)
        .bind(&group.created_by)
        .bind(to_db_time(&group.created_at))
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                return Err(PelaError::InvalidInput(format!(
                    "a group named '{}' already exists here",
                    group.name
                )));
            }
            return Err(e.into());
        }

        // The creator administers the group
        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, role, joined_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&group.id)
        .bind(&group.created_by)
        .bind(GroupRole::Admin.as_str())
        .bind(to_db_time(&group.created_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn group_by_name(&self, guild_id: &str, name: &str) -> Result<Group> {
        let row = sqlx::query(
            r#"
            SELECT id, guild_id, name, created_by, created_at
            FROM player_groups
            WHERE guild_id = ? AND name = ?
            "#,
        )
        .bind(guild_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PelaError::NotFound(format!("Grupo '{}'", name)))?;

        Ok(Group {
            id: row.get("id"),
            guild_id: row.get("guild_id"),
            name: row.get("name"),
            created_by: row.get("created_by"),
            created_at: from_db_time(&row.get::<String, _>("created_at"))?,
        })
    }

    /// Adds a member; joining a group twice keeps the existing role.
    pub async fn join_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, role, joined_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(group_id, user_id) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(GroupRole::Member.as_str())
        .bind(to_db_time(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn membership(&self, group_id: &str, user_id: &str) -> Result<Option<Membership>> {
        let row = sqlx::query(
            "SELECT group_id, user_id, role FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Membership {
                group_id: row.get("group_id"),
                user_id: row.get("user_id"),
                role: row.get::<String, _>("role").parse()?,
            })
        })
        .transpose()
    }

    // --- Matches ---

    pub async fn create_match(&self, game: &Match) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO matches (id, group_id, location, scheduled_at, channel_id, results_announced)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&game.id)
        .bind(&game.group_id)
        .bind(&game.location)
        .bind(to_db_time(&game.scheduled_at))
        .bind(&game.channel_id)
        .bind(game.results_announced)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_match(&self, match_id: &str) -> Result<Match> {
        let row = sqlx::query(
            r#"
            SELECT id, group_id, location, scheduled_at, channel_id, results_announced
            FROM matches
            WHERE id = ?
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PelaError::NotFound(format!("Partida {}", match_id)))?;

        match_from_row(&row)
    }

    pub async fn set_rsvp(&self, match_id: &str, user_id: &str, status: RsvpStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO match_participants (match_id, user_id, status, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(match_id, user_id)
            DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at
            "#,
        )
        .bind(match_id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(to_db_time(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn rsvp_status(&self, match_id: &str, user_id: &str) -> Result<Option<RsvpStatus>> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM match_participants WHERE match_id = ? AND user_id = ?",
        )
        .bind(match_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        status.map(|s| s.parse()).transpose()
    }

    pub async fn confirmed_count(&self, match_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM match_participants WHERE match_id = ? AND status = ?",
        )
        .bind(match_id)
        .bind(RsvpStatus::Confirmed.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Matches whose voting window closed before `cutoff` and whose results
    /// still have to be posted.
    pub async fn matches_pending_announcement(&self, cutoff: DateTime<Utc>) -> Result<Vec<Match>> {
        sqlx::query(
            r#"
            SELECT id, group_id, location, scheduled_at, channel_id, results_announced
            FROM matches
            WHERE scheduled_at < ? AND results_announced = FALSE AND channel_id IS NOT NULL
            ORDER BY scheduled_at
            "#,
        )
        .bind(to_db_time(&cutoff))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(match_from_row)
        .collect()
    }

    pub async fn mark_results_announced(&self, match_id: &str) -> Result<()> {
        sqlx::query("UPDATE matches SET results_announced = TRUE WHERE id = ?")
            .bind(match_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Votes ---

    /// Stores a vote. Each voter has one vote per match and category, and a
    /// stored vote is never changed.
    pub async fn cast_vote(&self, vote: &Vote) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO votes (match_id, voter_id, voted_user_id, category, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vote.match_id)
        .bind(&vote.voter_id)
        .bind(&vote.voted_user_id)
        .bind(vote.category.as_str())
        .bind(to_db_time(&vote.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(PelaError::AlreadyVoted),
            Err(e) => Err(e.into()),
        }
    }

    // --- Transactions ---

    pub async fn record_transaction(&self, transaction: &Transaction) -> Result<()> {
        if transaction.amount_cents <= 0 {
            return Err(PelaError::InvalidInput("amount must be positive".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO transactions (id, group_id, user_id, kind, amount_cents, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.group_id)
        .bind(&transaction.user_id)
        .bind(transaction.kind.as_str())
        .bind(transaction.amount_cents)
        .bind(&transaction.description)
        .bind(to_db_time(&transaction.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Income minus expenses, in cents.
    pub async fn group_balance(&self, group_id: &str) -> Result<i64> {
        let balance: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE WHEN kind = ? THEN amount_cents ELSE -amount_cents END), 0)
            FROM transactions
            WHERE group_id = ?
            "#,
        )
        .bind(TransactionKind::Income.as_str())
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(balance)
    }

    pub async fn recent_transactions(&self, group_id: &str, limit: u32) -> Result<Vec<Transaction>> {
        sqlx::query(
            r#"
            SELECT id, group_id, user_id, kind, amount_cents, description, created_at
            FROM transactions
            WHERE group_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(group_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            Ok(Transaction {
                id: row.get("id"),
                group_id: row.get("group_id"),
                user_id: row.get("user_id"),
                kind: row.get::<String, _>("kind").parse()?,
                amount_cents: row.get("amount_cents"),
                description: row.get("description"),
                created_at: from_db_time(&row.get::<String, _>("created_at"))?,
            })
        })
        .collect()
    }
}

pub(crate) fn match_from_row(row: &SqliteRow) -> Result<Match> {
    Ok(Match {
        id: row.get("id"),
        group_id: row.get("group_id"),
        location: row.get("location"),
        scheduled_at: from_db_time(&row.get::<String, _>("scheduled_at"))?,
        channel_id: row.get("channel_id"),
        results_announced: row.get("results_announced"),
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
