use crate::dashboard::match_results;
use crate::db::Database;
use crate::error::{PelaError, Result};
use crate::handlers::vote::results_embed;
use crate::models::Match;
use crate::AppState;
use chrono::{DateTime, Duration, Utc};
use log::{error, info};
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::time::interval;

pub async fn announce_results_task(state: Arc<AppState>, ctx: Context) {
    info!("Starting background task to announce match results...");
    let mut interval = interval(StdDuration::from_secs(state.config.check_interval_seconds.max(1)));

    loop {
        interval.tick().await;
        // Matches that kicked off before the cutoff have closed voting
        let cutoff = voting_cutoff(Utc::now(), state.config.voting_window_hours);

        match state.database.matches_pending_announcement(cutoff).await {
            Ok(pending) => {
                if !pending.is_empty() {
                    info!("Found {} match(es) with closed voting.", pending.len());
                }
                for game in pending {
                    // Failed announcements stay pending and are retried next tick.
                    match announce(&state, &ctx, &game).await {
                        Ok(()) => info!("Announced results of match {}", game.id),
                        Err(e) => error!("Error announcing match {}: {}", game.id, e),
                    }
                }
            }
            Err(e) => {
                error!("Failed to query matches pending announcement: {}", e);
            }
        }
    }
}

fn voting_cutoff(now: DateTime<Utc>, window_hours: i64) -> DateTime<Utc> {
    Duration::try_hours(window_hours)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

async fn announce(state: &AppState, ctx: &Context, game: &Match) -> Result<()> {
    let channel_id = announcement_channel(&state.database, game).await?;

    // Tally both categories before posting
    let results = match_results(&state.database, &game.id).await?;
    let offset = state.config.utc_offset();

    // Send the embed; the match stays pending if Discord rejects it
    channel_id
        .send_message(&ctx.http, |message| {
            message
                .content("Votação encerrada!")
                .embed(|embed| results_embed(embed, game, &results, offset))
        })
        .await?;

    state.database.mark_results_announced(&game.id).await
}

/// Channel to post a match's results in. A match whose stored channel is
/// unusable is marked announced so it is not picked up again.
async fn announcement_channel(database: &Database, game: &Match) -> Result<ChannelId> {
    match parse_channel_id(game.channel_id.as_deref()) {
        Ok(channel_id) => Ok(channel_id),
        Err(e) => {
            database.mark_results_announced(&game.id).await?;
            Err(e)
        }
    }
}

fn parse_channel_id(raw: Option<&str>) -> Result<ChannelId> {
    raw.and_then(|id| id.parse::<u64>().ok())
        .map(ChannelId)
        .ok_or_else(|| PelaError::Corrupt(format!("invalid announcement channel {:?}", raw)))
}
