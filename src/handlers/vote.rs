use super::format::{format_local, winner_line};
use super::{discord_profile, identity_of, respond, respond_embed, SubCommand};
use crate::auth::{require_group_member, Identity};
use crate::dashboard::{match_results, MatchResults};
use crate::db::{Database, MatchFilter, MatchRepository, SortOrder};
use crate::error::{PelaError, Result};
use crate::models::{Match, Vote, VoteCategory};
use crate::voting::{validate_ballot, Ballot};
use crate::AppState;
use chrono::{FixedOffset, Utc};
use log::info;
use serenity::builder::CreateEmbed;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::prelude::*;
use serenity::utils::Colour;

/// Match named by the `partida` option, or the caller's latest played match.
async fn target_match(database: &Database, match_id: Option<&str>, user_id: &str) -> Result<Match> {
    if let Some(match_id) = match_id {
        return database.get_match(match_id).await;
    }

    let filter = MatchFilter {
        before: Some(Utc::now()),
        order: SortOrder::Descending,
        limit: Some(1),
        ..Default::default()
    };
    database
        .matches_for_user(user_id, filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PelaError::NotFound("Partida recente".to_string()))
}

pub async fn handle_vote(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let voter = identity_of(&command.user);
    let category: VoteCategory = args.required_str("categoria")?.parse()?;
    let candidate = args.required_user("jogador")?;
    let game = target_match(&state.database, args.str("partida"), &voter.user_id).await?;

    // The candidate may never have used the bot
    let candidate_id = candidate.id.to_string();
    state.database.ensure_profile(&discord_profile(candidate)).await?;

    // Window and presence checks
    let now = Utc::now();
    let ballot = Ballot {
        game: &game,
        voter_id: &voter.user_id,
        voter_rsvp: state.database.rsvp_status(&game.id, &voter.user_id).await?,
        voted_user_id: &candidate_id,
        voted_rsvp: state.database.rsvp_status(&game.id, &candidate_id).await?,
    };
    validate_ballot(&ballot, now, state.config.voting_window_hours)?;

    // Storage rejects a second vote in the same category
    state
        .database
        .cast_vote(&Vote {
            match_id: game.id.clone(),
            voter_id: voter.user_id.clone(),
            voted_user_id: candidate_id,
            category,
            created_at: now,
        })
        .await?;

    info!("Recorded {} vote: match_id={}, voter={}", category, game.id, voter.user_id);

    respond(
        ctx,
        command,
        format!("Voto de **{}** registrado para {}.", category, candidate.name),
        true,
    )
    .await
}

pub async fn handle_results(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let caller = identity_of(&command.user);
    let game = results_match(&state.database, &caller, args.str("partida")).await?;
    let results = match_results(&state.database, &game.id).await?;
    let offset = state.config.utc_offset();

    respond_embed(ctx, command, false, |embed| results_embed(embed, &game, &results, offset)).await
}

/// Match whose results the caller asked for. A match picked by ID is only
/// shown to members of its group.
async fn results_match(database: &Database, caller: &Identity, match_id: Option<&str>) -> Result<Match> {
    let game = target_match(database, match_id, &caller.user_id).await?;
    if match_id.is_some() {
        require_group_member(database, caller, &game.group_id).await?;
    }
    Ok(game)
}

pub fn results_embed<'a>(
    embed: &'a mut CreateEmbed,
    game: &Match,
    results: &MatchResults,
    offset: FixedOffset,
) -> &'a mut CreateEmbed {
    embed
        .title("Resultado da pelada")
        .description(format!("{} em {}", game.location, format_local(&game.scheduled_at, offset)))
        .colour(Colour::GOLD)
        .field(
            "Craque",
            winner_line(results.craque.as_ref(), "Ainda sem craque"),
            true,
        )
        .field(
            "Bagre",
            winner_line(results.bagre.as_ref(), "Ainda sem bagre"),
            true,
        )
        .footer(|footer| footer.text(format!("Partida {}", game.id)));

    if let Some(avatar) = results.craque.as_ref().and_then(|w| w.profile.avatar_url.as_ref()) {
        embed.thumbnail(avatar);
    }
    embed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Group, RsvpStatus};
    use chrono::Duration;

    async fn seeded() -> (Database, Match) {
        let db = Database::in_memory().await.unwrap();
        let group = Group::new("guild".into(), "Pelada de Quinta".into(), "admin".into());
        db.create_group(&group).await.unwrap();
        db.join_group(&group.id, "player").await.unwrap();
        let game = Match::new(group.id.clone(), "Arena".into(), Utc::now() - Duration::hours(2), None);
        db.create_match(&game).await.unwrap();
        db.set_rsvp(&game.id, "player", RsvpStatus::Confirmed).await.unwrap();
        (db, game)
    }

    #[tokio::test]
    async fn results_by_id_are_limited_to_group_members() {
        let (db, game) = seeded().await;

        let found = results_match(&db, &Identity::new("player"), Some(&game.id)).await.unwrap();
        assert_eq!(found.id, game.id);

        let err = results_match(&db, &Identity::new("outsider"), Some(&game.id)).await.unwrap_err();
        assert!(matches!(err, PelaError::Forbidden(_)));
    }

    #[tokio::test]
    async fn results_default_to_the_callers_latest_match() {
        let (db, game) = seeded().await;

        let found = results_match(&db, &Identity::new("player"), None).await.unwrap();
        assert_eq!(found.id, game.id);

        let err = results_match(&db, &Identity::new("outsider"), None).await.unwrap_err();
        assert!(matches!(err, PelaError::NotFound(_)));
    }
}
