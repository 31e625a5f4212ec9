pub mod format;
pub mod vote;

use crate::auth::Identity;
use crate::error::{PelaError, Result};
use crate::models::Profile;
use crate::AppState;
use log::{error, info, warn};
use serenity::builder::CreateEmbed;
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOption, CommandDataOptionValue,
};
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::user::User;
use serenity::prelude::*;

/// Options of the sub-command a slash command was invoked with.
pub struct SubCommand<'a> {
    pub name: &'a str,
    options: &'a [CommandDataOption],
}

impl<'a> SubCommand<'a> {
    pub fn from_command(command: &'a ApplicationCommandInteraction) -> Option<Self> {
        command.data.options.first().map(|option| SubCommand {
            name: option.name.as_str(),
            options: &option.options,
        })
    }

    fn find(&self, name: &str) -> Option<&'a CommandDataOption> {
        self.options.iter().find(|option| option.name == name)
    }

    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.find(name)?
            .value
            .as_ref()?
            .as_str()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn required_str(&self, name: &str) -> Result<&'a str> {
        self.str(name)
            .ok_or_else(|| PelaError::InvalidInput(format!("faltou o campo '{}'", name)))
    }

    pub fn user(&self, name: &str) -> Option<&'a User> {
        match self.find(name)?.resolved.as_ref()? {
            CommandDataOptionValue::User(user, _) => Some(user),
            _ => None,
        }
    }

    pub fn required_user(&self, name: &str) -> Result<&'a User> {
        self.user(name)
            .ok_or_else(|| PelaError::InvalidInput(format!("faltou o campo '{}'", name)))
    }
}

pub fn identity_of(user: &User) -> Identity {
    Identity::new(user.id.to_string())
}

/// Profile derived from a Discord account, used until the player sets a name.
pub fn discord_profile(user: &User) -> Profile {
    Profile {
        id: user.id.to_string(),
        full_name: user.name.clone(),
        avatar_url: user.avatar_url(),
    }
}

pub fn guild_id_of(command: &ApplicationCommandInteraction) -> Result<String> {
    command
        .guild_id
        .map(|id| id.to_string())
        .ok_or_else(|| PelaError::InvalidInput("use este comando dentro de um servidor".to_string()))
}

pub async fn respond(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    content: impl ToString,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(content).ephemeral(ephemeral))
        })
        .await?;
    Ok(())
}

pub async fn respond_embed<F>(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    ephemeral: bool,
    build: F,
) -> Result<()>
where
    F: FnOnce(&mut CreateEmbed) -> &mut CreateEmbed,
{
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.embed(build).ephemeral(ephemeral))
        })
        .await?;
    Ok(())
}

pub async fn handle_command(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<()> {
    info!("Received command: {} from {}", command.data.name, command.user.id);

    // Keep a profile for everyone who talks to the bot.
    state.database.ensure_profile(&discord_profile(&command.user)).await?;

    match command.data.name.as_str() {
        "pelada" => crate::commands::pelada::handle_pelada_command(state, ctx, command).await,
        other => Err(PelaError::InvalidInput(format!("comando desconhecido '{}'", other))),
    }
}

pub async fn handle_interaction(state: &AppState, ctx: &Context, interaction: Interaction) {
    match interaction {
        Interaction::ApplicationCommand(command) => {
            if let Err(why) = handle_command(state, ctx, &command).await {
                match why {
                    PelaError::Database(_) | PelaError::Discord(_) | PelaError::Corrupt(_) => {
                        error!("Command '{}' failed: {:?}", command.data.name, why)
                    }
                    _ => info!("Command '{}' rejected: {}", command.data.name, why),
                }
                if let Err(e) = respond(ctx, &command, why.user_message(), true).await {
                    warn!("Could not report error to user {}: {}", command.user.id, e);
                }
            }
        }
        _ => {
            warn!("Unhandled interaction type: {:?}", interaction.kind());
        }
    }
}
