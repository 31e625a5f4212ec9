mod auth;
mod commands;
mod config;
mod dashboard;
mod db;
mod error;
mod handlers;
mod models;
mod tasks;
mod voting;

use config::Config;
use db::Database;
use log::{error, info};
use serenity::async_trait;
use serenity::model::application::interaction::Interaction;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;

/// Shared by every interaction handler and the background task.
pub struct AppState {
    pub database: Database,
    pub config: Config,
}

struct Bot {
    state: Arc<AppState>,
}

#[async_trait]
impl EventHandler for Bot {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            handlers::handle_interaction(&state, &ctx, interaction).await;
        });
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        match commands::register_commands(&ctx).await {
            Ok(()) => info!("Successfully registered global slash commands."),
            Err(why) => error!("Failed to register slash commands: {:?}", why),
        }

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tasks::results_announcer::announce_results_task(state, ctx).await;
        });
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    let database = match Database::connect(&config.database_url, config.max_connections).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };

    let token = config.discord_token.clone();
    let state = Arc::new(AppState { database, config });

    // Slash commands only; no message content needed.
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_INTEGRATIONS;

    let mut client = match Client::builder(&token, intents)
        .event_handler(Bot { state })
        .await
    {
        Ok(client) => client,
        Err(why) => {
            error!("Error creating client: {:?}", why);
            return;
        }
    };

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }
}
