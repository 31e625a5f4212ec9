pub mod pelada;

use serenity::model::application::command::Command;
use serenity::prelude::*;

pub async fn register_commands(ctx: &Context) -> Result<(), serenity::Error> {
    Command::set_global_application_commands(&ctx.http, |commands| {
        commands.create_application_command(|command| pelada::create_pelada_command(command))
    })
    .await?;

    Ok(())
}
