use crate::auth::{require_group_admin, require_group_member};
use crate::dashboard::load_dashboard;
use crate::error::{PelaError, Result};
use crate::handlers::format::{
    format_brl, format_local, parse_amount_cents, parse_local_datetime, winner_line,
};
use crate::handlers::{discord_profile, guild_id_of, identity_of, respond, respond_embed, vote, SubCommand};
use crate::models::{Group, Match, Profile, RsvpStatus, Transaction, TransactionKind};
use crate::AppState;
use chrono::Utc;
use log::info;
use serenity::builder::{CreateApplicationCommand, CreateApplicationCommandOption};
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::prelude::*;
use serenity::utils::Colour;

const RECENT_TRANSACTIONS: u32 = 5;

fn string_option<'a>(
    option: &'a mut CreateApplicationCommandOption,
    name: &str,
    description: &str,
    required: bool,
) -> &'a mut CreateApplicationCommandOption {
    option
        .name(name)
        .description(description)
        .kind(CommandOptionType::String)
        .required(required)
}

pub fn create_pelada_command(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("pelada")
        .description("Organize sua pelada: grupos, partidas, presença, votos e caixa")
        .create_option(|option| {
            option
                .name("perfil")
                .description("Define o nome exibido nos resultados")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| string_option(sub, "nome", "Seu nome de jogador", true))
        })
        .create_option(|option| {
            option
                .name("criar-grupo")
                .description("Cria um grupo de pelada neste servidor")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| string_option(sub, "nome", "Nome do grupo", true))
        })
        .create_option(|option| {
            option
                .name("entrar")
                .description("Entra em um grupo de pelada")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| string_option(sub, "grupo", "Nome do grupo", true))
        })
        .create_option(|option| {
            option
                .name("marcar")
                .description("Marca uma partida (administradores)")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| string_option(sub, "grupo", "Nome do grupo", true))
                .create_sub_option(|sub| string_option(sub, "data", "DD/MM/AAAA HH:MM", true))
                .create_sub_option(|sub| string_option(sub, "local", "Onde vai ser", true))
        })
        .create_option(|option| {
            option
                .name("presenca")
                .description("Confirma ou desmarca presença em uma partida")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| string_option(sub, "partida", "ID da partida", true))
                .create_sub_option(|sub| {
                    string_option(sub, "resposta", "Vai jogar?", true)
                        .add_string_choice("Vou", "confirmed")
                        .add_string_choice("Não vou", "declined")
                })
        })
        .create_option(|option| {
            option
                .name("votar")
                .description("Vota no craque ou no bagre da partida")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| {
                    string_option(sub, "categoria", "Categoria do voto", true)
                        .add_string_choice("Craque", "craque")
                        .add_string_choice("Bagre", "bagre")
                })
                .create_sub_option(|sub| {
                    sub.name("jogador")
                        .description("Em quem você vota")
                        .kind(CommandOptionType::User)
                        .required(true)
                })
                .create_sub_option(|sub| {
                    string_option(sub, "partida", "ID da partida (padrão: sua última)", false)
                })
        })
        .create_option(|option| {
            option
                .name("resultado")
                .description("Mostra craque e bagre de uma partida")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| {
                    string_option(sub, "partida", "ID da partida (padrão: sua última)", false)
                })
        })
        .create_option(|option| {
            option
                .name("painel")
                .description("Seu resumo: última e próxima partida, craque e bagre")
                .kind(CommandOptionType::SubCommand)
        })
        .create_option(|option| {
            option
                .name("pagamento")
                .description("Registra uma entrada ou saída no caixa (administradores)")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| string_option(sub, "grupo", "Nome do grupo", true))
                .create_sub_option(|sub| {
                    string_option(sub, "tipo", "Entrada ou saída", true)
                        .add_string_choice("Entrada", "income")
                        .add_string_choice("Saída", "expense")
                })
                .create_sub_option(|sub| string_option(sub, "valor", "Ex.: 25,50", true))
                .create_sub_option(|sub| string_option(sub, "descricao", "Do que se trata", true))
        })
        .create_option(|option| {
            option
                .name("caixa")
                .description("Saldo e últimas movimentações do grupo")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| string_option(sub, "grupo", "Nome do grupo", true))
        })
}

pub async fn handle_pelada_command(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<()> {
    let args = SubCommand::from_command(command)
        .ok_or_else(|| PelaError::InvalidInput("nenhum subcomando informado".to_string()))?;

    match args.name {
        "perfil" => handle_profile(state, ctx, command, &args).await,
        "criar-grupo" => handle_create_group(state, ctx, command, &args).await,
        "entrar" => handle_join_group(state, ctx, command, &args).await,
        "marcar" => handle_schedule_match(state, ctx, command, &args).await,
        "presenca" => handle_rsvp(state, ctx, command, &args).await,
        "votar" => vote::handle_vote(state, ctx, command, &args).await,
        "resultado" => vote::handle_results(state, ctx, command, &args).await,
        "painel" => handle_dashboard(state, ctx, command).await,
        "pagamento" => handle_payment(state, ctx, command, &args).await,
        "caixa" => handle_cash(state, ctx, command, &args).await,
        other => Err(PelaError::InvalidInput(format!("subcomando desconhecido '{}'", other))),
    }
}

async fn handle_profile(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let name = args.required_str("nome")?;
    let profile = Profile {
        full_name: name.to_string(),
        ..discord_profile(&command.user)
    };
    state.database.upsert_profile(&profile).await?;

    respond(ctx, command, format!("Perfil atualizado: **{}**", profile.full_name), true).await
}

async fn handle_create_group(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let guild_id = guild_id_of(command)?;
    let group = Group::new(
        guild_id,
        args.required_str("nome")?.to_string(),
        command.user.id.to_string(),
    );
    state.database.create_group(&group).await?;
    info!("Group '{}' created by {}", group.name, group.created_by);

    respond(
        ctx,
        command,
        format!("Grupo **{}** criado. Você é o administrador.", group.name),
        false,
    )
    .await
}

async fn handle_join_group(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let group = state
        .database
        .group_by_name(&guild_id_of(command)?, args.required_str("grupo")?)
        .await?;
    state.database.join_group(&group.id, &command.user.id.to_string()).await?;

    respond(ctx, command, format!("Você está no grupo **{}**.", group.name), true).await
}

async fn handle_schedule_match(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let caller = identity_of(&command.user);
    let group = state
        .database
        .group_by_name(&guild_id_of(command)?, args.required_str("grupo")?)
        .await?;
    require_group_admin(&state.database, &caller, &group.id).await?;

    // Dates are typed in local time and must be in the future
    let offset = state.config.utc_offset();
    let scheduled_at = parse_local_datetime(args.required_str("data")?, offset)?;
    if scheduled_at <= Utc::now() {
        return Err(PelaError::InvalidInput("a data da partida já passou".to_string()));
    }

    // Results are announced in the channel the match was scheduled from
    let game = Match::new(
        group.id.clone(),
        args.required_str("local")?.to_string(),
        scheduled_at,
        Some(command.channel_id.to_string()),
    );
    state.database.create_match(&game).await?;
    info!("Match {} scheduled for group {}", game.id, group.id);

    respond_embed(ctx, command, false, |embed| {
        embed
            .title(format!("Pelada marcada: {}", group.name))
            .colour(Colour::DARK_GREEN)
            .field("Quando", format_local(&game.scheduled_at, offset), true)
            .field("Onde", &game.location, true)
            .field("Partida ID", &game.id, false)
            .footer(|footer| footer.text("Confirme com /pelada presenca"))
    })
    .await
}

async fn handle_rsvp(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let caller = identity_of(&command.user);
    let game = state.database.get_match(args.required_str("partida")?).await?;
    require_group_member(&state.database, &caller, &game.group_id).await?;

    // RSVPs close at kickoff
    if Utc::now() >= game.scheduled_at {
        return Err(PelaError::InvalidInput("a partida já começou".to_string()));
    }

    let status: RsvpStatus = args.required_str("resposta")?.parse()?;
    state.database.set_rsvp(&game.id, &caller.user_id, status).await?;
    let confirmed = state.database.confirmed_count(&game.id).await?;

    let answer = match status {
        RsvpStatus::Confirmed => "Presença confirmada",
        RsvpStatus::Declined => "Presença desmarcada",
    };
    respond(
        ctx,
        command,
        format!("{} em {}. Confirmados: {}.", answer, game.location, confirmed),
        true,
    )
    .await
}

async fn handle_dashboard(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<()> {
    let caller = identity_of(&command.user);
    let dashboard = load_dashboard(&state.database, &caller.user_id, Utc::now()).await?;
    let offset = state.config.utc_offset();

    // Render each part with its empty state
    let describe = |game: &Match| {
        format!("{} em {}", game.location, format_local(&game.scheduled_at, offset))
    };
    let next = dashboard
        .next_match
        .as_ref()
        .map(describe)
        .unwrap_or_else(|| "Nenhuma partida marcada".to_string());
    let last = dashboard
        .last_match
        .as_ref()
        .map(describe)
        .unwrap_or_else(|| "Você ainda não jogou".to_string());
    let craque = winner_line(
        dashboard.craque.as_ref(),
        "Ainda sem craque",
    );
    let bagre = winner_line(
        dashboard.bagre.as_ref(),
        "Ainda sem bagre",
    );

    respond_embed(ctx, command, true, |embed| {
        embed
            .title(format!("Painel de {}", command.user.name))
            .colour(Colour::BLUE)
            .field("Próxima partida", next, false)
            .field("Última partida", last, false)
            .field("Craque", craque, true)
            .field("Bagre", bagre, true)
            .field("Partidas jogadas", dashboard.matches_played, true)
    })
    .await
}

async fn handle_payment(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let caller = identity_of(&command.user);
    let group = state
        .database
        .group_by_name(&guild_id_of(command)?, args.required_str("grupo")?)
        .await?;
    require_group_admin(&state.database, &caller, &group.id).await?;

    let kind: TransactionKind = args.required_str("tipo")?.parse()?;
    let transaction = Transaction::new(
        group.id.clone(),
        caller.user_id.clone(),
        kind,
        parse_amount_cents(args.required_str("valor")?)?,
        args.required_str("descricao")?.to_string(),
    );
    state.database.record_transaction(&transaction).await?;
    info!("Transaction {} recorded for group {}", transaction.id, group.id);

    let label = match kind {
        TransactionKind::Income => "Entrada",
        TransactionKind::Expense => "Saída",
    };
    respond(
        ctx,
        command,
        format!(
            "{} de {} registrada no caixa de **{}**: {}",
            label,
            format_brl(transaction.amount_cents),
            group.name,
            transaction.description
        ),
        false,
    )
    .await
}

async fn handle_cash(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    args: &SubCommand<'_>,
) -> Result<()> {
    let caller = identity_of(&command.user);
    let group = state
        .database
        .group_by_name(&guild_id_of(command)?, args.required_str("grupo")?)
        .await?;
    require_group_member(&state.database, &caller, &group.id).await?;

    // Balance plus the latest movements
    let balance = state.database.group_balance(&group.id).await?;
    let recent = state.database.recent_transactions(&group.id, RECENT_TRANSACTIONS).await?;
    let offset = state.config.utc_offset();

    let history = if recent.is_empty() {
        "Nenhuma movimentação".to_string()
    } else {
        recent
            .iter()
            .map(|t| {
                format!(
                    "{} {} · {}",
                    t.created_at.with_timezone(&offset).format("%d/%m"),
                    format_brl(t.signed_amount()),
                    t.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    respond_embed(ctx, command, true, |embed| {
        embed
            .title(format!("Caixa de {}", group.name))
            .colour(if balance < 0 { Colour::RED } else { Colour::DARK_GREEN })
            .field("Saldo", format_brl(balance), false)
            .field("Últimas movimentações", history, false)
    })
    .await
}
