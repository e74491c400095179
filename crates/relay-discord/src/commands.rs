//! Discord slash commands: `/chat`, `/reset`, `/private`, `/public`,
//! `/replyall`, `/switchpersona`, `/help`.
//!
//! Registration happens in `ready()`. Interactions are dispatched from
//! `interaction_create` in the event handler.

use std::sync::Arc;

use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse,
};
use serenity::model::application::{Command, CommandInteraction, CommandOptionType};
use serenity::prelude::Context;
use tracing::{info, warn};

use relay_agent::persona::PersonaError;
use relay_agent::pipeline::MessageQueue;
use relay_agent::Session;

use crate::target::DiscordTarget;

const HELP_TEXT: &str = "**Commands**\n\
    - `/chat [message]`: ask the assistant\n\
    - `/reset`: forget the conversation and restore the default persona\n\
    - `/private`: replies to `/chat` are only visible to you\n\
    - `/public`: replies to `/chat` are visible to everyone\n\
    - `/replyall`: toggle answering every message instead of mentions only\n\
    - `/switchpersona [persona]`: switch persona (resets the conversation)\n\
    - `/help`: show this help";

const REPLY_ALL_WARNING: &str = "> **WARN: Reply-all mode is on. \
    Use `/replyall` again to switch back before using slash commands.**";

/// Register global slash commands. Call from `ready()`.
pub async fn register_commands(ctx: &Context, session: &Arc<Session>) {
    let mut persona_option = CreateCommandOption::new(
        CommandOptionType::String,
        "persona",
        "Persona to switch to",
    )
    .required(true);
    // Discord caps choices at 25.
    for name in session.personas().names().into_iter().take(25) {
        persona_option = persona_option.add_string_choice(name, name);
    }

    let commands = vec![
        CreateCommand::new("chat")
            .description("Have a chat with the assistant")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "message", "Your message")
                    .required(true),
            ),
        CreateCommand::new("reset").description("Reset the conversation history"),
        CreateCommand::new("private").description("Make /chat replies visible only to you"),
        CreateCommand::new("public").description("Make /chat replies visible to everyone"),
        CreateCommand::new("replyall").description("Toggle replying to every message"),
        CreateCommand::new("switchpersona")
            .description("Switch the assistant persona")
            .add_option(persona_option),
        CreateCommand::new("help").description("Show available commands"),
    ];

    match Command::set_global_commands(&ctx.http, commands).await {
        Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
        Err(e) => warn!(error = %e, "failed to register global slash commands"),
    }
}

/// Dispatch a slash command interaction to the appropriate handler.
pub async fn handle_interaction(
    queue: &MessageQueue<DiscordTarget>,
    ctx: &Context,
    command: &CommandInteraction,
) {
    let session = queue.session();
    let result = match command.data.name.as_str() {
        "chat" => handle_chat(queue, ctx, command).await,
        "reset" => {
            session.reset().await;
            respond(ctx, command, "> **INFO: I have forgotten everything.**", false).await
        }
        "private" => {
            session.set_private_replies(true);
            respond(ctx, command, "> **INFO: Next, replies to /chat will be private.**", false)
                .await
        }
        "public" => {
            session.set_private_replies(false);
            respond(ctx, command, "> **INFO: Next, replies to /chat will be public.**", false)
                .await
        }
        "replyall" => {
            let on = session.toggle_reply_all();
            info!(reply_all = on, user = %command.user.id, "reply-all toggled");
            let text = if on {
                "> **INFO: Now answering every message in the channel. Slash `/chat` is disabled.**"
            } else {
                "> **INFO: Back to normal mode. Mention me or use `/chat`.**"
            };
            respond(ctx, command, text, false).await
        }
        "switchpersona" => handle_switch_persona(session, ctx, command).await,
        "help" => respond(ctx, command, HELP_TEXT, false).await,
        _ => respond(ctx, command, "Unknown command.", true).await,
    };

    if let Err(e) = result {
        warn!(command = %command.data.name, error = %e, "slash command error");
    }
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> &'a str {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
        .unwrap_or("")
}

/// `/chat message:String`: queued like a mention; the queue defers the response.
async fn handle_chat(
    queue: &MessageQueue<DiscordTarget>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    if queue.session().reply_all() {
        return respond(ctx, command, REPLY_ALL_WARNING, true).await;
    }

    let message = string_option(command, "message").trim();
    if message.is_empty() {
        return respond(ctx, command, "Please provide a message.", true).await;
    }

    info!(user = %command.user.id, channel = %command.channel_id, "/chat received");
    let target = DiscordTarget::from_interaction(Arc::clone(&ctx.http), command);
    if let Err(e) = queue.enqueue(target, message.to_string()).await {
        warn!(error = %e, "failed to enqueue /chat");
    }
    Ok(())
}

/// `/switchpersona persona:String`: deferred, since priming calls the model.
async fn handle_switch_persona(
    session: &Arc<Session>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    let name = string_option(command, "persona").trim();

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let text = match session.switch_persona(name).await {
        Ok(_) => format!("> **INFO: Switched to persona `{name}`.**"),
        Err(PersonaError::Unknown(_)) => format!(
            "> **ERROR: Unknown persona `{name}`. Available: {}**",
            session.personas().names().join(", ")
        ),
        Err(PersonaError::Provider(e)) => {
            warn!(persona = name, error = %e, "persona priming failed");
            format!("> **ERROR: Switched to `{name}`, but priming the model failed.**")
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
        .await
        .map(|_| ())
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    text: &str,
    ephemeral: bool,
) -> Result<(), serenity::Error> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(ephemeral),
            ),
        )
        .await
}
