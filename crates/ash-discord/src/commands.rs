//! The single `/ash` slash command, with subcommands mapped onto
//! [`AshCommand`] (spec §4.13). Registered as a guild-scoped command in
//! `ready()`; parsed back out in `interaction_create`.

use ash_commands::AshCommand;
use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::{CommandDataOptionValue, CommandInteraction, CommandOptionType};
use serenity::prelude::Context;
use tracing::{info, warn};

/// Register the `/ash` command and its subcommands globally. Global
/// registration can take up to an hour to propagate on Discord's side;
/// acceptable here since Ash's command surface rarely changes.
pub async fn register_commands(ctx: &Context) {
    let notes_add = CreateCommandOption::new(CommandOptionType::SubCommand, "add", "Add a note")
        .add_sub_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "Who the note is about")
                .required(true),
        )
        .add_sub_option(
            CreateCommandOption::new(CommandOptionType::String, "text", "Note text").required(true),
        );
    let notes_view = CreateCommandOption::new(CommandOptionType::SubCommand, "view", "View notes")
        .add_sub_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "Whose notes to view")
                .required(true),
        );
    let notes_group = CreateCommandOption::new(
        CommandOptionType::SubCommandGroup,
        "notes",
        "Crisis response team notes",
    )
    .add_sub_option(notes_add)
    .add_sub_option(notes_view);

    let command = CreateCommand::new("ash")
        .description("Ash crisis-response bot commands")
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "status",
            "Check your opt-out status",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "optout",
            "Opt out of direct contact from Ash",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "optin",
            "Opt back in to direct contact from Ash",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "health",
            "Crisis response team: Ash component health",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "stats",
            "Crisis response team: point-in-time counters",
        ))
        .add_option(notes_group);

    match serenity::model::application::Command::set_global_commands(&ctx.http, vec![command]).await
    {
        Ok(cmds) => info!(count = cmds.len(), "registered /ash slash command"),
        Err(e) => warn!(error = %e, "failed to register /ash slash command"),
    }
}

/// Map a parsed `/ash ...` interaction onto [`AshCommand`]. Returns `None`
/// for a shape that should never occur once the command is registered as
/// above (unknown subcommand, malformed notes group).
pub fn parse_command(command: &CommandInteraction) -> Option<AshCommand> {
    if command.data.name != "ash" {
        return None;
    }

    let top = command.data.options.first()?;
    match top.name.as_str() {
        "status" => Some(AshCommand::Status),
        "optout" => Some(AshCommand::OptOut),
        "optin" => Some(AshCommand::OptIn),
        "health" => Some(AshCommand::Health),
        "stats" => Some(AshCommand::Stats),
        "notes" => {
            let CommandDataOptionValue::SubCommandGroup(ref group) = top.value else {
                return None;
            };
            let sub = group.first()?;
            match sub.name.as_str() {
                "add" => {
                    let CommandDataOptionValue::SubCommand(ref opts) = sub.value else {
                        return None;
                    };
                    let target_user_id = find_user(opts, "user")?;
                    let text = find_string(opts, "text")?;
                    Some(AshCommand::NotesAdd { target_user_id, text })
                }
                "view" => {
                    let CommandDataOptionValue::SubCommand(ref opts) = sub.value else {
                        return None;
                    };
                    let target_user_id = find_user(opts, "user")?;
                    Some(AshCommand::NotesView { target_user_id })
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn find_string(opts: &[serenity::model::application::CommandDataOption], name: &str) -> Option<String> {
    opts.iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.value {
            CommandDataOptionValue::String(s) => Some(s.clone()),
            _ => None,
        })
}

fn find_user(opts: &[serenity::model::application::CommandDataOption], name: &str) -> Option<String> {
    opts.iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.value {
            CommandDataOptionValue::User(id) => Some(id.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    // `CommandInteraction` has no public constructor outside serenity's
    // deserialization path, so `parse_command` is exercised indirectly via
    // the gateway's integration tests instead of unit tests here.
}
