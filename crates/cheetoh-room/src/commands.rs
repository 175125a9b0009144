//! Slash commands typed into the chat box.
//!
//! Parsing only recognises the fixed set in [`CommandName`]; any other
//! leading-slash line is ordinary chat text. Handlers read room state and
//! return a [`CommandResult`]. The room applies whatever state change the
//! result implies and decides who hears about it.

use uuid::Uuid;

use cheetoh_types::models::CameraAction;

use crate::directory::{Directory, Participant};
use crate::ledger::{MAX_MESSAGE_CHARS, clip};
use crate::requests::MAX_REASON_CHARS;

pub const COMMAND_MARKER: char = '/';
pub const PARTY_DURATION_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandName {
    Help,
    SlashList,
    Picture,
    Party,
    RequestAdmin,
    Grant,
    Camera,
}

impl CommandName {
    pub const ALL: [CommandName; 7] = [
        CommandName::Help,
        CommandName::SlashList,
        CommandName::Picture,
        CommandName::Party,
        CommandName::RequestAdmin,
        CommandName::Grant,
        CommandName::Camera,
    ];

    pub fn token(self) -> &'static str {
        match self {
            CommandName::Help => "/help",
            CommandName::SlashList => "/commands",
            CommandName::Picture => "/picture",
            CommandName::Party => "/cheetohparty",
            CommandName::RequestAdmin => "/requestadmin",
            CommandName::Grant => "/grant",
            CommandName::Camera => "/camera",
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            CommandName::Help => "/help - show this message",
            CommandName::SlashList => "/commands - list slash commands",
            CommandName::Picture => "/picture <url> - share a picture",
            CommandName::Party => "/cheetohparty - start a 10 second party",
            CommandName::RequestAdmin => "/requestadmin [reason] - ask the admins for admin powers",
            CommandName::Grant => "/grant <username> - give someone admin powers (admin)",
            CommandName::Camera => "/camera [on|off] - toggle your camera",
        }
    }

    pub fn admin_only(self) -> bool {
        matches!(self, CommandName::Grant)
    }

    fn lookup(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.token() == token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: CommandName,
    pub args: Vec<&'a str>,
}

/// Parse a chat line. `None` means "not a command, treat as chat".
pub fn parse(text: &str) -> Option<ParsedCommand<'_>> {
    let text = text.trim_start();
    if !text.starts_with(COMMAND_MARKER) {
        return None;
    }
    let mut tokens = text.split_whitespace();
    let name = CommandName::lookup(tokens.next()?)?;
    Some(ParsedCommand {
        name,
        args: tokens.collect(),
    })
}

/// Typed outcome of a command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Help(String),
    SlashList(Vec<String>),
    Picture { url: String },
    Party { duration_ms: u64 },
    RequestAdmin { reason: String },
    Grant { target: Uuid },
    Camera { action: CameraAction },
    Error(String),
    Success(String),
}

/// Read-only view of the room handed to handlers.
pub struct CommandContext<'a> {
    pub directory: &'a Directory,
    pub party_active: bool,
}

/// Run the handler registered for `command.name`.
pub fn execute(
    ctx: &CommandContext<'_>,
    requester: &Participant,
    command: &ParsedCommand<'_>,
) -> CommandResult {
    let handler: fn(&CommandContext<'_>, &Participant, &[&str]) -> CommandResult =
        match command.name {
            CommandName::Help => help,
            CommandName::SlashList => slash_list,
            CommandName::Picture => picture,
            CommandName::Party => party,
            CommandName::RequestAdmin => request_admin,
            CommandName::Grant => grant,
            CommandName::Camera => camera,
        };
    handler(ctx, requester, &command.args)
}

fn help(_ctx: &CommandContext<'_>, requester: &Participant, _args: &[&str]) -> CommandResult {
    let mut lines = vec!["Available commands:".to_string()];
    lines.extend(
        CommandName::ALL
            .into_iter()
            .filter(|name| requester.is_admin || !name.admin_only())
            .map(|name| format!("  {}", name.usage())),
    );
    CommandResult::Help(lines.join("\n"))
}

fn slash_list(_ctx: &CommandContext<'_>, _requester: &Participant, _args: &[&str]) -> CommandResult {
    CommandResult::SlashList(
        CommandName::ALL
            .into_iter()
            .map(|name| name.token().to_string())
            .collect(),
    )
}

fn picture(_ctx: &CommandContext<'_>, _requester: &Participant, args: &[&str]) -> CommandResult {
    match args.first() {
        Some(url) if url.len() <= MAX_MESSAGE_CHARS => CommandResult::Picture {
            url: (*url).to_string(),
        },
        _ => CommandResult::Error(format!("Usage: {}", CommandName::Picture.usage())),
    }
}

fn party(ctx: &CommandContext<'_>, _requester: &Participant, _args: &[&str]) -> CommandResult {
    if ctx.party_active {
        return CommandResult::Error("A Cheetoh party is already in progress!".to_string());
    }
    CommandResult::Party {
        duration_ms: PARTY_DURATION_MS,
    }
}

fn request_admin(_ctx: &CommandContext<'_>, requester: &Participant, args: &[&str]) -> CommandResult {
    if requester.is_admin {
        return CommandResult::Error("You are already an admin.".to_string());
    }
    let reason = clip(&args.join(" "), MAX_REASON_CHARS);
    CommandResult::RequestAdmin {
        reason: if reason.is_empty() {
            "No reason given".to_string()
        } else {
            reason
        },
    }
}

fn grant(ctx: &CommandContext<'_>, requester: &Participant, args: &[&str]) -> CommandResult {
    if !requester.is_admin {
        return CommandResult::Error("Only admins can grant admin powers.".to_string());
    }
    if args.is_empty() {
        return CommandResult::Error(format!("Usage: {}", CommandName::Grant.usage()));
    }
    let name = args.join(" ");
    match ctx.directory.find_by_username(&name, true) {
        None => CommandResult::Error(format!("No one here is called '{name}'.")),
        Some(target) if target.is_admin => {
            CommandResult::Error(format!("{} is already an admin.", target.username))
        }
        Some(target) => CommandResult::Grant { target: target.id },
    }
}

fn camera(_ctx: &CommandContext<'_>, requester: &Participant, args: &[&str]) -> CommandResult {
    let action = match args.first().map(|a| a.to_ascii_lowercase()) {
        None if requester.camera_on => CameraAction::Off,
        None => CameraAction::On,
        Some(arg) if arg == "on" => CameraAction::On,
        Some(arg) if arg == "off" => CameraAction::Off,
        Some(_) => {
            return CommandResult::Error(format!("Usage: {}", CommandName::Camera.usage()));
        }
    };
    CommandResult::Camera { action }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ContentFilter;

    fn room_with(names: &[&str]) -> (Directory, Vec<Uuid>) {
        let mut dir = Directory::new();
        let filter = ContentFilter::new(false);
        let ids = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let id = Uuid::new_v4();
                dir.register(id, &format!("10.0.0.{i}"));
                dir.rename(id, name, &filter).unwrap();
                id
            })
            .collect();
        (dir, ids)
    }

    fn run(dir: &Directory, who: Uuid, line: &str) -> CommandResult {
        let ctx = CommandContext {
            directory: dir,
            party_active: false,
        };
        let cmd = parse(line).expect("line should parse as a command");
        execute(&ctx, dir.get(who).unwrap(), &cmd)
    }

    #[test]
    fn parse_splits_name_and_args() {
        let cmd = parse("/grant   chester  cheetah").unwrap();
        assert_eq!(cmd.name, CommandName::Grant);
        assert_eq!(cmd.args, vec!["chester", "cheetah"]);
    }

    #[test]
    fn unknown_commands_are_chat() {
        assert!(parse("/shrug").is_none());
        assert!(parse("/HELP").is_none());
        assert!(parse("hello /help").is_none());
        assert!(parse("/").is_none());
    }

    #[test]
    fn help_hides_admin_commands_from_regular_users() {
        let (mut dir, ids) = room_with(&["alice"]);
        let CommandResult::Help(text) = run(&dir, ids[0], "/help") else {
            panic!("expected help");
        };
        assert!(!text.contains("/grant"));

        dir.get_mut(ids[0]).unwrap().is_admin = true;
        let CommandResult::Help(text) = run(&dir, ids[0], "/help") else {
            panic!("expected help");
        };
        assert!(text.contains("/grant"));
    }

    #[test]
    fn slash_list_names_every_command() {
        let (dir, ids) = room_with(&["alice"]);
        let CommandResult::SlashList(list) = run(&dir, ids[0], "/commands") else {
            panic!("expected slash list");
        };
        assert_eq!(list.len(), CommandName::ALL.len());
        assert!(list.contains(&"/cheetohparty".to_string()));
    }

    #[test]
    fn grant_requires_admin() {
        let (dir, ids) = room_with(&["alice", "bob"]);
        assert!(matches!(run(&dir, ids[0], "/grant bob"), CommandResult::Error(_)));
    }

    #[test]
    fn grant_finds_target_case_insensitively() {
        let (mut dir, ids) = room_with(&["alice", "Bob"]);
        dir.get_mut(ids[0]).unwrap().is_admin = true;
        assert_eq!(
            run(&dir, ids[0], "/grant bob"),
            CommandResult::Grant { target: ids[1] }
        );
        assert!(matches!(run(&dir, ids[0], "/grant nobody"), CommandResult::Error(_)));
        assert!(matches!(run(&dir, ids[0], "/grant alice"), CommandResult::Error(_)));
    }

    #[test]
    fn party_refuses_while_active() {
        let (dir, ids) = room_with(&["alice"]);
        let ctx = CommandContext {
            directory: &dir,
            party_active: true,
        };
        let cmd = parse("/cheetohparty").unwrap();
        assert!(matches!(
            execute(&ctx, dir.get(ids[0]).unwrap(), &cmd),
            CommandResult::Error(_)
        ));
        assert_eq!(
            run(&dir, ids[0], "/cheetohparty"),
            CommandResult::Party { duration_ms: PARTY_DURATION_MS }
        );
    }

    #[test]
    fn picture_needs_url() {
        let (dir, ids) = room_with(&["alice"]);
        assert!(matches!(run(&dir, ids[0], "/picture"), CommandResult::Error(_)));
        assert_eq!(
            run(&dir, ids[0], "/picture https://example.com/cat.png"),
            CommandResult::Picture { url: "https://example.com/cat.png".into() }
        );
    }

    #[test]
    fn camera_toggles_without_argument() {
        let (mut dir, ids) = room_with(&["alice"]);
        assert_eq!(
            run(&dir, ids[0], "/camera"),
            CommandResult::Camera { action: CameraAction::On }
        );
        dir.get_mut(ids[0]).unwrap().camera_on = true;
        assert_eq!(
            run(&dir, ids[0], "/camera"),
            CommandResult::Camera { action: CameraAction::Off }
        );
        assert!(matches!(run(&dir, ids[0], "/camera sideways"), CommandResult::Error(_)));
    }

    #[test]
    fn request_admin_defaults_reason() {
        let (dir, ids) = room_with(&["alice"]);
        assert_eq!(
            run(&dir, ids[0], "/requestadmin"),
            CommandResult::RequestAdmin { reason: "No reason given".into() }
        );
        assert_eq!(
            run(&dir, ids[0], "/requestadmin I  mod a lot"),
            CommandResult::RequestAdmin { reason: "I mod a lot".into() }
        );
    }
}
