//! Interactive chat loop over a [`ChatSync`].
//!
//! Lines starting with `/` are commands; anything else is sent to the
//! selected chat. The loop ends on `/quit` or end of input.

#[cfg(test)]
#[path = "repl_test.rs"]
mod repl_test;

use jarvis::ClientError;
use jarvis::net::types::{Persona, Role};
use jarvis::state::chat::ChatState;
use jarvis::sync::chat::ChatSync;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::CliError;

const HELP: &str = "\
/new               start a chat in the active mode
/chats             list chats in the active mode
/select <n|id>     open a chat by list number or id
/delete <n|id>     delete a chat
/modes             list modes
/mode <name>       switch mode (created if new)
/persona <name>    Generalist, Coder, Architect or Sentinel
/history           reprint the open chat
/help              this text
/quit              leave";

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplCommand {
    Send(String),
    New,
    Chats,
    Select(String),
    Delete(String),
    Modes,
    Mode(String),
    Persona(String),
    History,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub(crate) fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplCommand::Send(line.to_owned());
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim().to_owned()),
        None => (command, String::new()),
    };
    match (name, arg.is_empty()) {
        ("new", _) => ReplCommand::New,
        ("chats", _) => ReplCommand::Chats,
        ("modes", _) => ReplCommand::Modes,
        ("history", _) => ReplCommand::History,
        ("help" | "?", _) => ReplCommand::Help,
        ("quit" | "exit" | "q", _) => ReplCommand::Quit,
        ("select", false) => ReplCommand::Select(arg),
        ("delete", false) => ReplCommand::Delete(arg),
        ("mode", false) => ReplCommand::Mode(arg),
        ("persona", false) => ReplCommand::Persona(arg),
        _ => ReplCommand::Unknown(line.to_owned()),
    }
}

/// Resolve a 1-based list number or a literal id against the chat list.
pub(crate) fn resolve_chat(arg: &str, chat_ids: &[String]) -> String {
    match arg.parse::<usize>() {
        Ok(n) if (1..=chat_ids.len()).contains(&n) => chat_ids[n - 1].clone(),
        _ => arg.to_owned(),
    }
}

pub(crate) async fn run(sync: &ChatSync) -> Result<(), CliError> {
    println!("mode {}; /help for commands", sync.active_mode());
    print_history(sync);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = parse_line(&line);
        if command == ReplCommand::Quit {
            break;
        }
        match handle(sync, command).await {
            Ok(()) => {}
            Err(e) if e.requires_login() => return Err(e.into()),
            Err(e) => eprintln!("error [{}]: {e}", e.error_code()),
        }
    }
    Ok(())
}

async fn handle(sync: &ChatSync, command: ReplCommand) -> Result<(), ClientError> {
    match command {
        ReplCommand::Empty | ReplCommand::Quit => {}
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Unknown(line) => println!("unknown command: {line} (try /help)"),
        ReplCommand::Send(text) => {
            let reply = sync.send_message(&text).await?;
            println!("jarvis> {}", reply.content);
        }
        ReplCommand::New => {
            let chat = sync.create_chat(&sync.active_mode()).await?;
            println!("opened {} ({})", chat.display_title(), chat.id);
        }
        ReplCommand::Chats => print_chats(sync),
        ReplCommand::Select(arg) => {
            let chat_id = resolve_chat(&arg, &chat_ids(sync));
            if sync.select_chat(&chat_id).await? {
                print_history(sync);
            }
        }
        ReplCommand::Delete(arg) => {
            let chat_id = resolve_chat(&arg, &chat_ids(sync));
            sync.delete_chat(&chat_id).await?;
            println!("deleted {chat_id}");
        }
        ReplCommand::Modes => {
            let active = sync.active_mode();
            for mode in sync.list_modes().await? {
                let marker = if mode.name == active { '*' } else { ' ' };
                println!("{marker} {}", mode.name);
            }
        }
        ReplCommand::Mode(name) => {
            sync.switch_mode(&name).await?;
            println!("mode {}", sync.active_mode());
            print_history(sync);
        }
        ReplCommand::Persona(name) => {
            let persona: Persona = name.parse()?;
            sync.set_persona(persona).await?;
            println!("persona {}", sync.snapshot().persona);
        }
        ReplCommand::History => print_history(sync),
    }
    Ok(())
}

fn chat_ids(sync: &ChatSync) -> Vec<String> {
    sync.snapshot().chats.into_iter().map(|chat| chat.id).collect()
}

fn print_chats(sync: &ChatSync) {
    let state = sync.snapshot();
    if state.chats.is_empty() {
        println!("no chats in {}", state.active_mode);
    }
    for (i, chat) in state.chats.iter().enumerate() {
        let marker = if state.selected_chat_id.as_deref() == Some(chat.id.as_str()) { '*' } else { ' ' };
        println!("{marker} {:>2}. {}", i + 1, chat.display_title());
    }
}

fn print_history(sync: &ChatSync) {
    print!("{}", render_history(&sync.snapshot()));
}

/// Transcript of the open chat. A chat selected by id outside the active
/// mode's list is headed by its id.
pub(crate) fn render_history(state: &ChatState) -> String {
    let Some(chat_id) = state.selected_chat_id.as_deref() else {
        return "no chat open; /new or /select\n".to_owned();
    };
    let heading = state.selected_chat().map_or_else(|| chat_id.to_owned(), |chat| chat.display_title().to_owned());
    let mut out = format!("-- {heading} --\n");
    for message in &state.messages {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "jarvis",
            Role::System => "system",
            Role::Tool => "tool",
        };
        out.push_str(&format!("{who}> {}\n", message.content));
    }
    out
}
