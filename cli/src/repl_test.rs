use super::*;
use jarvis::net::types::Message;

#[test]
fn plain_text_is_sent_trimmed() {
    assert_eq!(parse_line("  hello jarvis \n"), ReplCommand::Send("hello jarvis".into()));
}

#[test]
fn blank_line_is_empty() {
    assert_eq!(parse_line("   "), ReplCommand::Empty);
}

#[test]
fn commands_without_arguments() {
    assert_eq!(parse_line("/new"), ReplCommand::New);
    assert_eq!(parse_line("/chats"), ReplCommand::Chats);
    assert_eq!(parse_line("/modes"), ReplCommand::Modes);
    assert_eq!(parse_line("/history"), ReplCommand::History);
    assert_eq!(parse_line("/?"), ReplCommand::Help);
    assert_eq!(parse_line("/exit"), ReplCommand::Quit);
}

#[test]
fn commands_take_the_rest_of_the_line() {
    assert_eq!(parse_line("/mode  Deep Work "), ReplCommand::Mode("Deep Work".into()));
    assert_eq!(parse_line("/select 2"), ReplCommand::Select("2".into()));
    assert_eq!(parse_line("/persona coder"), ReplCommand::Persona("coder".into()));
}

#[test]
fn missing_argument_is_unknown() {
    assert_eq!(parse_line("/mode"), ReplCommand::Unknown("/mode".into()));
    assert_eq!(parse_line("/delete   "), ReplCommand::Unknown("/delete".into()));
}

#[test]
fn unrecognised_command_is_unknown() {
    assert_eq!(parse_line("/frobnicate now"), ReplCommand::Unknown("/frobnicate now".into()));
}

#[test]
fn resolve_chat_by_number_or_id() {
    let ids = vec!["c-new".to_owned(), "c-old".to_owned()];
    assert_eq!(resolve_chat("1", &ids), "c-new");
    assert_eq!(resolve_chat("2", &ids), "c-old");
    assert_eq!(resolve_chat("3", &ids), "3");
    assert_eq!(resolve_chat("0", &ids), "0");
    assert_eq!(resolve_chat("c-old", &ids), "c-old");
}

#[test]
fn history_of_chat_outside_the_list_is_shown() {
    let mut state = ChatState::new("Work");
    state.selected_chat_id = Some("p1".to_owned());
    state.messages = vec![Message::user("hi"), Message::assistant("hello")];

    assert_eq!(render_history(&state), "-- p1 --\nyou> hi\njarvis> hello\n");
}

#[test]
fn history_without_selection_prompts_for_one() {
    let mut state = ChatState::new("Work");
    state.messages = vec![Message::user("orphan")];

    assert_eq!(render_history(&state), "no chat open; /new or /select\n");
}
