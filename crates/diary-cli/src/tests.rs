use clap::Parser;
use diary_core::status::StatusMessage;
use diary_core::{Note, StatusSink};
use pretty_assertions::assert_eq;

use crate::cli::{AuthCommands, Cli, Commands, CompletionShell, ConfigCommands};
use crate::commands::common::{
    format_note_lines, newest_first, note_preview, note_to_list_item, resolve_note_fields,
};
use crate::commands::completions::render_completions;
use crate::commands::config::merge_profile_values;
use crate::error::CliError;
use crate::status::TerminalStatusSink;

const NOW: i64 = 1_700_000_000_000;

#[test]
fn resolve_note_fields_joins_body_words() {
    let (title, body) =
        resolve_note_fields("  Groceries ", &["milk".to_string(), "eggs".to_string()]).unwrap();
    assert_eq!(title, "Groceries");
    assert_eq!(body, "milk eggs");
}

#[test]
fn resolve_note_fields_allows_title_only() {
    let (title, body) = resolve_note_fields("Just a title", &[]).unwrap();
    assert_eq!(title, "Just a title");
    assert_eq!(body, "");
}

#[test]
fn resolve_note_fields_rejects_blank_note() {
    let result = resolve_note_fields("   ", &[" ".to_string()]);
    assert!(matches!(result, Err(CliError::EmptyNote)));
}

#[test]
fn note_preview_truncates_long_first_line() {
    let body = format!("{}\nsecond line", "word ".repeat(20));
    let preview = note_preview(&body, 20);
    assert_eq!(preview.chars().count(), 20);
    assert!(preview.ends_with("..."));
    assert_eq!(note_preview("  short  \nmore", 20), "short");
}

#[test]
fn format_note_lines_shows_key_age_and_title() {
    let notes = vec![
        Note::with_timestamp(NOW - 5 * 60_000, "Standup", "ship the release"),
        Note::with_timestamp(NOW - 1_000, "Untitled", ""),
    ];
    let lines = format_note_lines(&notes, NOW);

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(&(NOW - 5 * 60_000).to_string()));
    assert!(lines[0].contains("5 minutes ago"));
    assert!(lines[0].ends_with("Standup: ship the release"));
    assert!(lines[1].contains("1 second ago"));
    assert!(lines[1].ends_with("Untitled"));
}

#[test]
fn newest_first_orders_by_timestamp() {
    let notes = vec![
        Note::with_timestamp(1, "a", ""),
        Note::with_timestamp(3, "c", ""),
        Note::with_timestamp(2, "b", ""),
    ];
    let ordered = newest_first(&notes)
        .into_iter()
        .map(|note| note.timestamp)
        .collect::<Vec<_>>();
    assert_eq!(ordered, vec![3, 2, 1]);
}

#[test]
fn list_item_serializes_relative_time() {
    let note = Note::with_timestamp(NOW - 2 * 3_600_000, "Title", "Body");
    let value = serde_json::to_value(note_to_list_item(&note, NOW)).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "timestamp": NOW - 2 * 3_600_000,
            "title": "Title",
            "body": "Body",
            "relative_time": "2 hours ago",
        })
    );
}

#[test]
fn merge_profile_values_prefers_explicit_values() {
    let (api_key, database_url) = merge_profile_values(
        Some("new-key".to_string()),
        None,
        Some("old-key".to_string()),
        Some("https://demo.firebaseio.com/".to_string()),
    )
    .unwrap();
    assert_eq!(api_key.as_deref(), Some("new-key"));
    assert_eq!(database_url.as_deref(), Some("https://demo.firebaseio.com"));
}

#[test]
fn merge_profile_values_rejects_bad_database_url() {
    let result = merge_profile_values(None, Some("demo.firebaseio.com".to_string()), None, None);
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[test]
fn terminal_status_sink_keeps_latest_message() {
    let sink = TerminalStatusSink::default();
    assert_eq!(sink.current(), None);

    sink.show(StatusMessage::LoggingIn);
    sink.show(StatusMessage::LoginFailed("Invalid email or password".to_string()));
    assert_eq!(
        sink.current(),
        Some(StatusMessage::LoginFailed(
            "Invalid email or password".to_string()
        ))
    );
}

#[test]
fn cli_parses_add_with_body_words() {
    let cli = Cli::try_parse_from(["diary", "add", "Title", "hello", "world"]).unwrap();
    match cli.command {
        Commands::Add { title, body } => {
            assert_eq!(title, "Title");
            assert_eq!(body, vec!["hello".to_string(), "world".to_string()]);
        }
        _ => panic!("expected add command"),
    }
}

#[test]
fn cli_parses_global_profile_after_subcommand() {
    let cli = Cli::try_parse_from(["diary", "list", "--json", "--profile", "work"]).unwrap();
    assert_eq!(cli.profile.as_deref(), Some("work"));
    assert!(matches!(
        cli.command,
        Commands::List {
            json: true,
            limit: None
        }
    ));
}

#[test]
fn cli_parses_auth_and_config_commands() {
    let cli = Cli::try_parse_from([
        "diary",
        "auth",
        "login",
        "--email",
        "u@example.com",
        "--password",
        "p",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Auth {
            command: AuthCommands::Login { .. }
        }
    ));

    let cli = Cli::try_parse_from(["diary", "config", "init", "--no-activate"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommands::Init {
                no_activate: true,
                ..
            }
        }
    ));
}

#[test]
fn cli_rejects_non_numeric_delete_key() {
    assert!(Cli::try_parse_from(["diary", "delete", "yesterday"]).is_err());
}

#[test]
fn completions_mention_binary_name() {
    for shell in [
        CompletionShell::Bash,
        CompletionShell::Zsh,
        CompletionShell::Fish,
    ] {
        let script = String::from_utf8(render_completions(shell)).unwrap();
        assert!(script.contains("diary"), "{shell:?}");
    }
}
