//! Line-oriented commands read from stdin and text rendering of the view.

use std::fmt::Write as _;

use sieve_core::{AppViewModel, FilterId, Msg, SourceId, StepKind, UnknownStepKind};
use thiserror::Error;

pub(crate) const HELP: &str = "\
commands:
  source add <url>            source edit <id> <url>      source rm <id>
  group add                   group rm <n>                group use <n>
  step add                    step rm <id>                step kind <id> <kind>
  step move <id> <position>   step edit <id> <body...>
  show    dismiss    help    quit";

#[derive(Debug, PartialEq)]
pub(crate) enum Command {
    Send(Msg),
    Show,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum ParseError {
    #[error("unknown command {0:?}; try `help`")]
    Unknown(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("{what} must be a number, got {raw:?}")]
    NotANumber { what: &'static str, raw: String },
    #[error(transparent)]
    Kind(#[from] UnknownStepKind),
}

/// Parses one input line. Blank lines are `Ok(None)`.
pub(crate) fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word {
        "source" => Command::Send(parse_source(rest)?),
        "group" => Command::Send(parse_group(rest)?),
        "step" => Command::Send(parse_step(rest)?),
        "dismiss" => Command::Send(Msg::NoticesDismissed),
        "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_source(args: &str) -> Result<Msg, ParseError> {
    let (action, rest) = split_word(args).ok_or(ParseError::Missing("source action"))?;
    match action {
        "add" => {
            let (url, _) = split_word(rest).ok_or(ParseError::Missing("url"))?;
            Ok(Msg::SourceSubmitted(url.to_string()))
        }
        "edit" => {
            let (source_id, rest) = take_number(rest, "source id")?;
            let (url, _) = split_word(rest).ok_or(ParseError::Missing("url"))?;
            Ok(Msg::SourceUrlEdited {
                source_id: SourceId::new(source_id),
                url: url.to_string(),
            })
        }
        "rm" => {
            let (source_id, _) = take_number(rest, "source id")?;
            Ok(Msg::SourceRemoved(SourceId::new(source_id)))
        }
        other => Err(ParseError::Unknown(format!("source {other}"))),
    }
}

fn parse_group(args: &str) -> Result<Msg, ParseError> {
    let (action, rest) = split_word(args).ok_or(ParseError::Missing("group action"))?;
    match action {
        "add" => Ok(Msg::GroupAdded),
        "rm" => Ok(Msg::GroupRemoved(take_index(rest)?)),
        "use" => Ok(Msg::GroupSelected(take_index(rest)?)),
        other => Err(ParseError::Unknown(format!("group {other}"))),
    }
}

fn parse_step(args: &str) -> Result<Msg, ParseError> {
    let (action, rest) = split_word(args).ok_or(ParseError::Missing("step action"))?;
    if action == "add" {
        return Ok(Msg::FilterAdded);
    }

    let (raw_id, rest) = take_number(rest, "step id")?;
    let filter_id = FilterId::new(raw_id);
    match action {
        "rm" => Ok(Msg::FilterRemoved(filter_id)),
        "kind" => {
            let (kind, _) = split_word(rest).ok_or(ParseError::Missing("step kind"))?;
            Ok(Msg::FilterKindChanged {
                filter_id,
                kind: kind.parse::<StepKind>()?,
            })
        }
        "move" => {
            let (position, _) = take_number(rest, "position")?;
            Ok(Msg::FilterMoved {
                filter_id,
                position: to_index(position),
            })
        }
        "edit" => {
            let text = rest.trim();
            if text.is_empty() {
                return Err(ParseError::Missing("step body"));
            }
            Ok(Msg::FilterSourceEdited {
                filter_id,
                text: text.to_string(),
            })
        }
        other => Err(ParseError::Unknown(format!("step {other}"))),
    }
}

fn split_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    Some(match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest),
        None => (text, ""),
    })
}

fn take_number<'a>(text: &'a str, what: &'static str) -> Result<(u64, &'a str), ParseError> {
    let (word, rest) = split_word(text).ok_or(ParseError::Missing(what))?;
    let number = word.parse().map_err(|_| ParseError::NotANumber {
        what,
        raw: word.to_string(),
    })?;
    Ok((number, rest))
}

fn take_index(text: &str) -> Result<usize, ParseError> {
    take_number(text, "group index").map(|(index, _)| to_index(index))
}

fn to_index(raw: u64) -> usize {
    usize::try_from(raw).unwrap_or(usize::MAX)
}

/// Full textual dump of the view for the `show` command.
pub(crate) fn render_view(view: &AppViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "sources:");
    if view.sources.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for source in &view.sources {
        let state = if source.loaded { "loaded" } else { "pending" };
        let _ = writeln!(out, "  [{}] {} ({state})", source.source_id, source.url);
    }

    if view.group_count == 0 {
        let _ = writeln!(out, "groups: none");
    } else {
        let _ = writeln!(
            out,
            "group {} of {} (0-based):",
            view.active_group, view.group_count
        );
    }
    for step in &view.steps {
        let _ = writeln!(out, "  [{}] {:<7} {}", step.filter_id, step.kind, step.body);
        if let Some(error) = &step.compile_error {
            let _ = writeln!(out, "        broken: {error}");
        }
        if let Some(draft) = &step.draft {
            let _ = writeln!(out, "        draft: {draft}");
        }
    }

    out.push_str(&render_notices(&view.notices));
    out
}

pub(crate) fn render_notices(notices: &[String]) -> String {
    let mut out = String::new();
    for notice in notices {
        let _ = writeln!(out, "! {notice}");
    }
    out
}
