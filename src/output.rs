use chrono::TimeZone;
use serde::Serialize;
use thiserror::Error;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::dates;
use crate::model::{LocalStatus, Message, Participant, ReactionGroup};
use crate::mutation::edit_eligibility;
use crate::store::ChatStore;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One rendered line of the timeline.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TimelineRow {
    DateSeparator { label: String },
    Message(MessageRow),
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub message: Message,
    pub sender_name: String,
    /// Author differs from the previous message.
    pub show_header: bool,
    pub own: bool,
    pub edited: bool,
    /// The local user may still edit this message.
    pub editable: bool,
    pub time: String,
    pub age: String,
    pub reply_preview: Option<ReplyPreview>,
    pub reactions: Vec<ReactionGroup>,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPreview {
    pub uuid: String,
    pub sender_name: String,
    pub text: String,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineOutput {
    pub session_uuid: Option<String>,
    pub current_user_uuid: Option<String>,
    pub has_more_older: bool,
    pub rows: Vec<TimelineRow>,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantListOutput {
    pub participants: Vec<Participant>,
    /// Composer text with the mention filled in from the first candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,
}

/// Build display rows: a separator whenever the day changes, and a header
/// whenever the author changes.
pub fn build_timeline<Tz>(store: &ChatStore, tz: &Tz, now_ms: i64) -> TimelineOutput
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let messages = store.timeline.messages();
    let mut rows = Vec::with_capacity(messages.len());
    let mut previous: Option<&Message> = None;
    for message in messages {
        let day = dates::day_of(message.sent_at, tz);
        if let Some(prev) = previous {
            if dates::day_of(prev.sent_at, tz) != day {
                if let Some(day) = day {
                    rows.push(TimelineRow::DateSeparator {
                        label: dates::day_label(day),
                    });
                }
            }
        }

        let reply_preview = message.reply_to_message_uuid.as_deref().and_then(|target| {
            store.timeline.get(target).map(|replied| ReplyPreview {
                uuid: replied.uuid.clone(),
                sender_name: sender_name(store, &replied.author_uuid, now_ms),
                text: replied.text.clone(),
            })
        });

        rows.push(TimelineRow::Message(MessageRow {
            sender_name: sender_name(store, &message.author_uuid, now_ms),
            show_header: previous.is_none_or(|prev| prev.author_uuid != message.author_uuid),
            own: store.is_own(&message.author_uuid),
            edited: message.is_edited(),
            editable: edit_eligibility(message, store.current_user_uuid.as_deref(), now_ms).is_ok(),
            time: dates::clock_time(message.sent_at, tz),
            age: dates::format_relative_date(message.sent_at, now_ms),
            reply_preview,
            reactions: message.reaction_groups(),
            message: message.clone(),
        }));
        previous = Some(message);
    }

    TimelineOutput {
        session_uuid: store.session_uuid.clone(),
        current_user_uuid: store.current_user_uuid.clone(),
        has_more_older: store.timeline.has_more_older(),
        rows,
    }
}

fn sender_name(store: &ChatStore, author_uuid: &str, now_ms: i64) -> String {
    if store.is_own(author_uuid) {
        store.directory.resolve_self(author_uuid, now_ms).name
    } else {
        store.directory.resolve(author_uuid, now_ms).name
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), OutputError> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}

pub fn print_timeline(output: &TimelineOutput, json: bool) -> Result<(), OutputError> {
    if json {
        return print_json(output);
    }
    if output.has_more_older {
        println!("{}", pad_center("(older messages available)", 72));
    }
    for row in &output.rows {
        print_row(row);
    }
    Ok(())
}

pub fn print_row(row: &TimelineRow) {
    match row {
        TimelineRow::DateSeparator { label } => {
            println!("{}", pad_center(&format!("-- {label} --"), 72));
        }
        TimelineRow::Message(row) => {
            if row.show_header {
                let name = if row.own {
                    format!("{} (you)", row.sender_name)
                } else {
                    row.sender_name.clone()
                };
                println!("{}  {}", truncate_display(&name, 40), row.age);
            }
            if let Some(reply) = &row.reply_preview {
                println!(
                    "        > {}: {}",
                    truncate_display(&reply.sender_name, 20),
                    truncate_display(&reply.text, 48)
                );
            }
            let mut line = row.message.text.clone();
            if !row.message.attachments.is_empty() {
                line.push_str(&format!(" [{} image(s)]", row.message.attachments.len()));
            }
            if row.edited {
                line.push_str(" (edited)");
            } else if row.editable {
                line.push_str(" (editable)");
            }
            if row.message.is_placeholder() {
                line.push_str(" (not sent)");
            } else if row.message.local_status == Some(LocalStatus::Pending) {
                line.push_str(" (sending)");
            }
            println!("  {}  {}", row.time, line);
            if !row.reactions.is_empty() {
                let summary: Vec<String> = row
                    .reactions
                    .iter()
                    .map(|group| format!("{} {}", group.value, group.count()))
                    .collect();
                println!("         {}", summary.join("  "));
            }
            println!("         {}", row.message.uuid);
        }
    }
}

pub fn print_participants(
    output: &ParticipantListOutput,
    current_user: Option<&str>,
    json: bool,
) -> Result<(), OutputError> {
    if json {
        return print_json(output);
    }

    if let Some(completion) = &output.completion {
        println!("{completion}");
    }
    let mut id_width = display_width("id");
    let mut name_width = display_width("name");
    for participant in &output.participants {
        id_width = id_width.max(display_width(&participant.uuid));
        name_width = name_width.max(display_width(&participant.name));
    }
    id_width = id_width.min(36);
    name_width = name_width.min(24);

    println!(
        "{}  {}  {}  {}",
        pad_right("id", id_width),
        pad_right("name", name_width),
        pad_right("title", 20),
        pad_right("email", 28),
    );
    for participant in &output.participants {
        let mut name = participant.name.clone();
        if current_user == Some(participant.uuid.as_str()) {
            name.push_str(" *");
        }
        let title = participant.job_title.as_deref().unwrap_or("-");
        let email = participant.email.as_deref().unwrap_or("-");
        println!(
            "{}  {}  {}  {}",
            pad_right(&truncate_display(&participant.uuid, id_width), id_width),
            pad_right(&truncate_display(&name, name_width), name_width),
            pad_right(&truncate_display(title, 20), 20),
            pad_right(&truncate_display(email, 28), 28),
        );
    }
    Ok(())
}

fn display_width(value: &str) -> usize {
    UnicodeWidthStr::width(value)
}

fn truncate_display(value: &str, max_width: usize) -> String {
    if display_width(value) <= max_width {
        return value.to_string();
    }
    let ellipsis = "...";
    let mut width = 0usize;
    let mut output = String::new();
    for ch in value.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width + ellipsis.len() > max_width {
            break;
        }
        output.push(ch);
        width += ch_width;
    }
    output.push_str(ellipsis);
    output
}

fn pad_right(value: &str, width: usize) -> String {
    let mut output = value.to_string();
    let current = display_width(value);
    if current < width {
        output.push_str(&" ".repeat(width - current));
    }
    output
}

fn pad_center(value: &str, width: usize) -> String {
    let current = display_width(value);
    if current >= width {
        return value.to_string();
    }
    let left = (width - current) / 2;
    format!("{}{value}", " ".repeat(left))
}
