use std::collections::HashSet;
use std::sync::Arc;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::error::RecvError;

use chat_sync::config::Config;
use chat_sync::directory::{MENTION_LIMIT, complete_mention, mention_query};
use chat_sync::output::{self, ParticipantListOutput, TimelineRow};
use chat_sync::{
    ChatSession, FixedIdentity, HttpApi, LocalDb, PageOutcome, SendOutcome, StoreEvent, logging,
};

#[derive(Parser)]
#[command(
    name = "chatsync",
    version,
    about = "Chat client with a local sync cache",
    after_help = concat!(
        "Examples:\n",
        "  chatsync sync\n",
        "  chatsync messages list --older 2\n",
        "  chatsync messages send --text \"hello\"\n",
        "  chatsync messages reply --to 8d1f... --text \"agreed\"\n",
        "  chatsync messages react --id 8d1f... --emoji 👍\n",
        "  chatsync participants mention --text \"ping @al\""
    )
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, help = "Output JSON instead of text")]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Load the chat and follow updates until Ctrl-C")]
    Sync(SyncArgs),
    #[command(about = "Read and write messages")]
    Messages {
        #[command(subcommand)]
        command: MessagesCommand,
    },
    #[command(about = "Browse the participant directory")]
    Participants {
        #[command(subcommand)]
        command: ParticipantsCommand,
    },
}

#[derive(Args)]
struct SyncArgs {
    #[arg(long, help = "Print the loaded timeline and exit without polling")]
    once: bool,
}

#[derive(Subcommand)]
enum MessagesCommand {
    #[command(about = "Load and print the timeline")]
    List(MessagesListArgs),
    #[command(about = "Send a message")]
    Send(MessagesSendArgs),
    #[command(about = "Reply to a message")]
    Reply(MessagesReplyArgs),
    #[command(about = "Edit one of your recent messages (local only)")]
    Edit(MessagesEditArgs),
    #[command(about = "Toggle a reaction on a message (local only)")]
    React(MessagesReactArgs),
}

#[derive(Args)]
struct MessagesListArgs {
    #[arg(long, default_value_t = 0, help = "Number of older pages to fetch after loading")]
    older: usize,
}

#[derive(Args)]
struct MessagesSendArgs {
    #[arg(long, help = "Message text")]
    text: Option<String>,

    #[arg(long, help = "Read message text from stdin")]
    stdin: bool,
}

#[derive(Args)]
struct MessagesReplyArgs {
    #[arg(long, help = "Id of the message being replied to")]
    to: String,

    #[arg(long, help = "Reply text")]
    text: Option<String>,

    #[arg(long, help = "Read reply text from stdin")]
    stdin: bool,
}

#[derive(Args)]
struct MessagesEditArgs {
    #[arg(long, help = "Message id")]
    id: String,

    #[arg(long, help = "New text")]
    text: String,
}

#[derive(Args)]
struct MessagesReactArgs {
    #[arg(long, help = "Message id")]
    id: String,

    #[arg(long, help = "Emoji to toggle")]
    emoji: String,
}

#[derive(Subcommand)]
enum ParticipantsCommand {
    #[command(about = "List known participants")]
    List,
    #[command(about = "Suggest participants for the @mention at the end of some text")]
    Mention(MentionArgs),
}

#[derive(Args)]
struct MentionArgs {
    #[arg(long, help = "Composer text ending in @query")]
    text: String,
}

type Session = ChatSession<HttpApi>;

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(error) = run().await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load();
    let api = HttpApi::new(config.api_base_url.clone(), config.request_timeout)?;
    let local_db = LocalDb::new(config.state_path.clone(), config.api_base_url.clone());
    let mut session = ChatSession::new(api).with_snapshots(Arc::new(local_db));
    if let Some(user_id) = config.user_id.clone() {
        session = session.with_identity(Arc::new(FixedIdentity(user_id.clone())));
        session.set_current_user(Some(user_id));
    }

    match cli.command {
        Command::Sync(args) => {
            load_or_fail(&session).await?;
            print_timeline(&session, cli.json)?;
            if !args.once {
                follow(&session, &config, cli.json).await?;
            }
        }
        Command::Messages { command } => match command {
            MessagesCommand::List(args) => {
                load_or_fail(&session).await?;
                for _ in 0..args.older {
                    match session.fetch_older().await {
                        PageOutcome::Merged {
                            has_more_older: true,
                            ..
                        } => continue,
                        PageOutcome::Merged { .. } | PageOutcome::Skipped => break,
                        PageOutcome::Failed => {
                            eprintln!("Could not load older messages.");
                            break;
                        }
                    }
                }
                print_timeline(&session, cli.json)?;
            }
            MessagesCommand::Send(args) => {
                let text = message_text(args.text, args.stdin).await?;
                let outcome = session.send_message(&text).await;
                report_send(&session, &outcome, cli.json)?;
            }
            MessagesCommand::Reply(args) => {
                let text = message_text(args.text, args.stdin).await?;
                session.set_replying_to(Some(args.to.clone()));
                let outcome = session.send_reply(&text, &args.to).await;
                report_send(&session, &outcome, cli.json)?;
            }
            MessagesCommand::Edit(args) => {
                session.edit_message(&args.id, &args.text)?;
                if !cli.json {
                    println!("Edited {}.", args.id);
                }
                print_message(&session, &args.id, cli.json)?;
            }
            MessagesCommand::React(args) => {
                let added = session.toggle_reaction(&args.id, &args.emoji)?;
                if !cli.json {
                    let verb = if added { "Added" } else { "Removed" };
                    println!("{verb} {} on {}.", args.emoji, args.id);
                }
                print_message(&session, &args.id, cli.json)?;
            }
        },
        Command::Participants { command } => {
            if session.read(|store| store.directory.is_empty()) {
                load_or_fail(&session).await?;
            }
            match command {
                ParticipantsCommand::List => {
                    let (participants, current_user) = session.read(|store| {
                        (
                            store
                                .directory
                                .participants()
                                .into_iter()
                                .cloned()
                                .collect::<Vec<_>>(),
                            store.current_user_uuid.clone(),
                        )
                    });
                    output::print_participants(
                        &ParticipantListOutput {
                            participants,
                            completion: None,
                        },
                        current_user.as_deref(),
                        cli.json,
                    )?;
                }
                ParticipantsCommand::Mention(args) => {
                    let Some(query) = mention_query(&args.text) else {
                        return Err("Text does not end with an @mention.".into());
                    };
                    let (participants, current_user) = session.read(|store| {
                        (
                            store
                                .directory
                                .mention_candidates(query, MENTION_LIMIT)
                                .into_iter()
                                .cloned()
                                .collect::<Vec<_>>(),
                            store.current_user_uuid.clone(),
                        )
                    });
                    let completion = participants
                        .first()
                        .map(|first| complete_mention(&args.text, &first.name));
                    output::print_participants(
                        &ParticipantListOutput {
                            participants,
                            completion,
                        },
                        current_user.as_deref(),
                        cli.json,
                    )?;
                }
            }
        }
    }

    Ok(())
}

/// Load, falling back to restored state when the network is unavailable.
async fn load_or_fail(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(error) = session.load().await {
        if session.read(|store| store.timeline.is_empty()) {
            return Err(error.into());
        }
        eprintln!("{error}. Showing saved messages.");
    }
    Ok(())
}

async fn follow(
    session: &Session,
    config: &Config,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = session.subscribe();
    let poller = session.spawn_poller(config.poll_interval);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(StoreEvent::TimelineChanged { uuids }) => {
                    print_changed(session, &uuids.into_iter().collect(), json)?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    poller.stop().await;
    Ok(())
}

fn print_timeline(session: &Session, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let now = chrono::Utc::now().timestamp_millis();
    let timeline = session.read(|store| output::build_timeline(store, &Local, now));
    if let Some(message) = session.read(|store| match &store.load_status {
        chat_sync::LoadStatus::Failed(message) => Some(message.clone()),
        _ => None,
    }) {
        eprintln!("{message}");
    }
    output::print_timeline(&timeline, json)?;
    Ok(())
}

fn print_changed(
    session: &Session,
    uuids: &HashSet<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = chrono::Utc::now().timestamp_millis();
    let timeline = session.read(|store| output::build_timeline(store, &Local, now));
    for row in timeline.rows.iter().filter(|row| match row {
        TimelineRow::Message(row) => uuids.contains(&row.message.uuid),
        TimelineRow::DateSeparator { .. } => false,
    }) {
        if json {
            output::print_json(row)?;
        } else {
            output::print_row(row);
        }
    }
    Ok(())
}

fn print_message(
    session: &Session,
    uuid: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut changed = HashSet::new();
    changed.insert(uuid.to_string());
    print_changed(session, &changed, json)
}

fn report_send(
    session: &Session,
    outcome: &SendOutcome,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !json {
        match outcome {
            SendOutcome::Confirmed(uuid) => println!("Sent {uuid}."),
            SendOutcome::Placeholder(uuid) => {
                eprintln!("Could not reach the server; kept a local copy ({uuid}).")
            }
        }
    }
    print_message(session, outcome.uuid(), json)
}

async fn message_text(
    text: Option<String>,
    stdin: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let text = if stdin {
        let mut buffer = String::new();
        tokio::io::stdin().read_to_string(&mut buffer).await?;
        buffer
    } else {
        text.unwrap_or_default()
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err("Message text is empty. Pass --text or --stdin.".into());
    }
    Ok(text)
}
