use std::io::{self, Write};

use anyhow::{Context as _, Result};

use crate::{
    cli::{Cli, Command},
    domain::message::{CurrentUser, FormattedMessage, SenderKind},
    gateway::{http::HttpGateway, memory::InMemoryGateway, push::LocalPushBroker},
    infra::error::AppError,
    ui::{
        conversation_list::{conversation_row, DEFAULT_ROW_WIDTH},
        transcript::{build_transcript, render_lines},
    },
    usecases::{
        bootstrap,
        contracts::{IdentityProvider, PushBroker, RemoteGateway},
        coordinator::SyncCoordinator,
        load_messages::{load_messages_with_user, LoadUserHistoryQuery},
    },
};

const SESSION_FINISHED: &str = "APP_SESSION_FINISHED";
const DEMO_PEER_REPLY: &str = "Are you still there?";
const DEMO_OWN_REPLY: &str = "Yes, checking it right now.";

pub fn run(cli: Cli) -> Result<()> {
    let command = cli.command_or_default();
    let (context, _log_guard) = bootstrap::bootstrap(cli.config.as_deref())?;
    tracing::debug!(command = ?command, config = ?context.config.gateway, "starting session");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    let broker = LocalPushBroker::new();
    let user = context.current_user();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match command {
        Command::Demo => {
            let gateway = InMemoryGateway::with_demo_data(user.clone());
            let coordinator = SyncCoordinator::new(gateway, &broker, user, context.config.sync);
            runtime.block_on(run_demo(&coordinator, &broker, &mut out))
        }
        command => {
            let gateway = HttpGateway::new(&context.config.gateway)?;
            let coordinator = SyncCoordinator::new(gateway, &broker, user, context.config.sync);
            runtime.block_on(execute(&coordinator, command, &mut out))
        }
    };

    tracing::debug!(code = SESSION_FINISHED, ok = result.is_ok(), "session finished");
    result
}

/// Runs one server-backed command and prints its outcome.
pub async fn execute<G, B, I>(
    coordinator: &SyncCoordinator<G, B, I>,
    command: Command,
    out: &mut impl Write,
) -> Result<()>
where
    G: RemoteGateway,
    B: PushBroker,
    I: IdentityProvider,
{
    match command {
        Command::Conversations { pages } => {
            for page in 1..=pages.max(1) {
                coordinator
                    .load_conversations(page)
                    .await
                    .with_context(|| format!("failed to load conversation page {page}"))?;
                if !coordinator.conversations_cursor().has_next() {
                    break;
                }
            }
            print_conversations(coordinator, out)?;
        }
        Command::Open {
            conversation_id,
            older,
        } => {
            coordinator
                .load_conversations(1)
                .await
                .context("failed to load conversations")?;
            coordinator
                .select(conversation_id)
                .await
                .with_context(|| format!("failed to open conversation {conversation_id}"))?;
            for _ in 0..older {
                if !coordinator.load_older().await? {
                    break;
                }
            }
            print_transcript(coordinator, conversation_id, out)?;
        }
        Command::History {
            user_id,
            admin,
            page,
        } => {
            let kind = peer_kind(admin);
            let query = LoadUserHistoryQuery::new(user_id, kind).with_page(page);
            let history = load_messages_with_user(coordinator.gateway(), query)
                .await
                .with_context(|| format!("failed to load history with {} {user_id}", kind.as_str()))?;

            let user = coordinator.current_user();
            let formatted: Vec<FormattedMessage> = history
                .messages
                .iter()
                .map(|m| FormattedMessage::new(m, &user))
                .collect();
            writeln!(out, "== History with {} {user_id} ==", kind.as_str())?;
            let lines = render_lines(&build_transcript(&formatted));
            if lines.is_empty() {
                writeln!(out, "(no messages)")?;
            }
            for line in lines {
                writeln!(out, "{line}")?;
            }
            if history.cursor.has_next() {
                writeln!(out, "(older messages available, use --page {})", page.max(1) + 1)?;
            }
        }
        Command::Send {
            conversation_id,
            text,
        } => {
            coordinator
                .select(conversation_id)
                .await
                .with_context(|| format!("failed to open conversation {conversation_id}"))?;
            let message = coordinator.send(&text).await.context("failed to send")?;
            writeln!(
                out,
                "Sent message {} to conversation {conversation_id}.",
                message.id
            )?;
        }
        Command::Start { user_id, admin } => {
            let kind = peer_kind(admin);
            let conversation = coordinator
                .start_chat_with(user_id, kind)
                .await
                .with_context(|| format!("failed to start a chat with {} {user_id}", kind.as_str()))?;
            let title = coordinator
                .conversation_title(conversation.id)
                .unwrap_or_else(|| conversation.title(None));
            writeln!(out, "Conversation {}: {title}", conversation.id)?;
        }
        Command::Demo => {
            anyhow::bail!("the demo session runs against the built-in backend only")
        }
    }

    Ok(())
}

/// Scripted session against the in-memory backend: list, open, receive a
/// live message, reply.
pub async fn run_demo(
    coordinator: &SyncCoordinator<InMemoryGateway, &LocalPushBroker, CurrentUser>,
    broker: &LocalPushBroker,
    out: &mut impl Write,
) -> Result<()> {
    let notifications = coordinator.subscribe_events();

    writeln!(out, "== Conversations ==")?;
    execute(coordinator, Command::Conversations { pages: 1 }, out).await?;

    let conversations = coordinator.conversations();
    let Some(target) = conversations
        .iter()
        .find(|c| c.unread_count > 0)
        .or_else(|| conversations.first())
    else {
        writeln!(out, "Nothing to open.")?;
        return Ok(());
    };
    let conversation_id = target.id;
    let user = coordinator.current_user();
    let (peer_id, peer_sender_kind) = target
        .last_message
        .as_ref()
        .filter(|m| !m.is_own(&user))
        .map(|m| (m.sender_id, m.sender_kind))
        .unwrap_or((user.id + 1, SenderKind::User));

    writeln!(out)?;
    coordinator.select(conversation_id).await?;
    print_transcript(coordinator, conversation_id, out)?;

    let incoming = coordinator
        .gateway()
        .seed_message(conversation_id, peer_id, peer_sender_kind, DEMO_PEER_REPLY);
    broker.publish(incoming);
    let applied = coordinator.pump_live_events();
    writeln!(out, "\n[{applied} live message(s) received]")?;

    coordinator.send(DEMO_OWN_REPLY).await?;
    print_transcript(coordinator, conversation_id, out)?;

    writeln!(out, "\n== Conversations ==")?;
    print_conversations(coordinator, out)?;

    tracing::debug!(
        notifications = notifications.try_iter().count(),
        "demo session finished"
    );
    Ok(())
}

fn peer_kind(admin: bool) -> SenderKind {
    if admin {
        SenderKind::Admin
    } else {
        SenderKind::User
    }
}

fn print_conversations<G, B, I>(
    coordinator: &SyncCoordinator<G, B, I>,
    out: &mut impl Write,
) -> io::Result<()>
where
    G: RemoteGateway,
    B: PushBroker,
    I: IdentityProvider,
{
    let user = coordinator.current_user();
    let conversations = coordinator.conversations();
    if conversations.is_empty() {
        writeln!(out, "No conversations yet.")?;
    }

    for conversation in &conversations {
        writeln!(
            out,
            "{:>5} {}",
            conversation.id,
            conversation_row(conversation, &user, DEFAULT_ROW_WIDTH)
        )?;
    }

    writeln!(
        out,
        "{} unread in {} conversation(s)",
        coordinator.total_unread(),
        coordinator.unread_conversations().len()
    )
}

fn print_transcript<G, B, I>(
    coordinator: &SyncCoordinator<G, B, I>,
    conversation_id: i64,
    out: &mut impl Write,
) -> io::Result<()>
where
    G: RemoteGateway,
    B: PushBroker,
    I: IdentityProvider,
{
    let title = coordinator
        .conversation_title(conversation_id)
        .unwrap_or_else(|| format!("Conversation {conversation_id}"));
    writeln!(out, "== {title} ==")?;

    let lines = render_lines(&build_transcript(&coordinator.formatted_messages()));
    if lines.is_empty() {
        writeln!(out, "(no messages)")?;
    }
    for line in lines {
        writeln!(out, "{line}")?;
    }

    if coordinator.has_older_messages() {
        writeln!(out, "(older messages available, use --older N)")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::SyncConfig;

    fn me() -> CurrentUser {
        CurrentUser {
            id: 1,
            kind: SenderKind::User,
            name: "Me".to_owned(),
        }
    }

    fn demo_coordinator(
        broker: &LocalPushBroker,
    ) -> SyncCoordinator<InMemoryGateway, &LocalPushBroker, CurrentUser> {
        SyncCoordinator::new(
            InMemoryGateway::with_demo_data(me()),
            broker,
            me(),
            SyncConfig::default(),
        )
    }

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).expect("output is utf-8")
    }

    #[tokio::test]
    async fn conversations_command_lists_titles_and_unread_summary() {
        let broker = LocalPushBroker::new();
        let coordinator = demo_coordinator(&broker);
        let mut buffer = Vec::new();

        execute(&coordinator, Command::Conversations { pages: 3 }, &mut buffer)
            .await
            .expect("command succeeds");

        let text = output(buffer);
        assert!(text.contains("Alice"));
        assert!(text.contains("#Support team"));
        assert!(text.contains("unread in"));
    }

    #[tokio::test]
    async fn open_command_prints_transcript_and_subscribes() {
        let broker = LocalPushBroker::new();
        let coordinator = demo_coordinator(&broker);
        let mut buffer = Vec::new();

        execute(
            &coordinator,
            Command::Open {
                conversation_id: 1,
                older: 1,
            },
            &mut buffer,
        )
        .await
        .expect("command succeeds");

        let text = output(buffer);
        assert!(text.contains("== Alice =="));
        assert!(text.contains("You:"));
        assert!(text.contains("Great, thanks!"));
        assert_eq!(broker.active_conversations(), vec![1]);
    }

    #[tokio::test]
    async fn send_command_reports_acknowledged_message() {
        let broker = LocalPushBroker::new();
        let coordinator = demo_coordinator(&broker);
        let mut buffer = Vec::new();

        execute(
            &coordinator,
            Command::Send {
                conversation_id: 2,
                text: "  On it  ".to_owned(),
            },
            &mut buffer,
        )
        .await
        .expect("command succeeds");

        assert!(output(buffer).contains("to conversation 2"));
        assert_eq!(
            coordinator.messages().last().map(|m| m.content.as_str()),
            Some("On it")
        );
    }

    #[tokio::test]
    async fn send_command_surfaces_validation_errors() {
        let broker = LocalPushBroker::new();
        let coordinator = demo_coordinator(&broker);
        let mut buffer = Vec::new();

        let err = execute(
            &coordinator,
            Command::Send {
                conversation_id: 2,
                text: "   ".to_owned(),
            },
            &mut buffer,
        )
        .await
        .expect_err("empty message must fail");

        assert!(format!("{err:#}").contains("message cannot be empty"));
    }

    #[tokio::test]
    async fn history_command_prints_messages_shared_with_user() {
        let broker = LocalPushBroker::new();
        let coordinator = demo_coordinator(&broker);
        let mut buffer = Vec::new();

        execute(
            &coordinator,
            Command::History {
                user_id: 2,
                admin: false,
                page: 1,
            },
            &mut buffer,
        )
        .await
        .expect("command succeeds");

        let text = output(buffer);
        assert!(text.contains("== History with user 2 =="));
        assert!(text.contains("Great, thanks!"));
        assert!(text.contains("You:"));
        assert_eq!(coordinator.active_subscription(), None);
    }

    #[tokio::test]
    async fn start_command_prints_conversation() {
        let broker = LocalPushBroker::new();
        let coordinator = demo_coordinator(&broker);
        let mut buffer = Vec::new();

        execute(
            &coordinator,
            Command::Start {
                user_id: 2,
                admin: false,
            },
            &mut buffer,
        )
        .await
        .expect("command succeeds");

        assert_eq!(output(buffer), "Conversation 1: Alice\n");
    }

    #[tokio::test]
    async fn demo_session_receives_live_message_and_replies() {
        let broker = LocalPushBroker::new();
        let coordinator = demo_coordinator(&broker);
        let mut buffer = Vec::new();

        run_demo(&coordinator, &broker, &mut buffer)
            .await
            .expect("demo succeeds");

        let text = output(buffer);
        assert!(text.contains("[1 live message(s) received]"));
        assert!(text.contains(DEMO_PEER_REPLY));
        assert!(text.contains(DEMO_OWN_REPLY));
        // The group carries the most recent unread activity in the fixture.
        assert_eq!(coordinator.active_subscription(), Some(3));
        assert_eq!(coordinator.conversation(3).map(|c| c.unread_count), Some(0));
    }

    #[tokio::test]
    async fn demo_command_is_rejected_by_server_backed_execution() {
        let broker = LocalPushBroker::new();
        let coordinator = demo_coordinator(&broker);
        let mut buffer = Vec::new();

        assert!(execute(&coordinator, Command::Demo, &mut buffer)
            .await
            .is_err());
    }
}
