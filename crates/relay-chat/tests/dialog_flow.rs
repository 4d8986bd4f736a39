//! End-to-end dialog scenarios.
//!
//! Each test wires a fresh orchestrator over in-memory stores, a scripted
//! completion service and a recording reply sink.

use std::path::PathBuf;
use std::sync::Arc;

use relay_chat::{
    DialogOrchestrator, DirPromptSource, HistoryStore, InboundMessage, PersonaLibrary,
    PromptSource, RecordingSink, Style, StyleSelector, APOLOGY_HTML, APOLOGY_PLAIN,
};
use relay_core::{CompletionMessage, ConversationId, DialogConfig, Role};
use relay_llm::{CompletionError, MockCompletionService};

// =============================================================================
// Helpers
// =============================================================================

const CHAT: ConversationId = ConversationId(1001);

struct Relay {
    orchestrator: DialogOrchestrator,
    completion: Arc<MockCompletionService>,
    sink: Arc<RecordingSink>,
    history: Arc<HistoryStore>,
    _prompts: tempfile::TempDir,
}

fn write_prompts() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("system.txt"), "Ты вежливый ассистент.").unwrap();
    std::fs::write(dir.path().join("cat_mode.txt"), "Ты кот.").unwrap();
    std::fs::write(dir.path().join("villain_mode.txt"), "Ты суперзлодей.").unwrap();
    dir
}

fn relay() -> Relay {
    let prompts = write_prompts();
    let personas = Arc::new(PersonaLibrary::new(DirPromptSource::new(prompts.path())));
    let history = Arc::new(HistoryStore::new());
    let completion = Arc::new(MockCompletionService::new());
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = DialogOrchestrator::new(
        Arc::clone(&history),
        Arc::new(StyleSelector::with_seed(2024)),
        personas,
        completion.clone(),
        sink.clone(),
    );
    Relay {
        orchestrator,
        completion,
        sink,
        history,
        _prompts: prompts,
    }
}

fn entries(history: &HistoryStore, conversation: ConversationId) -> Vec<(Role, String)> {
    history
        .window(conversation, usize::MAX)
        .into_iter()
        .map(|m| (m.role, m.content))
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_greeting_exchange_stores_two_entries() {
    let r = relay();
    r.completion.push_reply("Привет, чем помочь?");

    r.orchestrator
        .handle(&InboundMessage::text(CHAT, 7, "Анна", "Привет"))
        .await
        .unwrap();

    let stored = entries(&r.history, CHAT);
    assert_eq!(
        stored,
        vec![
            (Role::User, "Привет".to_string()),
            (Role::Assistant, "Привет, чем помочь?".to_string()),
        ]
    );
    assert!(stored.iter().all(|(_, content)| !content.contains('<')));
}

#[tokio::test]
async fn test_repeated_failures_give_identical_apologies() {
    let r = relay();
    for _ in 0..3 {
        r.completion
            .push_failure(CompletionError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
    }

    for text in ["Привет", "Вы тут?", "Алло"] {
        r.orchestrator.handle_message(CHAT, text).await.unwrap();
    }

    let replies = r.sink.replies();
    assert_eq!(replies.len(), 3);
    assert!(replies.iter().all(|reply| reply.text == APOLOGY_HTML));
    assert!(APOLOGY_HTML.contains("<a href="));

    let assistant_turns: Vec<String> = entries(&r.history, CHAT)
        .into_iter()
        .filter(|(role, _)| *role == Role::Assistant)
        .map(|(_, content)| content)
        .collect();
    assert_eq!(assistant_turns, vec![APOLOGY_PLAIN; 3]);
}

#[tokio::test]
async fn test_service_question_routes_instruction() {
    let r = relay();
    r.completion.push_reply("Мы делаем приложения под iOS и Android.");

    let outcome = r
        .orchestrator
        .handle_message(CHAT, "Сколько стоит мобильное приложение?")
        .await
        .unwrap();
    assert!(outcome.intent.is_some());

    let sent = &r.completion.calls()[0];
    assert_eq!(sent[0], CompletionMessage::system("Ты вежливый ассистент."));
    assert!(sent[1].content.contains("разработка мобильных приложений"));
    assert_eq!(
        entries(&r.history, CHAT)[0],
        (Role::User, "Сколько стоит мобильное приложение?".to_string())
    );
}

#[tokio::test]
async fn test_start_then_conversation() {
    let r = relay();
    r.completion.push_reply("Здравствуйте! Чем помочь?");
    r.completion.push_reply("Расскажу про IT-консалтинг.");
    r.completion.push_reply("Продолжим.");

    r.orchestrator
        .handle(&InboundMessage::start(CHAT, 7, "Анна"))
        .await
        .unwrap();
    r.orchestrator
        .handle_message(CHAT, "Что вы умеете?")
        .await
        .unwrap();

    // Greeting counts as the first assistant turn, so an unprompted persona
    // is assigned on the next message.
    let outcome = r
        .orchestrator
        .handle_message(CHAT, "Что вы умеете ещё?")
        .await
        .unwrap();
    assert!(Style::RANDOM_POOL.contains(&outcome.style));

    let replies = r.sink.replies();
    assert!(replies[1].text.contains("<a href=\"https://technoservice.ru/consulting\">IT-консалтинг</a>"));

    // Greeting call carried only the persona and the greeting instruction.
    assert_eq!(r.completion.calls()[0].len(), 2);
}

#[tokio::test]
async fn test_start_clears_previous_dialog() {
    let r = relay();
    r.completion.push_reply("раз");
    r.completion.push_reply("два");
    r.completion.push_failure(CompletionError::EmptyCompletion);

    r.orchestrator.handle_message(CHAT, "один").await.unwrap();
    r.orchestrator.select_persona(CHAT, "cat");
    r.orchestrator.handle_message(CHAT, "два").await.unwrap();
    r.orchestrator.handle_start(CHAT, "Олег").await.unwrap();

    let stored = entries(&r.history, CHAT);
    assert_eq!(stored.len(), 1);
    assert!(stored[0].1.starts_with("Здравствуйте, Олег!"));
    assert_eq!(r.orchestrator.styles().stored_style(CHAT), None);
}

#[tokio::test]
async fn test_history_window_bounds_context() {
    let r = relay();
    let orchestrator = r.orchestrator.with_dialog_config(&DialogConfig {
        history_window: 4,
        ..DialogConfig::default()
    });
    for i in 0..5 {
        r.completion.push_reply(format!("ответ {}", i));
        orchestrator
            .handle_message(CHAT, &format!("вопрос {}", i))
            .await
            .unwrap();
    }

    let last_call = r.completion.calls().pop().unwrap();
    // system + 4 history messages + current user text
    assert_eq!(last_call.len(), 6);
    assert_eq!(last_call[1], CompletionMessage::user("вопрос 2"));
    assert_eq!(last_call[5], CompletionMessage::user("вопрос 4"));
}

#[tokio::test]
async fn test_conversations_do_not_share_state() {
    let r = relay();
    let other = ConversationId(2002);
    r.completion.push_reply("a");
    r.completion.push_reply("b");

    r.orchestrator
        .handle_message(CHAT, "Объясни как кот")
        .await
        .unwrap();
    r.orchestrator.handle_message(other, "Привет").await.unwrap();

    assert_eq!(r.orchestrator.styles().stored_style(CHAT), Some(Style::Cat));
    assert_eq!(r.orchestrator.styles().stored_style(other), None);
    assert_eq!(r.history.len(CHAT), 2);
    assert_eq!(r.history.len(other), 2);
}

// Concurrent messages in one conversation are not serialized: both exchanges
// land in history, but their relative order is unspecified.
#[tokio::test]
async fn test_concurrent_messages_same_conversation_interleave() {
    let r = relay();
    r.completion.push_reply("первый");
    r.completion.push_reply("второй");

    let (a, b) = tokio::join!(
        r.orchestrator.handle_message(CHAT, "сообщение А"),
        r.orchestrator.handle_message(CHAT, "сообщение Б"),
    );
    a.unwrap();
    b.unwrap();

    let stored = entries(&r.history, CHAT);
    assert_eq!(stored.len(), 4);
    let users: Vec<&str> = stored
        .iter()
        .filter(|(role, _)| *role == Role::User)
        .map(|(_, content)| content.as_str())
        .collect();
    assert!(users.contains(&"сообщение А"));
    assert!(users.contains(&"сообщение Б"));
}

#[test]
fn test_shipped_prompts_cover_every_persona() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../prompts");
    let source = DirPromptSource::new(dir);
    let library = PersonaLibrary::new(source.clone());
    library.ensure_default().unwrap();
    for style in Style::ALL {
        assert!(source.load(style).is_some(), "missing prompt for {}", style);
    }
}
