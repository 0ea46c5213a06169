use std::sync::{Arc, Mutex};
use std::time::Duration;

use oa_console_core::utils::ManualClock;
use oa_console_sidebar::SidebarConfig;
use oa_console_sidebar::application::commands::{
    ChangeFilterCommand, OpenConversationCommand, SidebarCommand,
};
use oa_console_sidebar::application::queries::{SidebarSnapshot, SidebarSnapshotQuery};
use oa_console_sidebar::domain::model::{
    ChannelCommand, ConversationKey, ConversationStatus, ConversationSummary,
    ConversationUpdatePayload, RawEvent, RenderFrame, StatusFilter, ThreadLoad, TimerUpdate,
    UpdatesNotice,
};
use oa_console_sidebar::domain::repository::{MessageNotification, Notifier};
use oa_console_sidebar::infrastructure::persistence::InMemoryTimerSnapshotStore;
use oa_console_sidebar::infrastructure::source::InMemorySidebarSource;
use oa_console_sidebar::infrastructure::transport::{MemoryChannelPeer, memory_channel};
use oa_console_sidebar::service::{
    ApplicationContext, ContextParts, ReplayDriver, SidebarRuntime, wire,
};
use serde_json::{Value, json};
use tokio::io::BufReader;
use tokio::sync::mpsc;

const NOW: i64 = 1_700_000_000;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<MessageNotification>>,
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &MessageNotification) {
        self.sent.lock().unwrap().push(notification.clone());
    }
}

struct Harness {
    context: ApplicationContext,
    clock: ManualClock,
    notifier: Arc<RecordingNotifier>,
    source: Arc<InMemorySidebarSource>,
}

fn harness_with(config: SidebarConfig) -> Harness {
    let clock = ManualClock::new(NOW);
    let notifier = Arc::new(RecordingNotifier::default());
    let source = Arc::new(InMemorySidebarSource::default());
    let context = wire::initialize_with(
        config,
        ContextParts {
            clock: Arc::new(clock.clone()),
            source: source.clone(),
            snapshot_store: Arc::new(InMemoryTimerSnapshotStore::new()),
            notifier: notifier.clone(),
        },
    );
    Harness {
        context,
        clock,
        notifier,
        source,
    }
}

fn harness() -> Harness {
    harness_with(SidebarConfig {
        admin_email: Some("me@shop.test".into()),
        active_group_ids: vec![1, 2],
        ..Default::default()
    })
}

fn update(user: &str, status: &str) -> RawEvent {
    let mut payload = json!({
        "user_id": user,
        "line_account_id": 1,
        "status": status,
        "unread_count": 0,
        "display_name": format!("Customer {user}"),
        "picture_url": "",
        "oa_name": "Shop",
        "tags": [],
        "last_message_prefix": "ลูกค้า:",
        "last_message_content": "hello",
        "last_message_iso_timestamp": "2024-05-01T10:00:00Z"
    });
    if status == "unread" {
        payload["unread_count"] = json!(1);
        payload["last_unread_timestamp"] = json!(NOW - 125);
    }
    RawEvent::new("conversation_update", payload)
}

fn message(sender_type: &str, message_type: &str, admin_email: Option<&str>) -> RawEvent {
    let mut payload = json!({
        "id": 77,
        "user_id": "U1",
        "oa_id": 1,
        "sender_type": sender_type,
        "message_type": message_type,
        "content": "hi"
    });
    if let Some(email) = admin_email {
        payload["admin_email"] = Value::String(email.into());
    }
    RawEvent::new("new_message", payload)
}

fn key(user: &str) -> ConversationKey {
    ConversationKey::new(user, "1")
}

async fn snapshot(h: &Harness) -> SidebarSnapshot {
    h.context
        .query_handler
        .handle_sidebar_snapshot(SidebarSnapshotQuery)
        .await
}

fn order(snapshot: &SidebarSnapshot) -> Vec<&str> {
    snapshot
        .conversations
        .iter()
        .map(|s| s.key.user_id.as_str())
        .collect()
}

fn timer_display<'a>(snapshot: &'a SidebarSnapshot, user: &str) -> Option<&'a str> {
    snapshot
        .timers
        .iter()
        .find(|t| t.key == key(user))
        .map(|t| t.display.as_str())
}

#[tokio::test]
async fn closed_then_unread_orders_unread_first() {
    let h = harness();
    let handler = &h.context.command_handler;

    handler.handle_raw_event(update("A", "closed")).await;
    handler.handle_raw_event(update("B", "unread")).await;

    assert_eq!(order(&snapshot(&h).await), vec!["B", "A"]);
}

#[tokio::test]
async fn new_closed_entry_joins_head_of_closed_block() {
    let h = harness();
    let handler = &h.context.command_handler;

    handler.handle_raw_event(update("Y", "closed")).await;
    handler.handle_raw_event(update("X", "unread")).await;
    assert_eq!(order(&snapshot(&h).await), vec!["X", "Y"]);

    handler.handle_raw_event(update("Z", "closed")).await;
    assert_eq!(order(&snapshot(&h).await), vec!["X", "Z", "Y"]);
}

#[tokio::test]
async fn repeated_update_is_idempotent() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler.handle_raw_event(update("P", "read")).await;

    handler.handle_raw_event(update("Q", "deposit")).await;
    let once = snapshot(&h).await;
    handler.handle_raw_event(update("Q", "deposit")).await;
    let twice = snapshot(&h).await;

    assert_eq!(once.conversations, twice.conversations);
    assert_eq!(order(&twice), vec!["Q", "P"]);
}

#[tokio::test]
async fn issue_filter_drops_entry_that_closes() {
    let h = harness_with(SidebarConfig {
        status_filter: StatusFilter::Only(ConversationStatus::Issue),
        ..Default::default()
    });
    let handler = &h.context.command_handler;

    handler.handle_raw_event(update("K", "issue")).await;
    assert_eq!(order(&snapshot(&h).await), vec!["K"]);

    handler.handle_raw_event(update("K", "closed")).await;
    assert!(snapshot(&h).await.conversations.is_empty());

    // 不匹配筛选的新会话不会出现
    handler.handle_raw_event(update("N", "unread")).await;
    let snap = snapshot(&h).await;
    assert!(snap.conversations.is_empty());
    assert!(snap.timers.is_empty());
}

#[tokio::test]
async fn unread_timer_ticks_until_opened_then_stays_frozen() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler.handle_raw_event(update("A", "unread")).await;

    let ticked = handler.handle_tick().await;
    assert_eq!(ticked.len(), 1);
    assert_eq!(ticked[0].display, "02:05");

    h.clock.advance(3600);
    let output = handler
        .handle_open_conversation(OpenConversationCommand {
            user_id: "A".into(),
            oa_id: "1".into(),
        })
        .await;
    assert_eq!(output.frozen_display.as_deref(), Some("01:02:05"));

    h.clock.advance(30);
    assert!(handler.handle_tick().await.is_empty());

    let snap = snapshot(&h).await;
    let entry = &snap.conversations[0];
    assert!(entry.unread_since_epoch_seconds.is_none());
    assert_eq!(entry.status, ConversationStatus::Read);
    assert!(entry.is_active);
    assert_eq!(timer_display(&snap, "A"), Some("01:02:05"));
    assert_eq!(snap.open_conversation, Some(key("A")));
}

#[tokio::test]
async fn opening_without_prior_tick_freezes_current_elapsed() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler.handle_raw_event(update("A", "unread")).await;

    let output = handler
        .handle_open_conversation(OpenConversationCommand {
            user_id: "A".into(),
            oa_id: "1".into(),
        })
        .await;

    assert_eq!(output.frozen_display.as_deref(), Some("02:05"));
    h.clock.advance(10);
    handler.handle_tick().await;
    assert_eq!(timer_display(&snapshot(&h).await, "A"), Some("02:05"));
}

#[tokio::test]
async fn status_change_event_freezes_last_rendered_display() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler.handle_raw_event(update("A", "unread")).await;
    handler.handle_tick().await;

    h.clock.advance(50);
    handler.handle_raw_event(update("A", "withdraw")).await;
    h.clock.advance(50);
    handler.handle_tick().await;

    let snap = snapshot(&h).await;
    assert_eq!(snap.conversations[0].status, ConversationStatus::Withdraw);
    assert_eq!(timer_display(&snap, "A"), Some("02:05"));
}

#[tokio::test]
async fn event_messages_never_notify() {
    let h = harness();
    let handler = &h.context.command_handler;

    handler.handle_raw_event(message("user", "event", None)).await;
    handler.handle_raw_event(message("admin", "event", Some("other@shop.test"))).await;
    assert_eq!(h.notifier.count(), 0);

    handler.handle_raw_event(message("user", "text", None)).await;
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn local_admin_messages_never_notify() {
    let h = harness();
    let handler = &h.context.command_handler;

    handler.handle_raw_event(message("admin", "text", Some("me@shop.test"))).await;
    handler.handle_raw_event(message("admin", "text", Some("ME@SHOP.TEST"))).await;
    assert_eq!(h.notifier.count(), 0);

    handler.handle_raw_event(message("admin", "text", Some("colleague@shop.test"))).await;
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn duplicate_message_in_open_thread_is_silent() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler
        .handle_open_conversation(OpenConversationCommand {
            user_id: "U1".into(),
            oa_id: "1".into(),
        })
        .await;

    let first = handler.handle_raw_event(message("user", "text", None)).await;
    let second = handler.handle_raw_event(message("user", "text", None)).await;

    assert_eq!(first.thread_appends.len(), 1);
    assert!(second.thread_appends.is_empty());
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn malformed_events_leave_state_untouched() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler.handle_raw_event(update("A", "read")).await;
    let before = snapshot(&h).await;

    let mut missing_user = update("B", "unread");
    missing_user.payload.as_object_mut().unwrap().remove("user_id");
    handler.handle_raw_event(missing_user).await;

    let mut unknown_status = update("A", "unread");
    unknown_status.payload["status"] = json!("archived");
    handler.handle_raw_event(unknown_status).await;

    handler
        .handle_raw_event(RawEvent::new("new_message", json!("not an object")))
        .await;

    let after = snapshot(&h).await;
    assert_eq!(before.conversations, after.conversations);
    assert_eq!(h.notifier.count(), 0);
}

#[tokio::test]
async fn filter_change_refreshes_from_source() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler.handle_raw_event(update("A", "read")).await;

    let rows = vec![
        summary_from(update("I1", "issue")),
        summary_from(update("R1", "read")),
    ];
    h.source.set_rows(rows).unwrap();

    handler
        .handle_command(SidebarCommand::ChangeFilter(ChangeFilterCommand {
            filter: "issue".into(),
        }))
        .await
        .unwrap();
    let snap = snapshot(&h).await;
    assert_eq!(order(&snap), vec!["I1"]);
    assert_eq!(
        snap.view.filter,
        StatusFilter::Only(ConversationStatus::Issue)
    );

    let rejected = handler
        .handle_command(SidebarCommand::ChangeFilter(ChangeFilterCommand {
            filter: "archived".into(),
        }))
        .await;
    assert!(rejected.is_err());
}

#[tokio::test]
async fn search_mode_defers_updates_with_notice() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler
        .handle_command(
            serde_json::from_value(json!({"local": "set_search_active", "active": true})).unwrap(),
        )
        .await
        .unwrap();

    handler.handle_raw_event(update("A", "unread")).await;
    let snap = snapshot(&h).await;
    assert!(snap.conversations.is_empty());
    assert_eq!(snap.view.updates_available, Some(UpdatesNotice::ClearSearch));
}

fn summary_from(raw: RawEvent) -> ConversationSummary {
    let payload: ConversationUpdatePayload = serde_json::from_value(raw.payload).unwrap();
    ConversationSummary::from_update(&payload.into_update().unwrap())
}

#[tokio::test(start_paused = true)]
async fn runtime_applies_events_commands_and_ticks() {
    let h = harness();
    let (mut channel, peer) = memory_channel(16);
    let MemoryChannelPeer {
        events,
        commands: mut emitted,
        mut frames,
    } = peer;
    let (local_tx, local_rx) = mpsc::channel(8);

    events.send(RawEvent::new("connect", Value::Null)).await.unwrap();
    events.send(update("A", "unread")).await.unwrap();
    events
        .send(RawEvent::new("conversation_update", json!({"status": "read"})))
        .await
        .unwrap();
    local_tx
        .send(SidebarCommand::OpenConversation(OpenConversationCommand {
            user_id: "A".into(),
            oa_id: "1".into(),
        }))
        .await
        .unwrap();

    let runtime = SidebarRuntime::new(h.context.command_handler.clone(), Duration::from_secs(1));
    let stats = runtime
        .run(
            &mut channel,
            local_rx,
            tokio::time::sleep(Duration::from_secs(3)),
        )
        .await
        .unwrap();

    assert_eq!(stats.events, 3);
    assert_eq!(stats.local_commands, 1);
    assert!(stats.ticks >= 2);

    assert_eq!(
        emitted.recv().await,
        Some(ChannelCommand::UpdateActiveGroups {
            group_ids: vec![1, 2]
        })
    );
    assert_eq!(
        emitted.recv().await,
        Some(ChannelCommand::Join {
            room: "chat_A_1".into()
        })
    );

    let mut rendered = Vec::new();
    while let Ok(frame) = frames.try_recv() {
        rendered.push(frame);
    }
    assert!(rendered.contains(&RenderFrame::LoadThread(ThreadLoad {
        key: key("A"),
        frozen_time: Some("02:05".into()),
    })));
    assert!(rendered.contains(&RenderFrame::Timers(vec![TimerUpdate {
        key: key("A"),
        display: "02:05".into(),
    }])));

    let snap = snapshot(&h).await;
    assert_eq!(order(&snap), vec!["A"]);
    assert!(snap.conversations[0].is_active);
    assert_eq!(timer_display(&snap, "A"), Some("02:05"));

    drop(events);
    drop(local_tx);
}

#[tokio::test]
async fn replay_script_produces_commands_and_final_sidebar() {
    let h = harness();
    let driver = ReplayDriver::new(
        h.context.command_handler.clone(),
        h.context.query_handler.clone(),
        h.clock.clone(),
    );

    let script = [
        r#"{"event": "connect"}"#,
        "# comment lines are ignored",
        r#"{"event": "update_conversation_list", "data": {"user_id": "U9", "line_account_id": 4, "status": "unread", "last_unread_timestamp": 1699999990}}"#,
        r#"{"advance_secs": 5}"#,
        r#"{"local": "open_conversation", "user_id": "U9", "oa_id": "4"}"#,
        r#"{"event": "resort_sidebar", "data": {"user_id": "U8", "line_account_id": 4, "status": "closed"}}"#,
        "garbage",
    ]
    .join("\n");

    let mut output = Vec::new();
    let snap = driver
        .run(BufReader::new(script.as_bytes()), &mut output)
        .await
        .unwrap();

    assert_eq!(
        snap.conversations
            .iter()
            .map(|s| s.key.user_id.as_str())
            .collect::<Vec<_>>(),
        vec!["U9", "U8"]
    );
    let frozen = snap
        .timers
        .iter()
        .find(|t| t.key == ConversationKey::new("U9", "4"))
        .map(|t| t.display.clone());
    assert_eq!(frozen.as_deref(), Some("00:15"));

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let commands: Vec<&Value> = lines.iter().filter(|l| l.get("command").is_some()).collect();
    assert_eq!(commands[0]["command"], "update_active_groups");
    assert_eq!(commands[1]["command"], "join");
    assert_eq!(commands[1]["data"]["room"], "chat_U9_4");

    // 前进 5 秒后写出一行计时帧
    assert!(lines.iter().any(|l| l["timers"][0]["display"] == "00:15"));
    let load = lines
        .iter()
        .find_map(|l| l.get("load_thread"))
        .expect("load_thread frame");
    assert_eq!(load["key"]["user_id"], "U9");
    assert_eq!(load["frozen_time"], "00:15");
    assert!(lines.last().unwrap().get("sidebar").is_some());
}

#[tokio::test]
async fn open_command_hands_frozen_time_to_thread_loader() {
    let h = harness();
    let handler = &h.context.command_handler;
    handler.handle_raw_event(update("A", "unread")).await;

    let effects = handler
        .handle_command(SidebarCommand::OpenConversation(OpenConversationCommand {
            user_id: "A".into(),
            oa_id: "1".into(),
        }))
        .await
        .unwrap();

    assert_eq!(
        effects.load_thread,
        Some(ThreadLoad {
            key: key("A"),
            frozen_time: Some("02:05".into()),
        })
    );
    assert_eq!(
        effects.timer_updates,
        vec![TimerUpdate {
            key: key("A"),
            display: "02:05".into(),
        }]
    );
    assert!(
        effects
            .render_frames()
            .iter()
            .any(|f| matches!(f, RenderFrame::LoadThread(_)))
    );

    // 已读会话没有冻结时间，线程仍然加载
    handler.handle_raw_event(update("B", "read")).await;
    let effects = handler
        .handle_command(SidebarCommand::OpenConversation(OpenConversationCommand {
            user_id: "B".into(),
            oa_id: "1".into(),
        }))
        .await
        .unwrap();
    assert_eq!(
        effects.load_thread,
        Some(ThreadLoad {
            key: key("B"),
            frozen_time: None,
        })
    );
    assert!(effects.timer_updates.is_empty());
}
