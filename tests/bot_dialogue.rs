//! End-to-end chat tests: raw lines in, replies and notifications out

mod common;

use std::sync::Arc;

use gymlegend::bot::{CommandProcessor, IncomingMessage};
use gymlegend::config::Config;
use gymlegend::gym::Gym;
use gymlegend::notify::{Outbox, Outgoing};
use tokio::sync::mpsc::UnboundedReceiver;

use common::{test_gym, ADMIN};

const GROUP_CHAT: i64 = 2_000_000_001;

fn processor(gym: Gym) -> (CommandProcessor, UnboundedReceiver<Outgoing>) {
    let mut config = Config::default();
    config.bot.inspection_delay_ms = 0;
    let (outbox, rx) = Outbox::channel();
    (CommandProcessor::new(Arc::new(gym), outbox, &config.bot), rx)
}

fn drain(rx: &mut UnboundedReceiver<Outgoing>) -> Vec<Outgoing> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

async fn say(p: &CommandProcessor, from: i64, text: &str) {
    p.handle(IncomingMessage::direct(from, format!("Player{}", from), text))
        .await
        .expect("outbox open");
}

#[tokio::test]
async fn test_chatter_gets_no_reply() {
    let (_tmp, gym) = test_gym();
    let (p, mut rx) = processor(gym);
    say(&p, 1, "hello everyone").await;
    say(&p, 1, "").await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_first_contact_registers_and_answers() {
    let (_tmp, gym) = test_gym();
    let (p, mut rx) = processor(gym);

    say(&p, 1, "balance").await;
    let replies = drain(&mut rx);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].peer_id, 1);
    assert!(!replies[0].direct);
    assert_eq!(replies[0].text, "Balance: 1 coins");
    assert_eq!(p.gym().player(1).unwrap().name, "Player1");

    say(&p, 1, "/lift").await;
    let replies = drain(&mut rx);
    assert!(replies[0].text.starts_with("You lifted the dumbbell!"));
    assert!(replies[0].text.ends_with("Balance: 2"));

    say(&p, 1, "lift").await;
    assert!(drain(&mut rx)[0].text.starts_with("Too early."));
}

#[tokio::test]
async fn test_group_inspection_flow() {
    let (_tmp, gym) = test_gym();
    let (p, mut rx) = processor(gym);
    say(&p, 2, "balance").await;
    say(&p, 1, "balance").await;
    let mut attacker = p.gym().player(1).unwrap();
    attacker.balance = 100;
    p.gym().store().put_player(attacker).unwrap();
    let mut target = p.gym().player(2).unwrap();
    target.halls = 10;
    p.gym().store().put_player(target).unwrap();
    drain(&mut rx);

    say(&p, 1, "buy inspector 3").await;
    assert!(drain(&mut rx)[0].text.starts_with("Inspector level 3 hired for 15 coins"));

    let line = IncomingMessage {
        peer_id: GROUP_CHAT,
        from_id: 1,
        name: "Player1".into(),
        text: "[club1|@gymbot] inspect [id2|Player2] 3".into(),
    };
    p.handle(line).await.unwrap();
    let out = drain(&mut rx);
    assert_eq!(out.len(), 3, "{:?}", out);
    assert_eq!(out[0].peer_id, GROUP_CHAT);
    assert!(out[0].text.starts_with("An inspector of level 3 is on the way to [id2|Player2]"));
    assert!(out[1].direct);
    assert_eq!(out[1].peer_id, 2);
    assert!(out[1].text.starts_with("[id1|Player1] sent an inspector to you"));
    assert_eq!(out[2].peer_id, GROUP_CHAT);
    assert!(out[2].text.contains("Inspections today: 1/10."));

    let halls = p.gym().player(2).unwrap().halls;
    assert!((5..=7).contains(&halls));
}

#[tokio::test]
async fn test_rule_errors_are_explained() {
    let (_tmp, gym) = test_gym();
    let (p, mut rx) = processor(gym);

    say(&p, 1, "inspect id1 2").await;
    assert_eq!(drain(&mut rx)[0].text, "You cannot do that to yourself.");

    say(&p, 1, "inspect id2 2").await;
    assert_eq!(drain(&mut rx)[0].text, "You don't own inspector level 2. Buy it first.");

    say(&p, 1, "buy protection 4").await;
    assert_eq!(drain(&mut rx)[0].text, "Not enough coins: need 175, you have 1.");

    say(&p, 1, "buy hall 0").await;
    assert_eq!(drain(&mut rx)[0].text, "Usage: buy hall [count]");

    say(&p, 1, "admin mode on 5").await;
    assert_eq!(drain(&mut rx)[0].text, "Not allowed: administrators only");
}

#[tokio::test]
async fn test_transfer_notifies_receiver() {
    let (_tmp, gym) = test_gym();
    let (p, mut rx) = processor(gym);
    say(&p, 2, "balance").await;
    say(&p, 1, "balance").await;
    let mut sender = p.gym().player(1).unwrap();
    sender.balance = 1_000;
    p.gym().store().put_player(sender).unwrap();
    drain(&mut rx);

    say(&p, 1, "transfer id2 200").await;
    let out = drain(&mut rx);
    assert_eq!(out.len(), 2);
    assert!(out[0].direct);
    assert_eq!(out[0].text, "[id1|Player1] sent you 190 coins.");
    assert!(out[1].text.starts_with("Sent 200 coins to [id2|Player2] (fee 10, they get 190)."));
}

#[tokio::test]
async fn test_banned_player_is_refused_everything() {
    let (_tmp, gym) = test_gym();
    let (p, mut rx) = processor(gym);
    say(&p, 1, "balance").await;
    say(&p, ADMIN, "balance").await;
    drain(&mut rx);

    say(&p, ADMIN, "admin ban id1 botting").await;
    let out = drain(&mut rx);
    assert_eq!(out.len(), 2);
    assert!(out[0].direct);
    assert_eq!(out[0].text, "You have been banned permanently: botting");
    assert_eq!(out[1].text, "[id1|Player1] banned permanently.");

    for line in ["lift", "balance", "help"] {
        say(&p, 1, line).await;
        assert_eq!(drain(&mut rx)[0].text, "You are banned: botting");
    }

    say(&p, ADMIN, "admin unban id1").await;
    drain(&mut rx);
    say(&p, 1, "balance").await;
    assert_eq!(drain(&mut rx)[0].text, "Balance: 1 coins");
}

#[tokio::test]
async fn test_admin_switches_inspection_time() {
    let (_tmp, gym) = test_gym();
    let (p, mut rx) = processor(gym);
    say(&p, ADMIN, "admin mode on 2").await;
    assert_eq!(drain(&mut rx)[0].text, "Inspection time is ON for 2 hour(s).");

    say(&p, 1, "mode").await;
    assert!(drain(&mut rx)[0].text.starts_with("Inspection time is ON for"));

    say(&p, ADMIN, "admin mode on 500").await;
    assert_eq!(drain(&mut rx)[0].text, "Duration must be 1-168 hours.");

    say(&p, ADMIN, "admin mode off").await;
    assert_eq!(drain(&mut rx)[0].text, "Inspection time is OFF.");
}
