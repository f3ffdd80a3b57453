//! Console transport for local play and debugging.
//!
//! Each stdin line is `<user_id> <text>`, optionally `<user_id>@<peer_id> <text>` to speak in
//! a group conversation. Outgoing messages are printed to stdout as `-> <peer>: <text>`,
//! direct notifications as `=> <user>: <text>`.

use anyhow::Result;
use log::warn;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::bot::handler::IncomingMessage;
use crate::bot::server::BotServer;
use crate::gym::UserId;
use crate::logutil::escape_log;
use crate::notify::{Outbox, Outgoing};

/// Parse one console line. Blank or malformed lines yield `None`.
pub fn parse_console_line(line: &str) -> Option<IncomingMessage> {
    let line = line.trim();
    let (who, text) = line.split_once(char::is_whitespace)?;
    let (from, peer) = match who.split_once('@') {
        Some((from, peer)) => (from.parse::<UserId>().ok()?, peer.parse::<UserId>().ok()?),
        None => {
            let id = who.parse::<UserId>().ok()?;
            (id, id)
        }
    };
    if from <= 0 {
        return None;
    }
    Some(IncomingMessage {
        peer_id: peer,
        from_id: from,
        name: format!("id{}", from),
        text: text.trim().to_string(),
    })
}

pub fn render_outgoing(msg: &Outgoing) -> String {
    let arrow = if msg.direct { "=>" } else { "->" };
    format!("{} {}: {}", arrow, msg.peer_id, msg.text)
}

/// Run the server with stdin/stdout as the chat platform.
pub async fn run_console(server: BotServer) -> Result<()> {
    let (outbox, mut outgoing) = Outbox::channel();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

    let printer = tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            println!("{}", render_outgoing(&msg));
        }
    });

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_console_line(&line) {
                    Some(msg) => {
                        if incoming_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!("ignoring console line '{}': expected '<user_id> <text>'", escape_log(&line)),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });

    server.run(incoming_rx, outbox).await?;
    // The processor tasks hold the last outbox clones; once they finish the printer drains.
    let _ = printer.await;
    Ok(())
}
