//! Chat surface of the game: command parsing, reply rendering, the command processor,
//! scheduled jobs and the server loop with its console transport.

pub mod commands;
pub mod console;
pub mod format;
pub mod handler;
pub mod scheduler;
pub mod server;

pub use commands::{parse_amount, parse_user_ref, AdminCommand, ClanCommand, Command, CommandParser};
pub use console::run_console;
pub use handler::{CommandProcessor, IncomingMessage};
pub use scheduler::JobScheduler;
pub use server::{BotServer, StatusReport};
