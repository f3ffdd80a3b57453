//! # Gym Legend - a chat economy game bot
//!
//! Players lift dumbbells for coins, buy fitness halls that pay daily income, and send
//! inspectors to close each other's halls. Protections block inspections for a while,
//! clans pool a treasury that grows with their members' activity, and a global
//! "inspection time" mode makes everything more aggressive.
//!
//! ## Features
//!
//! - **Player ledger**: balances, dumbbell ladder, fitness halls, transfers with a burned fee,
//!   an audit record for every coin movement, leaderboards.
//! - **Inspections**: five inspector tiers with damage rolls, daily quotas and cooldowns that
//!   switch with inspection time, compensation for the target.
//! - **Protections**: five unlockable tiers, one timed window per player, never stacking.
//! - **Clans**: roles, a logged treasury, level-based bonuses.
//! - **Daily jobs**: hall payout and inspection counter reset on a configurable local day.
//! - **Persistence**: Sled trees with bincode records, every mutation under one ledger lock.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gymlegend::config::Config;
//! use gymlegend::bot::{run_console, BotServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let server = BotServer::new(config).await?;
//!     run_console(server).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`gym`] - Game rules, balance tables, storage and daily jobs
//! - [`bot`] - Command parsing, replies, the server loop and scheduled tasks
//! - [`notify`] - Best-effort direct notifications
//! - [`config`] - Configuration loading and validation
//! - [`logutil`] - Log-safe rendering of chat text
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Transport     │ ← console (stdin/stdout) or a chat platform
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Bot           │ ← parser, command processor, scheduler
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Gym           │ ← rules, tables, ledger lock
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   GymStore      │ ← Sled trees
//! └─────────────────┘
//! ```

pub mod bot;
pub mod config;
pub mod gym;
pub mod logutil;
pub mod notify;
