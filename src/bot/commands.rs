//! Chat command parser.
//!
//! Turns a raw chat line into a [`Command`]. Words are case-insensitive and an optional
//! configured prefix (`/lift`) is accepted. A leading bot mention such as
//! `[club123|@gymbot]` is ignored so commands work in group chats.
//!
//! Text that is not a command parses to [`Command::Unknown`] and the bot stays silent.
//! A recognised command with bad arguments parses to [`Command::Invalid`] carrying the
//! usage line to send back.

use log::trace;

use crate::gym::types::{TopKind, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Profile,
    Balance,
    Rename(String),
    Lift,
    Dumbbell,
    DumbbellShop,
    UpgradeDumbbell,
    BuyHalls(u32),
    Income,
    Transfer { target: UserId, amount: i64 },
    History,
    Top(TopKind),
    Inspectors,
    BuyInspector(u8),
    Inspect { target: UserId, tier: u8 },
    InspectionStats,
    Protections,
    BuyProtection(u8),
    Protect(u8),
    Mode,
    Coach,
    CoachUpgrade,
    Train,
    Promo(String),
    Clan(ClanCommand),
    Admin(AdminCommand),
    /// Known command, unusable arguments. Carries the usage text.
    Invalid(String),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClanCommand {
    Help,
    Create { tag: String, name: String },
    Join(String),
    Leave,
    Info(Option<String>),
    Members,
    Deposit(i64),
    Withdraw(i64),
    Upgrade,
    Top,
    Log,
    Promote(UserId),
    Demote(UserId),
    Kick(UserId),
    Disband,
    Bonuses,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    ModeOn(i64),
    ModeOff,
    Grant { target: UserId, amount: i64 },
    Halls { target: UserId, halls: u32 },
    Ban { target: UserId, hours: Option<i64>, reason: String },
    Unban(UserId),
    Promo { code: String, reward: i64, uses: u32 },
}

/// Parse a player reference: `[id123|Name]`, `id123`, `@id123`, `123` or a profile link
/// like `vk.com/id123`.
pub fn parse_user_ref(raw: &str) -> Option<UserId> {
    let mut s = raw.trim();
    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        s = inner.split('|').next()?;
    }
    if let Some(pos) = s.rfind('/') {
        s = &s[pos + 1..];
    }
    let s = s.trim_start_matches('@');
    let digits = s.strip_prefix("id").unwrap_or(s);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<UserId>().ok().filter(|id| *id > 0)
}

/// Parse a coin amount. Each trailing `k` multiplies by 1 000: `5k` = 5 000, `2kk` = 2 000 000.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let lower = raw.trim().to_lowercase();
    let digits = lower.trim_end_matches(|c| c == 'k' || c == 'к');
    let suffixes = lower[digits.len()..].chars().count() as u32;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || suffixes > 4 {
        return None;
    }
    let base: i64 = digits.parse().ok()?;
    base.checked_mul(1000i64.checked_pow(suffixes)?)
}

/// Split a leading player reference off `rest`. Mentions may contain spaces inside the
/// brackets, so `[id1|John Smith] 500` yields `(1, "500")`.
fn split_target(rest: &str) -> Option<(UserId, &str)> {
    let rest = rest.trim_start();
    let end = if rest.starts_with('[') {
        rest.find(']')? + 1
    } else {
        rest.find(char::is_whitespace).unwrap_or(rest.len())
    };
    let id = parse_user_ref(&rest[..end])?;
    Some((id, rest[end..].trim()))
}

fn parse_tier(raw: &str) -> Option<u8> {
    raw.trim().parse::<u8>().ok()
}

/// Drop a leading `[club123|@bot]` / `@bot` style mention.
fn strip_bot_mention(text: &str) -> &str {
    let t = text.trim_start();
    if t.starts_with("[club") || t.starts_with("[public") {
        if let Some(end) = t.find(']') {
            return t[end + 1..].trim_start_matches([',', ' ']);
        }
    }
    t
}

pub struct CommandParser {
    prefix: Option<char>,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(Some('/'))
    }
}

impl CommandParser {
    pub fn new(prefix: Option<char>) -> Self {
        Self { prefix }
    }

    pub fn parse(&self, raw: &str) -> Command {
        let mut body = strip_bot_mention(raw).trim();
        if let Some(p) = self.prefix {
            body = body.strip_prefix(p).unwrap_or(body).trim_start();
        }
        if body.is_empty() {
            return Command::Unknown;
        }
        let (head, rest) = match body.find(char::is_whitespace) {
            Some(i) => (&body[..i], body[i..].trim()),
            None => (body, ""),
        };
        let cmd = self.parse_words(&head.to_lowercase(), rest);
        trace!("Parsed {:?} from '{}'", cmd, raw);
        cmd
    }

    fn parse_words(&self, head: &str, rest: &str) -> Command {
        let lower_rest = rest.to_lowercase();
        match head {
            "help" | "commands" | "?" if rest.is_empty() => Command::Help,
            "profile" | "me" if rest.is_empty() => Command::Profile,
            "balance" | "bal" if rest.is_empty() => Command::Balance,
            "name" => {
                if rest.is_empty() {
                    Command::Invalid("Usage: name <new name>".to_string())
                } else {
                    Command::Rename(rest.to_string())
                }
            }
            "lift" if rest.is_empty() => Command::Lift,
            "dumbbell" => match lower_rest.as_str() {
                "" => Command::Dumbbell,
                "shop" => Command::DumbbellShop,
                _ => Command::Unknown,
            },
            "upgrade" if rest.is_empty() => Command::UpgradeDumbbell,
            "buy" => self.parse_buy(&lower_rest),
            "income" if rest.is_empty() => Command::Income,
            "transfer" | "give" => match split_target(rest) {
                Some((target, amount)) => match parse_amount(amount) {
                    Some(amount) => Command::Transfer { target, amount },
                    None => Command::Invalid("Usage: transfer <player> <amount>".to_string()),
                },
                None => Command::Invalid("Usage: transfer <player> <amount>".to_string()),
            },
            "history" if rest.is_empty() => Command::History,
            "top" => {
                if rest.is_empty() {
                    Command::Top(TopKind::Balance)
                } else {
                    match TopKind::from_str(&lower_rest) {
                        Some(kind) => Command::Top(kind),
                        None => Command::Invalid("Usage: top [balance|lifts|power|halls]".to_string()),
                    }
                }
            }
            "inspectors" if rest.is_empty() => Command::Inspectors,
            "inspect" => {
                let usage = || Command::Invalid("Usage: inspect <player> <tier 1-5>".to_string());
                match split_target(rest) {
                    Some((target, tier)) => match parse_tier(tier) {
                        Some(tier) => Command::Inspect { target, tier },
                        None => usage(),
                    },
                    None => usage(),
                }
            }
            "inspection" if lower_rest == "stats" => Command::InspectionStats,
            "protections" if rest.is_empty() => Command::Protections,
            "protect" => match parse_tier(rest) {
                Some(tier) => Command::Protect(tier),
                None => Command::Invalid("Usage: protect <tier 1-5>".to_string()),
            },
            "mode" if rest.is_empty() => Command::Mode,
            "coach" => match lower_rest.as_str() {
                "" => Command::Coach,
                "upgrade" => Command::CoachUpgrade,
                _ => Command::Unknown,
            },
            "train" if rest.is_empty() => Command::Train,
            "promo" => {
                if rest.is_empty() || rest.contains(char::is_whitespace) {
                    Command::Invalid("Usage: promo <code>".to_string())
                } else {
                    Command::Promo(rest.to_string())
                }
            }
            "clan" => Command::Clan(match self.parse_clan(rest) {
                Ok(sub) => sub,
                Err(usage) => return Command::Invalid(usage),
            }),
            "admin" => match self.parse_admin(rest) {
                Some(Ok(sub)) => Command::Admin(sub),
                Some(Err(usage)) => Command::Invalid(usage),
                None => Command::Unknown,
            },
            _ => Command::Unknown,
        }
    }

    fn parse_buy(&self, rest: &str) -> Command {
        let mut words = rest.split_whitespace();
        let what = words.next().unwrap_or("");
        let arg = words.next();
        if words.next().is_some() {
            return Command::Unknown;
        }
        match what {
            "hall" | "halls" => match arg {
                None => Command::BuyHalls(1),
                Some(n) => match n.parse::<u32>() {
                    Ok(n) if n > 0 => Command::BuyHalls(n),
                    _ => Command::Invalid("Usage: buy hall [count]".to_string()),
                },
            },
            "inspector" => match arg.and_then(parse_tier) {
                Some(tier) => Command::BuyInspector(tier),
                None => Command::Invalid("Usage: buy inspector <tier 1-5>".to_string()),
            },
            "protection" => match arg.and_then(parse_tier) {
                Some(tier) => Command::BuyProtection(tier),
                None => Command::Invalid("Usage: buy protection <tier 1-5>".to_string()),
            },
            _ => Command::Unknown,
        }
    }

    fn parse_clan(&self, rest: &str) -> Result<ClanCommand, String> {
        let (sub, args) = match rest.find(char::is_whitespace) {
            Some(i) => (rest[..i].to_lowercase(), rest[i..].trim()),
            None => (rest.to_lowercase(), ""),
        };
        let target = |usage: &str| split_target(args).map(|(id, _)| id).ok_or_else(|| usage.to_string());
        let amount = |usage: &str| parse_amount(args).ok_or_else(|| usage.to_string());
        Ok(match sub.as_str() {
            "" | "help" => ClanCommand::Help,
            "create" => {
                let (tag, name) = match args.find(char::is_whitespace) {
                    Some(i) => (&args[..i], args[i..].trim()),
                    None => return Err("Usage: clan create <TAG> <name>".to_string()),
                };
                ClanCommand::Create {
                    tag: tag.to_string(),
                    name: name.to_string(),
                }
            }
            "join" if !args.is_empty() => ClanCommand::Join(args.to_string()),
            "join" => return Err("Usage: clan join <TAG>".to_string()),
            "leave" => ClanCommand::Leave,
            "info" => ClanCommand::Info((!args.is_empty()).then(|| args.to_string())),
            "members" => ClanCommand::Members,
            "deposit" => ClanCommand::Deposit(amount("Usage: clan deposit <amount>")?),
            "withdraw" => ClanCommand::Withdraw(amount("Usage: clan withdraw <amount>")?),
            "upgrade" => ClanCommand::Upgrade,
            "top" => ClanCommand::Top,
            "log" => ClanCommand::Log,
            "promote" => ClanCommand::Promote(target("Usage: clan promote <player>")?),
            "demote" => ClanCommand::Demote(target("Usage: clan demote <player>")?),
            "kick" => ClanCommand::Kick(target("Usage: clan kick <player>")?),
            "disband" => ClanCommand::Disband,
            "bonuses" => ClanCommand::Bonuses,
            _ => return Err(
                "Clan commands: create, join, leave, info, members, deposit, withdraw, upgrade, top, log, promote, demote, kick, disband, bonuses".to_string(),
            ),
        })
    }

    /// `None` for unrecognised admin words so they stay silent for regular players.
    fn parse_admin(&self, rest: &str) -> Option<Result<AdminCommand, String>> {
        let (sub, args) = match rest.find(char::is_whitespace) {
            Some(i) => (rest[..i].to_lowercase(), rest[i..].trim()),
            None => (rest.to_lowercase(), ""),
        };
        let parsed = match sub.as_str() {
            "mode" => {
                let words: Vec<String> = args.split_whitespace().map(str::to_lowercase).collect();
                match words.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                    ["on", hours] => hours
                        .parse::<i64>()
                        .map(AdminCommand::ModeOn)
                        .map_err(|_| "Usage: admin mode on <hours>".to_string()),
                    ["off"] => Ok(AdminCommand::ModeOff),
                    _ => Err("Usage: admin mode on <hours> | admin mode off".to_string()),
                }
            }
            "grant" => split_target(args)
                .and_then(|(target, amount)| {
                    let (negative, amount) = match amount.strip_prefix('-') {
                        Some(a) => (true, a),
                        None => (false, amount),
                    };
                    let amount = parse_amount(amount)?;
                    Some(AdminCommand::Grant {
                        target,
                        amount: if negative { -amount } else { amount },
                    })
                })
                .ok_or_else(|| "Usage: admin grant <player> <amount>".to_string()),
            "halls" => split_target(args)
                .and_then(|(target, n)| {
                    n.parse::<u32>()
                        .ok()
                        .map(|halls| AdminCommand::Halls { target, halls })
                })
                .ok_or_else(|| "Usage: admin halls <player> <count>".to_string()),
            "ban" => split_target(args)
                .map(|(target, tail)| {
                    let (hours, reason) = match tail.split_once(char::is_whitespace) {
                        Some((first, more)) => match first.parse::<i64>() {
                            Ok(h) => (Some(h), more.trim()),
                            Err(_) => (None, tail),
                        },
                        None => match tail.parse::<i64>() {
                            Ok(h) => (Some(h), ""),
                            Err(_) => (None, tail),
                        },
                    };
                    AdminCommand::Ban {
                        target,
                        hours,
                        reason: reason.to_string(),
                    }
                })
                .ok_or_else(|| "Usage: admin ban <player> [hours] [reason]".to_string()),
            "unban" => split_target(args)
                .map(|(target, _)| AdminCommand::Unban(target))
                .ok_or_else(|| "Usage: admin unban <player>".to_string()),
            "promo" => {
                let words: Vec<&str> = args.split_whitespace().collect();
                match words.as_slice() {
                    [code, reward, uses] => match (parse_amount(reward), uses.parse::<u32>()) {
                        (Some(reward), Ok(uses)) => Ok(AdminCommand::Promo {
                            code: code.to_string(),
                            reward,
                            uses,
                        }),
                        _ => Err("Usage: admin promo <code> <reward> <uses>".to_string()),
                    },
                    _ => Err("Usage: admin promo <code> <reward> <uses>".to_string()),
                }
            }
            _ => return None,
        };
        Some(parsed)
    }
}
