//! Command processing: parse a chat line, run it against the [`Gym`] and queue the reply.
//!
//! The processor is shared by every in-flight message task. Game operations are short
//! synchronous Sled transactions behind the ledger lock, so they run inline; the only await
//! point is the artificial pause between "inspection started" and the result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info};

use crate::bot::commands::{AdminCommand, ClanCommand, Command, CommandParser};
use crate::bot::format::*;
use crate::config::BotConfig;
use crate::gym::{ClanRole, ErrorKind, Gym, GymError, UserId};
use crate::logutil::escape_log;
use crate::notify::{notify_best_effort, NotifyError, Outbox};

const HISTORY_LIMIT: usize = 10;
const TOP_LIMIT: usize = 10;

/// One chat line as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Conversation the reply goes to (a private chat or a group chat).
    pub peer_id: UserId,
    pub from_id: UserId,
    /// Display name used when the sender is registered on first contact.
    pub name: String,
    pub text: String,
}

impl IncomingMessage {
    /// A private message, where the conversation is the sender.
    pub fn direct(from_id: UserId, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            peer_id: from_id,
            from_id,
            name: name.into(),
            text: text.into(),
        }
    }
}

pub struct CommandProcessor {
    gym: Arc<Gym>,
    outbox: Outbox,
    parser: CommandParser,
    inspection_delay: Duration,
}

impl CommandProcessor {
    pub fn new(gym: Arc<Gym>, outbox: Outbox, config: &BotConfig) -> Self {
        Self {
            gym,
            outbox,
            parser: CommandParser::new(config.prefix_char()),
            inspection_delay: config.inspection_delay(),
        }
    }

    pub fn gym(&self) -> &Gym {
        &self.gym
    }

    /// Handle one message. Unrecognised text produces no reply.
    pub async fn handle(&self, msg: IncomingMessage) -> Result<(), NotifyError> {
        let cmd = self.parser.parse(&msg.text);
        if cmd == Command::Unknown {
            return Ok(());
        }
        debug!("command from {}: {}", msg.from_id, escape_log(&msg.text));
        let reply = match self.execute(&msg, cmd).await {
            Ok(text) => text,
            Err(e) => self.error_reply(msg.from_id, &e),
        };
        self.outbox.reply(msg.peer_id, reply)
    }

    fn error_reply(&self, user_id: UserId, e: &GymError) -> String {
        match e.kind() {
            ErrorKind::Storage => error!("command from {} failed: {}", user_id, e),
            ErrorKind::Validation | ErrorKind::BusinessRule => {
                debug!("command from {} rejected: {}", user_id, e)
            }
        }
        e.user_message()
    }

    async fn execute(&self, msg: &IncomingMessage, cmd: Command) -> Result<String, GymError> {
        let now = Utc::now();
        let gym = &*self.gym;
        let me = msg.from_id;
        let player = gym.ensure_player(me, &msg.name, now)?;
        if let Some(ban) = player.active_ban(now) {
            return Err(GymError::Banned {
                reason: ban.reason.clone(),
            });
        }

        let text = match cmd {
            Command::Help => help_text(),
            Command::Profile => render_profile(&gym.profile(me)?, gym.tables(), now),
            Command::Balance => format!("Balance: {} coins", format_number(player.balance)),
            Command::Rename(name) => format!("Your name is now {}.", gym.rename(me, &name, now)?),
            Command::Lift => render_lift(&gym.lift(me, now)?),
            Command::Dumbbell => {
                let dumbbell = gym.tables().dumbbell(player.dumbbell_level)?;
                format!(
                    "Your dumbbell: {} (level {}).\nIncome {} and power {} per lift.",
                    dumbbell.name, dumbbell.level, dumbbell.income_per_lift, dumbbell.power_per_lift
                )
            }
            Command::DumbbellShop => render_dumbbell_shop(&player, gym.tables()),
            Command::UpgradeDumbbell => {
                let upgrade = gym.upgrade_dumbbell(me, now)?;
                format!(
                    "New equipment: {} (level {}) for {} coins. Balance: {}",
                    upgrade.name,
                    upgrade.level,
                    format_number(upgrade.price),
                    format_number(upgrade.balance)
                )
            }
            Command::BuyHalls(count) => render_hall_purchase(&gym.buy_halls(me, count, now)?),
            Command::Income => render_income(&gym.income_summary(me)?),
            Command::Transfer { target, amount } => {
                let receipt = gym.transfer(me, target, amount, now)?;
                notify_best_effort(&self.outbox, target, &render_transfer_notice(&receipt, &player.name));
                render_transfer(&receipt)
            }
            Command::History => render_history(&gym.recent_transactions(me, HISTORY_LIMIT)?),
            Command::Top(kind) => render_top(kind, &gym.top(kind, TOP_LIMIT, now)?),
            Command::Inspectors => render_inspectors(gym.tables(), &gym.store().get_arsenal(me)?.inspectors),
            Command::BuyInspector(tier) => {
                let purchase = gym.buy_inspector(me, tier, now)?;
                format!(
                    "Inspector level {} hired for {} coins. Balance: {}",
                    purchase.tier,
                    format_number(purchase.price),
                    format_number(purchase.balance)
                )
            }
            Command::Inspect { target, tier } => self.run_inspection(msg, target, tier).await?,
            Command::InspectionStats => {
                let mode = gym.inspection_mode(now)?;
                let limit = gym.tables().mode(mode.is_active_at(now)).daily_limit;
                render_inspection_stats(&gym.inspection_stats(me)?, gym.today(now), limit)
            }
            Command::Protections => render_protections(gym.tables(), &gym.store().get_arsenal(me)?.protections),
            Command::BuyProtection(tier) => {
                let purchase = gym.buy_protection(me, tier, now)?;
                format!(
                    "Protection level {} unlocked for {} coins. Activate it with 'protect {}'. Balance: {}",
                    purchase.tier,
                    format_number(purchase.price),
                    purchase.tier,
                    format_number(purchase.balance)
                )
            }
            Command::Protect(tier) => render_activation(&gym.activate_protection(me, tier, now)?, now),
            Command::Mode => render_mode(&gym.inspection_mode(now)?, gym.tables(), now),
            Command::Coach => render_coach(&player, gym.tables()),
            Command::CoachUpgrade => render_coach_upgrade(&gym.upgrade_coach(me, now)?),
            Command::Train => {
                let outcome = gym.train(me, now, &mut rand::thread_rng())?;
                render_training(&outcome)
            }
            Command::Promo(code) => {
                let redemption = gym.redeem_promo(me, &code, now)?;
                format!(
                    "Promo {} redeemed: +{} coins. Balance: {}",
                    redemption.code,
                    format_number(redemption.reward),
                    format_number(redemption.balance)
                )
            }
            Command::Clan(sub) => self.clan(me, sub)?,
            Command::Admin(sub) => self.admin(me, sub)?,
            Command::Invalid(usage) => usage,
            Command::Unknown => String::new(),
        };
        Ok(text)
    }

    /// Validate, announce, wait, then resolve against fresh state and tell the target.
    async fn run_inspection(&self, msg: &IncomingMessage, target: UserId, tier: u8) -> Result<String, GymError> {
        let plan = self.gym.prepare_inspection(msg.from_id, target, tier, Utc::now())?;
        if let Err(e) = self.outbox.reply(msg.peer_id, render_inspection_started(&plan)) {
            debug!("inspection announcement for {} not sent: {}", msg.from_id, e);
        }
        tokio::time::sleep(self.inspection_delay).await;

        let outcome = self
            .gym
            .resolve_inspection(msg.from_id, target, tier, Utc::now(), &mut rand::thread_rng())?;
        notify_best_effort(&self.outbox, target, &render_inspection_notice(&outcome));
        Ok(render_inspection_result(&outcome))
    }

    fn clan(&self, me: UserId, sub: ClanCommand) -> Result<String, GymError> {
        let gym = &*self.gym;
        let now = Utc::now();
        let not_in_clan = || "You are not in a clan.".to_string();
        Ok(match sub {
            ClanCommand::Help => [
                "Clan commands:",
                "clan create <TAG> <name>, clan join <TAG>, clan leave",
                "clan info [TAG], clan members, clan bonuses, clan top, clan log",
                "clan deposit <amount>, clan withdraw <amount>, clan upgrade",
                "clan promote|demote|kick <player>, clan disband",
            ]
            .join("\n"),
            ClanCommand::Create { tag, name } => {
                let clan = gym.create_clan(me, &tag, &name, now)?;
                format!(
                    "Clan [{}] {} founded for {} coins. You are the owner.",
                    clan.tag,
                    clan.name,
                    format_number(gym.tables().clans.create_cost)
                )
            }
            ClanCommand::Join(tag) => {
                let clan = gym.join_clan(me, &tag, now)?;
                format!("Welcome to [{}] {}!", clan.tag, clan.name)
            }
            ClanCommand::Leave => format!("You left [{}].", gym.leave_clan(me, now)?.tag),
            ClanCommand::Info(Some(tag)) => render_clan_info(&gym.clan_info(&tag)?),
            ClanCommand::Info(None) => match gym.clan_of(me)? {
                Some((clan, _)) => render_clan_info(&gym.describe_clan(clan)?),
                None => not_in_clan(),
            },
            ClanCommand::Members => match gym.clan_of(me)? {
                Some((clan, _)) => render_roster(&gym.clan_roster(clan.id)?),
                None => not_in_clan(),
            },
            ClanCommand::Deposit(amount) => {
                let clan = gym.deposit_to_clan(me, amount, now)?;
                format!(
                    "Deposited {} coins into [{}]. Treasury: {}",
                    format_number(amount),
                    clan.tag,
                    format_number(clan.treasury)
                )
            }
            ClanCommand::Withdraw(amount) => {
                let clan = gym.withdraw_from_clan(me, amount, now)?;
                format!(
                    "Withdrew {} coins from [{}]. Treasury: {}",
                    format_number(amount),
                    clan.tag,
                    format_number(clan.treasury)
                )
            }
            ClanCommand::Upgrade => {
                let (clan, cost) = gym.upgrade_clan(me, now)?;
                format!(
                    "[{}] is now level {} (paid {} from the treasury).",
                    clan.tag,
                    clan.level,
                    format_number(cost)
                )
            }
            ClanCommand::Top => {
                let clans = gym.clan_top(TOP_LIMIT)?;
                if clans.is_empty() {
                    "No clans yet.".to_string()
                } else {
                    let mut lines = vec!["Top clans:".to_string()];
                    for (i, c) in clans.iter().enumerate() {
                        lines.push(format!(
                            "{}. [{}] {} level {}, treasury {}",
                            i + 1,
                            c.tag,
                            c.name,
                            c.level,
                            format_number(c.treasury)
                        ));
                    }
                    lines.join("\n")
                }
            }
            ClanCommand::Log => render_treasury_log(&gym.clan_treasury_log(me, HISTORY_LIMIT)?),
            ClanCommand::Promote(target) => {
                gym.set_clan_role(me, target, ClanRole::Officer, now)?;
                format!("{} is now an officer.", self.label(target))
            }
            ClanCommand::Demote(target) => {
                gym.set_clan_role(me, target, ClanRole::Member, now)?;
                format!("{} is now a member.", self.label(target))
            }
            ClanCommand::Kick(target) => {
                let clan = gym.kick_member(me, target, now)?;
                notify_best_effort(&self.outbox, target, &format!("You were removed from clan [{}].", clan.tag));
                format!("{} was removed from the clan.", self.label(target))
            }
            ClanCommand::Disband => {
                let clan = gym.disband_clan(me, now)?;
                format!("Clan [{}] {} has been disbanded.", clan.tag, clan.name)
            }
            ClanCommand::Bonuses => match gym.clan_of(me)? {
                Some((clan, _)) => {
                    let b = gym.clan_bonuses(clan.level);
                    format!(
                        "[{}] level {} bonuses:\n+{} coins per member lift (you)\n+{} to the treasury per member lift\n+{} to the treasury per member hall daily\nMember limit: {}",
                        clan.tag, clan.level, b.player_lift_bonus, b.lift_bonus_coins, b.hall_income_bonus, b.member_limit
                    )
                }
                None => not_in_clan(),
            },
        })
    }

    fn admin(&self, me: UserId, sub: AdminCommand) -> Result<String, GymError> {
        let gym = &*self.gym;
        let now = Utc::now();
        Ok(match sub {
            AdminCommand::ModeOn(hours) => {
                gym.set_inspection_mode(me, Some(hours), now)?;
                info!("inspection time switched on by {} for {}h", me, hours);
                format!("Inspection time is ON for {} hour(s).", hours)
            }
            AdminCommand::ModeOff => {
                gym.set_inspection_mode(me, None, now)?;
                "Inspection time is OFF.".to_string()
            }
            AdminCommand::Grant { target, amount } => {
                let player = gym.grant_coins(me, target, amount, now)?;
                format!(
                    "{} balance changed by {}. Now {}.",
                    mention(player.user_id, &player.name),
                    format_number(amount),
                    format_number(player.balance)
                )
            }
            AdminCommand::Halls { target, halls } => {
                let player = gym.set_halls(me, target, halls, now)?;
                format!("{} now has {} halls.", mention(player.user_id, &player.name), format_number(halls as i64))
            }
            AdminCommand::Ban { target, hours, reason } => {
                let ban = gym.ban_player(me, target, hours, &reason, now)?;
                let until = ban
                    .until
                    .map(|t| format!("until {}", t.with_timezone(&gym.calendar().offset()).format("%d.%m.%Y %H:%M")))
                    .unwrap_or_else(|| "permanently".to_string());
                notify_best_effort(&self.outbox, target, &format!("You have been banned {}: {}", until, ban.reason));
                format!("{} banned {}.", self.label(target), until)
            }
            AdminCommand::Unban(target) => {
                gym.unban_player(me, target, now)?;
                format!("{} unbanned.", self.label(target))
            }
            AdminCommand::Promo { code, reward, uses } => {
                let promo = gym.create_promo(me, &code, reward, uses, now)?;
                format!(
                    "Promo {} created: {} coins, {} use(s).",
                    promo.code,
                    format_number(promo.reward),
                    promo.uses_total
                )
            }
        })
    }

    /// Mention for a player, falling back to the bare id.
    fn label(&self, user_id: UserId) -> String {
        match self.gym.store().find_player(user_id) {
            Ok(Some(p)) => mention(p.user_id, &p.name),
            _ => format!("id{}", user_id),
        }
    }
}
