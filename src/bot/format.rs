//! Reply rendering. Every function returns a finished chat message.
//!
//! Numbers use `.` as the thousands separator (`12.500`), players are shown as platform
//! mentions (`[id42|Bob]`).

use chrono::{DateTime, Duration, Utc};

use crate::gym::{
    format_wait, ClanInfo, ClanRosterEntry, CoachUpgrade, CurrencyTransaction, GameTables,
    HallPurchase, IncomeSummary, InspectionMode, InspectionOutcome, InspectionPlan,
    InspectionStats, LiftOutcome, PayoutReceipt, PlayerRecord, Profile, ProtectionActivation,
    TopKind, TrainingOutcome, TrainingReward, TransferReceipt, TreasuryLogEntry, TreasuryOp,
    UserId,
};

pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

pub fn mention(user_id: UserId, label: &str) -> String {
    format!("[id{}|{}]", user_id, label)
}

pub fn format_duration(d: Duration) -> String {
    format_wait(d)
}

pub fn help_text() -> String {
    [
        "GYM LEGEND commands:",
        "profile, balance, name <new>, history",
        "lift, dumbbell, dumbbell shop, upgrade",
        "buy hall [n], income, transfer <player> <amount>",
        "top [balance|lifts|power|halls]",
        "inspectors, buy inspector <tier>, inspect <player> <tier>, inspection stats",
        "protections, buy protection <tier>, protect <tier>, mode",
        "coach, coach upgrade, train, promo <code>",
        "clan help",
    ]
    .join("\n")
}

pub fn render_profile(profile: &Profile, tables: &GameTables, now: DateTime<Utc>) -> String {
    let p = &profile.player;
    let mut lines = vec![
        format!("Profile of {}", mention(p.user_id, &p.name)),
        format!("Balance: {} coins", format_number(p.balance)),
        format!("Power: {}  Lifts: {}", format_number(p.power), format_number(p.total_lifts as i64)),
        format!("Dumbbell: {} (level {})", profile.dumbbell.name, p.dumbbell_level),
        format!("Fitness halls: {}", format_number(p.halls as i64)),
    ];
    if p.coach_level > 0 {
        if let Ok(coach) = tables.coach(p.coach_level) {
            lines.push(format!("Coach: {} (level {})", coach.name, coach.level));
        }
    }
    match &profile.clan {
        Some((clan, role)) => lines.push(format!("Clan: [{}] {} ({})", clan.tag, clan.name, role.label())),
        None => lines.push("Clan: none".to_string()),
    }
    match profile.arsenal.active_protection.filter(|w| w.is_active_at(now)) {
        Some(window) => lines.push(format!(
            "Protection: level {} for {}",
            window.level,
            format_duration(window.remaining(now))
        )),
        None => lines.push("Protection: off".to_string()),
    }
    if let Some(ban) = p.active_ban(now) {
        lines.push(format!("Banned: {}", ban.reason));
    }
    lines.join("\n")
}

pub fn render_lift(outcome: &LiftOutcome) -> String {
    let mut text = format!(
        "You lifted the dumbbell! +{} coins, +{} power.",
        format_number(outcome.income),
        format_number(outcome.power_gained)
    );
    if outcome.clan_bonus > 0 {
        text.push_str(&format!(" (clan bonus +{})", format_number(outcome.clan_bonus)));
    }
    if let Some((tag, credit)) = &outcome.clan_credit {
        text.push_str(&format!("\n[{}] treasury +{}", tag, format_number(*credit)));
    }
    text.push_str(&format!("\nBalance: {}", format_number(outcome.balance)));
    text
}

pub fn render_dumbbell_shop(player: &PlayerRecord, tables: &GameTables) -> String {
    let mut lines = vec![format!("Your dumbbell: level {}", player.dumbbell_level)];
    for level in tables.dumbbells.values().filter(|d| d.level > player.dumbbell_level).take(5) {
        lines.push(format!(
            "{}. {}: {} coins, {} per lift",
            level.level,
            level.name,
            format_number(level.price),
            format_number(level.income_per_lift)
        ));
    }
    if lines.len() == 1 {
        lines.push("You own the heaviest equipment.".to_string());
    } else {
        lines.push("Use 'upgrade' to buy the next one.".to_string());
    }
    lines.join("\n")
}

pub fn render_hall_purchase(purchase: &HallPurchase) -> String {
    format!(
        "Bought {} fitness hall(s) for {} coins.\nHalls: {}  Left to buy today: {}\nBalance: {}",
        purchase.count,
        format_number(purchase.price),
        format_number(purchase.halls as i64),
        purchase.remaining_today,
        format_number(purchase.balance)
    )
}

pub fn render_income(summary: &IncomeSummary) -> String {
    let last = summary
        .last_paid_day
        .map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "Fitness halls: {}\nDaily income: {} coins\nReceived in total: {}\nLast payout: {}",
        format_number(summary.halls as i64),
        format_number(summary.daily_income),
        format_number(summary.total_received),
        last
    )
}

pub fn render_transfer(receipt: &TransferReceipt) -> String {
    format!(
        "Sent {} coins to {} (fee {}, they get {}).\nBalance: {}",
        format_number(receipt.amount),
        mention(receipt.to, &receipt.target_name),
        format_number(receipt.commission),
        format_number(receipt.received),
        format_number(receipt.sender_balance)
    )
}

pub fn render_transfer_notice(receipt: &TransferReceipt, sender_name: &str) -> String {
    format!(
        "{} sent you {} coins.",
        mention(receipt.from, sender_name),
        format_number(receipt.received)
    )
}

pub fn render_history(entries: &[CurrencyTransaction]) -> String {
    if entries.is_empty() {
        return "No transactions yet.".to_string();
    }
    let mut lines = vec!["Recent transactions:".to_string()];
    for tx in entries {
        let sign = if tx.amount >= 0 { "+" } else { "" };
        lines.push(format!(
            "{} {}{} {}",
            tx.timestamp.format("%d.%m %H:%M"),
            sign,
            format_number(tx.amount),
            tx.description
        ));
    }
    lines.join("\n")
}

pub fn render_top(kind: TopKind, players: &[PlayerRecord]) -> String {
    if players.is_empty() {
        return "Nobody here yet.".to_string();
    }
    let mut lines = vec![format!("Top by {}:", kind.label())];
    for (i, p) in players.iter().enumerate() {
        lines.push(format!(
            "{}. {} {}",
            i + 1,
            mention(p.user_id, &p.name),
            format_number(kind.score(p))
        ));
    }
    lines.join("\n")
}

pub fn render_inspectors(tables: &GameTables, owned: &std::collections::BTreeSet<u8>) -> String {
    let mut lines = vec!["Inspectors:".to_string()];
    for tier in tables.inspectors.values() {
        let mark = if owned.contains(&tier.level) { " (owned)" } else { "" };
        lines.push(format!(
            "{}. closes {}-{} halls, {} coins{}",
            tier.level,
            tier.min_damage,
            tier.max_damage,
            format_number(tier.price),
            mark
        ));
    }
    lines.join("\n")
}

pub fn render_protections(tables: &GameTables, owned: &std::collections::BTreeSet<u8>) -> String {
    let mut lines = vec!["Protections:".to_string()];
    for tier in tables.protections.values() {
        let mark = if owned.contains(&tier.level) { " (owned)" } else { "" };
        lines.push(format!(
            "{}. {}: {}% vs inspectors up to {}, {} min, {} coins{}",
            tier.level,
            tier.name,
            tier.chance,
            tier.max_inspector_level,
            tier.duration_minutes,
            format_number(tier.price),
            mark
        ));
    }
    lines.join("\n")
}

pub fn render_inspection_started(plan: &InspectionPlan) -> String {
    format!(
        "An inspector of level {} is on the way to {}...",
        plan.tier,
        mention(plan.target_id, &plan.target_name)
    )
}

pub fn render_inspection_result(outcome: &InspectionOutcome) -> String {
    let target = mention(outcome.target_id, &outcome.target_name);
    let mut text = match outcome.blocked_by {
        Some(level) => format!("The inspection of {} was blocked by protection level {}.", target, level),
        None if outcome.damage == 0 => format!("The inspector found nothing wrong at {}.", target),
        None => format!(
            "The inspector closed {} hall(s) of {}. They have {} left.",
            outcome.damage,
            target,
            format_number(outcome.halls_left as i64)
        ),
    };
    if outcome.inspection_time {
        text.push_str("\nInspection time is on!");
    }
    text.push_str(&format!(
        "\nInspections today: {}/{}. Next in {} min.",
        outcome.inspections_today, outcome.daily_limit, outcome.cooldown_minutes
    ));
    text
}

pub fn render_inspection_notice(outcome: &InspectionOutcome) -> String {
    let attacker = mention(outcome.attacker_id, &outcome.attacker_name);
    match outcome.blocked_by {
        Some(level) => format!("{} sent an inspector to you, but protection level {} stopped it.", attacker, level),
        None if outcome.damage == 0 => format!("{} sent an inspector to you. Nothing was closed.", attacker),
        None => format!(
            "{} sent an inspector to you! {} hall(s) closed, compensation {} coins. Halls left: {}.",
            attacker,
            outcome.damage,
            format_number(outcome.compensation),
            format_number(outcome.halls_left as i64)
        ),
    }
}

pub fn render_inspection_stats(stats: &InspectionStats, today: chrono::NaiveDate, limit: u32) -> String {
    format!(
        "Inspections: {} ({} successful, {} failed)\nHalls closed: {}\nToday: {}/{}\nInspected by others: {} times, halls lost {}, compensation {}\nBlocked by your protection: {}\nSpent on protection: {}",
        stats.attempts,
        stats.successes,
        stats.failures,
        format_number(stats.halls_closed as i64),
        stats.inspections_today.value_on(today),
        limit,
        stats.times_inspected,
        format_number(stats.halls_lost as i64),
        format_number(stats.compensation_received),
        stats.blocked,
        format_number(stats.protection_spent)
    )
}

pub fn render_activation(activation: &ProtectionActivation, now: DateTime<Utc>) -> String {
    let mut text = format!(
        "Protection level {} is active for {}. Paid {} coins, balance {}.",
        activation.window.level,
        format_duration(activation.window.remaining(now)),
        format_number(activation.price),
        format_number(activation.balance)
    );
    if let Some(old) = activation.replaced {
        text.push_str(&format!("\nThe previous level {} window was replaced.", old.level));
    }
    text
}

pub fn render_mode(mode: &InspectionMode, tables: &GameTables, now: DateTime<Utc>) -> String {
    let active = mode.is_active_at(now);
    let settings = tables.mode(active);
    let head = match (active, mode.ends_at) {
        (true, Some(end)) => format!("Inspection time is ON for {}.", format_duration(end - now)),
        (true, None) => "Inspection time is ON.".to_string(),
        (false, _) => "Normal mode.".to_string(),
    };
    format!(
        "{}\nCooldown {} min, {} inspections per day, compensation {} per hall.",
        head, settings.cooldown_minutes, settings.daily_limit, settings.compensation_per_hall
    )
}

pub fn render_coach(player: &PlayerRecord, tables: &GameTables) -> String {
    let mut lines = Vec::new();
    match tables.coach(player.coach_level) {
        Ok(coach) => lines.push(format!(
            "Coach: {} (level {}), pays {}-{} per training, {}% chance of {} hall(s).",
            coach.name, coach.level, coach.min_income, coach.max_income, coach.bonus_chance, coach.bonus_halls
        )),
        Err(_) => lines.push("You have no coach.".to_string()),
    }
    match tables.coaches.get(&player.coach_level.saturating_add(1)) {
        Some(next) => lines.push(format!(
            "Next: {} for {} coins ('coach upgrade').",
            next.name,
            format_number(next.price)
        )),
        None => lines.push("Your coach is the best there is.".to_string()),
    }
    lines.join("\n")
}

pub fn render_coach_upgrade(upgrade: &CoachUpgrade) -> String {
    format!(
        "You hired {} (level {}) for {} coins. Balance: {}",
        upgrade.name,
        upgrade.level,
        format_number(upgrade.price),
        format_number(upgrade.balance)
    )
}

pub fn render_training(outcome: &TrainingOutcome) -> String {
    match outcome.reward {
        TrainingReward::Coins(coins) => format!(
            "Training done: +{} coins. Balance: {}",
            format_number(coins),
            format_number(outcome.balance)
        ),
        TrainingReward::Halls(halls) => format!(
            "Great session! Your coach landed you {} new hall(s). Halls: {}",
            halls,
            format_number(outcome.halls as i64)
        ),
    }
}

pub fn render_clan_info(info: &ClanInfo) -> String {
    let c = &info.clan;
    format!(
        "[{}] {}\nLevel {}  Members {}/{}\nTreasury: {}\nOwner: {}\nBonuses: +{} per lift, +{} per hall daily\n{}",
        c.tag,
        c.name,
        c.level,
        info.member_count,
        info.bonuses.member_limit,
        format_number(c.treasury),
        mention(c.owner_id, &info.owner_name),
        info.bonuses.player_lift_bonus,
        info.bonuses.hall_income_bonus,
        if c.open { "Open to join" } else { "Closed" }
    )
}

pub fn render_roster(entries: &[ClanRosterEntry]) -> String {
    let mut lines = vec!["Members:".to_string()];
    for e in entries {
        lines.push(format!(
            "{} {}, power {}, contributed {}",
            mention(e.member.user_id, &e.name),
            e.member.role.label(),
            format_number(e.power),
            format_number(e.member.contribution)
        ));
    }
    lines.join("\n")
}

pub fn render_treasury_log(entries: &[TreasuryLogEntry]) -> String {
    if entries.is_empty() {
        return "The treasury log is empty.".to_string();
    }
    let mut lines = vec!["Treasury log:".to_string()];
    for e in entries {
        let op = match e.op {
            TreasuryOp::Deposit => "deposit",
            TreasuryOp::Withdraw => "withdraw",
            TreasuryOp::LiftIncome => "lift income",
            TreasuryOp::HallIncome => "hall income",
            TreasuryOp::Upgrade => "upgrade",
        };
        let who = e.user_id.map(|id| format!(" by id{}", id)).unwrap_or_default();
        lines.push(format!(
            "{} {} {}{}",
            e.timestamp.format("%d.%m %H:%M"),
            op,
            format_number(e.amount),
            who
        ));
    }
    lines.join("\n")
}

pub fn render_payout_notice(receipt: &PayoutReceipt) -> String {
    format!(
        "Daily income: your {} fitness hall(s) earned {} coins. Balance: {}",
        format_number(receipt.halls as i64),
        format_number(receipt.amount),
        format_number(receipt.balance)
    )
}
