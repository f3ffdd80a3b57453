//! Integration tests for clans: membership, roles, the treasury and level bonuses

mod common;

use chrono::Duration;
use gymlegend::gym::{ClanRole, GymError, TreasuryOp};

use common::{balance, day_start, player_with_balance, test_gym};

const OWNER: i64 = 1;
const OFFICER: i64 = 2;
const MEMBER: i64 = 3;
const OUTSIDER: i64 = 4;

fn clan_with_roles(gym: &gymlegend::gym::Gym) {
    let now = day_start();
    player_with_balance(gym, OWNER, 10_000, now);
    player_with_balance(gym, OFFICER, 1_000, now);
    player_with_balance(gym, MEMBER, 1_000, now);
    player_with_balance(gym, OUTSIDER, 1_000, now);
    gym.create_clan(OWNER, "Gym", "Iron Paradise", now).unwrap();
    gym.join_clan(OFFICER, "gym", now).unwrap();
    gym.join_clan(MEMBER, "GYM", now).unwrap();
    gym.set_clan_role(OWNER, OFFICER, ClanRole::Officer, now).unwrap();
}

#[test]
fn test_create_charges_owner_and_reserves_names() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, OWNER, 6_000, now);
    player_with_balance(&gym, OUTSIDER, 6_000, now);

    let clan = gym.create_clan(OWNER, "gym", "Iron Paradise", now).unwrap();
    assert_eq!(clan.tag, "GYM");
    assert_eq!(clan.level, 1);
    assert_eq!(clan.treasury, 0);
    assert_eq!(balance(&gym, OWNER), 1_000);

    assert!(matches!(
        gym.create_clan(OUTSIDER, "GYM", "Other Name", now),
        Err(GymError::Rule(_))
    ));
    assert!(matches!(
        gym.create_clan(OUTSIDER, "NEW", "iron paradise", now),
        Err(GymError::Rule(_))
    ));
    assert!(matches!(
        gym.create_clan(OUTSIDER, "TOOLONG", "Fine Name", now),
        Err(GymError::Invalid(_))
    ));
    assert!(matches!(
        gym.create_clan(OWNER, "TWO", "Second Clan", now),
        Err(GymError::Rule(_))
    ));
    assert_eq!(balance(&gym, OUTSIDER), 6_000);
}

#[test]
fn test_create_without_funds() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, OWNER, 4_999, now);
    assert!(matches!(
        gym.create_clan(OWNER, "GYM", "Iron Paradise", now),
        Err(GymError::InsufficientFunds { need: 5_000, have: 4_999 })
    ));
    assert!(gym.clan_of(OWNER).unwrap().is_none());
}

#[test]
fn test_deposit_and_manager_only_withdraw() {
    let (_tmp, gym) = test_gym();
    clan_with_roles(&gym);
    let now = day_start() + Duration::hours(1);

    let clan = gym.deposit_to_clan(MEMBER, 400, now).unwrap();
    assert_eq!(clan.treasury, 400);
    assert_eq!(balance(&gym, MEMBER), 600);

    assert!(matches!(
        gym.withdraw_from_clan(MEMBER, 100, now),
        Err(GymError::PermissionDenied(_))
    ));
    assert!(matches!(
        gym.withdraw_from_clan(OFFICER, 500, now),
        Err(GymError::InsufficientFunds { need: 500, have: 400 })
    ));
    let clan = gym.withdraw_from_clan(OFFICER, 150, now).unwrap();
    assert_eq!(clan.treasury, 250);
    assert_eq!(balance(&gym, OFFICER), 1_150);

    assert!(matches!(
        gym.deposit_to_clan(OUTSIDER, 10, now),
        Err(GymError::Rule(_))
    ));
    assert!(matches!(gym.deposit_to_clan(MEMBER, 0, now), Err(GymError::Invalid(_))));

    let log = gym.clan_treasury_log(OWNER, 10).unwrap();
    let ops: Vec<_> = log.iter().map(|e| (e.op, e.amount)).collect();
    assert_eq!(ops, vec![(TreasuryOp::Withdraw, -150), (TreasuryOp::Deposit, 400)]);

    let roster = gym.clan_roster(clan.id).unwrap();
    let order: Vec<_> = roster.iter().map(|r| r.member.user_id).collect();
    assert_eq!(order, vec![OWNER, OFFICER, MEMBER]);
    assert_eq!(roster[2].member.contribution, 400);
}

#[test]
fn test_upgrade_raises_bonuses() {
    let (_tmp, gym) = test_gym();
    clan_with_roles(&gym);
    let now = day_start() + Duration::hours(1);

    assert!(matches!(
        gym.upgrade_clan(OFFICER, now),
        Err(GymError::InsufficientFunds { need: 1_000, have: 0 })
    ));
    gym.deposit_to_clan(OWNER, 3_500, now).unwrap();
    assert!(matches!(gym.upgrade_clan(MEMBER, now), Err(GymError::PermissionDenied(_))));

    let (clan, cost) = gym.upgrade_clan(OFFICER, now).unwrap();
    assert_eq!((clan.level, cost, clan.treasury), (2, 1_000, 2_500));
    let (clan, cost) = gym.upgrade_clan(OWNER, now).unwrap();
    assert_eq!((clan.level, cost, clan.treasury), (3, 2_000, 500));

    let info = gym.clan_info("GYM").unwrap();
    assert_eq!(info.member_count, 3);
    assert_eq!(info.bonuses.player_lift_bonus, 3);
    assert_eq!(info.bonuses.hall_income_bonus, 3);
    assert_eq!(info.bonuses.member_limit, 16);

    let lift = gym.lift(MEMBER, now).unwrap();
    assert_eq!(lift.income, 1 + 3);
    assert_eq!(lift.clan_credit, Some(("GYM".to_string(), 3)));
}

#[test]
fn test_member_limit_applies_on_join() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, OWNER, 10_000, now);
    gym.create_clan(OWNER, "FULL", "Packed House", now).unwrap();
    let limit = gym.clan_bonuses(1).member_limit as i64;
    for id in 100..100 + limit - 1 {
        player_with_balance(&gym, id, 0, now);
        gym.join_clan(id, "FULL", now).unwrap();
    }
    player_with_balance(&gym, 999, 0, now);
    assert!(matches!(gym.join_clan(999, "FULL", now), Err(GymError::Rule(_))));
    assert!(matches!(
        gym.join_clan(999, "NONE", now),
        Err(GymError::ClanNotFound(_))
    ));
}

#[test]
fn test_role_rules_for_kick_and_leave() {
    let (_tmp, gym) = test_gym();
    clan_with_roles(&gym);
    let now = day_start() + Duration::hours(1);

    assert!(matches!(gym.leave_clan(OWNER, now), Err(GymError::Rule(_))));
    assert!(matches!(
        gym.kick_member(OFFICER, OWNER, now),
        Err(GymError::PermissionDenied(_))
    ));
    assert!(matches!(
        gym.kick_member(MEMBER, OFFICER, now),
        Err(GymError::PermissionDenied(_))
    ));
    assert!(matches!(
        gym.set_clan_role(OFFICER, MEMBER, ClanRole::Officer, now),
        Err(GymError::PermissionDenied(_))
    ));

    gym.kick_member(OFFICER, MEMBER, now).unwrap();
    assert!(gym.clan_of(MEMBER).unwrap().is_none());
    assert!(gym.player(MEMBER).unwrap().clan_id.is_none());

    gym.set_clan_role(OWNER, OFFICER, ClanRole::Member, now).unwrap();
    gym.leave_clan(OFFICER, now).unwrap();
    let (clan, member) = gym.clan_of(OWNER).unwrap().expect("owner stays");
    assert_eq!(member.role, ClanRole::Owner);
    assert_eq!(gym.store().member_count(clan.id), 1);
}

#[test]
fn test_disband_frees_members_and_loses_treasury() {
    let (_tmp, gym) = test_gym();
    clan_with_roles(&gym);
    let now = day_start() + Duration::hours(1);
    gym.deposit_to_clan(MEMBER, 500, now).unwrap();

    assert!(matches!(gym.disband_clan(OFFICER, now), Err(GymError::PermissionDenied(_))));
    let clan = gym.disband_clan(OWNER, now).unwrap();
    assert_eq!(clan.treasury, 500);

    for id in [OWNER, OFFICER, MEMBER] {
        assert!(gym.player(id).unwrap().clan_id.is_none());
    }
    assert!(matches!(gym.clan_info("GYM"), Err(GymError::ClanNotFound(_))));
    assert_eq!(balance(&gym, MEMBER), 500);

    // The tag is free again.
    player_with_balance(&gym, OUTSIDER, 5_000, now);
    gym.create_clan(OUTSIDER, "GYM", "Iron Paradise", now).unwrap();
}

#[test]
fn test_clan_top_orders_by_level_then_treasury() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    for (id, tag) in [(1, "AAA"), (2, "BBB"), (3, "CCC")] {
        player_with_balance(&gym, id, 10_000, now);
        gym.create_clan(id, tag, &format!("Clan {}", tag), now).unwrap();
    }
    gym.deposit_to_clan(1, 100, now).unwrap();
    gym.deposit_to_clan(2, 1_500, now).unwrap();
    gym.upgrade_clan(2, now).unwrap();
    gym.deposit_to_clan(3, 200, now).unwrap();

    let tags: Vec<_> = gym.clan_top(10).unwrap().into_iter().map(|c| c.tag).collect();
    assert_eq!(tags, vec!["BBB", "CCC", "AAA"]);
}
