//! Integration tests for inspection validation and resolution

mod common;

use chrono::Duration;
use gymlegend::gym::{GymError, TransactionReason};
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{balance, day_start, player_with_balance, register_admin, set_halls, test_gym, ADMIN};

const ATTACKER: i64 = 1;
const TARGET: i64 = 2;

#[test]
fn test_damage_is_clamped_to_target_halls() {
    let (_tmp, gym) = test_gym();
    let base = day_start();
    player_with_balance(&gym, ATTACKER, 1_000, base);
    player_with_balance(&gym, TARGET, 0, base);
    gym.buy_inspector(ATTACKER, 3, base).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let mut seen = [0u32; 6];
    let mut expected_balance = 0;
    for day in 0..100 {
        let now = base + Duration::days(day) + Duration::hours(12);
        set_halls(&gym, TARGET, 4);
        let outcome = gym
            .resolve_inspection(ATTACKER, TARGET, 3, now, &mut rng)
            .unwrap();
        assert!(!outcome.blocked());
        assert!((3..=5).contains(&outcome.rolled));
        assert!((3..=4).contains(&outcome.damage), "damage {}", outcome.damage);
        assert_eq!(outcome.damage, outcome.rolled.min(4));
        assert_eq!(outcome.halls_left, 4 - outcome.damage);
        assert_eq!(outcome.compensation, outcome.damage as i64 * 3);
        assert_eq!(gym.player(TARGET).unwrap().halls, 4 - outcome.damage);
        expected_balance += outcome.compensation;
        seen[outcome.damage as usize] += 1;
    }
    assert!(seen[3] > 0 && seen[4] > 0);
    assert_eq!(balance(&gym, TARGET), expected_balance);

    let stats = gym.inspection_stats(ATTACKER).unwrap();
    assert_eq!(stats.attempts, 100);
    assert_eq!(stats.successes, 100);
    assert_eq!(stats.failures, 0);
    let target_stats = gym.inspection_stats(TARGET).unwrap();
    assert_eq!(target_stats.times_inspected, 100);
    assert_eq!(target_stats.compensation_received, expected_balance);
}

#[test]
fn test_target_without_halls_loses_nothing() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, ATTACKER, 100, now);
    player_with_balance(&gym, TARGET, 0, now);
    gym.buy_inspector(ATTACKER, 5, now).unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let outcome = gym.resolve_inspection(ATTACKER, TARGET, 5, now, &mut rng).unwrap();
    assert!(outcome.rolled >= 8);
    assert_eq!(outcome.damage, 0);
    assert_eq!(outcome.compensation, 0);
    assert_eq!(balance(&gym, TARGET), 0);
    // The attempt still counts.
    assert_eq!(gym.inspection_stats(ATTACKER).unwrap().attempts, 1);
}

#[test]
fn test_compensation_is_recorded_in_target_history() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, ATTACKER, 100, now);
    player_with_balance(&gym, TARGET, 0, now);
    set_halls(&gym, TARGET, 50);
    gym.buy_inspector(ATTACKER, 4, now).unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let outcome = gym.resolve_inspection(ATTACKER, TARGET, 4, now, &mut rng).unwrap();
    assert!((5..=7).contains(&outcome.damage));

    let history = gym.recent_transactions(TARGET, 5).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reason, TransactionReason::InspectionCompensation);
    assert_eq!(history[0].amount, outcome.compensation);
    assert_eq!(history[0].counterparty, Some(ATTACKER));
}

#[test]
fn test_daily_quota_rejects_one_more() {
    let (_tmp, gym) = test_gym();
    let base = day_start();
    player_with_balance(&gym, ATTACKER, 100, base);
    player_with_balance(&gym, TARGET, 0, base);
    set_halls(&gym, TARGET, 1_000);
    gym.buy_inspector(ATTACKER, 2, base).unwrap();

    let mut rng = StdRng::seed_from_u64(11);
    let limit = gym.tables().normal_mode.daily_limit;
    for i in 0..limit as i64 {
        let now = base + Duration::minutes(61 * i);
        gym.resolve_inspection(ATTACKER, TARGET, 2, now, &mut rng).unwrap();
    }
    let late = base + Duration::minutes(61 * limit as i64);
    let before = gym.inspection_stats(ATTACKER).unwrap();
    let err = gym
        .resolve_inspection(ATTACKER, TARGET, 2, late, &mut rng)
        .unwrap_err();
    assert!(matches!(err, GymError::QuotaExceeded { limit: l } if l == limit));
    // A rejected attempt mutates nothing.
    assert_eq!(gym.inspection_stats(ATTACKER).unwrap(), before);

    // The quota belongs to the day.
    let tomorrow = base + Duration::days(1);
    gym.resolve_inspection(ATTACKER, TARGET, 2, tomorrow, &mut rng).unwrap();
    let stats = gym.inspection_stats(ATTACKER).unwrap();
    assert_eq!(stats.inspections_today.value_on(gym.today(tomorrow)), 1);
}

#[test]
fn test_cooldown_between_inspections() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, ATTACKER, 100, now);
    player_with_balance(&gym, TARGET, 0, now);
    gym.buy_inspector(ATTACKER, 1, now).unwrap();

    let mut rng = StdRng::seed_from_u64(5);
    gym.resolve_inspection(ATTACKER, TARGET, 1, now, &mut rng).unwrap();

    let soon = now + Duration::minutes(30);
    match gym.prepare_inspection(ATTACKER, TARGET, 1, soon) {
        Err(GymError::OnCooldown { remaining }) => assert_eq!(remaining, Duration::minutes(30)),
        other => panic!("expected cooldown, got {:?}", other),
    }

    let ready = now + Duration::minutes(60);
    assert!(gym.prepare_inspection(ATTACKER, TARGET, 1, ready).is_ok());
}

#[test]
fn test_precondition_failures() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, ATTACKER, 10_000, now);
    player_with_balance(&gym, TARGET, 0, now);

    assert!(matches!(
        gym.prepare_inspection(ATTACKER, ATTACKER, 1, now),
        Err(GymError::SelfTarget)
    ));
    assert!(matches!(
        gym.prepare_inspection(ATTACKER, TARGET, 6, now),
        Err(GymError::UnknownLevel { kind: "inspector", level: 6 })
    ));
    assert!(matches!(
        gym.prepare_inspection(ATTACKER, TARGET, 2, now),
        Err(GymError::NotOwned { kind: "inspector", level: 2 })
    ));

    gym.buy_inspector(ATTACKER, 2, now).unwrap();
    assert!(matches!(
        gym.buy_inspector(ATTACKER, 2, now),
        Err(GymError::AlreadyOwned { kind: "inspector", level: 2 })
    ));
    assert!(matches!(
        gym.prepare_inspection(ATTACKER, 777, 2, now),
        Err(GymError::PlayerNotFound(777))
    ));

    gym.create_clan(ATTACKER, "IRON", "Iron Lifters", now).unwrap();
    gym.join_clan(TARGET, "IRON", now).unwrap();
    assert!(matches!(
        gym.prepare_inspection(ATTACKER, TARGET, 2, now),
        Err(GymError::SameClan)
    ));
}

#[test]
fn test_inspector_purchase_needs_funds() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, ATTACKER, 10, now);

    let err = gym.buy_inspector(ATTACKER, 3, now).unwrap_err();
    assert!(matches!(err, GymError::InsufficientFunds { need: 15, have: 10 }));
    assert_eq!(balance(&gym, ATTACKER), 10);
    assert!(gym.store().get_arsenal(ATTACKER).unwrap().inspectors.is_empty());

    let purchase = gym.buy_inspector(ATTACKER, 2, now).unwrap();
    assert_eq!((purchase.price, purchase.balance), (6, 4));
}

#[test]
fn test_inspection_time_changes_the_rules() {
    let (_tmp, gym) = test_gym();
    let base = day_start();
    register_admin(&gym, base);
    player_with_balance(&gym, ATTACKER, 100, base);
    player_with_balance(&gym, TARGET, 0, base);
    set_halls(&gym, TARGET, 1_000);
    gym.buy_inspector(ATTACKER, 3, base).unwrap();
    gym.set_inspection_mode(ADMIN, Some(24), base).unwrap();

    let mut rng = StdRng::seed_from_u64(21);
    let first = gym.resolve_inspection(ATTACKER, TARGET, 3, base, &mut rng).unwrap();
    assert!(first.inspection_time);
    assert_eq!(first.daily_limit, 24);
    assert_eq!(first.cooldown_minutes, 30);
    assert_eq!(first.compensation, first.damage as i64 * 6);

    // Thirty minutes is enough during inspection time.
    let next = base + Duration::minutes(30);
    gym.resolve_inspection(ATTACKER, TARGET, 3, next, &mut rng).unwrap();

    // After the window ends the normal cooldown applies again.
    let after = base + Duration::hours(24) + Duration::minutes(10);
    let plan = gym.prepare_inspection(ATTACKER, TARGET, 3, after).unwrap();
    assert!(!plan.inspection_time);
    assert!(!gym.inspection_mode(after).unwrap().active);
}

#[test]
fn test_banned_attacker_cannot_inspect() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    register_admin(&gym, now);
    player_with_balance(&gym, ATTACKER, 100, now);
    player_with_balance(&gym, TARGET, 0, now);
    gym.buy_inspector(ATTACKER, 1, now).unwrap();
    gym.ban_player(ADMIN, ATTACKER, Some(2), "spam", now).unwrap();

    assert!(matches!(
        gym.prepare_inspection(ATTACKER, TARGET, 1, now),
        Err(GymError::Banned { .. })
    ));
    let later = now + Duration::hours(3);
    assert!(gym.prepare_inspection(ATTACKER, TARGET, 1, later).is_ok());
}
