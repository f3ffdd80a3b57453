//! Integration tests for protection unlocks, activation windows and blocking

mod common;

use chrono::Duration;
use gymlegend::gym::{protection_blocks, GymError, TransactionReason};
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{balance, day_start, player_with_balance, register_admin, set_halls, test_gym, ADMIN};

const ATTACKER: i64 = 10;
const DEFENDER: i64 = 20;

#[test]
fn test_activation_replaces_running_window() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, DEFENDER, 1_000, now);
    gym.buy_protection(DEFENDER, 1, now).unwrap();
    gym.buy_protection(DEFENDER, 2, now).unwrap();

    let first = gym.activate_protection(DEFENDER, 1, now).unwrap();
    assert_eq!(first.window.expires_at, now + Duration::minutes(15));
    assert!(first.replaced.is_none());

    let later = now + Duration::minutes(5);
    let second = gym.activate_protection(DEFENDER, 2, later).unwrap();
    assert_eq!(second.replaced.map(|w| w.level), Some(1));
    // No stacking: the new window runs from the second activation only.
    assert_eq!(second.window.expires_at, later + Duration::minutes(30));

    let active = gym.active_protection(DEFENDER, later).unwrap().expect("active window");
    assert_eq!(active.level, 2);
    assert_eq!(active.activated_at, later);
}

#[test]
fn test_every_activation_is_charged() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, DEFENDER, 300, now);

    let purchase = gym.buy_protection(DEFENDER, 2, now).unwrap();
    assert_eq!((purchase.price, purchase.balance), (75, 225));

    let a = gym.activate_protection(DEFENDER, 2, now).unwrap();
    assert_eq!(a.balance, 150);
    let b = gym.activate_protection(DEFENDER, 2, now + Duration::hours(1)).unwrap();
    assert_eq!(b.balance, 75);
    assert!(b.replaced.is_none(), "an expired window is not reported as replaced");

    let reasons: Vec<_> = gym
        .recent_transactions(DEFENDER, 10)
        .unwrap()
        .into_iter()
        .map(|tx| tx.reason)
        .collect();
    assert_eq!(
        reasons,
        vec![
            TransactionReason::ProtectionActivation,
            TransactionReason::ProtectionActivation,
            TransactionReason::ProtectionPurchase,
        ]
    );
    assert_eq!(gym.inspection_stats(DEFENDER).unwrap().protection_spent, 150);
}

#[test]
fn test_activation_requires_unlock_and_funds() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, DEFENDER, 100, now);

    assert!(matches!(
        gym.activate_protection(DEFENDER, 3, now),
        Err(GymError::NotOwned { kind: "protection", level: 3 })
    ));
    assert!(matches!(
        gym.buy_protection(DEFENDER, 9, now),
        Err(GymError::UnknownLevel { kind: "protection", level: 9 })
    ));

    gym.buy_protection(DEFENDER, 2, now).unwrap();
    assert!(matches!(
        gym.buy_protection(DEFENDER, 2, now),
        Err(GymError::AlreadyOwned { .. })
    ));
    // 25 left, activation costs 75.
    let err = gym.activate_protection(DEFENDER, 2, now).unwrap_err();
    assert!(matches!(err, GymError::InsufficientFunds { need: 75, have: 25 }));
    assert!(gym.active_protection(DEFENDER, now).unwrap().is_none());
    assert_eq!(balance(&gym, DEFENDER), 25);
}

#[test]
fn test_expired_window_is_cleared_on_read() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, DEFENDER, 1_000, now);
    gym.buy_protection(DEFENDER, 2, now).unwrap();
    gym.activate_protection(DEFENDER, 2, now).unwrap();

    let inside = now + Duration::minutes(29);
    assert!(gym.active_protection(DEFENDER, inside).unwrap().is_some());

    let expiry = now + Duration::minutes(30);
    assert!(gym.active_protection(DEFENDER, expiry).unwrap().is_none());
    assert!(gym.store().get_arsenal(DEFENDER).unwrap().active_protection.is_none());
}

#[test]
fn test_sweep_clears_only_expired_windows() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    for id in [1, 2, 3] {
        player_with_balance(&gym, id, 1_000, now);
        gym.buy_protection(id, 1, now).unwrap();
        gym.buy_protection(id, 4, now).unwrap();
    }
    gym.activate_protection(1, 1, now).unwrap();
    gym.activate_protection(2, 1, now).unwrap();
    gym.activate_protection(3, 4, now).unwrap();

    let later = now + Duration::minutes(20);
    assert_eq!(gym.sweep_expired_protections(later).unwrap(), 2);
    assert_eq!(gym.sweep_expired_protections(later).unwrap(), 0);
    assert!(gym.store().get_arsenal(3).unwrap().active_protection.is_some());
}

#[test]
fn test_block_rate_matches_protection_chance() {
    let (_tmp, gym) = test_gym();
    let base = day_start();
    player_with_balance(&gym, ATTACKER, 100, base);
    player_with_balance(&gym, DEFENDER, 100_000, base);
    gym.buy_inspector(ATTACKER, 3, base).unwrap();
    gym.buy_protection(DEFENDER, 2, base).unwrap();

    let mut rng = StdRng::seed_from_u64(2024);
    let trials = 1_000;
    let mut blocked = 0;
    for day in 0..trials {
        let now = base + Duration::days(day);
        set_halls(&gym, DEFENDER, 10);
        gym.activate_protection(DEFENDER, 2, now).unwrap();
        let outcome = gym
            .resolve_inspection(ATTACKER, DEFENDER, 3, now + Duration::minutes(1), &mut rng)
            .unwrap();
        if outcome.blocked() {
            assert_eq!(outcome.blocked_by, Some(2));
            assert_eq!((outcome.damage, outcome.compensation), (0, 0));
            blocked += 1;
        }
    }
    // 15% of 1000, with generous slack for the seeded draw.
    assert!((100..=200).contains(&blocked), "blocked {} of {}", blocked, trials);

    let stats = gym.inspection_stats(ATTACKER).unwrap();
    assert_eq!(stats.attempts, trials as u64);
    assert_eq!(stats.failures, blocked as u64);
    assert_eq!(gym.inspection_stats(DEFENDER).unwrap().blocked, blocked as u64);
}

#[test]
fn test_blocked_inspection_consumes_attempt_and_cooldown() {
    let (_tmp, gym) = test_gym();
    let now = day_start();
    player_with_balance(&gym, ATTACKER, 100, now);
    player_with_balance(&gym, DEFENDER, 1_000, now);
    set_halls(&gym, DEFENDER, 5);
    gym.buy_inspector(ATTACKER, 4, now).unwrap();
    gym.buy_protection(DEFENDER, 5, now).unwrap();
    gym.activate_protection(DEFENDER, 5, now).unwrap();

    let mut rng = StdRng::seed_from_u64(9);
    let outcome = gym.resolve_inspection(ATTACKER, DEFENDER, 4, now, &mut rng).unwrap();
    assert_eq!(outcome.blocked_by, Some(5));
    assert_eq!(gym.player(DEFENDER).unwrap().halls, 5);

    let stats = gym.inspection_stats(ATTACKER).unwrap();
    assert_eq!(stats.inspections_today.value_on(gym.today(now)), 1);
    assert!(matches!(
        gym.prepare_inspection(ATTACKER, DEFENDER, 4, now + Duration::minutes(10)),
        Err(GymError::OnCooldown { .. })
    ));
}

#[test]
fn test_stronger_inspector_is_never_blocked() {
    let (_tmp, gym) = test_gym();
    let base = day_start();
    player_with_balance(&gym, ATTACKER, 100, base);
    player_with_balance(&gym, DEFENDER, 10_000, base);
    gym.buy_inspector(ATTACKER, 4, base).unwrap();
    gym.buy_protection(DEFENDER, 2, base).unwrap();

    let mut rng = StdRng::seed_from_u64(77);
    for day in 0..50 {
        let now = base + Duration::days(day);
        set_halls(&gym, DEFENDER, 20);
        gym.activate_protection(DEFENDER, 2, now).unwrap();
        let outcome = gym.resolve_inspection(ATTACKER, DEFENDER, 4, now, &mut rng).unwrap();
        assert!(!outcome.blocked());
        assert!((5..=7).contains(&outcome.damage));
    }
}

#[test]
fn test_nothing_blocks_during_inspection_time() {
    let (_tmp, gym) = test_gym();
    let base = day_start();
    register_admin(&gym, base);
    player_with_balance(&gym, ATTACKER, 100, base);
    player_with_balance(&gym, DEFENDER, 10_000, base);
    gym.buy_inspector(ATTACKER, 1, base).unwrap();
    gym.buy_protection(DEFENDER, 5, base).unwrap();
    gym.set_inspection_mode(ADMIN, Some(24), base).unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    for i in 0..20 {
        let now = base + Duration::minutes(30 * i);
        gym.activate_protection(DEFENDER, 5, now).unwrap();
        let outcome = gym.resolve_inspection(ATTACKER, DEFENDER, 1, now, &mut rng).unwrap();
        assert!(outcome.inspection_time);
        assert!(!outcome.blocked());
    }
}

#[test]
fn test_block_roll_bounds() {
    let (_tmp, gym) = test_gym();
    let tables = gym.tables();
    let mut rng = StdRng::seed_from_u64(1);

    let level5 = tables.protection(5).unwrap();
    assert!((0..100).all(|_| protection_blocks(level5, 5, false, &mut rng)));
    assert!((0..100).all(|_| !protection_blocks(level5, 5, true, &mut rng)));

    let level1 = tables.protection(1).unwrap();
    assert!((0..100).all(|_| !protection_blocks(level1, 3, false, &mut rng)));
}
