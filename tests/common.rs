//! Test utilities & fixtures.
//! Every test gets a throwaway Sled store in its own temp dir and a UTC calendar, so
//! "today" is simply the UTC date of the injected `now`.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use gymlegend::gym::{GameTables, Gym, GymStoreBuilder, LocalCalendar, UserId};
use tempfile::TempDir;

pub const ADMIN: UserId = 900;

/// A gym backed by a fresh store. Keep the `TempDir` alive for the duration of the test.
pub fn test_gym() -> (TempDir, Gym) {
    let tmp = TempDir::new().expect("tempdir");
    let store = GymStoreBuilder::new(tmp.path().join("gym"))
        .flush_on_write(false)
        .open()
        .expect("open store");
    let gym = Gym::new(Arc::new(store), Arc::new(GameTables::standard()), LocalCalendar::utc())
        .with_admins([ADMIN]);
    (tmp, gym)
}

/// Midnight UTC on a fixed day, a stable base for time arithmetic.
pub fn day_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single().expect("valid time")
}

/// Register a player and give them `balance` coins.
#[allow(dead_code)]
pub fn player_with_balance(gym: &Gym, user_id: UserId, balance: i64, now: DateTime<Utc>) {
    let mut player = gym
        .ensure_player(user_id, &format!("Player{}", user_id), now)
        .expect("register");
    player.balance = balance;
    gym.store().put_player(player).expect("save player");
}

/// Overwrite a player's hall count directly.
#[allow(dead_code)]
pub fn set_halls(gym: &Gym, user_id: UserId, halls: u32) {
    let mut player = gym.player(user_id).expect("player");
    player.halls = halls;
    gym.store().put_player(player).expect("save player");
}

#[allow(dead_code)]
pub fn balance(gym: &Gym, user_id: UserId) -> i64 {
    gym.player(user_id).expect("player").balance
}

/// Register the bootstrap admin so admin operations find a player record.
#[allow(dead_code)]
pub fn register_admin(gym: &Gym, now: DateTime<Utc>) {
    gym.ensure_player(ADMIN, "Admin", now).expect("register admin");
}
