use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sled::IVec;

use crate::gym::errors::GymError;
use crate::gym::types::{
    AdminAction, ArsenalRecord, ClanId, ClanMember, ClanRecord, CurrencyTransaction,
    InspectionMode, InspectionStats, PlayerRecord, PromoCode, TreasuryLogEntry, UserId,
    ARSENAL_SCHEMA_VERSION, CLAN_SCHEMA_VERSION, MEMBER_SCHEMA_VERSION, PLAYER_SCHEMA_VERSION,
    PROMO_SCHEMA_VERSION, STATS_SCHEMA_VERSION,
};

const TREE_PLAYERS: &str = "gym_players";
const TREE_ARSENAL: &str = "gym_arsenal";
const TREE_STATS: &str = "gym_stats";
const TREE_CLANS: &str = "gym_clans";
const TREE_MEMBERS: &str = "gym_clan_members";
const TREE_TREASURY_LOG: &str = "gym_treasury_log";
const TREE_TRANSACTIONS: &str = "gym_transactions";
const TREE_SETTINGS: &str = "gym_settings";
const TREE_PROMOS: &str = "gym_promos";
const TREE_ADMIN_LOG: &str = "gym_admin_log";

const KEY_INSPECTION_MODE: &[u8] = b"settings:inspection_mode";

/// Records stored with a schema version stamp.
trait Versioned {
    const ENTITY: &'static str;
    const VERSION: u8;
    fn schema_version(&self) -> u8;
    fn stamp(&mut self);
}

macro_rules! versioned {
    ($ty:ty, $entity:literal, $version:expr) => {
        impl Versioned for $ty {
            const ENTITY: &'static str = $entity;
            const VERSION: u8 = $version;
            fn schema_version(&self) -> u8 {
                self.schema_version
            }
            fn stamp(&mut self) {
                self.schema_version = $version;
            }
        }
    };
}

versioned!(PlayerRecord, "player", PLAYER_SCHEMA_VERSION);
versioned!(ArsenalRecord, "arsenal", ARSENAL_SCHEMA_VERSION);
versioned!(InspectionStats, "inspection stats", STATS_SCHEMA_VERSION);
versioned!(ClanRecord, "clan", CLAN_SCHEMA_VERSION);
versioned!(ClanMember, "clan member", MEMBER_SCHEMA_VERSION);
versioned!(PromoCode, "promo code", PROMO_SCHEMA_VERSION);

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct GymStoreBuilder {
    path: PathBuf,
    flush_on_write: bool,
}

impl GymStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_on_write: true,
        }
    }

    /// Skip the fsync after every write and rely on sled's background flusher. Meant for
    /// tests that run thousands of operations.
    pub fn flush_on_write(mut self, flush: bool) -> Self {
        self.flush_on_write = flush;
        self
    }

    pub fn open(self) -> Result<GymStore, GymError> {
        GymStore::open_with_options(self.path, self.flush_on_write)
    }
}

/// Sled-backed persistence for every gym table.
///
/// One tree per table keeps the relational shape of the game data: players, owned tiers,
/// inspection counters, clans and their members, the treasury and currency audit logs,
/// global settings, promo codes and the admin log. Multi-step ledger mutations hold
/// [`GymStore::lock_ledger`] for their whole read-check-write sequence.
pub struct GymStore {
    db: sled::Db,
    players: sled::Tree,
    arsenal: sled::Tree,
    stats: sled::Tree,
    clans: sled::Tree,
    members: sled::Tree,
    treasury_log: sled::Tree,
    transactions: sled::Tree,
    settings: sled::Tree,
    promos: sled::Tree,
    admin_log: sled::Tree,
    ledger: Mutex<()>,
    flush_on_write: bool,
}

impl GymStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GymError> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, flush_on_write: bool) -> Result<Self, GymError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        Ok(Self {
            players: db.open_tree(TREE_PLAYERS)?,
            arsenal: db.open_tree(TREE_ARSENAL)?,
            stats: db.open_tree(TREE_STATS)?,
            clans: db.open_tree(TREE_CLANS)?,
            members: db.open_tree(TREE_MEMBERS)?,
            treasury_log: db.open_tree(TREE_TREASURY_LOG)?,
            transactions: db.open_tree(TREE_TRANSACTIONS)?,
            settings: db.open_tree(TREE_SETTINGS)?,
            promos: db.open_tree(TREE_PROMOS)?,
            admin_log: db.open_tree(TREE_ADMIN_LOG)?,
            db,
            ledger: Mutex::new(()),
            flush_on_write,
        })
    }

    /// Serialize a multi-step ledger mutation against every other one in this process.
    pub fn lock_ledger(&self) -> Result<MutexGuard<'_, ()>, GymError> {
        self.ledger
            .lock()
            .map_err(|_| GymError::Internal("ledger lock poisoned".to_string()))
    }

    pub fn flush(&self) -> Result<(), GymError> {
        self.db.flush()?;
        Ok(())
    }

    fn player_key(user_id: UserId) -> Vec<u8> {
        format!("players:{}", user_id).into_bytes()
    }

    fn clan_key(clan_id: ClanId) -> Vec<u8> {
        format!("clans:{:020}", clan_id).into_bytes()
    }

    fn clan_tag_key(tag: &str) -> Vec<u8> {
        format!("tags:{}", tag.to_ascii_uppercase()).into_bytes()
    }

    fn clan_name_key(name: &str) -> Vec<u8> {
        format!("names:{}", name.to_lowercase()).into_bytes()
    }

    fn member_prefix(clan_id: ClanId) -> Vec<u8> {
        format!("members:{:020}:", clan_id).into_bytes()
    }

    fn member_key(clan_id: ClanId, user_id: UserId) -> Vec<u8> {
        format!("members:{:020}:{}", clan_id, user_id).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, GymError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, GymError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn decode_versioned<T>(bytes: IVec) -> Result<T, GymError>
    where
        T: Versioned + serde::de::DeserializeOwned,
    {
        let record: T = Self::deserialize(bytes)?;
        if record.schema_version() != T::VERSION {
            return Err(GymError::SchemaMismatch {
                entity: T::ENTITY,
                expected: T::VERSION,
                found: record.schema_version(),
            });
        }
        Ok(record)
    }

    fn load<T>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, GymError>
    where
        T: Versioned + serde::de::DeserializeOwned,
    {
        match tree.get(key)? {
            Some(bytes) => Ok(Some(Self::decode_versioned(bytes)?)),
            None => Ok(None),
        }
    }

    fn save<T>(&self, tree: &sled::Tree, key: Vec<u8>, mut record: T) -> Result<(), GymError>
    where
        T: Versioned + serde::Serialize,
    {
        record.stamp();
        tree.insert(key, Self::serialize(&record)?)?;
        self.after_write(tree)
    }

    fn after_write(&self, tree: &sled::Tree) -> Result<(), GymError> {
        if self.flush_on_write {
            tree.flush()?;
        }
        Ok(())
    }

    fn scan_all<T>(tree: &sled::Tree, prefix: &[u8]) -> Result<Vec<T>, GymError>
    where
        T: Versioned + serde::de::DeserializeOwned,
    {
        let mut out = Vec::new();
        for entry in tree.scan_prefix(prefix) {
            let (_, bytes) = entry?;
            out.push(Self::decode_versioned(bytes)?);
        }
        Ok(out)
    }

    fn scan_newest<T>(tree: &sled::Tree, prefix: &[u8], limit: usize) -> Result<Vec<T>, GymError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut out = Vec::new();
        for entry in tree.scan_prefix(prefix).rev().take(limit) {
            let (_, bytes) = entry?;
            out.push(Self::deserialize(bytes)?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------------

    pub fn put_player(&self, player: PlayerRecord) -> Result<(), GymError> {
        let key = Self::player_key(player.user_id);
        self.save(&self.players, key, player)
    }

    pub fn get_player(&self, user_id: UserId) -> Result<PlayerRecord, GymError> {
        self.find_player(user_id)?
            .ok_or(GymError::PlayerNotFound(user_id))
    }

    pub fn find_player(&self, user_id: UserId) -> Result<Option<PlayerRecord>, GymError> {
        Self::load(&self.players, &Self::player_key(user_id))
    }

    pub fn list_players(&self) -> Result<Vec<PlayerRecord>, GymError> {
        Self::scan_all(&self.players, b"players:")
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    // ------------------------------------------------------------------------
    // Owned tiers and inspection counters
    // ------------------------------------------------------------------------

    /// Fetch a player's arsenal; players who never bought anything get an empty one.
    pub fn get_arsenal(&self, user_id: UserId) -> Result<ArsenalRecord, GymError> {
        Ok(Self::load(&self.arsenal, &Self::player_key(user_id))?
            .unwrap_or_else(|| ArsenalRecord::new(user_id)))
    }

    pub fn put_arsenal(&self, arsenal: ArsenalRecord) -> Result<(), GymError> {
        let key = Self::player_key(arsenal.user_id);
        self.save(&self.arsenal, key, arsenal)
    }

    pub fn list_arsenals(&self) -> Result<Vec<ArsenalRecord>, GymError> {
        Self::scan_all(&self.arsenal, b"players:")
    }

    pub fn get_stats(&self, user_id: UserId) -> Result<InspectionStats, GymError> {
        Ok(Self::load(&self.stats, &Self::player_key(user_id))?
            .unwrap_or_else(|| InspectionStats::new(user_id)))
    }

    pub fn put_stats(&self, stats: InspectionStats) -> Result<(), GymError> {
        let key = Self::player_key(stats.user_id);
        self.save(&self.stats, key, stats)
    }

    pub fn list_stats(&self) -> Result<Vec<InspectionStats>, GymError> {
        Self::scan_all(&self.stats, b"players:")
    }

    // ------------------------------------------------------------------------
    // Clans
    // ------------------------------------------------------------------------

    pub fn next_clan_id(&self) -> Result<ClanId, GymError> {
        // generate_id starts at 0; keep ids human friendly.
        Ok(self.db.generate_id()? + 1)
    }

    /// Insert or update a clan together with its unique tag and name indexes.
    pub fn put_clan(&self, clan: ClanRecord) -> Result<(), GymError> {
        let id_bytes = clan.id.to_be_bytes().to_vec();
        self.clans.insert(Self::clan_tag_key(&clan.tag), id_bytes.clone())?;
        self.clans.insert(Self::clan_name_key(&clan.name), id_bytes)?;
        let key = Self::clan_key(clan.id);
        self.save(&self.clans, key, clan)
    }

    pub fn get_clan(&self, clan_id: ClanId) -> Result<ClanRecord, GymError> {
        Self::load(&self.clans, &Self::clan_key(clan_id))?
            .ok_or_else(|| GymError::ClanNotFound(format!("#{}", clan_id)))
    }

    fn index_lookup(&self, key: Vec<u8>) -> Result<Option<ClanId>, GymError> {
        let Some(bytes) = self.clans.get(key)? else {
            return Ok(None);
        };
        let raw = <[u8; 8]>::try_from(&bytes[..])
            .map_err(|_| GymError::Internal("corrupt clan index entry".to_string()))?;
        Ok(Some(u64::from_be_bytes(raw)))
    }

    pub fn find_clan_by_tag(&self, tag: &str) -> Result<Option<ClanRecord>, GymError> {
        match self.index_lookup(Self::clan_tag_key(tag))? {
            Some(id) => Self::load(&self.clans, &Self::clan_key(id)),
            None => Ok(None),
        }
    }

    pub fn clan_name_taken(&self, name: &str) -> Result<bool, GymError> {
        Ok(self.index_lookup(Self::clan_name_key(name))?.is_some())
    }

    pub fn list_clans(&self) -> Result<Vec<ClanRecord>, GymError> {
        Self::scan_all(&self.clans, b"clans:")
    }

    /// Remove a clan, its indexes and its member rows. The treasury log is kept for audit.
    pub fn delete_clan(&self, clan: &ClanRecord) -> Result<(), GymError> {
        self.clans.remove(Self::clan_key(clan.id))?;
        self.clans.remove(Self::clan_tag_key(&clan.tag))?;
        self.clans.remove(Self::clan_name_key(&clan.name))?;
        for entry in self.members.scan_prefix(Self::member_prefix(clan.id)) {
            let (key, _) = entry?;
            self.members.remove(key)?;
        }
        self.after_write(&self.clans)?;
        self.after_write(&self.members)
    }

    pub fn put_member(&self, member: ClanMember) -> Result<(), GymError> {
        let key = Self::member_key(member.clan_id, member.user_id);
        self.save(&self.members, key, member)
    }

    pub fn get_member(&self, clan_id: ClanId, user_id: UserId) -> Result<Option<ClanMember>, GymError> {
        Self::load(&self.members, &Self::member_key(clan_id, user_id))
    }

    pub fn remove_member(&self, clan_id: ClanId, user_id: UserId) -> Result<(), GymError> {
        self.members.remove(Self::member_key(clan_id, user_id))?;
        self.after_write(&self.members)
    }

    pub fn list_members(&self, clan_id: ClanId) -> Result<Vec<ClanMember>, GymError> {
        Self::scan_all(&self.members, &Self::member_prefix(clan_id))
    }

    pub fn member_count(&self, clan_id: ClanId) -> usize {
        self.members.scan_prefix(Self::member_prefix(clan_id)).count()
    }

    pub fn append_treasury_log(&self, entry: TreasuryLogEntry) -> Result<(), GymError> {
        let seq = self.db.generate_id()?;
        let key = format!("log:{:020}:{:020}", entry.clan_id, seq).into_bytes();
        self.treasury_log.insert(key, Self::serialize(&entry)?)?;
        self.after_write(&self.treasury_log)
    }

    /// Newest-first treasury history for a clan.
    pub fn treasury_log(&self, clan_id: ClanId, limit: usize) -> Result<Vec<TreasuryLogEntry>, GymError> {
        let prefix = format!("log:{:020}:", clan_id).into_bytes();
        Self::scan_newest(&self.treasury_log, &prefix, limit)
    }

    // ------------------------------------------------------------------------
    // Currency audit
    // ------------------------------------------------------------------------

    pub fn record_transaction(&self, tx: CurrencyTransaction) -> Result<(), GymError> {
        let seq = self.db.generate_id()?;
        let key = format!("tx:{}:{:020}", tx.user_id, seq).into_bytes();
        self.transactions.insert(key, Self::serialize(&tx)?)?;
        self.after_write(&self.transactions)
    }

    pub fn recent_transactions(&self, user_id: UserId, limit: usize) -> Result<Vec<CurrencyTransaction>, GymError> {
        let prefix = format!("tx:{}:", user_id).into_bytes();
        Self::scan_newest(&self.transactions, &prefix, limit)
    }

    // ------------------------------------------------------------------------
    // Settings, promo codes, admin log
    // ------------------------------------------------------------------------

    pub fn get_inspection_mode(&self) -> Result<InspectionMode, GymError> {
        match self.settings.get(KEY_INSPECTION_MODE)? {
            Some(bytes) => Self::deserialize(bytes),
            None => Ok(InspectionMode::default()),
        }
    }

    pub fn put_inspection_mode(&self, mode: &InspectionMode) -> Result<(), GymError> {
        self.settings.insert(KEY_INSPECTION_MODE, Self::serialize(mode)?)?;
        self.after_write(&self.settings)
    }

    pub fn put_promo(&self, promo: PromoCode) -> Result<(), GymError> {
        let key = format!("promo:{}", promo.code).into_bytes();
        self.save(&self.promos, key, promo)
    }

    pub fn get_promo(&self, code: &str) -> Result<Option<PromoCode>, GymError> {
        Self::load(&self.promos, format!("promo:{}", code).as_bytes())
    }

    pub fn promo_redeemed_by(&self, code: &str, user_id: UserId) -> Result<bool, GymError> {
        Ok(self
            .promos
            .contains_key(format!("redeemed:{}:{}", code, user_id))?)
    }

    pub fn mark_promo_redeemed(&self, code: &str, user_id: UserId) -> Result<(), GymError> {
        self.promos
            .insert(format!("redeemed:{}:{}", code, user_id), &[1u8][..])?;
        self.after_write(&self.promos)
    }

    pub fn append_admin_action(&self, action: AdminAction) -> Result<(), GymError> {
        let seq = self.db.generate_id()?;
        let key = format!("admin:{:020}", seq).into_bytes();
        self.admin_log.insert(key, Self::serialize(&action)?)?;
        self.after_write(&self.admin_log)
    }

    pub fn recent_admin_actions(&self, limit: usize) -> Result<Vec<AdminAction>, GymError> {
        Self::scan_newest(&self.admin_log, b"admin:", limit)
    }
}
