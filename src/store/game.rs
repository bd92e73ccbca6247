//! Typed game-state operations over the tabular store.
//!
//! One method per logical operation the handlers need. Column positions are
//! resolved by header name on every call — snapshots come from the short-TTL
//! table cache, so this costs no extra round trips. A missing header is a
//! contract fault and raises [`StoreError::Schema`].
//!
//! Settings are cached separately with a longer TTL and are force-reloaded
//! by a periodic background task.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::FixedOffset;
use tokio::time::Instant;
use tracing::debug;

use crate::error::StoreError;
use crate::store::client::ResilientTables;
use crate::util::{now_stamp, today_ymd};

/// Logical table names (worksheet titles in the original deployment).
pub const RUNNERS: &str = "러너";
pub const LIMITS: &str = "제한";
pub const EXPLORE: &str = "탐색";
pub const SESSIONS: &str = "세션";
pub const PARTICIPATION: &str = "참여기록";
pub const CONFIG: &str = "설정";
pub const BAG: &str = "가방";

/// A runner row: one user known to the bot.
#[derive(Debug, Clone)]
pub struct Runner {
    pub handle: String,
    pub nickname: String,
    pub house: String,
    pub points: i64,
    pub last_attend_date: String,
    pub last_confirm_date: String,
}

/// Reward configuration of one exploration node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub area: String,
    pub place: String,
    pub coin_min: i64,
    pub coin_max: i64,
    pub item: String,
    pub qty: i64,
    pub rumor: String,
}

/// Store behavior knobs supplied by process configuration.
#[derive(Debug, Clone)]
pub struct GameStoreOptions {
    pub timezone: FixedOffset,
    pub config_ttl: Duration,
    /// Whether the inventory matrix is configured at all.
    pub ledger_enabled: bool,
    /// Label inventory columns `@handle` instead of bare handle.
    pub user_column_with_at: bool,
}

type ConfigSnapshot = (Arc<HashMap<String, String>>, Instant);

/// Game-state store.
pub struct GameStore {
    tables: ResilientTables,
    opts: GameStoreOptions,
    config: StdMutex<Option<ConfigSnapshot>>,
}

impl GameStore {
    pub fn new(tables: ResilientTables, opts: GameStoreOptions) -> Self {
        Self {
            tables,
            opts,
            config: StdMutex::new(None),
        }
    }

    /// Today's calendar date in the store's timezone.
    pub fn today(&self) -> String {
        today_ymd(&self.opts.timezone)
    }

    /// Wall-clock timestamp in the store's timezone.
    pub fn stamp(&self) -> String {
        now_stamp(&self.opts.timezone)
    }

    // ── Settings ────────────────────────────────────────────────────

    /// Current settings snapshot, refreshed when the long TTL lapses.
    pub async fn config(&self) -> Result<Arc<HashMap<String, String>>, StoreError> {
        {
            let cached = self.config.lock().expect("config cache poisoned");
            if let Some((map, loaded_at)) = cached.as_ref()
                && loaded_at.elapsed() <= self.opts.config_ttl
            {
                return Ok(Arc::clone(map));
            }
        }

        let rows = self.tables.read(CONFIG).await?;
        let mut map = HashMap::new();
        for row in rows.iter().skip(1) {
            let key = cell(row, 0).trim();
            if !key.is_empty() {
                map.insert(key.to_string(), cell(row, 1).trim().to_string());
            }
        }
        let map = Arc::new(map);

        let mut cached = self.config.lock().expect("config cache poisoned");
        *cached = Some((Arc::clone(&map), Instant::now()));
        Ok(map)
    }

    /// Drop the settings snapshot so the next read refetches.
    pub async fn force_reload(&self) {
        self.config.lock().expect("config cache poisoned").take();
        self.tables.invalidate(CONFIG).await;
        debug!("settings cache invalidated");
    }

    // ── Runners ─────────────────────────────────────────────────────

    /// Find a runner row by handle, creating it on first contact.
    ///
    /// Returns the 1-based row number and the parsed runner.
    pub async fn runner(&self, handle: &str) -> Result<(u32, Runner), StoreError> {
        for pass in 0..2 {
            let rows = self.tables.read(RUNNERS).await?;
            let cu = header_index(&rows, RUNNERS, "유저명")?;
            let cn = header_index(&rows, RUNNERS, "닉네임")?;
            let ch = header_index(&rows, RUNNERS, "기숙사")?;
            let cp = header_index(&rows, RUNNERS, "기숙사점수")?;
            let ca = header_index(&rows, RUNNERS, "출석마지막일")?;
            let cc = header_index(&rows, RUNNERS, "이벤트확인마지막일")?;

            for (r, row) in rows.iter().enumerate().skip(1) {
                if cell(row, cu).trim() == handle {
                    return Ok((
                        r as u32 + 1,
                        Runner {
                            handle: handle.to_string(),
                            nickname: cell(row, cn).to_string(),
                            house: cell(row, ch).to_string(),
                            points: to_int(cell(row, cp), 0),
                            last_attend_date: cell(row, ca).to_string(),
                            last_confirm_date: cell(row, cc).to_string(),
                        },
                    ));
                }
            }

            if pass == 0 {
                debug!(handle, "runner not found; creating row");
                self.tables
                    .append_row(RUNNERS, &row_of(&[handle, "", "", "0", "", ""]))
                    .await?;
            }
        }
        Err(StoreError::Schema(format!(
            "{RUNNERS}: row for '{handle}' missing after append"
        )))
    }

    pub async fn update_runner_nickname(&self, row: u32, nickname: &str) -> Result<(), StoreError> {
        let col = self.column(RUNNERS, "닉네임").await?;
        self.tables.update_cell(RUNNERS, row, col, nickname).await
    }

    pub async fn update_runner_points(&self, row: u32, points: i64) -> Result<(), StoreError> {
        let col = self.column(RUNNERS, "기숙사점수").await?;
        self.tables
            .update_cell(RUNNERS, row, col, &points.to_string())
            .await
    }

    pub async fn update_runner_last_attend(&self, row: u32, ymd: &str) -> Result<(), StoreError> {
        let col = self.column(RUNNERS, "출석마지막일").await?;
        self.tables.update_cell(RUNNERS, row, col, ymd).await
    }

    pub async fn update_runner_last_confirm(&self, row: u32, ymd: &str) -> Result<(), StoreError> {
        let col = self.column(RUNNERS, "이벤트확인마지막일").await?;
        self.tables.update_cell(RUNNERS, row, col, ymd).await
    }

    // ── Daily usage counters ────────────────────────────────────────

    /// Times `handle` has consumed exploration quota today.
    pub async fn today_usage(&self, handle: &str) -> Result<i64, StoreError> {
        let ymd = self.today();
        let rows = self.tables.read(LIMITS).await?;
        let cu = header_index(&rows, LIMITS, "유저명")?;
        let cd = header_index(&rows, LIMITS, "날짜")?;
        let cc = header_index(&rows, LIMITS, "탐색_사용횟수")?;

        for row in rows.iter().skip(1) {
            if cell(row, cu).trim() == handle && cell(row, cd).trim() == ymd {
                return Ok(to_int(cell(row, cc), 0));
            }
        }
        Ok(0)
    }

    /// Increment today's usage counter, creating the row on first use.
    pub async fn inc_today_usage(&self, handle: &str) -> Result<(), StoreError> {
        let ymd = self.today();
        let rows = self.tables.read(LIMITS).await?;
        let cu = header_index(&rows, LIMITS, "유저명")?;
        let cd = header_index(&rows, LIMITS, "날짜")?;
        let cc = header_index(&rows, LIMITS, "탐색_사용횟수")?;

        for (r, row) in rows.iter().enumerate().skip(1) {
            if cell(row, cu).trim() == handle && cell(row, cd).trim() == ymd {
                let next = to_int(cell(row, cc), 0) + 1;
                return self
                    .tables
                    .update_cell(LIMITS, r as u32 + 1, cc as u32 + 1, &next.to_string())
                    .await;
            }
        }
        self.tables
            .append_row(LIMITS, &row_of(&[handle, &ymd, "1"]))
            .await
    }

    // ── Exploration nodes ───────────────────────────────────────────

    pub async fn node_exists(&self, area: &str) -> Result<bool, StoreError> {
        let rows = self.tables.read(EXPLORE).await?;
        let ia = header_index(&rows, EXPLORE, "구역")?;
        Ok(rows.iter().skip(1).any(|row| cell(row, ia).trim() == area))
    }

    /// Reward configuration for a node, if it has a settings row.
    pub async fn node_config(&self, area: &str) -> Result<Option<NodeConfig>, StoreError> {
        let rows = self.tables.read(EXPLORE).await?;
        let ia = header_index(&rows, EXPLORE, "구역")?;
        let ips = header_index(&rows, EXPLORE, "장소스크립트")?;
        let imin = header_index(&rows, EXPLORE, "갈레온_최소")?;
        let imax = header_index(&rows, EXPLORE, "갈레온_최대")?;
        let iitem = header_index(&rows, EXPLORE, "아이템명")?;
        let iqty = header_index(&rows, EXPLORE, "아이템수량")?;
        let irum = header_index(&rows, EXPLORE, "소문스크립트")?;

        for row in rows.iter().skip(1) {
            if cell(row, ia).trim() == area {
                return Ok(Some(NodeConfig {
                    area: area.to_string(),
                    place: cell(row, ips).to_string(),
                    coin_min: to_int(cell(row, imin), 0),
                    coin_max: to_int(cell(row, imax), 0),
                    item: cell(row, iitem).trim().to_string(),
                    qty: to_int(cell(row, iqty), 0).max(0),
                    rumor: cell(row, irum).trim().to_string(),
                }));
            }
        }
        Ok(None)
    }

    /// Unique child areas of `parent`, sorted. Empty parent lists the roots.
    pub async fn children(&self, parent: &str) -> Result<Vec<String>, StoreError> {
        let rows = self.tables.read(EXPLORE).await?;
        let ia = header_index(&rows, EXPLORE, "구역")?;
        let ipar = header_index(&rows, EXPLORE, "부모구역")?;

        let mut children = BTreeSet::new();
        for row in rows.iter().skip(1) {
            if cell(row, ipar).trim() == parent {
                let child = cell(row, ia).trim();
                if !child.is_empty() {
                    children.insert(child.to_string());
                }
            }
        }
        Ok(children.into_iter().collect())
    }

    // ── Sessions ────────────────────────────────────────────────────

    /// A runner's exploration session: (row, current path). Created empty on
    /// first use.
    pub async fn session(&self, handle: &str) -> Result<(u32, String), StoreError> {
        for pass in 0..2 {
            let rows = self.tables.read(SESSIONS).await?;
            let cu = header_index(&rows, SESSIONS, "유저명")?;
            let cp = header_index(&rows, SESSIONS, "현재경로")?;

            for (r, row) in rows.iter().enumerate().skip(1) {
                if cell(row, cu).trim() == handle {
                    return Ok((r as u32 + 1, cell(row, cp).to_string()));
                }
            }

            if pass == 0 {
                self.tables
                    .append_row(SESSIONS, &row_of(&[handle, "", ""]))
                    .await?;
            }
        }
        Err(StoreError::Schema(format!(
            "{SESSIONS}: row for '{handle}' missing after append"
        )))
    }

    /// Store a session's current path and update timestamp.
    pub async fn set_session_path(&self, row: u32, path: &str) -> Result<(), StoreError> {
        let col = self.column(SESSIONS, "현재경로").await?;
        self.tables.update_cell(SESSIONS, row, col, path).await?;
        self.tables
            .update_cell(SESSIONS, row, col + 1, &self.stamp())
            .await
    }

    // ── Participation log ───────────────────────────────────────────

    /// Whether a (type, notice, handle) grant is already recorded.
    pub async fn has_participation(
        &self,
        event_type: &str,
        notice_id: &str,
        handle: &str,
    ) -> Result<bool, StoreError> {
        let rows = self.tables.read(PARTICIPATION).await?;
        let it = header_index(&rows, PARTICIPATION, "유형")?;
        let iid = header_index(&rows, PARTICIPATION, "공지ID")?;
        let iu = header_index(&rows, PARTICIPATION, "유저명")?;

        Ok(rows.iter().skip(1).any(|row| {
            cell(row, it) == event_type && cell(row, iid) == notice_id && cell(row, iu) == handle
        }))
    }

    /// Append a participation record.
    pub async fn append_participation(
        &self,
        event_type: &str,
        notice_id: &str,
        handle: &str,
    ) -> Result<(), StoreError> {
        let stamp = self.stamp();
        self.tables
            .append_row(
                PARTICIPATION,
                &row_of(&[event_type, notice_id, handle, &stamp]),
            )
            .await
    }

    // ── Inventory ledger ────────────────────────────────────────────

    /// Grant currency. No-op when the ledger is not configured or the amount
    /// is zero.
    pub async fn add_currency(&self, handle: &str, amount: i64) -> Result<(), StoreError> {
        if !self.opts.ledger_enabled || amount == 0 {
            return Ok(());
        }
        let conf = self.config().await?;
        let key = config_str(&conf, "통화키", "골드").to_string();
        self.bump_ledger(handle, &key, amount).await
    }

    /// Grant an item. No-op when the ledger is not configured or the
    /// quantity is zero.
    pub async fn add_item(&self, handle: &str, item: &str, qty: i64) -> Result<(), StoreError> {
        if !self.opts.ledger_enabled || qty == 0 {
            return Ok(());
        }
        self.bump_ledger(handle, item, qty).await
    }

    /// Add `amount` to the (item row, user column) cell of the inventory
    /// matrix, creating the column or row on first use.
    async fn bump_ledger(&self, handle: &str, item: &str, amount: i64) -> Result<(), StoreError> {
        let rows = self.tables.read(BAG).await?;
        let target = if self.opts.user_column_with_at {
            format!("@{handle}")
        } else {
            handle.to_string()
        };

        let header = rows.first().cloned().unwrap_or_default();
        let col = match header.iter().position(|h| h.trim() == target) {
            Some(i) => i as u32 + 1,
            None => {
                let next = header.len() as u32 + 1;
                self.tables.update_cell(BAG, 1, next, &target).await?;
                next
            }
        };

        let row = match rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, r)| cell(r, 0).trim() == item)
        {
            Some((i, _)) => i as u32 + 1,
            None => {
                let next = rows.len().max(1) as u32 + 1;
                self.tables.update_cell(BAG, next, 1, item).await?;
                next
            }
        };

        let current = rows
            .get(row as usize - 1)
            .map(|r| to_int(cell(r, col as usize - 1), 0))
            .unwrap_or(0);
        self.tables
            .update_cell(BAG, row, col, &(current + amount).to_string())
            .await
    }

    /// 1-based column of `name` in `table`.
    async fn column(&self, table: &str, name: &str) -> Result<u32, StoreError> {
        let rows = self.tables.read(table).await?;
        Ok(header_index(&rows, table, name)? as u32 + 1)
    }
}

// ── Row/config helpers ──────────────────────────────────────────────

fn row_of(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

fn to_int(s: &str, default: i64) -> i64 {
    s.trim().parse().unwrap_or(default)
}

fn header_index(rows: &[Vec<String>], table: &str, name: &str) -> Result<usize, StoreError> {
    let header = rows
        .first()
        .ok_or_else(|| StoreError::Schema(format!("{table}: empty table")))?;
    header
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| StoreError::Schema(format!("{table}: missing column '{name}'")))
}

/// Setting value with a fallback default.
pub fn config_str<'a>(conf: &'a HashMap<String, String>, key: &str, default: &'a str) -> &'a str {
    match conf.get(key) {
        Some(v) if !v.trim().is_empty() => v.trim(),
        _ => default,
    }
}

/// Integer setting with a fallback default (malformed values fall back too).
pub fn config_int(conf: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    conf.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use crate::store::traits::TableBackend;

    fn store_over(backend: Arc<MemoryBackend>) -> GameStore {
        let tables = ResilientTables::new(backend, Duration::from_millis(10));
        GameStore::new(
            tables,
            GameStoreOptions {
                timezone: FixedOffset::east_opt(9 * 3600).unwrap(),
                config_ttl: Duration::from_secs(1800),
                ledger_enabled: true,
                user_column_with_at: false,
            },
        )
    }

    fn seeded() -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::with_tables([
            (
                RUNNERS,
                vec![
                    vec!["유저명", "닉네임", "기숙사", "기숙사점수", "출석마지막일", "이벤트확인마지막일"],
                    vec!["alice", "앨리스", "그리핀", "10", "", ""],
                ],
            ),
            (
                LIMITS,
                vec![vec!["유저명", "날짜", "탐색_사용횟수"]],
            ),
            (
                EXPLORE,
                vec![
                    vec!["구역", "부모구역", "장소스크립트", "갈레온_최소", "갈레온_최대", "아이템명", "아이템수량", "소문스크립트"],
                    vec!["숲", "", "어두운 숲이다.", "1", "5", "", "0", ""],
                    vec!["동굴", "숲", "축축한 동굴.", "0", "0", "", "0", "이상한 소문"],
                    vec!["공터", "숲", "빈 공터.", "0", "0", "", "0", ""],
                ],
            ),
            (
                SESSIONS,
                vec![vec!["유저명", "현재경로", "마지막업데이트"]],
            ),
            (
                PARTICIPATION,
                vec![vec!["유형", "공지ID", "유저명", "시각"]],
            ),
            (
                CONFIG,
                vec![
                    vec!["키", "값"],
                    vec!["출석_기숙사점수", "2"],
                    vec!["통화키", "갈레온"],
                ],
            ),
            (BAG, vec![vec!["아이템"]]),
        ]))
    }

    #[tokio::test]
    async fn runner_lookup_existing() {
        let store = store_over(seeded());
        let (row, runner) = store.runner("alice").await.unwrap();
        assert_eq!(row, 2);
        assert_eq!(runner.nickname, "앨리스");
        assert_eq!(runner.points, 10);
    }

    #[tokio::test]
    async fn runner_upsert_on_first_contact() {
        let backend = seeded();
        let store = store_over(backend.clone());
        let (row, runner) = store.runner("bob").await.unwrap();
        assert_eq!(row, 3);
        assert_eq!(runner.points, 0);
        // Second call finds the same row, no duplicate append.
        let (row2, _) = store.runner("bob").await.unwrap();
        assert_eq!(row2, row);
        assert_eq!(backend.rows(RUNNERS).len(), 3);
    }

    #[tokio::test]
    async fn usage_counter_round_trip() {
        let store = store_over(seeded());
        assert_eq!(store.today_usage("alice").await.unwrap(), 0);
        store.inc_today_usage("alice").await.unwrap();
        store.inc_today_usage("alice").await.unwrap();
        assert_eq!(store.today_usage("alice").await.unwrap(), 2);
        // Other users unaffected.
        assert_eq!(store.today_usage("bob").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn children_are_sorted_and_unique() {
        let store = store_over(seeded());
        assert_eq!(store.children("").await.unwrap(), vec!["숲"]);
        assert_eq!(store.children("숲").await.unwrap(), vec!["공터", "동굴"]);
        assert!(store.children("동굴").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn participation_dedupe() {
        let store = store_over(seeded());
        assert!(!store.has_participation("확인", "n1", "alice").await.unwrap());
        store.append_participation("확인", "n1", "alice").await.unwrap();
        assert!(store.has_participation("확인", "n1", "alice").await.unwrap());
        // Different notice is a fresh grant.
        assert!(!store.has_participation("확인", "n2", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn ledger_creates_column_and_row() {
        let backend = seeded();
        let store = store_over(backend.clone());
        store.add_currency("alice", 7).await.unwrap();
        store.add_currency("alice", 3).await.unwrap();

        let rows = backend.rows(BAG);
        assert_eq!(rows[0][1], "alice");
        assert_eq!(rows[1][0], "갈레온");
        assert_eq!(rows[1][1], "10");
    }

    #[tokio::test]
    async fn ledger_disabled_is_a_noop() {
        let backend = seeded();
        let tables = ResilientTables::new(backend.clone(), Duration::from_millis(10));
        let store = GameStore::new(
            tables,
            GameStoreOptions {
                timezone: FixedOffset::east_opt(9 * 3600).unwrap(),
                config_ttl: Duration::from_secs(1800),
                ledger_enabled: false,
                user_column_with_at: false,
            },
        );
        store.add_currency("alice", 7).await.unwrap();
        assert_eq!(backend.rows(BAG), vec![vec!["아이템".to_string()]]);
    }

    #[tokio::test]
    async fn session_created_on_first_use() {
        let store = store_over(seeded());
        let (row, path) = store.session("alice").await.unwrap();
        assert_eq!(row, 2);
        assert_eq!(path, "");
        store.set_session_path(row, "숲/동굴").await.unwrap();
        let (_, path) = store.session("alice").await.unwrap();
        assert_eq!(path, "숲/동굴");
    }

    #[tokio::test(start_paused = true)]
    async fn config_snapshot_and_force_reload() {
        let backend = seeded();
        let store = store_over(backend.clone());

        let conf = store.config().await.unwrap();
        assert_eq!(config_int(&conf, "출석_기숙사점수", 1), 2);
        assert_eq!(config_str(&conf, "아이디_표기", "hidden"), "hidden");

        // A write behind the cache is invisible until reload.
        backend
            .append_row(CONFIG, &row_of(&["출석_통화", "5"]))
            .await
            .unwrap();
        let conf = store.config().await.unwrap();
        assert_eq!(config_int(&conf, "출석_통화", 0), 0);

        store.force_reload().await;
        let conf = store.config().await.unwrap();
        assert_eq!(config_int(&conf, "출석_통화", 0), 5);
    }

    #[tokio::test]
    async fn missing_header_is_a_schema_fault() {
        let backend = Arc::new(MemoryBackend::with_tables([(
            RUNNERS,
            vec![vec!["유저명", "닉네임"]],
        )]));
        let store = store_over(backend);
        let err = store.runner("alice").await.unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }
}
