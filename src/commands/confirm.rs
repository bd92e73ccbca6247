//! Event participation confirmation.
//!
//! Caller must hold the handle's lock for the whole call: the duplicate
//! check, the grant, and the participation append form one read-modify-write.

use crate::error::Error;
use crate::store::GameStore;
use crate::store::game::{config_int, config_str};
use crate::util::build_user_label;

/// Participation log event type for confirmations.
pub const EVENT_TYPE: &str = "확인";

/// Reply for confirmation outside the allowed announcement thread.
const DENIED: &str = "참여 확인은 지정된 공지에 대한 답글로만 인정됩니다.";

/// Reply for a repeated confirmation of the same notice.
const ALREADY: &str = "이미 해당 이벤트의 참여 확인이 되었습니다.";

pub async fn handle(
    store: &GameStore,
    handle: &str,
    allowed: bool,
    root_id: &str,
) -> Result<String, Error> {
    if !allowed {
        return Ok(DENIED.to_string());
    }

    let conf = store.config().await?;

    if !root_id.is_empty() && store.has_participation(EVENT_TYPE, root_id, handle).await? {
        return Ok(ALREADY.to_string());
    }

    let (row, runner) = store.runner(handle).await?;
    let points = config_int(&conf, "확인_기숙사점수", 1);

    store.update_runner_points(row, runner.points + points).await?;
    store.update_runner_last_confirm(row, &store.today()).await?;

    let coins = config_int(&conf, "확인_통화", 0);
    if coins != 0 {
        store.add_currency(handle, coins).await?;
    }

    store.append_participation(EVENT_TYPE, root_id, handle).await?;

    let mode = config_str(&conf, "아이디_표기", "hidden").to_lowercase();
    let label = build_user_label(handle, &runner.nickname, &mode);
    let currency = config_str(&conf, "통화키", "갈레온");
    let tail = if coins != 0 {
        format!(" / {currency} +{coins}")
    } else {
        String::new()
    };
    Ok(format!(
        "{label}의 이벤트 참여 확인이 완료되었습니다. 기숙사 점수 +{points}{tail}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::FixedOffset;

    use crate::store::client::ResilientTables;
    use crate::store::game::{CONFIG, GameStoreOptions, PARTICIPATION, RUNNERS};
    use crate::store::memory::MemoryBackend;

    fn fixture() -> (Arc<MemoryBackend>, GameStore) {
        let backend = Arc::new(MemoryBackend::with_tables([
            (
                RUNNERS,
                vec![
                    vec!["유저명", "닉네임", "기숙사", "기숙사점수", "출석마지막일", "이벤트확인마지막일"],
                    vec!["alice", "", "", "0", "", ""],
                ],
            ),
            (
                PARTICIPATION,
                vec![vec!["유형", "공지ID", "유저명", "시각"]],
            ),
            (
                CONFIG,
                vec![vec!["키", "값"], vec!["확인_기숙사점수", "1"]],
            ),
        ]));
        let store = GameStore::new(
            ResilientTables::new(backend.clone(), Duration::from_millis(10)),
            GameStoreOptions {
                timezone: FixedOffset::east_opt(9 * 3600).unwrap(),
                config_ttl: Duration::from_secs(1800),
                ledger_enabled: false,
                user_column_with_at: false,
            },
        );
        (backend, store)
    }

    #[tokio::test]
    async fn grants_once_per_notice() {
        let (backend, store) = fixture();

        let msg = handle(&store, "alice", true, "notice-1").await.unwrap();
        assert_eq!(msg, "alice의 이벤트 참여 확인이 완료되었습니다. 기숙사 점수 +1");
        assert_eq!(backend.rows(RUNNERS)[1][3], "1");
        assert_eq!(backend.rows(PARTICIPATION).len(), 2);

        // Repeat for the same notice: denied, no second record.
        let msg = handle(&store, "alice", true, "notice-1").await.unwrap();
        assert_eq!(msg, ALREADY);
        assert_eq!(backend.rows(RUNNERS)[1][3], "1");
        assert_eq!(backend.rows(PARTICIPATION).len(), 2);

        // A different notice grants again.
        let msg = handle(&store, "alice", true, "notice-2").await.unwrap();
        assert!(msg.contains("기숙사 점수 +1"));
        assert_eq!(backend.rows(RUNNERS)[1][3], "2");
    }

    #[tokio::test]
    async fn outside_window_is_denied() {
        let (backend, store) = fixture();
        let msg = handle(&store, "alice", false, "notice-1").await.unwrap();
        assert_eq!(msg, DENIED);
        assert_eq!(backend.rows(PARTICIPATION).len(), 1);
    }
}
