//! Yes/no oracle.

use crate::commands::Roller;
use crate::error::Error;
use crate::store::GameStore;
use crate::store::game::config_str;
use crate::util::build_user_label;

/// Uniform Yes/No, rendered with the caller's display label.
pub async fn handle(store: &GameStore, roller: &dyn Roller, handle: &str) -> Result<String, Error> {
    let (_row, runner) = store.runner(handle).await?;
    let conf = store.config().await?;
    let mode = config_str(&conf, "아이디_표기", "hidden").to_lowercase();
    let label = build_user_label(handle, &runner.nickname, &mode);

    let result = if roller.flip() { "Yes" } else { "No" };
    Ok(format!("{label}의 결과는 {result} 입니다."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::FixedOffset;

    use crate::store::client::ResilientTables;
    use crate::store::game::{GameStoreOptions, CONFIG, RUNNERS};
    use crate::store::memory::MemoryBackend;

    struct CoinRoller(bool);

    impl Roller for CoinRoller {
        fn die(&self, _sides: u32) -> u32 {
            1
        }
        fn flip(&self) -> bool {
            self.0
        }
        fn range(&self, lo: i64, _hi: i64) -> i64 {
            lo
        }
        fn choose(&self, _n: usize) -> usize {
            0
        }
    }

    fn store_with(display_mode: &'static str) -> GameStore {
        let backend = Arc::new(MemoryBackend::with_tables([
            (
                RUNNERS,
                vec![
                    vec!["유저명", "닉네임", "기숙사", "기숙사점수", "출석마지막일", "이벤트확인마지막일"],
                    vec!["alice", "앨리스", "", "0", "", ""],
                ],
            ),
            (
                CONFIG,
                vec![vec!["키", "값"], vec!["아이디_표기", display_mode]],
            ),
        ]));
        GameStore::new(
            ResilientTables::new(backend, Duration::from_secs(5)),
            GameStoreOptions {
                timezone: FixedOffset::east_opt(9 * 3600).unwrap(),
                config_ttl: Duration::from_secs(1800),
                ledger_enabled: false,
                user_column_with_at: false,
            },
        )
    }

    #[tokio::test]
    async fn yes_with_nickname() {
        let store = store_with("hidden");
        let msg = handle(&store, &CoinRoller(true), "alice").await.unwrap();
        assert_eq!(msg, "앨리스의 결과는 Yes 입니다.");
    }

    #[tokio::test]
    async fn no_with_parens_label() {
        let store = store_with("parens");
        let msg = handle(&store, &CoinRoller(false), "alice").await.unwrap();
        assert_eq!(msg, "앨리스(@alice)의 결과는 No 입니다.");
    }
}
