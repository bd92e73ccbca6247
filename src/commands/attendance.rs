//! Daily attendance check-in.
//!
//! Caller must hold the handle's lock for the whole call: the same-day check
//! and the grant are a read-modify-write against the runner row.

use crate::error::Error;
use crate::store::GameStore;
use crate::store::game::{config_int, config_str};
use crate::util::build_user_label;

/// Reply for attendance outside the allowed announcement thread.
const DENIED: &str = "출석은 지정된 공지에 대한 답글로만 인정됩니다.";

/// Reply for a second attendance the same calendar day.
const ALREADY: &str = "이미 오늘 출석했습니다.";

pub async fn handle(store: &GameStore, handle: &str, allowed: bool) -> Result<String, Error> {
    if !allowed {
        return Ok(DENIED.to_string());
    }

    let today = store.today();
    let conf = store.config().await?;
    let (row, runner) = store.runner(handle).await?;

    if runner.last_attend_date == today {
        return Ok(ALREADY.to_string());
    }

    let points = config_int(&conf, "출석_기숙사점수", 1);
    store.update_runner_points(row, runner.points + points).await?;
    store.update_runner_last_attend(row, &today).await?;

    let coins = config_int(&conf, "출석_통화", 0);
    if coins != 0 {
        store.add_currency(handle, coins).await?;
    }

    let mode = config_str(&conf, "아이디_표기", "hidden").to_lowercase();
    let label = build_user_label(handle, &runner.nickname, &mode);
    let currency = config_str(&conf, "통화키", "갈레온");
    let tail = if coins != 0 {
        format!(" / {currency} +{coins}")
    } else {
        String::new()
    };
    Ok(format!(
        "{label}의 출석이 완료되었습니다. 기숙사 점수 +{points}{tail}"
    ))
}
