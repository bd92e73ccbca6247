//! Session-based exploration of the node forest.
//!
//! Pure navigation (root, parent, child, absolute jump) never consumes the
//! daily quota; only evaluating a concrete node's reward checks and
//! increments the usage counter. The reward section runs under the handle's
//! lock — navigation and the children listing do not need it.

use crate::commands::Roller;
use crate::error::Error;
use crate::locks::LockRegistry;
use crate::store::game::{NodeConfig, config_int, config_str};
use crate::store::GameStore;
use crate::util::{normalize_path, path_last, path_parent};

/// Token jumping back to the forest roots.
const ROOT_TOKEN: &str = "루트";

/// Token moving to the parent node.
const PARENT_TOKEN: &str = "..";

#[derive(Clone, Copy, PartialEq, Eq)]
enum RewardKind {
    Coin,
    Item,
    Rumor,
}

const KINDS: [RewardKind; 3] = [RewardKind::Coin, RewardKind::Item, RewardKind::Rumor];

fn is_valid(kind: RewardKind, node: &NodeConfig) -> bool {
    match kind {
        RewardKind::Coin => node.coin_min > 0 || node.coin_max > 0,
        RewardKind::Item => !node.item.is_empty() && node.qty > 0,
        RewardKind::Rumor => !node.rumor.is_empty(),
    }
}

/// Uniform pick among the three categories; invalid first pick falls back to
/// a uniform pick among the valid ones. `None` when nothing is valid.
fn choose_kind(node: &NodeConfig, roller: &dyn Roller) -> Option<RewardKind> {
    let pick = KINDS[roller.choose(KINDS.len())];
    if is_valid(pick, node) {
        return Some(pick);
    }
    let valid: Vec<RewardKind> = KINDS.into_iter().filter(|k| is_valid(*k, node)).collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid[roller.choose(valid.len())])
    }
}

fn format_children(children: &[String]) -> String {
    let lines: Vec<String> = children.iter().map(|c| format!("- [탐색/{c}]")).collect();
    format!("추가로 조사할 곳:\n{}", lines.join("\n"))
}

/// Resolve and apply one reward. Returns the reply text and whether a
/// quota-consuming reward was handed out.
async fn apply_reward(
    node: &NodeConfig,
    store: &GameStore,
    roller: &dyn Roller,
    handle: &str,
    currency_key: &str,
) -> Result<(String, bool), Error> {
    let base = node.place.clone();
    let Some(kind) = choose_kind(node, roller) else {
        return Ok((base, false));
    };

    match kind {
        RewardKind::Coin => {
            let lo = node.coin_min.max(0);
            let hi = node.coin_max.max(lo);
            let amount = if hi > 0 { roller.range(lo, hi) } else { 0 };
            if amount > 0 {
                store.add_currency(handle, amount).await?;
                Ok((format!("{base}\n획득: {currency_key} +{amount}"), true))
            } else {
                Ok((base, false))
            }
        }
        RewardKind::Item => {
            if !node.item.is_empty() && node.qty > 0 {
                store.add_item(handle, &node.item, node.qty).await?;
                Ok((format!("{base}\n획득: {} x{}", node.item, node.qty), true))
            } else {
                Ok((base, false))
            }
        }
        RewardKind::Rumor => {
            if node.rumor.is_empty() {
                Ok((base, false))
            } else {
                Ok((format!("{base}\n소문: {}", node.rumor), true))
            }
        }
    }
}

pub async fn handle(
    store: &GameStore,
    locks: &LockRegistry,
    roller: &dyn Roller,
    handle: &str,
    raw_path: &str,
) -> Result<String, Error> {
    let (sess_row, cur_path) = store.session(handle).await?;
    let conf = store.config().await?;
    let currency_key = config_str(&conf, "통화키", "갈레온").to_string();

    let cur_path = normalize_path(&cur_path);
    let token = raw_path.trim();

    // Resolve the navigation target.
    let new_path = if token == ROOT_TOKEN {
        String::new()
    } else if token == PARENT_TOKEN {
        path_parent(&cur_path)
    } else if token.contains('/') {
        // Absolute jump.
        normalize_path(token)
    } else {
        let here = path_last(&cur_path);
        if !here.is_empty() {
            let children = store.children(&here).await?;
            if children.iter().any(|c| c == token) {
                normalize_path(&format!("{cur_path}/{token}"))
            } else {
                normalize_path(token)
            }
        } else {
            normalize_path(token)
        }
    };

    let node = path_last(&new_path);

    // Root: show the entry choices, no quota.
    if node.is_empty() {
        let roots = store.children("").await?;
        if roots.is_empty() {
            return Ok("탐색 가능한 루트 구역이 없습니다.".to_string());
        }
        store.set_session_path(sess_row, "").await?;
        return Ok(format!("탐색 시작 지점입니다.\n\n{}", format_children(&roots)));
    }

    if !store.node_exists(&node).await? {
        return Ok(format!("해당 구역을 찾을 수 없습니다: {node}"));
    }

    // Quota check and reward grant are a read-modify-write on this handle.
    let mut text = {
        let lock = locks.acquire(handle);
        let _guard = lock.lock().await;

        let used = store.today_usage(handle).await?;
        let limit = config_int(&conf, "탐색_일일제한", 3);
        if used >= limit {
            let children = store.children(&node).await?;
            let tips = if children.is_empty() {
                String::new()
            } else {
                format!("\n\n{}", format_children(&children))
            };
            return Ok(format!("탐색은 하루 {limit}회까지 가능합니다.{tips}"));
        }

        let Some(node_cfg) = store.node_config(&node).await? else {
            return Ok(format!("해당 구역에는 설정 행이 없습니다: {node}"));
        };

        let (text, consumed) =
            apply_reward(&node_cfg, store, roller, handle, &currency_key).await?;
        if consumed {
            store.inc_today_usage(handle).await?;
        }
        text
    };

    let children = store.children(&node).await?;
    if !children.is_empty() {
        text.push_str(&format!("\n\n{}", format_children(&children)));
    }
    store.set_session_path(sess_row, &new_path).await?;
    Ok(text)
}
