//! Event processing: worker pool, reply gating, and the poll loop.
//!
//! Each worker drains the mailbox and processes one event to completion:
//! classification → lock acquisition → state mutation → reply construction →
//! pacing enqueue. A fault during processing is logged and answered with a
//! best-effort apology reply; no fault terminates the pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::commands::{Command, Dispatcher, Roller, attendance, confirm, dice, explore, oracle};
use crate::config::BotConfig;
use crate::error::Error;
use crate::locks::LockRegistry;
use crate::mailbox::{Mailbox, MailboxReceiver, mailbox};
use crate::network::{Notification, Status, StatusNetwork};
use crate::pacing::PacingScheduler;
use crate::store::GameStore;
use crate::store::game::config_str;
use crate::util::html_to_text;

/// Maximum reply-chain hops when resolving a thread root.
const MAX_THREAD_HOPS: u32 = 10;

/// Which policy gate an allowed-reply check serves.
#[derive(Clone, Copy)]
enum Purpose {
    Attendance,
    Confirm,
}

impl Purpose {
    fn explicit_id_key(self) -> &'static str {
        match self {
            Purpose::Attendance => "출석_허용_상태ID",
            Purpose::Confirm => "확인_허용_상태ID",
        }
    }

    fn keyword_key(self) -> &'static str {
        match self {
            Purpose::Attendance => "출석_공지_키워드",
            Purpose::Confirm => "확인_공지_키워드",
        }
    }
}

/// Shared dependencies for event workers.
#[derive(Clone)]
pub struct BotDeps {
    pub config: BotConfig,
    pub store: Arc<GameStore>,
    pub network: Arc<dyn StatusNetwork>,
    pub locks: Arc<LockRegistry>,
    pub pacing: Arc<PacingScheduler>,
    pub dispatcher: Arc<Dispatcher>,
    pub roller: Arc<dyn Roller>,
}

/// The assembled bot: mailbox, workers, delivery, poll loop.
pub struct Bot {
    deps: BotDeps,
    mailbox: Mailbox,
    receiver: MailboxReceiver,
}

impl Bot {
    pub fn new(deps: BotDeps) -> Self {
        let (mailbox, receiver) =
            mailbox(deps.config.inbox_capacity, deps.config.submit_timeout);
        Self {
            deps,
            mailbox,
            receiver,
        }
    }

    /// Run until the process is stopped: spawn the worker pool, delivery
    /// task, and settings-reload timer, then poll notifications forever.
    /// Poll faults are logged and retried on the next tick.
    pub async fn run(self) -> Result<(), Error> {
        let me = self.deps.network.verify_credentials().await?;
        info!(acct = %me.acct, "bot logged in");

        let _workers =
            spawn_workers(self.deps.clone(), self.receiver.clone(), self.deps.config.workers);
        let _delivery = self.deps.pacing.spawn_delivery(
            Arc::clone(&self.deps.network),
            self.deps.config.visibility.clone(),
        );
        let _reload = spawn_config_reload(
            Arc::clone(&self.deps.store),
            self.deps.config.config_reload_interval,
        );

        let mut since_id: Option<String> = None;
        let mut tick = tokio::time::interval(self.deps.config.poll_interval);
        loop {
            tick.tick().await;
            match self
                .deps
                .network
                .notifications_since(since_id.as_deref())
                .await
            {
                Ok(batch) => {
                    // Newest first; remember the high-water mark, then
                    // submit oldest first.
                    if let Some(first) = batch.first() {
                        since_id = Some(first.id.clone());
                    }
                    for event in batch.into_iter().rev() {
                        if !event.is_mention() {
                            continue;
                        }
                        self.mailbox.submit(event).await;
                    }
                }
                Err(e) => warn!(error = %e, "notification poll failed; retrying next tick"),
            }
        }
    }
}

/// Spawn the fixed pool of event workers.
pub fn spawn_workers(
    deps: BotDeps,
    receiver: MailboxReceiver,
    count: usize,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker| {
            let deps = deps.clone();
            let receiver = receiver.clone();
            tokio::spawn(async move {
                info!(worker, "event worker started");
                while let Some(event) = receiver.next().await {
                    handle_event(&deps, event).await;
                }
                info!(worker, "event worker stopped");
            })
        })
        .collect()
}

/// Spawn the periodic settings-cache invalidation task.
pub fn spawn_config_reload(store: Arc<GameStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.tick().await;
        loop {
            tick.tick().await;
            store.force_reload().await;
            info!("settings cache invalidated (periodic)");
        }
    })
}

/// Process one event to completion. Faults never escape the worker.
pub async fn handle_event(deps: &BotDeps, event: Notification) {
    let Some(status) = event.status else {
        return;
    };
    let acct = status.account.acct.clone();
    let reply_to = status.id.clone();

    match process_mention(deps, &status).await {
        Ok(Some(reply)) => {
            deps.pacing
                .enqueue(&acct, Some(reply_to), with_mention(&acct, reply))
                .await;
        }
        Ok(None) => {}
        Err(e) => {
            error!(acct = %acct, error = %e, "worker error");
            let apology = format!("오류: {e}");
            deps.pacing
                .enqueue(&acct, Some(reply_to), with_mention(&acct, apology))
                .await;
        }
    }
}

fn with_mention(acct: &str, text: String) -> String {
    if acct.is_empty() {
        text
    } else {
        format!("@{acct} {text}")
    }
}

async fn process_mention(deps: &BotDeps, status: &Status) -> Result<Option<String>, Error> {
    let acct = status.account.acct.as_str();
    let text = html_to_text(&status.content);

    // Upsert the runner row and apply the nickname policy; row creation and
    // the nickname write are per-user mutations.
    {
        let lock = deps.locks.acquire(acct);
        let _guard = lock.lock().await;
        let (row, runner) = deps.store.runner(acct).await?;
        maybe_update_nickname(deps, status, row, &runner.nickname).await?;
    }

    let reply = match deps.dispatcher.classify(&text) {
        None => None,
        Some(Command::Dice(exprs)) => {
            let lines = dice::handle(&exprs, deps.roller.as_ref());
            if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            }
        }
        Some(Command::Oracle) => {
            Some(oracle::handle(&deps.store, deps.roller.as_ref(), acct).await?)
        }
        Some(Command::Attendance) => {
            let (allowed, _root) = allowed_reply(deps, status, Purpose::Attendance).await?;
            let lock = deps.locks.acquire(acct);
            let _guard = lock.lock().await;
            Some(attendance::handle(&deps.store, acct, allowed).await?)
        }
        Some(Command::Explore(path)) => Some(
            explore::handle(
                &deps.store,
                &deps.locks,
                deps.roller.as_ref(),
                acct,
                &path,
            )
            .await?,
        ),
        Some(Command::Confirm) => {
            let (allowed, root) = allowed_reply(deps, status, Purpose::Confirm).await?;
            let lock = deps.locks.acquire(acct);
            let _guard = lock.lock().await;
            Some(confirm::handle(&deps.store, acct, allowed, &root.id).await?)
        }
    };
    Ok(reply)
}

/// Apply the `닉네임_업데이트` policy (`always` | `missing`).
async fn maybe_update_nickname(
    deps: &BotDeps,
    status: &Status,
    row: u32,
    nickname: &str,
) -> Result<(), Error> {
    let conf = deps.store.config().await?;
    let policy = config_str(&conf, "닉네임_업데이트", "missing").to_lowercase();
    let display_name = status.account.display_name.trim();
    if display_name.is_empty() {
        return Ok(());
    }

    let update = match policy.as_str() {
        "always" => true,
        "missing" => nickname.trim().is_empty(),
        _ => false,
    };
    if update {
        deps.store.update_runner_nickname(row, display_name).await?;
    }
    Ok(())
}

/// Walk the reply chain to the thread root, bounded by the hop limit.
/// A failed fetch falls back to the deepest status reached.
async fn thread_root(network: &dyn StatusNetwork, status: &Status) -> Status {
    let mut root = status.clone();
    let mut hops = 0;
    while let Some(parent_id) = root.in_reply_to_id.clone() {
        if hops >= MAX_THREAD_HOPS {
            break;
        }
        match network.get_status(&parent_id).await {
            Ok(parent) => {
                root = parent;
                hops += 1;
            }
            Err(e) => {
                warn!(error = %e, "thread root fetch failed; using deepest status reached");
                break;
            }
        }
    }
    root
}

/// The allowed-reply window shared by attendance and confirmation.
///
/// Permits the action if the explicit target status id matches the reply
/// target, or if no restriction is configured at all, or if the thread
/// root passes the allow-list and keyword checks (both must hold when both
/// are configured). An explicit id that is configured but does not match,
/// with no other restriction, denies.
async fn allowed_reply(
    deps: &BotDeps,
    status: &Status,
    purpose: Purpose,
) -> Result<(bool, Status), Error> {
    let conf = deps.store.config().await?;
    let root = thread_root(deps.network.as_ref(), status).await;

    let explicit = config_str(&conf, purpose.explicit_id_key(), "");
    let explicit_set = !explicit.is_empty() && explicit != "0";
    if explicit_set && status.in_reply_to_id.as_deref() == Some(explicit) {
        return Ok((true, root));
    }

    let allowed_accounts: Vec<&str> = config_str(&conf, "공지_발신자_허용", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let keyword = config_str(&conf, purpose.keyword_key(), "");

    if !explicit_set && allowed_accounts.is_empty() && keyword.is_empty() {
        return Ok((true, root));
    }
    if allowed_accounts.is_empty() && keyword.is_empty() {
        return Ok((false, root));
    }

    let acct_ok =
        allowed_accounts.is_empty() || allowed_accounts.contains(&root.account.acct.as_str());
    let kw_ok = keyword.is_empty() || html_to_text(&root.content).contains(keyword);
    Ok((acct_ok && kw_ok, root))
}
