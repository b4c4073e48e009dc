//! 会话状态管理
//!
//! 每个用户（número de teléfono）一条会话：封闭状态枚举 + 流程暂存数据 +
//! 过期定时器。定时器由 CancellationToken 取消；为关闭「已取消的定时器仍然
//! 触发并清掉新状态」的竞态，每次状态写入递增代数计数器，定时器触发后在
//! 会话锁内核对代数，不匹配即放弃。
//!
//! 锁结构：外层 RwLock<HashMap> 只保护映射本身，每条会话各有一把
//! tokio::sync::Mutex。锁序固定为 映射 → 会话，不同用户互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// 用户在对话流程中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserState {
    Idle,
    AwaitingPartSearch,
    AwaitingStatusSearch,
    AwaitingOrderNumber,
    PostConsultation,
    PostStatus,
    PostOrder,
}

impl std::fmt::Display for UserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserState::Idle => "idle",
            UserState::AwaitingPartSearch => "awaiting_part_search",
            UserState::AwaitingStatusSearch => "awaiting_status_search",
            UserState::AwaitingOrderNumber => "awaiting_order_number",
            UserState::PostConsultation => "post_consultation",
            UserState::PostStatus => "post_status",
            UserState::PostOrder => "post_order",
        };
        write!(f, "{}", s)
    }
}

/// 单个用户会话
struct UserSession {
    state: UserState,
    /// 流程暂存数据，对路由层不透明
    data: HashMap<String, String>,
    last_interaction: Instant,
    /// 过期定时器的取消令牌；不变式：任一时刻至多一个存活
    expiry: Option<CancellationToken>,
    /// 状态写入代数，定时器触发后核对
    epoch: u64,
}

impl UserSession {
    fn new() -> Self {
        Self {
            state: UserState::Idle,
            data: HashMap::new(),
            last_interaction: Instant::now(),
            expiry: None,
            epoch: 0,
        }
    }

    /// 取消当前定时器并回到 Idle；epoch 递增使迟到的定时器失效
    fn reset(&mut self) {
        if let Some(token) = self.expiry.take() {
            token.cancel();
        }
        self.state = UserState::Idle;
        self.data.clear();
        self.epoch += 1;
    }
}

/// 会话存储：按用户加锁的状态机后端
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<UserSession>>>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    async fn entry(&self, user: &str) -> Option<Arc<Mutex<UserSession>>> {
        self.sessions.read().await.get(user).cloned()
    }

    async fn entry_or_create(&self, user: &str) -> Arc<Mutex<UserSession>> {
        if let Some(found) = self.entry(user).await {
            return found;
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(UserSession::new())))
            .clone()
    }

    /// 获取用户当前状态；Idle 视为「无活动状态」返回 None
    pub async fn get(&self, user: &str) -> Option<UserState> {
        let entry = self.entry(user).await?;
        let session = entry.lock().await;
        if session.state == UserState::Idle {
            None
        } else {
            Some(session.state)
        }
    }

    /// 设置用户状态并重置其过期定时器
    ///
    /// 先取消旧定时器，合并 data，更新 last_interaction；状态非 Idle 时
    /// 调度新定时器（到期回到 Idle）。设置 Idle 等价于 clear。
    pub async fn set(&self, user: &str, state: UserState, data: Option<HashMap<String, String>>) {
        let entry = self.entry_or_create(user).await;
        let mut session = entry.lock().await;

        if let Some(token) = session.expiry.take() {
            token.cancel();
        }
        session.state = state;
        session.last_interaction = Instant::now();
        session.epoch += 1;

        if state == UserState::Idle {
            session.data.clear();
            tracing::debug!(user = %crate::util::mask_sensitive(user), "session reset to idle");
            return;
        }

        if let Some(extra) = data {
            session.data.extend(extra);
        }

        let token = CancellationToken::new();
        session.expiry = Some(token.clone());
        let epoch = session.epoch;
        drop(session);

        // 定时器只持有本用户的会话条目；触发后在锁内核对代数，
        // 被取消或已被新写入抢先则是 no-op
        let masked = crate::util::mask_sensitive(user);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let mut session = entry.lock().await;
                    if session.epoch == epoch && session.state != UserState::Idle {
                        session.reset();
                        tracing::info!(user = %masked, "session expired");
                    }
                }
            }
        });

        tracing::info!(user = %crate::util::mask_sensitive(user), state = %state, "session state");
    }

    /// 清理用户状态：取消定时器、回到 Idle、清空数据。对已 Idle 的会话是 no-op。
    pub async fn clear(&self, user: &str) {
        if let Some(entry) = self.entry(user).await {
            entry.lock().await.reset();
        }
    }

    /// 读取会话暂存数据
    pub async fn get_data(&self, user: &str, key: &str) -> Option<String> {
        let entry = self.entry(user).await?;
        let session = entry.lock().await;
        session.data.get(key).cloned()
    }

    /// 写入会话暂存数据（不改变状态，但刷新 last_interaction）
    pub async fn set_data(&self, user: &str, key: &str, value: &str) {
        let entry = self.entry_or_create(user).await;
        let mut session = entry.lock().await;
        session.data.insert(key.to_string(), value.to_string());
        session.last_interaction = Instant::now();
    }

    /// 清扫闲置超过 max_age 的会话，整条移除并取消其定时器；返回移除数
    ///
    /// 正在被其它任务持锁操作的会话（try_lock 失败）本轮跳过，避免与
    /// 进行中的状态迁移竞争。
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut stale = Vec::new();

        for (user, entry) in sessions.iter() {
            if let Ok(session) = entry.try_lock() {
                if session.last_interaction.elapsed() > max_age {
                    stale.push(user.clone());
                }
            }
        }

        for user in &stale {
            if let Some(entry) = sessions.remove(user) {
                let mut session = entry.lock().await;
                session.reset();
            }
        }

        if !stale.is_empty() {
            tracing::info!(count = stale.len(), "swept inactive sessions");
        }
        stale.len()
    }

    /// 有活动状态（非 Idle）的会话数
    pub async fn active_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        let mut count = 0;
        for entry in sessions.values() {
            if entry.lock().await.state != UserState::Idle {
                count += 1;
            }
        }
        count
    }
}
