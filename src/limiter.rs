//! 速率限制与并发去重
//!
//! 两层防护：
//! 1. 冷却表：键为 `usuario + 前 20 个字符（小写）`，同键 10 秒内只响应一次。
//!    检查本身就是写入（check-and-set），连续两次同键调用第二次必被抑制。
//! 2. 在途标记：同一用户同一时刻只处理一条消息，后到的直接丢弃（不排队）。
//!    标记通过 RAII guard 持有，任何退出路径（成功、错误、panic 展开）都会释放。

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 按 (usuario, prefijo) 冷却的速率限制器
pub struct RateLimiter {
    cooldown: Duration,
    purge_age: Duration,
    purge_threshold: usize,
    last_responses: Mutex<HashMap<String, Instant>>,
    processing: Mutex<HashSet<String>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration, purge_age: Duration, purge_threshold: usize) -> Self {
        Self {
            cooldown,
            purge_age,
            purge_threshold,
            last_responses: Mutex::new(HashMap::new()),
            processing: Mutex::new(HashSet::new()),
        }
    }

    /// 判断是否应抑制本次消息
    ///
    /// 用户在途 → 抑制；同键冷却窗口内 → 抑制；否则记录时间戳并放行。
    /// 放行时如果表超过阈值，顺带清理过期条目。
    pub fn should_suppress(&self, user: &str, text: &str) -> bool {
        if self.processing.lock().unwrap().contains(user) {
            return true;
        }

        let prefix: String = text.to_lowercase().chars().take(20).collect();
        let key = format!("{}_{}", user, prefix);
        let now = Instant::now();

        let mut responses = self.last_responses.lock().unwrap();
        if let Some(last) = responses.get(&key) {
            if now.duration_since(*last) < self.cooldown {
                return true;
            }
        }
        responses.insert(key, now);

        if responses.len() > self.purge_threshold {
            let purge_age = self.purge_age;
            responses.retain(|_, stamp| now.duration_since(*stamp) < purge_age);
        }

        false
    }

    /// 标记用户在途，返回的 guard 在 drop 时无条件释放
    pub fn begin_processing(&self, user: &str) -> ProcessingGuard<'_> {
        self.processing.lock().unwrap().insert(user.to_string());
        ProcessingGuard {
            limiter: self,
            user: user.to_string(),
        }
    }

    pub fn is_processing(&self, user: &str) -> bool {
        self.processing.lock().unwrap().contains(user)
    }

    /// 冷却表当前条目数（/stats 用）
    pub fn cooldown_entries(&self) -> usize {
        self.last_responses.lock().unwrap().len()
    }
}

/// 在途标记的 RAII guard
pub struct ProcessingGuard<'a> {
    limiter: &'a RateLimiter,
    user: String,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.limiter.processing.lock().unwrap().remove(&self.user);
    }
}
