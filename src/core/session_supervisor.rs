//! 会话监管：每个会话一个取消令牌，并保证同一会话同一时刻只有一个运行
//!
//! 引擎在运行开始时 acquire，得到的 SessionGuard 在 drop 时释放登记。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::core::HiveError;

/// 活跃会话表：session_id -> 取消令牌
#[derive(Debug, Default)]
pub struct SessionSupervisor {
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个运行；同一会话已在运行时返回 SessionBusy
    pub fn acquire(&self, session_id: &str) -> Result<SessionGuard, HiveError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.contains_key(session_id) {
            return Err(HiveError::SessionBusy(session_id.to_string()));
        }
        let token = CancellationToken::new();
        active.insert(session_id.to_string(), token.clone());
        Ok(SessionGuard {
            session_id: session_id.to_string(),
            token,
            active: self.active.clone(),
        })
    }

    /// 取消指定会话的当前运行；会话不在运行时返回 false
    pub fn cancel(&self, session_id: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(session_id)
    }
}

/// 运行期间持有；drop 时从活跃表中移除
#[derive(Debug)]
pub struct SessionGuard {
    session_id: String,
    token: CancellationToken,
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl SessionGuard {
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.session_id);
    }
}
