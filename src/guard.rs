//! One-shot completion guard.
//!
//! 一次性完成守卫。

use std::fmt;

/// Wraps a completion callback so it runs at most once.
///
/// Several events may race to complete the same operation, for example a
/// driver `Connected` event and a synchronous "already connected" probe.
/// Only the first `fire` reaches the callback; later calls are dropped
/// without any side effect.
///
/// 包装一个完成回调，保证它最多执行一次。
///
/// 多个事件可能竞争完成同一个操作，例如驱动的 `Connected` 事件和同步的“已连接”探测。
/// 只有第一次 `fire` 会调用回调；之后的调用被静默丢弃。
pub struct CompletionGuard<F> {
    done: Option<F>,
}

impl<F> CompletionGuard<F> {
    /// Creates an armed guard around `done`.
    /// 用 `done` 创建一个待触发的守卫。
    pub fn new(done: F) -> Self {
        Self { done: Some(done) }
    }

    /// Invokes the callback with `arg` if it has not run yet.
    ///
    /// Returns `true` if this call ran the callback.
    ///
    /// 如果回调尚未执行，则以 `arg` 调用它。返回本次调用是否执行了回调。
    pub fn fire<A>(&mut self, arg: A) -> bool
    where
        F: FnOnce(A),
    {
        match self.done.take() {
            Some(done) => {
                done(arg);
                true
            }
            None => false,
        }
    }

    /// Returns `true` once the callback has run.
    /// 回调执行后返回 `true`。
    pub fn is_fired(&self) -> bool {
        self.done.is_none()
    }
}

impl<F> fmt::Debug for CompletionGuard<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionGuard")
            .field("fired", &self.is_fired())
            .finish()
    }
}
