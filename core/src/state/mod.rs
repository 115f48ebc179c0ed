//! # 状态转换模块
//!
//! Worker 与 Job 共用同一张状态转换表。
//!
//! ## 设计原则
//!
//! 1. **封闭枚举**：状态只能是预定义的枚举值
//! 2. **单一转换表**：所有合法转换集中在 [`Lifecycle`] 实现中
//! 3. **同态幂等**：转换到当前状态永远合法（no-op）

pub mod transitions;

pub use transitions::{Lifecycle, StateTransition, TransitionError};
