//! QoS 策略模块
//!
//! 类别策略（保证带宽份额、优先级、上限）、按链路编译出的队列配置，以及仿真底座使用的 HTB 式速率分配。

mod class;
mod policy;
mod queue;
mod shaper;

pub use class::{ClassPolicy, PolicySet, ServiceClass};
pub use policy::{CompiledPolicy, PolicyEngine};
pub use queue::QueueConfig;
pub use shaper::LinkShaper;
