//! # Clinic调度模块
//!
//! 预约系统的核心业务逻辑，包括：
//! - 预约状态机：管理预约记录的完整生命周期
//! - 时段注册表：管理医生发布的可预约时间窗口
//! - 预约协调器：把时段查找与预约创建绑定为单个原子操作，防止重复预约
//! - 只读视图：供展示层消费的纯投影
//!
//! 所有组件通过 `SchedulingStore` 抽象访问存储，内存实现用于测试与演示。

pub mod booking;
pub mod lifecycle;
pub mod memory;
pub mod registry;
pub mod state_machine;
pub mod store;
pub mod views;

// 重新导出主要类型
pub use booking::BookingCoordinator;
pub use lifecycle::AppointmentLifecycle;
pub use memory::MemoryStore;
pub use registry::SlotRegistry;
pub use state_machine::{AppointmentEvent, AppointmentStateMachine};
pub use store::SchedulingStore;
pub use views::ReadViews;
