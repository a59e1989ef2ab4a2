//! 预约状态机
//!
//! 管理预约记录的完整生命周期状态转换

use clinic_core::{AppointmentStatus, ClinicError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 预约状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentEvent {
    /// 医生确认预约
    Confirmed,
    /// 患者或医生取消预约
    Cancelled,
    /// 医生标记就诊完成
    Completed,
}

/// 预约状态机
///
/// 转换规则穷举存表，表外一律拒绝；终态不再接受任何事件。
#[derive(Debug)]
pub struct AppointmentStateMachine {
    transitions: HashMap<(AppointmentStatus, AppointmentEvent), AppointmentStatus>,
}

impl AppointmentStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert(
            (AppointmentStatus::Pending, AppointmentEvent::Confirmed),
            AppointmentStatus::Booked,
        );
        transitions.insert(
            (AppointmentStatus::Pending, AppointmentEvent::Cancelled),
            AppointmentStatus::Cancelled,
        );
        transitions.insert(
            (AppointmentStatus::Booked, AppointmentEvent::Cancelled),
            AppointmentStatus::Cancelled,
        );
        transitions.insert(
            (AppointmentStatus::Booked, AppointmentEvent::Completed),
            AppointmentStatus::Completed,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: AppointmentStatus, event: AppointmentEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(
        &self,
        from: AppointmentStatus,
        event: AppointmentEvent,
    ) -> Result<AppointmentStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(ClinicError::InvalidTransition {
                from: from.to_string(),
                to: format!("{:?}", event),
            }),
        }
    }

    /// 将医生侧的目标状态更新映射为状态机事件
    ///
    /// 医生状态更新接口仅接受 `PENDING` 和 `BOOKED` 作为目标值，
    /// 其中唯一合法的迁移是 `PENDING -> BOOKED`；其余组合（包括
    /// 目标与当前相同的空转）一律视为无效转换。
    pub fn event_for_status_update(
        &self,
        from: AppointmentStatus,
        target: AppointmentStatus,
    ) -> Result<AppointmentEvent> {
        match (from, target) {
            (AppointmentStatus::Pending, AppointmentStatus::Booked) => {
                Ok(AppointmentEvent::Confirmed)
            }
            _ => Err(ClinicError::InvalidTransition {
                from: from.to_string(),
                to: target.to_string(),
            }),
        }
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current: AppointmentStatus) -> Vec<AppointmentEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for AppointmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = AppointmentStateMachine::new();

        assert!(sm.can_transition(AppointmentStatus::Pending, AppointmentEvent::Confirmed));
        assert!(sm.can_transition(AppointmentStatus::Pending, AppointmentEvent::Cancelled));
        assert!(sm.can_transition(AppointmentStatus::Booked, AppointmentEvent::Cancelled));
        assert!(sm.can_transition(AppointmentStatus::Booked, AppointmentEvent::Completed));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = AppointmentStateMachine::new();

        // PENDING 不能跳过 BOOKED 直接完成
        assert!(!sm.can_transition(AppointmentStatus::Pending, AppointmentEvent::Completed));
        // 终态不再接受任何事件
        assert!(!sm.can_transition(AppointmentStatus::Cancelled, AppointmentEvent::Confirmed));
        assert!(!sm.can_transition(AppointmentStatus::Cancelled, AppointmentEvent::Cancelled));
        assert!(!sm.can_transition(AppointmentStatus::Completed, AppointmentEvent::Cancelled));
        assert!(!sm.can_transition(AppointmentStatus::Completed, AppointmentEvent::Confirmed));
    }

    #[test]
    fn test_transition_execution() {
        let sm = AppointmentStateMachine::new();

        let result = sm.transition(AppointmentStatus::Pending, AppointmentEvent::Confirmed);
        assert_eq!(result.unwrap(), AppointmentStatus::Booked);

        let result = sm.transition(AppointmentStatus::Pending, AppointmentEvent::Completed);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_status_regression() {
        let sm = AppointmentStateMachine::new();

        // 任何事件都不能把状态带回 PENDING
        for from in [
            AppointmentStatus::Booked,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Completed,
        ] {
            for event in [
                AppointmentEvent::Confirmed,
                AppointmentEvent::Cancelled,
                AppointmentEvent::Completed,
            ] {
                if let Ok(to) = sm.transition(from, event) {
                    assert_ne!(to, AppointmentStatus::Pending);
                }
            }
        }
    }

    #[test]
    fn test_event_for_status_update() {
        let sm = AppointmentStateMachine::new();

        assert_eq!(
            sm.event_for_status_update(AppointmentStatus::Pending, AppointmentStatus::Booked)
                .unwrap(),
            AppointmentEvent::Confirmed
        );
        // 空转与回退一律拒绝
        assert!(sm
            .event_for_status_update(AppointmentStatus::Booked, AppointmentStatus::Booked)
            .is_err());
        assert!(sm
            .event_for_status_update(AppointmentStatus::Booked, AppointmentStatus::Pending)
            .is_err());
        assert!(sm
            .event_for_status_update(AppointmentStatus::Cancelled, AppointmentStatus::Booked)
            .is_err());
    }

    #[test]
    fn test_possible_events() {
        let sm = AppointmentStateMachine::new();

        let mut events = sm.possible_events(AppointmentStatus::Booked);
        events.sort_by_key(|e| format!("{:?}", e));
        assert_eq!(
            events,
            vec![AppointmentEvent::Cancelled, AppointmentEvent::Completed]
        );
        assert!(sm.possible_events(AppointmentStatus::Completed).is_empty());
    }
}
