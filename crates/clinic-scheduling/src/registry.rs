//! 时段注册表
//!
//! 管理医生发布的可预约时间窗口

use crate::store::SchedulingStore;
use chrono::{DateTime, Utc};
use clinic_core::{utils, ClinicError, Result, Slot, SlotView};
use std::sync::Arc;
use uuid::Uuid;

/// 时段注册表
///
/// 时间窗口允许重叠发布，不做重叠检查；唯一的硬性约束是区间合法
/// 以及删除时不得存在未取消的关联预约。
#[derive(Debug)]
pub struct SlotRegistry<S> {
    store: Arc<S>,
}

impl<S: SchedulingStore> SlotRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 发布新时段
    pub async fn create_slot(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Slot> {
        utils::validate_time_range(start_time, end_time)?;

        let slot = Slot {
            id: Uuid::new_v4(),
            doctor_id,
            start_time,
            end_time,
            created_at: Utc::now(),
        };
        let slot = self.store.insert_slot(slot).await?;
        tracing::info!("Doctor {} published slot {}", doctor_id, slot.id);
        Ok(slot)
    }

    /// 医生全部时段（含占用标记与关联预约概要），按开始时间升序
    pub async fn list_slots(&self, doctor_id: Uuid) -> Result<Vec<SlotView>> {
        self.store.slots_for_doctor(doctor_id).await
    }

    /// 医生当前可预约时段
    pub async fn list_available_slots(&self, doctor_id: Uuid) -> Result<Vec<Slot>> {
        self.store.available_slots_for_doctor(doctor_id).await
    }

    /// 删除时段
    ///
    /// 仅时段归属医生可删除，且时段上不得存在未取消的预约；
    /// 关联预约全部已取消的时段视为已释放，允许删除。
    pub async fn delete_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<()> {
        let slot = self
            .store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("slot {}", slot_id)))?;

        if slot.doctor_id != doctor_id {
            return Err(ClinicError::Forbidden(format!("slot {}", slot_id)));
        }

        if self
            .store
            .active_appointment_for_slot(slot_id)
            .await?
            .is_some()
        {
            return Err(ClinicError::SlotConsumed(slot_id.to_string()));
        }

        self.store.delete_slot(slot_id).await?;
        tracing::info!("Doctor {} deleted slot {}", doctor_id, slot_id);
        Ok(())
    }
}
