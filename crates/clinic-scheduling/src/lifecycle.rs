//! 预约生命周期服务
//!
//! 在状态机规则之上叠加归属校验，并负责取消审计记录的写入

use crate::state_machine::{AppointmentEvent, AppointmentStateMachine};
use crate::store::SchedulingStore;
use clinic_core::{
    utils, Actor, Appointment, AppointmentStatus, Cancellation, ClinicError, Result, Role,
};
use std::sync::Arc;
use uuid::Uuid;

/// 预约生命周期服务
#[derive(Debug)]
pub struct AppointmentLifecycle<S> {
    store: Arc<S>,
    state_machine: AppointmentStateMachine,
}

impl<S: SchedulingStore> AppointmentLifecycle<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            state_machine: AppointmentStateMachine::new(),
        }
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("appointment {}", appointment_id)))
    }

    /// 医生更新预约状态
    ///
    /// 目标状态仅接受 `PENDING` / `BOOKED`，唯一合法迁移是
    /// `PENDING -> BOOKED`（医生确认）。
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        actor_doctor_id: Uuid,
        target: AppointmentStatus,
    ) -> Result<Appointment> {
        let appointment = self.load(appointment_id).await?;

        if appointment.doctor_id != actor_doctor_id {
            return Err(ClinicError::Forbidden(format!(
                "appointment {}",
                appointment_id
            )));
        }

        let event = self
            .state_machine
            .event_for_status_update(appointment.status, target)?;
        let new_status = self.state_machine.transition(appointment.status, event)?;

        let updated = self
            .store
            .update_appointment_status(appointment_id, new_status)
            .await?;
        tracing::info!(
            "Doctor {} moved appointment {} from {} to {}",
            actor_doctor_id,
            appointment_id,
            appointment.status,
            new_status
        );
        Ok(updated)
    }

    /// 医生标记就诊完成（仅 `BOOKED -> COMPLETED`）
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        actor_doctor_id: Uuid,
    ) -> Result<Appointment> {
        let appointment = self.load(appointment_id).await?;

        if appointment.doctor_id != actor_doctor_id {
            return Err(ClinicError::Forbidden(format!(
                "appointment {}",
                appointment_id
            )));
        }

        let new_status = self
            .state_machine
            .transition(appointment.status, AppointmentEvent::Completed)?;

        let updated = self
            .store
            .update_appointment_status(appointment_id, new_status)
            .await?;
        tracing::info!(
            "Doctor {} completed appointment {}",
            actor_doctor_id,
            appointment_id
        );
        Ok(updated)
    }

    /// 取消预约
    ///
    /// 归属患者或归属医生均可取消；重复取消被拒绝且不会产生第二条
    /// 审计记录。成功时写入且仅写入一条取消记录。
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        reason: Option<&str>,
    ) -> Result<Cancellation> {
        let appointment = self.load(appointment_id).await?;

        let owns = match actor.role {
            Role::Patient => appointment.patient_id == actor.id,
            Role::Doctor => appointment.doctor_id == actor.id,
        };
        if !owns {
            return Err(ClinicError::Forbidden(format!(
                "appointment {}",
                appointment_id
            )));
        }

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(ClinicError::AlreadyCancelled(appointment_id.to_string()));
        }

        let new_status = self
            .state_machine
            .transition(appointment.status, AppointmentEvent::Cancelled)?;
        self.store
            .update_appointment_status(appointment_id, new_status)
            .await?;

        let cancellation = Cancellation {
            id: Uuid::new_v4(),
            appointment_id,
            reason: utils::normalize_cancel_reason(reason),
            cancelled_at: chrono::Utc::now(),
        };
        let cancellation = self.store.insert_cancellation(cancellation).await?;
        tracing::info!(
            "{:?} {} cancelled appointment {}: {}",
            actor.role,
            actor.id,
            appointment_id,
            cancellation.reason
        );
        Ok(cancellation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingCoordinator;
    use crate::memory::MemoryStore;
    use crate::registry::SlotRegistry;
    use chrono::{Duration, Utc};
    use clinic_core::{Doctor, Patient};

    struct Fixture {
        store: Arc<MemoryStore>,
        lifecycle: AppointmentLifecycle<MemoryStore>,
        doctor: Doctor,
        patient: Patient,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Sharma".to_string(),
            email: "sharma@clinic.local".to_string(),
            phone: None,
            specialization: Some("Cardiology".to_string()),
            created_at: now,
            updated_at: now,
        };
        let patient = Patient {
            id: Uuid::new_v4(),
            name: "Devendra".to_string(),
            email: "devendra@example.com".to_string(),
            phone: None,
            age: Some(20),
            gender: None,
            created_at: now,
            updated_at: now,
        };
        store.seed_doctor(doctor.clone()).await;
        store.seed_patient(patient.clone()).await;
        Fixture {
            lifecycle: AppointmentLifecycle::new(store.clone()),
            store,
            doctor,
            patient,
        }
    }

    async fn book_pending(f: &Fixture) -> Appointment {
        let registry = SlotRegistry::new(f.store.clone());
        let coordinator = BookingCoordinator::new(f.store.clone());
        let now = Utc::now();
        let slot = registry
            .create_slot(f.doctor.id, now, now + Duration::minutes(30))
            .await
            .unwrap();
        coordinator
            .book(f.patient.id, f.doctor.id, Some(slot.id), None)
            .await
            .unwrap()
            .appointment
    }

    #[tokio::test]
    async fn test_doctor_confirms_pending_appointment() {
        let f = fixture().await;
        let appointment = book_pending(&f).await;

        let updated = f
            .lifecycle
            .update_status(appointment.id, f.doctor.id, AppointmentStatus::Booked)
            .await
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Booked);
    }

    #[tokio::test]
    async fn test_update_status_rejects_foreign_doctor() {
        let f = fixture().await;
        let appointment = book_pending(&f).await;

        let result = f
            .lifecycle
            .update_status(appointment.id, Uuid::new_v4(), AppointmentStatus::Booked)
            .await;
        assert!(matches!(result, Err(ClinicError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_cannot_complete_pending_directly() {
        let f = fixture().await;
        let appointment = book_pending(&f).await;

        // 必须先经过 BOOKED
        let result = f.lifecycle.complete(appointment.id, f.doctor.id).await;
        assert!(matches!(result, Err(ClinicError::InvalidTransition { .. })));

        f.lifecycle
            .update_status(appointment.id, f.doctor.id, AppointmentStatus::Booked)
            .await
            .unwrap();
        let completed = f
            .lifecycle
            .complete(appointment.id, f.doctor.id)
            .await
            .unwrap();
        assert_eq!(completed.status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_by_owner_records_reason() {
        let f = fixture().await;
        let appointment = book_pending(&f).await;

        let cancellation = f
            .lifecycle
            .cancel(appointment.id, Actor::patient(f.patient.id), Some("Feeling better"))
            .await
            .unwrap();
        assert_eq!(cancellation.reason, "Feeling better");

        let reloaded = f.store.get_appointment(appointment.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_defaults_reason_when_blank() {
        let f = fixture().await;
        let appointment = book_pending(&f).await;

        let cancellation = f
            .lifecycle
            .cancel(appointment.id, Actor::doctor(f.doctor.id), Some("   "))
            .await
            .unwrap();
        assert_eq!(cancellation.reason, utils::DEFAULT_CANCEL_REASON);
    }

    #[tokio::test]
    async fn test_cancel_rejects_foreign_actor() {
        let f = fixture().await;
        let appointment = book_pending(&f).await;

        // 其他患者
        let result = f
            .lifecycle
            .cancel(appointment.id, Actor::patient(Uuid::new_v4()), None)
            .await;
        assert!(matches!(result, Err(ClinicError::Forbidden(_))));

        // 其他医生
        let result = f
            .lifecycle
            .cancel(appointment.id, Actor::doctor(Uuid::new_v4()), None)
            .await;
        assert!(matches!(result, Err(ClinicError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_recancellation_rejected_without_second_record() {
        let f = fixture().await;
        let appointment = book_pending(&f).await;
        let actor = Actor::patient(f.patient.id);

        let first = f.lifecycle.cancel(appointment.id, actor, None).await.unwrap();
        let result = f.lifecycle.cancel(appointment.id, actor, None).await;
        assert!(matches!(result, Err(ClinicError::AlreadyCancelled(_))));

        let record = f
            .store
            .cancellation_for_appointment(appointment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.id, first.id);
    }

    #[tokio::test]
    async fn test_cancel_completed_appointment_rejected() {
        let f = fixture().await;
        let appointment = book_pending(&f).await;

        f.lifecycle
            .update_status(appointment.id, f.doctor.id, AppointmentStatus::Booked)
            .await
            .unwrap();
        f.lifecycle.complete(appointment.id, f.doctor.id).await.unwrap();

        let result = f
            .lifecycle
            .cancel(appointment.id, Actor::patient(f.patient.id), None)
            .await;
        assert!(matches!(result, Err(ClinicError::InvalidTransition { .. })));
    }
}
