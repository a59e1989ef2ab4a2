//! 预约协调器
//!
//! 把患者请求、医生与可选时段绑定为一次原子的预约创建

use crate::store::SchedulingStore;
use chrono::{DateTime, Utc};
use clinic_core::{
    Appointment, AppointmentStatus, BookedAppointment, ClinicError, DoctorSummary, Result,
};
use std::sync::Arc;
use uuid::Uuid;

/// 预约协调器
///
/// 预约一律以 `PENDING` 创建，确认权保留给医生；关联时段时，
/// 占用检查与预约写入由存储层作为单个原子单元执行，并发竞争的
/// 失败方收到 `SlotAlreadyBooked`。
#[derive(Debug)]
pub struct BookingCoordinator<S> {
    store: Arc<S>,
}

impl<S: SchedulingStore> BookingCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 创建预约请求
    ///
    /// `slot_id` 给定时预约日期取时段开始时间，否则取调用方提供的日期。
    pub async fn book(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        slot_id: Option<Uuid>,
        date: Option<DateTime<Utc>>,
    ) -> Result<BookedAppointment> {
        let doctor = self
            .store
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("doctor {}", doctor_id)))?;

        let date = match slot_id {
            Some(slot_id) => {
                let slot = self
                    .store
                    .get_slot(slot_id)
                    .await?
                    .ok_or_else(|| ClinicError::NotFound(format!("slot {}", slot_id)))?;

                if slot.doctor_id != doctor_id {
                    return Err(ClinicError::Validation(format!(
                        "slot {} does not belong to doctor {}",
                        slot_id, doctor_id
                    )));
                }

                // 快路径检查；真正的防线在存储层的原子检查-插入
                if self
                    .store
                    .active_appointment_for_slot(slot_id)
                    .await?
                    .is_some()
                {
                    return Err(ClinicError::SlotAlreadyBooked(slot_id.to_string()));
                }

                slot.start_time
            }
            None => date.ok_or_else(|| {
                ClinicError::Validation("date is required when no slot is given".to_string())
            })?,
        };

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            slot_id,
            date,
            status: AppointmentStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let appointment = self.store.insert_appointment(appointment).await?;
        tracing::info!(
            "Patient {} requested appointment {} with doctor {} (slot: {:?})",
            patient_id,
            appointment.id,
            doctor_id,
            slot_id
        );

        Ok(BookedAppointment {
            appointment,
            doctor: DoctorSummary::from(&doctor),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::registry::SlotRegistry;
    use chrono::Duration;
    use clinic_core::{Doctor, Patient};

    async fn seeded_store() -> (Arc<MemoryStore>, Doctor, Patient) {
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
        (store, doctor, patient)
    }

    #[tokio::test]
    async fn test_book_with_slot_creates_pending_and_consumes_slot() {
        let (store, doctor, patient) = seeded_store().await;
        let registry = SlotRegistry::new(store.clone());
        let coordinator = BookingCoordinator::new(store.clone());
        let now = Utc::now();

        let slot = registry
            .create_slot(doctor.id, now, now + Duration::minutes(30))
            .await
            .unwrap();

        let booked = coordinator
            .book(patient.id, doctor.id, Some(slot.id), None)
            .await
            .unwrap();
        assert_eq!(booked.appointment.status, AppointmentStatus::Pending);
        assert_eq!(booked.appointment.date, slot.start_time);
        assert_eq!(booked.doctor.name, "Dr. Sharma");

        let slots = registry.list_slots(doctor.id).await.unwrap();
        assert!(slots[0].consumed);
        assert_eq!(
            slots[0].appointment.as_ref().unwrap().id,
            booked.appointment.id
        );
    }

    #[tokio::test]
    async fn test_book_unknown_doctor_or_slot() {
        let (store, doctor, patient) = seeded_store().await;
        let coordinator = BookingCoordinator::new(store);

        let result = coordinator
            .book(patient.id, Uuid::new_v4(), None, Some(Utc::now()))
            .await;
        assert!(matches!(result, Err(ClinicError::NotFound(_))));

        let result = coordinator
            .book(patient.id, doctor.id, Some(Uuid::new_v4()), None)
            .await;
        assert!(matches!(result, Err(ClinicError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_book_without_slot_requires_date() {
        let (store, doctor, patient) = seeded_store().await;
        let coordinator = BookingCoordinator::new(store);

        let result = coordinator.book(patient.id, doctor.id, None, None).await;
        assert!(matches!(result, Err(ClinicError::Validation(_))));

        let date = Utc::now() + Duration::days(1);
        let booked = coordinator
            .book(patient.id, doctor.id, None, Some(date))
            .await
            .unwrap();
        assert_eq!(booked.appointment.date, date);
        assert_eq!(booked.appointment.slot_id, None);
    }

    #[tokio::test]
    async fn test_double_booking_rejected() {
        let (store, doctor, patient) = seeded_store().await;
        let registry = SlotRegistry::new(store.clone());
        let coordinator = BookingCoordinator::new(store.clone());
        let now = Utc::now();

        let slot = registry
            .create_slot(doctor.id, now, now + Duration::minutes(30))
            .await
            .unwrap();

        coordinator
            .book(patient.id, doctor.id, Some(slot.id), None)
            .await
            .unwrap();
        let result = coordinator
            .book(Uuid::new_v4(), doctor.id, Some(slot.id), None)
            .await;
        assert!(matches!(result, Err(ClinicError::SlotAlreadyBooked(_))));
    }

    #[tokio::test]
    async fn test_concurrent_booking_exactly_one_wins() {
        let (store, doctor, _patient) = seeded_store().await;
        let registry = SlotRegistry::new(store.clone());
        let now = Utc::now();

        let slot = registry
            .create_slot(doctor.id, now, now + Duration::minutes(30))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let doctor_id = doctor.id;
            let slot_id = slot.id;
            handles.push(tokio::spawn(async move {
                let coordinator = BookingCoordinator::new(store);
                coordinator
                    .book(Uuid::new_v4(), doctor_id, Some(slot_id), None)
                    .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(ClinicError::SlotAlreadyBooked(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_cancelled_appointment_frees_slot_for_rebooking() {
        let (store, doctor, patient) = seeded_store().await;
        let registry = SlotRegistry::new(store.clone());
        let coordinator = BookingCoordinator::new(store.clone());
        let now = Utc::now();

        let slot = registry
            .create_slot(doctor.id, now, now + Duration::minutes(30))
            .await
            .unwrap();
        let first = coordinator
            .book(patient.id, doctor.id, Some(slot.id), None)
            .await
            .unwrap();

        store
            .update_appointment_status(first.appointment.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        // 取消释放时段，可再次预约
        let second = coordinator
            .book(patient.id, doctor.id, Some(slot.id), None)
            .await
            .unwrap();
        assert_ne!(second.appointment.id, first.appointment.id);
    }
}
