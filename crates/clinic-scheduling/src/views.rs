//! 只读视图
//!
//! 供展示层消费的纯投影，不做任何修改操作

use crate::store::SchedulingStore;
use clinic_core::{AppointmentView, DoctorWithSlots, PatientSummary, Result};
use std::sync::Arc;
use uuid::Uuid;

/// 只读视图服务
#[derive(Debug)]
pub struct ReadViews<S> {
    store: Arc<S>,
}

impl<S: SchedulingStore> ReadViews<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 医生的全部预约（按日期降序，连接患者概要与时段）
    pub async fn doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<AppointmentView>> {
        self.store.doctor_appointments(doctor_id).await
    }

    /// 患者的全部预约（按日期降序，连接医生概要与时段）
    pub async fn patient_appointments(&self, patient_id: Uuid) -> Result<Vec<AppointmentView>> {
        self.store.patient_appointments(patient_id).await
    }

    /// 与医生有过预约史的去重患者集合
    pub async fn doctor_patients(&self, doctor_id: Uuid) -> Result<Vec<PatientSummary>> {
        self.store.doctor_patients(doctor_id).await
    }

    /// 全部医生及其当前可预约时段
    pub async fn doctors_with_availability(&self) -> Result<Vec<DoctorWithSlots>> {
        self.store.doctors_with_availability().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingCoordinator;
    use crate::lifecycle::AppointmentLifecycle;
    use crate::memory::MemoryStore;
    use crate::registry::SlotRegistry;
    use chrono::{Duration, Utc};
    use clinic_core::{Actor, Doctor, Patient};
    use uuid::Uuid;

    fn doctor(name: &str) -> Doctor {
        let now = Utc::now();
        Doctor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@clinic.local", name.to_lowercase().replace(' ', ".")),
            phone: None,
            specialization: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn patient(name: &str) -> Patient {
        let now = Utc::now();
        Patient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            age: None,
            gender: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_appointment_views_ordered_and_joined() {
        let store = Arc::new(MemoryStore::new());
        let d = doctor("Dr. Sharma");
        let p = patient("Devendra");
        store.seed_doctor(d.clone()).await;
        store.seed_patient(p.clone()).await;

        let coordinator = BookingCoordinator::new(store.clone());
        let now = Utc::now();
        coordinator
            .book(p.id, d.id, None, Some(now + Duration::days(1)))
            .await
            .unwrap();
        coordinator
            .book(p.id, d.id, None, Some(now + Duration::days(3)))
            .await
            .unwrap();

        let views = ReadViews::new(store);
        let mine = views.doctor_appointments(d.id).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].appointment.date > mine[1].appointment.date);
        assert_eq!(mine[0].patient.as_ref().unwrap().name, "Devendra");

        let theirs = views.patient_appointments(p.id).await.unwrap();
        assert_eq!(theirs[0].doctor.as_ref().unwrap().name, "Dr. Sharma");
    }

    #[tokio::test]
    async fn test_doctor_patients_deduplicated() {
        let store = Arc::new(MemoryStore::new());
        let d = doctor("Dr. Sharma");
        let p1 = patient("Devendra");
        let p2 = patient("Asha");
        store.seed_doctor(d.clone()).await;
        store.seed_patient(p1.clone()).await;
        store.seed_patient(p2.clone()).await;

        let coordinator = BookingCoordinator::new(store.clone());
        let now = Utc::now();
        // p1 预约两次，去重后只出现一次
        for days in [1, 2] {
            coordinator
                .book(p1.id, d.id, None, Some(now + Duration::days(days)))
                .await
                .unwrap();
        }
        coordinator
            .book(p2.id, d.id, None, Some(now + Duration::days(3)))
            .await
            .unwrap();

        let views = ReadViews::new(store);
        let roster = views.doctor_patients(d.id).await.unwrap();
        assert_eq!(roster.len(), 2);
    }

    #[tokio::test]
    async fn test_doctors_with_availability_excludes_consumed_slots() {
        let store = Arc::new(MemoryStore::new());
        let d = doctor("Dr. Sharma");
        let p = patient("Devendra");
        store.seed_doctor(d.clone()).await;
        store.seed_patient(p.clone()).await;

        let registry = SlotRegistry::new(store.clone());
        let coordinator = BookingCoordinator::new(store.clone());
        let lifecycle = AppointmentLifecycle::new(store.clone());
        let now = Utc::now();

        let taken = registry
            .create_slot(d.id, now, now + Duration::minutes(30))
            .await
            .unwrap();
        let free = registry
            .create_slot(d.id, now + Duration::hours(1), now + Duration::hours(2))
            .await
            .unwrap();
        let booked = coordinator
            .book(p.id, d.id, Some(taken.id), None)
            .await
            .unwrap();

        let views = ReadViews::new(store);
        let browse = views.doctors_with_availability().await.unwrap();
        assert_eq!(browse.len(), 1);
        assert_eq!(browse[0].available_slots.len(), 1);
        assert_eq!(browse[0].available_slots[0].id, free.id);

        // 取消后时段重新可见
        lifecycle
            .cancel(booked.appointment.id, Actor::patient(p.id), None)
            .await
            .unwrap();
        let browse = views.doctors_with_availability().await.unwrap();
        assert_eq!(browse[0].available_slots.len(), 2);
    }
}
