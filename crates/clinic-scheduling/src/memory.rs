//! 内存存储实现
//!
//! 供单元测试与演示程序使用。全部数据放在单个 `RwLock` 保护的内部结构
//! 中，预约创建的占用检查与写入在同一把写锁内完成，因此满足存储契约的
//! 原子性要求。

use crate::store::SchedulingStore;
use async_trait::async_trait;
use clinic_core::{
    Appointment, AppointmentStatus, AppointmentSummary, AppointmentView, Cancellation, ClinicError,
    Doctor, DoctorSummary, DoctorWithSlots, Patient, PatientSummary, Result, Slot, SlotView,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    slots: HashMap<Uuid, Slot>,
    appointments: HashMap<Uuid, Appointment>,
    cancellations: HashMap<Uuid, Cancellation>,
}

impl Inner {
    fn active_appointment_for_slot(&self, slot_id: Uuid) -> Option<&Appointment> {
        self.appointments
            .values()
            .find(|a| a.slot_id == Some(slot_id) && a.status != AppointmentStatus::Cancelled)
    }

    fn slot_view(&self, slot: &Slot) -> SlotView {
        let appointment = self.active_appointment_for_slot(slot.id);
        SlotView {
            slot: slot.clone(),
            consumed: appointment.is_some(),
            appointment: appointment.map(AppointmentSummary::from),
        }
    }

    fn appointment_view(&self, appointment: &Appointment) -> AppointmentView {
        AppointmentView {
            appointment: appointment.clone(),
            doctor: self.doctors.get(&appointment.doctor_id).map(DoctorSummary::from),
            patient: self
                .patients
                .get(&appointment.patient_id)
                .map(PatientSummary::from),
            slot: appointment.slot_id.and_then(|id| self.slots.get(&id)).cloned(),
        }
    }

    fn available_slots(&self, doctor_id: Uuid) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self
            .slots
            .values()
            .filter(|s| s.doctor_id == doctor_id)
            .filter(|s| self.active_appointment_for_slot(s.id).is_none())
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start_time);
        slots
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置医生记录（测试与演示用）
    pub async fn seed_doctor(&self, doctor: Doctor) {
        self.inner.write().await.doctors.insert(doctor.id, doctor);
    }

    /// 预置患者记录（测试与演示用）
    pub async fn seed_patient(&self, patient: Patient) {
        self.inner.write().await.patients.insert(patient.id, patient);
    }
}

#[async_trait]
impl SchedulingStore for MemoryStore {
    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.inner.read().await.doctors.get(&id).cloned())
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
        Ok(self.inner.read().await.patients.get(&id).cloned())
    }

    async fn insert_slot(&self, slot: Slot) -> Result<Slot> {
        self.inner.write().await.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn get_slot(&self, id: Uuid) -> Result<Option<Slot>> {
        Ok(self.inner.read().await.slots.get(&id).cloned())
    }

    async fn slots_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<SlotView>> {
        let inner = self.inner.read().await;
        let mut slots: Vec<&Slot> = inner
            .slots
            .values()
            .filter(|s| s.doctor_id == doctor_id)
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots.into_iter().map(|s| inner.slot_view(s)).collect())
    }

    async fn available_slots_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>> {
        Ok(self.inner.read().await.available_slots(doctor_id))
    }

    async fn delete_slot(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.slots.remove(&id).is_none() {
            return Err(ClinicError::NotFound(format!("slot {}", id)));
        }
        // 历史预约（只剩已取消的）解除时段引用，与数据库的 ON DELETE SET NULL 一致
        for appointment in inner.appointments.values_mut() {
            if appointment.slot_id == Some(id) {
                appointment.slot_id = None;
            }
        }
        Ok(())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment> {
        // 占用检查与写入在同一把写锁内，构成原子检查-插入
        let mut inner = self.inner.write().await;
        if let Some(slot_id) = appointment.slot_id {
            if inner.active_appointment_for_slot(slot_id).is_some() {
                return Err(ClinicError::SlotAlreadyBooked(slot_id.to_string()));
            }
        }
        inner
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.inner.read().await.appointments.get(&id).cloned())
    }

    async fn active_appointment_for_slot(&self, slot_id: Uuid) -> Result<Option<Appointment>> {
        Ok(self
            .inner
            .read()
            .await
            .active_appointment_for_slot(slot_id)
            .cloned())
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment> {
        let mut inner = self.inner.write().await;
        match inner.appointments.get_mut(&id) {
            Some(appointment) => {
                appointment.status = status;
                appointment.updated_at = chrono::Utc::now();
                Ok(appointment.clone())
            }
            None => Err(ClinicError::NotFound(format!("appointment {}", id))),
        }
    }

    async fn insert_cancellation(&self, cancellation: Cancellation) -> Result<Cancellation> {
        // 每条预约至多一条取消记录，与数据库的 UNIQUE 约束一致
        let mut inner = self.inner.write().await;
        if inner
            .cancellations
            .values()
            .any(|c| c.appointment_id == cancellation.appointment_id)
        {
            return Err(ClinicError::AlreadyCancelled(
                cancellation.appointment_id.to_string(),
            ));
        }
        inner
            .cancellations
            .insert(cancellation.id, cancellation.clone());
        Ok(cancellation)
    }

    async fn cancellation_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Cancellation>> {
        Ok(self
            .inner
            .read()
            .await
            .cancellations
            .values()
            .find(|c| c.appointment_id == appointment_id)
            .cloned())
    }

    async fn doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<AppointmentView>> {
        let inner = self.inner.read().await;
        let mut appointments: Vec<&Appointment> = inner
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .collect();
        appointments.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(appointments
            .into_iter()
            .map(|a| inner.appointment_view(a))
            .collect())
    }

    async fn patient_appointments(&self, patient_id: Uuid) -> Result<Vec<AppointmentView>> {
        let inner = self.inner.read().await;
        let mut appointments: Vec<&Appointment> = inner
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .collect();
        appointments.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(appointments
            .into_iter()
            .map(|a| inner.appointment_view(a))
            .collect())
    }

    async fn doctor_patients(&self, doctor_id: Uuid) -> Result<Vec<PatientSummary>> {
        let inner = self.inner.read().await;
        let mut appointments: Vec<&Appointment> = inner
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .collect();
        appointments.sort_by(|a, b| b.date.cmp(&a.date));

        let mut seen = std::collections::HashSet::new();
        let mut patients = Vec::new();
        for appointment in appointments {
            if seen.insert(appointment.patient_id) {
                if let Some(patient) = inner.patients.get(&appointment.patient_id) {
                    patients.push(PatientSummary::from(patient));
                }
            }
        }
        Ok(patients)
    }

    async fn doctors_with_availability(&self) -> Result<Vec<DoctorWithSlots>> {
        let inner = self.inner.read().await;
        let mut doctors: Vec<&Doctor> = inner.doctors.values().collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors
            .into_iter()
            .map(|d| DoctorWithSlots {
                id: d.id,
                name: d.name.clone(),
                email: d.email.clone(),
                phone: d.phone.clone(),
                specialization: d.specialization.clone(),
                available_slots: inner.available_slots(d.id),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cancellation(appointment_id: Uuid) -> Cancellation {
        Cancellation {
            id: Uuid::new_v4(),
            appointment_id,
            reason: "No reason provided".to_string(),
            cancelled_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_cancellation_rejects_duplicate_per_appointment() {
        let store = MemoryStore::new();
        let appointment_id = Uuid::new_v4();

        let first = store
            .insert_cancellation(cancellation(appointment_id))
            .await
            .unwrap();
        let result = store.insert_cancellation(cancellation(appointment_id)).await;
        assert!(matches!(result, Err(ClinicError::AlreadyCancelled(_))));

        // 已有记录保持不变，不会出现第二条
        let stored = store
            .cancellation_for_appointment(appointment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, first.id);

        // 其他预约的取消不受影响
        store
            .insert_cancellation(cancellation(Uuid::new_v4()))
            .await
            .unwrap();
    }
}
