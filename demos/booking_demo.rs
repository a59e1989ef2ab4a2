//! 预约流程演示程序
//!
//! 展示调度核心的完整流程：发布时段、挂号、确认、取消与重新预约

use chrono::{Duration, Utc};
use clinic_core::{Actor, AppointmentStatus, ClinicError, Doctor, Patient};
use clinic_scheduling::{
    AppointmentLifecycle, BookingCoordinator, MemoryStore, ReadViews, SlotRegistry,
};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🏥 门诊预约流程演示\n");

    // 1. 准备存储与服务
    let store = Arc::new(MemoryStore::new());
    let registry = SlotRegistry::new(store.clone());
    let coordinator = BookingCoordinator::new(store.clone());
    let lifecycle = AppointmentLifecycle::new(store.clone());
    let views = ReadViews::new(store.clone());

    // 2. 预置医生与患者
    let now = Utc::now();
    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: "Dr. Sharma".to_string(),
        email: "sharma@clinic.local".to_string(),
        phone: Some("9112345670".to_string()),
        specialization: Some("Cardiology".to_string()),
        created_at: now,
        updated_at: now,
    };
    let patient = Patient {
        id: Uuid::new_v4(),
        name: "Devendra".to_string(),
        email: "devendra@example.com".to_string(),
        phone: Some("9876543210".to_string()),
        age: Some(32),
        gender: None,
        created_at: now,
        updated_at: now,
    };
    store.seed_doctor(doctor.clone()).await;
    store.seed_patient(patient.clone()).await;
    println!("✅ 医生与患者已就绪: {} / {}", doctor.name, patient.name);

    // 3. 医生发布两个时段
    let start = now + Duration::days(1);
    let slot_a = registry
        .create_slot(doctor.id, start, start + Duration::minutes(30))
        .await?;
    let slot_b = registry
        .create_slot(
            doctor.id,
            start + Duration::hours(1),
            start + Duration::hours(1) + Duration::minutes(30),
        )
        .await?;
    println!("✅ 发布了 2 个时段");

    // 4. 患者浏览可预约医生
    let doctors = views.doctors_with_availability().await?;
    for d in &doctors {
        println!(
            "👨‍⚕️ {} ({}) 可预约时段: {}",
            d.name,
            d.specialization.as_deref().unwrap_or("-"),
            d.available_slots.len()
        );
    }

    // 5. 患者挂号第一个时段
    let booked = coordinator
        .book(patient.id, doctor.id, Some(slot_a.id), None)
        .await?;
    println!(
        "📋 挂号成功: {} -> {} ({})",
        patient.name, booked.doctor.name, booked.appointment.status
    );

    // 6. 同一时段再次挂号被拒绝
    match coordinator.book(patient.id, doctor.id, Some(slot_a.id), None).await {
        Err(ClinicError::SlotAlreadyBooked(_)) => println!("🚫 重复挂号被正确拒绝"),
        other => println!("⚠️ 意外结果: {:?}", other.map(|b| b.appointment.id)),
    }

    // 7. 医生确认预约
    let confirmed = lifecycle
        .update_status(booked.appointment.id, doctor.id, AppointmentStatus::Booked)
        .await?;
    println!("✅ 医生确认预约: {}", confirmed.status);

    // 8. 患者取消预约
    let cancellation = lifecycle
        .cancel(
            booked.appointment.id,
            Actor::patient(patient.id),
            Some("行程冲突"),
        )
        .await?;
    println!("🔄 预约已取消: {}", cancellation.reason);

    // 9. 取消后时段重新可预约
    let available = views.doctors_with_availability().await?;
    let freed = available
        .iter()
        .find(|d| d.id == doctor.id)
        .map(|d| d.available_slots.len())
        .unwrap_or(0);
    println!("♻️ 取消后可预约时段数: {}", freed);

    // 10. 改约另一时段并完成就诊
    let rebooked = coordinator
        .book(patient.id, doctor.id, Some(slot_b.id), None)
        .await?;
    lifecycle
        .update_status(rebooked.appointment.id, doctor.id, AppointmentStatus::Booked)
        .await?;
    let completed = lifecycle.complete(rebooked.appointment.id, doctor.id).await?;
    println!("🎉 就诊完成: {}", completed.status);

    // 11. 医生侧患者名册
    let roster = views.doctor_patients(doctor.id).await?;
    println!("\n📊 医生 {} 的患者名册: {} 人", doctor.name, roster.len());
    for p in roster {
        println!("   - {} <{}>", p.name, p.email);
    }

    Ok(())
}
