//! 数据库模型

use chrono::{DateTime, Utc};
use clinic_core::{
    Appointment, AppointmentStatus, Cancellation, Doctor, Gender, Patient, Payment, Slot,
};
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 状态枚举与存储字符串的映射
pub fn status_to_str(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Pending => "PENDING",
        AppointmentStatus::Booked => "BOOKED",
        AppointmentStatus::Cancelled => "CANCELLED",
        AppointmentStatus::Completed => "COMPLETED",
    }
}

pub fn status_from_str(s: &str) -> AppointmentStatus {
    match s {
        "BOOKED" => AppointmentStatus::Booked,
        "CANCELLED" => AppointmentStatus::Cancelled,
        "COMPLETED" => AppointmentStatus::Completed,
        _ => AppointmentStatus::Pending, // 默认状态
    }
}

pub fn gender_to_str(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "MALE",
        Gender::Female => "FEMALE",
        Gender::Other => "OTHER",
    }
}

pub fn gender_from_str(s: &str) -> Option<Gender> {
    match s {
        "MALE" => Some(Gender::Male),
        "FEMALE" => Some(Gender::Female),
        "OTHER" => Some(Gender::Other),
        _ => None,
    }
}

/// 数据库医生表（含凭证摘要，转换为领域模型时剥离）
#[derive(Debug, FromRow)]
pub struct DbDoctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbDoctor> for Doctor {
    fn from(db: DbDoctor) -> Self {
        Doctor {
            id: db.id,
            name: db.name,
            email: db.email,
            phone: db.phone,
            specialization: db.specialization,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>, // 存储为字符串，转换为Gender枚举
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(db: DbPatient) -> Self {
        Patient {
            id: db.id,
            name: db.name,
            email: db.email,
            phone: db.phone,
            age: db.age,
            gender: db.gender.as_deref().and_then(gender_from_str),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// 数据库时段表
#[derive(Debug, FromRow)]
pub struct DbSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<DbSlot> for Slot {
    fn from(db: DbSlot) -> Self {
        Slot {
            id: db.id,
            doctor_id: db.doctor_id,
            start_time: db.start_time,
            end_time: db.end_time,
            created_at: db.created_at,
        }
    }
}

/// 数据库预约表
#[derive(Debug, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    pub status: String, // 存储为字符串，转换为AppointmentStatus枚举
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbAppointment> for Appointment {
    fn from(db: DbAppointment) -> Self {
        Appointment {
            id: db.id,
            patient_id: db.patient_id,
            doctor_id: db.doctor_id,
            slot_id: db.slot_id,
            date: db.date,
            status: status_from_str(&db.status),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// 数据库取消记录表
#[derive(Debug, FromRow)]
pub struct DbCancellation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

impl From<DbCancellation> for Cancellation {
    fn from(db: DbCancellation) -> Self {
        Cancellation {
            id: db.id,
            appointment_id: db.appointment_id,
            reason: db.reason,
            cancelled_at: db.cancelled_at,
        }
    }
}

/// 数据库支付记录表
#[derive(Debug, FromRow)]
pub struct DbPayment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub amount: i64,
    pub method: String,
    pub payment_date: DateTime<Utc>,
}

impl From<DbPayment> for Payment {
    fn from(db: DbPayment) -> Self {
        Payment {
            id: db.id,
            appointment_id: db.appointment_id,
            amount: db.amount,
            method: db.method,
            payment_date: db.payment_date,
        }
    }
}

// 插入模型 - 用于创建新记录

/// 新医生插入模型
#[derive(Debug)]
pub struct NewDoctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub password_digest: String,
}

/// 新患者插入模型
#[derive(Debug)]
pub struct NewPatient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub password_digest: String,
}

/// 医生资料部分更新
#[derive(Debug, Default)]
pub struct DoctorProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
}

/// 患者资料部分更新
#[derive(Debug, Default)]
pub struct PatientProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Booked,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Completed,
        ] {
            assert_eq!(status_from_str(status_to_str(status)), status);
        }
        // 未知字符串落回默认状态
        assert_eq!(status_from_str("UNKNOWN"), AppointmentStatus::Pending);
    }

    #[test]
    fn test_gender_mapping() {
        assert_eq!(gender_from_str("MALE"), Some(Gender::Male));
        assert_eq!(gender_from_str(""), None);
        assert_eq!(gender_to_str(Gender::Other), "OTHER");
    }

    #[test]
    fn test_payment_row_mapping() {
        let now = Utc::now();
        let db = DbPayment {
            id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            amount: 50000,
            method: "UPI".to_string(),
            payment_date: now,
        };
        let payment: Payment = db.into();
        assert_eq!(payment.amount, 50000);
        assert_eq!(payment.method, "UPI");
        assert_eq!(payment.payment_date, now);
    }

    #[test]
    fn test_db_doctor_strips_credentials() {
        let now = Utc::now();
        let db = DbDoctor {
            id: Uuid::new_v4(),
            name: "Dr. Sharma".to_string(),
            email: "sharma@clinic.local".to_string(),
            phone: None,
            specialization: Some("Cardiology".to_string()),
            password_digest: "digest".to_string(),
            created_at: now,
            updated_at: now,
        };
        let doctor: Doctor = db.into();
        assert_eq!(doctor.name, "Dr. Sharma");
        // Doctor 领域模型不携带凭证字段，序列化结果不会泄露摘要
        let json = serde_json::to_value(&doctor).unwrap();
        assert!(json.get("password_digest").is_none());
    }
}
