//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 医生基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: Option<String>, // 专科方向
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 性别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// 可预约时段
///
/// 每个时段归属唯一医生，同一时刻至多关联一条未取消的预约。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// 预约状态
///
/// 闭合枚举，状态转换由状态机穷举检查，领域逻辑中不做字符串比较。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,   // 待确认
    Booked,    // 已确认
    Cancelled, // 已取消（终态）
    Completed, // 已完成（终态）
}

impl AppointmentStatus {
    /// 是否为终态（不允许再发生任何转换）
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Booked => "BOOKED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
        };
        write!(f, "{}", s)
    }
}

/// 预约记录
///
/// `slot_id` 为空表示不占用已发布时段的自由日期预约，
/// 此时不适用时段防重复预约约束。预约记录永不物理删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 取消记录
///
/// 追加式审计记录，每条预约至多一条，创建后不可变更。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

/// 支付记录（外围数据，无状态机）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub amount: i64, // 单位：分
    pub method: String,
    pub payment_date: DateTime<Utc>,
}

/// 调用方角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Patient,
}

/// 已验证的调用方身份
///
/// 由外部会话层验证后注入每次核心调用，核心内部不读取任何全局会话状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn doctor(id: Uuid) -> Self {
        Self { id, role: Role::Doctor }
    }

    pub fn patient(id: Uuid) -> Self {
        Self { id, role: Role::Patient }
    }
}

// ========== 展示用投影类型 ==========

/// 医生概要（预约创建结果中内嵌展示）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub name: String,
    pub specialization: Option<String>,
}

impl From<&Doctor> for DoctorSummary {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name.clone(),
            specialization: doctor.specialization.clone(),
        }
    }
}

/// 患者概要（医生侧列表展示）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name.clone(),
            email: patient.email.clone(),
            phone: patient.phone.clone(),
            age: patient.age,
            gender: patient.gender,
        }
    }
}

/// 关联预约概要（时段列表中内嵌展示）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: AppointmentStatus,
    pub date: DateTime<Utc>,
}

impl From<&Appointment> for AppointmentSummary {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            status: appointment.status,
            date: appointment.date,
        }
    }
}

/// 时段视图：时段 + 占用状态 + 关联预约概要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotView {
    #[serde(flatten)]
    pub slot: Slot,
    pub consumed: bool,
    pub appointment: Option<AppointmentSummary>,
}

/// 预约视图：预约 + 对方身份概要 + 关联时段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor: Option<DoctorSummary>,
    pub patient: Option<PatientSummary>,
    pub slot: Option<Slot>,
}

/// 医生浏览视图：医生 + 当前可预约时段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorWithSlots {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub available_slots: Vec<Slot>,
}

/// 预约创建结果：预约 + 内嵌医生概要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor: DoctorSummary,
}
