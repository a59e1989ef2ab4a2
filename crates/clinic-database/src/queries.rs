//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_core::{
    utils, Appointment, AppointmentStatus, AppointmentSummary, AppointmentView, Cancellation,
    ClinicError, Doctor, DoctorSummary, DoctorWithSlots, Patient, PatientSummary, Payment, Result,
    Slot, SlotView,
};
use clinic_scheduling::SchedulingStore;
use sqlx::FromRow;
use uuid::Uuid;

/// 防重复预约的部分唯一索引名
///
/// 每个时段至多允许一条未取消的预约；并发插入竞争由该索引裁决，
/// 失败方的唯一约束冲突被映射为 `SlotAlreadyBooked`。
const ACTIVE_SLOT_INDEX: &str = "idx_appointments_active_slot";

/// 取消记录 1:1 约束名（每条预约至多一条取消记录）
const CANCELLATION_UNIQUE: &str = "cancellations_appointment_id_key";

/// 数据库查询操作接口
#[derive(Debug, Clone)]
pub struct DatabaseQueries {
    pool: DatabasePool,
}

impl DatabaseQueries {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_db_err(e: sqlx::Error) -> ClinicError {
        if let sqlx::Error::Database(db) = &e {
            match db.constraint() {
                Some(ACTIVE_SLOT_INDEX) => {
                    return ClinicError::SlotAlreadyBooked("slot already booked".to_string())
                }
                Some(CANCELLATION_UNIQUE) => {
                    return ClinicError::AlreadyCancelled(
                        "cancellation already recorded".to_string(),
                    )
                }
                Some("doctors_email_key") | Some("patients_email_key") => {
                    return ClinicError::Conflict("email already registered".to_string())
                }
                _ => {}
            }
        }
        ClinicError::Database(e.to_string())
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建医生表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS doctors (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                email VARCHAR(255) UNIQUE NOT NULL,
                phone VARCHAR(32),
                specialization VARCHAR(255),
                password_digest VARCHAR(255) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(Self::map_db_err)?;

        // 创建患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                email VARCHAR(255) UNIQUE NOT NULL,
                phone VARCHAR(32),
                age INTEGER,
                gender VARCHAR(10),
                password_digest VARCHAR(255) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(Self::map_db_err)?;

        // 创建时段表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS slots (
                id UUID PRIMARY KEY,
                doctor_id UUID NOT NULL REFERENCES doctors(id),
                start_time TIMESTAMP WITH TIME ZONE NOT NULL,
                end_time TIMESTAMP WITH TIME ZONE NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                CHECK (end_time > start_time)
            )
        "#).execute(pool).await.map_err(Self::map_db_err)?;

        // 创建预约表
        // slot_id 在时段删除时置空，保留预约历史
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS appointments (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id),
                doctor_id UUID NOT NULL REFERENCES doctors(id),
                slot_id UUID REFERENCES slots(id) ON DELETE SET NULL,
                date TIMESTAMP WITH TIME ZONE NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(Self::map_db_err)?;

        // 创建取消记录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS cancellations (
                id UUID PRIMARY KEY,
                appointment_id UUID UNIQUE NOT NULL REFERENCES appointments(id),
                reason TEXT NOT NULL,
                cancelled_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(Self::map_db_err)?;

        // 创建支付记录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS payments (
                id UUID PRIMARY KEY,
                appointment_id UUID NOT NULL REFERENCES appointments(id),
                amount BIGINT NOT NULL,
                method VARCHAR(32) NOT NULL,
                payment_date TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(Self::map_db_err)?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_slots_doctor_id ON slots(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_slots_start_time ON slots(start_time)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_doctor_id ON appointments(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(date)",
            // 核心不变量：每个时段至多一条未取消预约
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_active_slot \
             ON appointments(slot_id) WHERE slot_id IS NOT NULL AND status <> 'CANCELLED'",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(Self::map_db_err)?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    // ========== 医生身份操作 ==========

    /// 注册新医生
    pub async fn create_doctor(&self, doctor: &NewDoctor) -> Result<Doctor> {
        let row = sqlx::query_as::<_, DbDoctor>(r#"
            INSERT INTO doctors (id, name, email, phone, specialization, password_digest)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        "#)
        .bind(doctor.id)
        .bind(&doctor.name)
        .bind(&doctor.email)
        .bind(&doctor.phone)
        .bind(&doctor.specialization)
        .bind(&doctor.password_digest)
        .fetch_one(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;

        Ok(row.into())
    }

    /// 按邮箱查找医生及其凭证摘要（登录校验用）
    pub async fn doctor_credentials(&self, email: &str) -> Result<Option<(Doctor, String)>> {
        let row = sqlx::query_as::<_, DbDoctor>("SELECT * FROM doctors WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;

        Ok(row.map(|db| {
            let digest = db.password_digest.clone();
            (db.into(), digest)
        }))
    }

    /// 查询医生资料
    pub async fn get_doctor_record(&self, id: Uuid) -> Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DbDoctor>("SELECT * FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;

        Ok(row.map(Into::into))
    }

    /// 部分更新医生资料
    pub async fn update_doctor_profile(
        &self,
        id: Uuid,
        update: &DoctorProfileUpdate,
    ) -> Result<Doctor> {
        let row = sqlx::query_as::<_, DbDoctor>(r#"
            UPDATE doctors SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                specialization = COALESCE($4, specialization),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
        "#)
        .bind(id)
        .bind(&update.name)
        .bind(&update.phone)
        .bind(&update.specialization)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?
        .ok_or_else(|| ClinicError::NotFound(format!("doctor {}", id)))?;

        Ok(row.into())
    }

    // ========== 患者身份操作 ==========

    /// 注册新患者
    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Patient> {
        let row = sqlx::query_as::<_, DbPatient>(r#"
            INSERT INTO patients (id, name, email, phone, age, gender, password_digest)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        "#)
        .bind(patient.id)
        .bind(&patient.name)
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(patient.age)
        .bind(patient.gender.map(gender_to_str))
        .bind(&patient.password_digest)
        .fetch_one(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;

        Ok(row.into())
    }

    /// 按邮箱查找患者及其凭证摘要（登录校验用）
    pub async fn patient_credentials(&self, email: &str) -> Result<Option<(Patient, String)>> {
        let row = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;

        Ok(row.map(|db| {
            let digest = db.password_digest.clone();
            (db.into(), digest)
        }))
    }

    /// 查询患者资料
    pub async fn get_patient_record(&self, id: Uuid) -> Result<Option<Patient>> {
        let row = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;

        Ok(row.map(Into::into))
    }

    /// 部分更新患者资料
    pub async fn update_patient_profile(
        &self,
        id: Uuid,
        update: &PatientProfileUpdate,
    ) -> Result<Patient> {
        let row = sqlx::query_as::<_, DbPatient>(r#"
            UPDATE patients SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                age = COALESCE($4, age),
                gender = COALESCE($5, gender),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
        "#)
        .bind(id)
        .bind(&update.name)
        .bind(&update.phone)
        .bind(update.age)
        .bind(update.gender.map(gender_to_str))
        .fetch_optional(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?
        .ok_or_else(|| ClinicError::NotFound(format!("patient {}", id)))?;

        Ok(row.into())
    }

    // ========== 演示数据 ==========

    /// 写入一组演示数据：医生、患者、时段、预约、支付与取消记录
    pub async fn seed_demo(&self) -> Result<()> {
        let doctor = self
            .create_doctor(&NewDoctor {
                id: Uuid::new_v4(),
                name: "Dr. Sharma".to_string(),
                email: "sharma@clinic.local".to_string(),
                phone: Some("9112345670".to_string()),
                specialization: Some("Cardiology".to_string()),
                password_digest: utils::hash_password("changeme", &utils::new_salt()),
            })
            .await?;
        let patient = self
            .create_patient(&NewPatient {
                id: Uuid::new_v4(),
                name: "Devendra".to_string(),
                email: "devendra@example.com".to_string(),
                phone: Some("9876543210".to_string()),
                age: Some(20),
                gender: Some(clinic_core::Gender::Male),
                password_digest: utils::hash_password("changeme", &utils::new_salt()),
            })
            .await?;

        let start = Utc::now() + chrono::Duration::days(1);
        let slot = self
            .insert_slot(Slot {
                id: Uuid::new_v4(),
                doctor_id: doctor.id,
                start_time: start,
                end_time: start + chrono::Duration::minutes(30),
                created_at: Utc::now(),
            })
            .await?;

        let appointment = self
            .insert_appointment(Appointment {
                id: Uuid::new_v4(),
                patient_id: patient.id,
                doctor_id: doctor.id,
                slot_id: Some(slot.id),
                date: slot.start_time,
                status: AppointmentStatus::Booked,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;

        let payment: Payment = sqlx::query_as::<_, DbPayment>(r#"
            INSERT INTO payments (id, appointment_id, amount, method)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        "#)
        .bind(Uuid::new_v4())
        .bind(appointment.id)
        .bind(50000i64)
        .bind("UPI")
        .fetch_one(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?
        .into();

        tracing::info!(
            "Demo data seeded (doctor: {}, patient: {}, payment: {} 分 via {})",
            doctor.id,
            patient.id,
            payment.amount,
            payment.method
        );
        Ok(())
    }
}

// ========== 联表查询行模型 ==========

/// 时段及关联未取消预约的联表行
#[derive(Debug, FromRow)]
struct DbSlotViewRow {
    id: Uuid,
    doctor_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    created_at: DateTime<Utc>,
    appointment_id: Option<Uuid>,
    appointment_patient_id: Option<Uuid>,
    appointment_status: Option<String>,
    appointment_date: Option<DateTime<Utc>>,
}

impl From<DbSlotViewRow> for SlotView {
    fn from(row: DbSlotViewRow) -> Self {
        let appointment = match (row.appointment_id, row.appointment_patient_id) {
            (Some(id), Some(patient_id)) => Some(AppointmentSummary {
                id,
                patient_id,
                status: status_from_str(row.appointment_status.as_deref().unwrap_or("PENDING")),
                date: row.appointment_date.unwrap_or(row.start_time),
            }),
            _ => None,
        };
        SlotView {
            consumed: appointment.is_some(),
            appointment,
            slot: Slot {
                id: row.id,
                doctor_id: row.doctor_id,
                start_time: row.start_time,
                end_time: row.end_time,
                created_at: row.created_at,
            },
        }
    }
}

/// 医生侧预约视图联表行（连接患者与时段）
#[derive(Debug, FromRow)]
struct DbDoctorAppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    slot_id: Option<Uuid>,
    date: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    patient_name: String,
    patient_email: String,
    patient_phone: Option<String>,
    patient_age: Option<i32>,
    patient_gender: Option<String>,
    slot_start_time: Option<DateTime<Utc>>,
    slot_end_time: Option<DateTime<Utc>>,
    slot_created_at: Option<DateTime<Utc>>,
}

impl From<DbDoctorAppointmentRow> for AppointmentView {
    fn from(row: DbDoctorAppointmentRow) -> Self {
        let slot = match (row.slot_id, row.slot_start_time, row.slot_end_time) {
            (Some(id), Some(start_time), Some(end_time)) => Some(Slot {
                id,
                doctor_id: row.doctor_id,
                start_time,
                end_time,
                created_at: row.slot_created_at.unwrap_or(start_time),
            }),
            _ => None,
        };
        AppointmentView {
            patient: Some(PatientSummary {
                id: row.patient_id,
                name: row.patient_name,
                email: row.patient_email,
                phone: row.patient_phone,
                age: row.patient_age,
                gender: row.patient_gender.as_deref().and_then(gender_from_str),
            }),
            doctor: None,
            slot,
            appointment: Appointment {
                id: row.id,
                patient_id: row.patient_id,
                doctor_id: row.doctor_id,
                slot_id: row.slot_id,
                date: row.date,
                status: status_from_str(&row.status),
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

/// 患者侧预约视图联表行（连接医生与时段）
#[derive(Debug, FromRow)]
struct DbPatientAppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    slot_id: Option<Uuid>,
    date: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    doctor_name: String,
    doctor_specialization: Option<String>,
    slot_start_time: Option<DateTime<Utc>>,
    slot_end_time: Option<DateTime<Utc>>,
    slot_created_at: Option<DateTime<Utc>>,
}

impl From<DbPatientAppointmentRow> for AppointmentView {
    fn from(row: DbPatientAppointmentRow) -> Self {
        let slot = match (row.slot_id, row.slot_start_time, row.slot_end_time) {
            (Some(id), Some(start_time), Some(end_time)) => Some(Slot {
                id,
                doctor_id: row.doctor_id,
                start_time,
                end_time,
                created_at: row.slot_created_at.unwrap_or(start_time),
            }),
            _ => None,
        };
        AppointmentView {
            doctor: Some(DoctorSummary {
                id: row.doctor_id,
                name: row.doctor_name,
                specialization: row.doctor_specialization,
            }),
            patient: None,
            slot,
            appointment: Appointment {
                id: row.id,
                patient_id: row.patient_id,
                doctor_id: row.doctor_id,
                slot_id: row.slot_id,
                date: row.date,
                status: status_from_str(&row.status),
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

#[async_trait]
impl SchedulingStore for DatabaseQueries {
    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DbDoctor>("SELECT * FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;
        Ok(row.map(Doctor::from))
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
        let row = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;
        Ok(row.map(Patient::from))
    }

    async fn insert_slot(&self, slot: Slot) -> Result<Slot> {
        let row = sqlx::query_as::<_, DbSlot>(r#"
            INSERT INTO slots (id, doctor_id, start_time, end_time, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        "#)
        .bind(slot.id)
        .bind(slot.doctor_id)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.created_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(row.into())
    }

    async fn get_slot(&self, id: Uuid) -> Result<Option<Slot>> {
        let row = sqlx::query_as::<_, DbSlot>("SELECT * FROM slots WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;
        Ok(row.map(Slot::from))
    }

    async fn slots_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<SlotView>> {
        let rows = sqlx::query_as::<_, DbSlotViewRow>(r#"
            SELECT s.id, s.doctor_id, s.start_time, s.end_time, s.created_at,
                   a.id AS appointment_id,
                   a.patient_id AS appointment_patient_id,
                   a.status AS appointment_status,
                   a.date AS appointment_date
            FROM slots s
            LEFT JOIN appointments a ON a.slot_id = s.id AND a.status <> 'CANCELLED'
            WHERE s.doctor_id = $1
            ORDER BY s.start_time ASC
        "#)
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(rows.into_iter().map(SlotView::from).collect())
    }

    async fn available_slots_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>> {
        let rows = sqlx::query_as::<_, DbSlot>(r#"
            SELECT s.* FROM slots s
            WHERE s.doctor_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM appointments a
                  WHERE a.slot_id = s.id AND a.status <> 'CANCELLED'
              )
            ORDER BY s.start_time ASC
        "#)
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(rows.into_iter().map(Slot::from).collect())
    }

    async fn delete_slot(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM slots WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(ClinicError::NotFound(format!("slot {}", id)));
        }
        Ok(())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment> {
        // 单条 INSERT 配合部分唯一索引即为原子检查-插入，
        // 并发竞争的失败方在此收到唯一约束冲突
        let row = sqlx::query_as::<_, DbAppointment>(r#"
            INSERT INTO appointments (id, patient_id, doctor_id, slot_id, date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
        "#)
        .bind(appointment.id)
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.slot_id)
        .bind(appointment.date)
        .bind(status_to_str(appointment.status))
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(row.into())
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
        let row = sqlx::query_as::<_, DbAppointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;
        Ok(row.map(Appointment::from))
    }

    async fn active_appointment_for_slot(&self, slot_id: Uuid) -> Result<Option<Appointment>> {
        let row = sqlx::query_as::<_, DbAppointment>(
            "SELECT * FROM appointments WHERE slot_id = $1 AND status <> 'CANCELLED'",
        )
        .bind(slot_id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(row.map(Appointment::from))
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment> {
        let row = sqlx::query_as::<_, DbAppointment>(r#"
            UPDATE appointments SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
        "#)
        .bind(id)
        .bind(status_to_str(status))
        .fetch_optional(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?
        .ok_or_else(|| ClinicError::NotFound(format!("appointment {}", id)))?;
        Ok(row.into())
    }

    async fn insert_cancellation(&self, cancellation: Cancellation) -> Result<Cancellation> {
        let row = sqlx::query_as::<_, DbCancellation>(r#"
            INSERT INTO cancellations (id, appointment_id, reason, cancelled_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        "#)
        .bind(cancellation.id)
        .bind(cancellation.appointment_id)
        .bind(&cancellation.reason)
        .bind(cancellation.cancelled_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(row.into())
    }

    async fn cancellation_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Cancellation>> {
        let row = sqlx::query_as::<_, DbCancellation>(
            "SELECT * FROM cancellations WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(row.map(Cancellation::from))
    }

    async fn doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<AppointmentView>> {
        let rows = sqlx::query_as::<_, DbDoctorAppointmentRow>(r#"
            SELECT a.id, a.patient_id, a.doctor_id, a.slot_id, a.date, a.status,
                   a.created_at, a.updated_at,
                   p.name AS patient_name, p.email AS patient_email,
                   p.phone AS patient_phone, p.age AS patient_age, p.gender AS patient_gender,
                   s.start_time AS slot_start_time, s.end_time AS slot_end_time,
                   s.created_at AS slot_created_at
            FROM appointments a
            JOIN patients p ON p.id = a.patient_id
            LEFT JOIN slots s ON s.id = a.slot_id
            WHERE a.doctor_id = $1
            ORDER BY a.date DESC
        "#)
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(rows.into_iter().map(AppointmentView::from).collect())
    }

    async fn patient_appointments(&self, patient_id: Uuid) -> Result<Vec<AppointmentView>> {
        let rows = sqlx::query_as::<_, DbPatientAppointmentRow>(r#"
            SELECT a.id, a.patient_id, a.doctor_id, a.slot_id, a.date, a.status,
                   a.created_at, a.updated_at,
                   d.name AS doctor_name, d.specialization AS doctor_specialization,
                   s.start_time AS slot_start_time, s.end_time AS slot_end_time,
                   s.created_at AS slot_created_at
            FROM appointments a
            JOIN doctors d ON d.id = a.doctor_id
            LEFT JOIN slots s ON s.id = a.slot_id
            WHERE a.patient_id = $1
            ORDER BY a.date DESC
        "#)
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;
        Ok(rows.into_iter().map(AppointmentView::from).collect())
    }

    async fn doctor_patients(&self, doctor_id: Uuid) -> Result<Vec<PatientSummary>> {
        // 预约史的查询期投影，去重依赖 DISTINCT ON，不维护独立的患者名册表
        #[derive(Debug, FromRow)]
        struct Row {
            id: Uuid,
            name: String,
            email: String,
            phone: Option<String>,
            age: Option<i32>,
            gender: Option<String>,
        }

        let rows = sqlx::query_as::<_, Row>(r#"
            SELECT DISTINCT ON (p.id) p.id, p.name, p.email, p.phone, p.age, p.gender
            FROM appointments a
            JOIN patients p ON p.id = a.patient_id
            WHERE a.doctor_id = $1
            ORDER BY p.id, a.date DESC
        "#)
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(Self::map_db_err)?;

        Ok(rows
            .into_iter()
            .map(|r| PatientSummary {
                id: r.id,
                name: r.name,
                email: r.email,
                phone: r.phone,
                age: r.age,
                gender: r.gender.as_deref().and_then(gender_from_str),
            })
            .collect())
    }

    async fn doctors_with_availability(&self) -> Result<Vec<DoctorWithSlots>> {
        let doctors = sqlx::query_as::<_, DbDoctor>("SELECT * FROM doctors ORDER BY name")
            .fetch_all(self.pool.pool())
            .await
            .map_err(Self::map_db_err)?;

        let mut result = Vec::with_capacity(doctors.len());
        for doctor in doctors {
            let available_slots = self.available_slots_for_doctor(doctor.id).await?;
            let doctor: Doctor = doctor.into();
            result.push(DoctorWithSlots {
                id: doctor.id,
                name: doctor.name,
                email: doctor.email,
                phone: doctor.phone,
                specialization: doctor.specialization,
                available_slots,
            });
        }
        Ok(result)
    }
}
