//! 调度存储抽象
//!
//! 核心组件通过该 trait 访问持久化存储，数据库实现与内存实现共用同一套
//! 契约。防重复预约的最后一道防线落在 `insert_appointment` 上：当预约
//! 关联了时段时，检查与写入必须是一个原子单元（数据库实现依赖部分唯一
//! 索引，内存实现依赖单一写锁），竞争失败方必须收到 `SlotAlreadyBooked`。

use async_trait::async_trait;
use clinic_core::{
    Appointment, AppointmentStatus, AppointmentView, Cancellation, Doctor, DoctorWithSlots,
    Patient, PatientSummary, Result, Slot, SlotView,
};
use uuid::Uuid;

/// 调度子系统存储接口
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    // ========== 身份查询 ==========

    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>>;

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>>;

    // ========== 时段操作 ==========

    async fn insert_slot(&self, slot: Slot) -> Result<Slot>;

    async fn get_slot(&self, id: Uuid) -> Result<Option<Slot>>;

    /// 医生全部时段，按开始时间升序，附带占用标记与关联预约概要
    async fn slots_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<SlotView>>;

    /// 医生当前未被占用的时段，按开始时间升序
    async fn available_slots_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>>;

    /// 物理删除时段（占用校验由注册表完成，删除本身是单行操作）
    async fn delete_slot(&self, id: Uuid) -> Result<()>;

    // ========== 预约操作 ==========

    /// 原子创建预约
    ///
    /// 关联时段已被未取消预约占用时返回 `SlotAlreadyBooked`。
    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment>;

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>>;

    /// 查询时段上未取消的预约（占用判定）
    async fn active_appointment_for_slot(&self, slot_id: Uuid) -> Result<Option<Appointment>>;

    /// 更新预约状态（合法性由状态机预先校验）
    async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment>;

    // ========== 取消记录 ==========

    async fn insert_cancellation(&self, cancellation: Cancellation) -> Result<Cancellation>;

    async fn cancellation_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Cancellation>>;

    // ========== 只读视图 ==========

    /// 医生的全部预约，按日期降序，连接患者概要与时段
    async fn doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<AppointmentView>>;

    /// 患者的全部预约，按日期降序，连接医生概要与时段
    async fn patient_appointments(&self, patient_id: Uuid) -> Result<Vec<AppointmentView>>;

    /// 与该医生有过预约史的去重患者集合（查询期投影，不落库）
    async fn doctor_patients(&self, doctor_id: Uuid) -> Result<Vec<PatientSummary>>;

    /// 全部医生及其当前可预约时段（患者浏览视图）
    async fn doctors_with_availability(&self) -> Result<Vec<DoctorWithSlots>>;
}
