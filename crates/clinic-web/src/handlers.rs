//! HTTP处理器

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use clinic_core::{utils, Actor, AppointmentStatus, ClinicError, Gender, Role};
use clinic_database::{
    DatabaseQueries, DoctorProfileUpdate, NewDoctor, NewPatient, PatientProfileUpdate,
};
use clinic_scheduling::{
    AppointmentLifecycle, BookingCoordinator, ReadViews, SlotRegistry,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::SessionStore;

/// Web层共享状态
///
/// 调度服务共享同一个数据库存储实例。
pub struct AppState {
    pub db: DatabaseQueries,
    pub sessions: SessionStore,
    pub registry: SlotRegistry<DatabaseQueries>,
    pub coordinator: BookingCoordinator<DatabaseQueries>,
    pub lifecycle: AppointmentLifecycle<DatabaseQueries>,
    pub views: ReadViews<DatabaseQueries>,
}

impl AppState {
    pub fn new(db: DatabaseQueries) -> Self {
        let store = Arc::new(db.clone());
        Self {
            db,
            sessions: SessionStore::new(),
            registry: SlotRegistry::new(store.clone()),
            coordinator: BookingCoordinator::new(store.clone()),
            lifecycle: AppointmentLifecycle::new(store.clone()),
            views: ReadViews::new(store),
        }
    }
}

/// 错误响应包装
///
/// 领域错误到HTTP状态码的唯一映射点；除存储故障外，
/// 所有领域规则违例都是可区分的 4xx。
#[derive(Debug)]
pub struct ApiError(pub ClinicError);

impl From<ClinicError> for ApiError {
    fn from(e: ClinicError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
            ClinicError::Forbidden(_) => StatusCode::FORBIDDEN,
            ClinicError::InvalidTransition { .. }
            | ClinicError::SlotAlreadyBooked(_)
            | ClinicError::SlotConsumed(_)
            | ClinicError::InvalidRange
            | ClinicError::AlreadyCancelled(_)
            | ClinicError::Validation(_) => StatusCode::BAD_REQUEST,
            ClinicError::Conflict(_) => StatusCode::CONFLICT,
            ClinicError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn require_role(actor: Actor, role: Role) -> ApiResult<Uuid> {
    if actor.role != role {
        return Err(ClinicError::Forbidden(format!("{:?} role required", role)).into());
    }
    Ok(actor.id)
}

// ========== 基础路由 ==========

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Clinic Booking API",
        "version": "1.0.0",
        "status": "running"
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

// ========== 认证 ==========

#[derive(Debug, Deserialize)]
pub struct DoctorSignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatientSignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn doctor_signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DoctorSignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let doctor = state
        .db
        .create_doctor(&NewDoctor {
            id: Uuid::new_v4(),
            name: request.name,
            email: request.email,
            phone: request.phone,
            specialization: request.specialization,
            password_digest: utils::hash_password(&request.password, &utils::new_salt()),
        })
        .await?;

    let token = state.sessions.issue(Actor::doctor(doctor.id)).await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Doctor registered successfully", "token": token, "doctor": doctor })),
    ))
}

pub async fn doctor_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (doctor, digest) = state
        .db
        .doctor_credentials(&request.email)
        .await?
        .ok_or_else(|| ClinicError::NotFound("doctor not found, please sign up".to_string()))?;

    if !utils::verify_password(&request.password, &digest) {
        return Err(ClinicError::Unauthorized("invalid credentials".to_string()).into());
    }

    let token = state.sessions.issue(Actor::doctor(doctor.id)).await;
    Ok(Json(json!({ "message": "Login successful", "token": token, "doctor": doctor })))
}

pub async fn patient_signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PatientSignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let patient = state
        .db
        .create_patient(&NewPatient {
            id: Uuid::new_v4(),
            name: request.name,
            email: request.email,
            phone: request.phone,
            age: request.age,
            gender: request.gender,
            password_digest: utils::hash_password(&request.password, &utils::new_salt()),
        })
        .await?;

    let token = state.sessions.issue(Actor::patient(patient.id)).await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Patient registered successfully", "token": token, "patient": patient })),
    ))
}

pub async fn patient_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (patient, digest) = state
        .db
        .patient_credentials(&request.email)
        .await?
        .ok_or_else(|| ClinicError::NotFound("patient not found, please sign up".to_string()))?;

    if !utils::verify_password(&request.password, &digest) {
        return Err(ClinicError::Unauthorized("invalid credentials".to_string()).into());
    }

    let token = state.sessions.issue(Actor::patient(patient.id)).await;
    Ok(Json(json!({ "message": "Login successful", "token": token, "patient": patient })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    request: axum::extract::Request,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        state.sessions.revoke(token).await;
    }
    Ok(Json(json!({ "message": "Logout successful" })))
}

// ========== 医生侧：时段 ==========

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub async fn create_slot(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateSlotRequest>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    let slot = state
        .registry
        .create_slot(doctor_id, request.start_time, request.end_time)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Slot created successfully", "slot": slot })),
    ))
}

pub async fn get_my_slots(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    let slots = state.registry.list_slots(doctor_id).await?;
    Ok(Json(json!({ "slots": slots })))
}

pub async fn delete_slot(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(slot_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    state.registry.delete_slot(doctor_id, slot_id).await?;
    Ok(Json(json!({ "message": "Slot deleted successfully" })))
}

// ========== 医生侧：预约 ==========

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn doctor_appointments(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    let appointments = state.views.doctor_appointments(doctor_id).await?;
    Ok(Json(json!({ "appointments": appointments })))
}

pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    let appointment = state
        .lifecycle
        .update_status(appointment_id, doctor_id, request.status)
        .await?;
    Ok(Json(json!({
        "message": "Appointment status updated successfully",
        "appointment": appointment
    })))
}

pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    let appointment = state.lifecycle.complete(appointment_id, doctor_id).await?;
    Ok(Json(json!({
        "message": "Appointment completed",
        "appointment": appointment
    })))
}

pub async fn doctor_cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    request: Option<Json<CancelRequest>>,
) -> ApiResult<impl IntoResponse> {
    require_role(actor, Role::Doctor)?;
    let reason = request.as_ref().and_then(|r| r.reason.as_deref());
    state.lifecycle.cancel(appointment_id, actor, reason).await?;
    Ok(Json(json!({ "message": "Appointment cancelled successfully" })))
}

pub async fn doctor_patients(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    let patients = state.views.doctor_patients(doctor_id).await?;
    Ok(Json(json!({ "patients": patients })))
}

// ========== 医生侧：资料 ==========

#[derive(Debug, Deserialize)]
pub struct DoctorProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
}

pub async fn get_doctor_profile(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    let doctor = state
        .db
        .get_doctor_record(doctor_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound(format!("doctor {}", doctor_id)))?;
    Ok(Json(json!({ "doctor": doctor })))
}

pub async fn update_doctor_profile(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<DoctorProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = require_role(actor, Role::Doctor)?;
    let doctor = state
        .db
        .update_doctor_profile(
            doctor_id,
            &DoctorProfileUpdate {
                name: request.name,
                phone: request.phone,
                specialization: request.specialization,
            },
        )
        .await?;
    Ok(Json(json!({ "message": "Profile updated successfully", "doctor": doctor })))
}

// ========== 患者侧 ==========

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PatientProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
}

pub async fn browse_doctors(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    require_role(actor, Role::Patient)?;
    let doctors = state.views.doctors_with_availability().await?;
    Ok(Json(json!({ "doctors": doctors })))
}

pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<BookAppointmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let patient_id = require_role(actor, Role::Patient)?;
    let booked = state
        .coordinator
        .book(patient_id, request.doctor_id, request.slot_id, request.date)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Appointment booked successfully", "appointment": booked })),
    ))
}

pub async fn patient_appointments(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let patient_id = require_role(actor, Role::Patient)?;
    let appointments = state.views.patient_appointments(patient_id).await?;
    Ok(Json(json!({ "appointments": appointments })))
}

pub async fn patient_cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    request: Option<Json<CancelRequest>>,
) -> ApiResult<impl IntoResponse> {
    require_role(actor, Role::Patient)?;
    let reason = request.as_ref().and_then(|r| r.reason.as_deref());
    state.lifecycle.cancel(appointment_id, actor, reason).await?;
    Ok(Json(json!({ "message": "Appointment cancelled successfully" })))
}

pub async fn get_patient_profile(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let patient_id = require_role(actor, Role::Patient)?;
    let patient = state
        .db
        .get_patient_record(patient_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound(format!("patient {}", patient_id)))?;
    Ok(Json(json!({ "patient": patient })))
}

pub async fn update_patient_profile(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<PatientProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let patient_id = require_role(actor, Role::Patient)?;
    let patient = state
        .db
        .update_patient_profile(
            patient_id,
            &PatientProfileUpdate {
                name: request.name,
                phone: request.phone,
                age: request.age,
                gender: request.gender,
            },
        )
        .await?;
    Ok(Json(json!({ "message": "Profile updated successfully", "patient": patient })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: ClinicError) -> StatusCode {
        ApiError(e).into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_of(ClinicError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ClinicError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(ClinicError::InvalidTransition { from: "PENDING".into(), to: "COMPLETED".into() }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ClinicError::SlotAlreadyBooked("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ClinicError::SlotConsumed("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ClinicError::InvalidRange), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ClinicError::AlreadyCancelled("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ClinicError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(ClinicError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ClinicError::Database("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_require_role() {
        let actor = Actor::doctor(Uuid::new_v4());
        assert!(require_role(actor, Role::Doctor).is_ok());
        assert!(require_role(actor, Role::Patient).is_err());
    }
}
