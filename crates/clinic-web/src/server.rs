//! Web服务器

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use clinic_core::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::auth_middleware;
use crate::handlers::{
    api_root, book_appointment, browse_doctors, complete_appointment, create_slot, delete_slot,
    doctor_appointments, doctor_cancel_appointment, doctor_login, doctor_patients, doctor_signup,
    get_doctor_profile, get_my_slots, get_patient_profile, health, logout,
    patient_appointments, patient_cancel_appointment, patient_login, patient_signup,
    update_appointment_status, update_doctor_profile, update_patient_profile, AppState,
};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        let app = Self::create_app(state);
        Self { addr, app }
    }

    fn create_app(state: Arc<AppState>) -> Router {
        Router::new()
            // 认证路由（无需token）
            .route("/auth/doctors/signup", post(doctor_signup))
            .route("/auth/doctors/login", post(doctor_login))
            .route("/auth/patients/signup", post(patient_signup))
            .route("/auth/patients/login", post(patient_login))
            .route("/auth/logout", post(logout))

            // 根路径
            .route("/", get(api_root))

            // 健康检查
            .route("/health", get(health))

            // 需要认证的API路由
            .nest("/api/v1", api_routes(state.clone()))
            .with_state(state)

            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| clinic_core::ClinicError::Internal(format!("Failed to start web server: {}", e)))?;

        Ok(())
    }
}

/// API v1 路由（医生侧 + 患者侧，均需Bearer令牌）
fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // 医生侧
        .route("/doctors/slots", post(create_slot).get(get_my_slots))
        .route("/doctors/slots/:slot_id", delete(delete_slot))
        .route("/doctors/appointments", get(doctor_appointments))
        // PUT 更新状态（目标限 PENDING/BOOKED），DELETE 取消
        .route(
            "/doctors/appointments/:appointment_id",
            put(update_appointment_status).delete(doctor_cancel_appointment),
        )
        .route("/doctors/appointments/:appointment_id/complete", put(complete_appointment))
        .route("/doctors/patients", get(doctor_patients))
        .route("/doctors/profile", get(get_doctor_profile).put(update_doctor_profile))
        // 患者侧
        .route("/patients/doctors", get(browse_doctors))
        .route("/patients/appointments", post(book_appointment).get(patient_appointments))
        .route(
            "/patients/appointments/:appointment_id",
            delete(patient_cancel_appointment),
        )
        .route("/patients/profile", get(get_patient_profile).put(update_patient_profile))
        .layer(axum::middleware::from_fn_with_state(state, auth_middleware))
}
