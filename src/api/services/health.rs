use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use tracing::trace;

use crate::database::ManagerState;
use crate::services::{DatabaseStatus, GeoLocator};

// 应用启动时间结构体
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<i64>,
    pub databases: Vec<DatabaseStatus>,
}

pub struct HealthService;

impl HealthService {
    /// 管理器运行中且三个数据库都已加载时为 healthy，否则 503
    pub async fn health_check(
        locator: web::Data<dyn GeoLocator>,
        app_start_time: Option<web::Data<AppStartTime>>,
    ) -> impl Responder {
        trace!("Received health check request");

        let state = locator.state();
        let databases = locator.status();
        let healthy = state == ManagerState::Running && databases.iter().all(|db| db.loaded);

        let response = HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            state: state.to_string(),
            uptime_secs: app_start_time
                .map(|t| (chrono::Utc::now() - t.start_datetime).num_seconds().max(0)),
            databases,
        };

        if healthy {
            HttpResponse::Ok().json(response)
        } else {
            HttpResponse::ServiceUnavailable().json(response)
        }
    }
}
