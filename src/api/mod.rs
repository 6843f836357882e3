use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::{error, info};
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigBases;
use crate::gauge::PowerDirection;
use crate::models::get_meter_status;
use crate::{get_config_or_panic, CONFIG};

/* A meter pushes a telegram every few seconds, a minute of silence means
   the chain to the device is broken */
const STALE_AFTER_SECONDS: i64 = 60;

pub struct ApiManager;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub last_reading_ago_seconds: Option<i64>,
    pub telegrams_received: u64,
    pub telegrams_dropped: u64,
    pub timestamp: u64,
}

#[derive(Serialize, ToSchema)]
pub struct GaugeResponse {
    pub angle: f64,
    pub direction: String,
    pub text: String,
    pub day_total_text: String,
}

#[utoipa::path(get,
    path = "/health",
    summary = "Health check endpoint for container monitoring",
    responses(
        (status = 200, description = "Telegrams are coming in", body = HealthResponse),
        (status = 503, description = "No recent telegram from the meter")
    ),
)]
async fn health_check() -> impl Responder {
    let status = get_meter_status().await;
    let system_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let last_reading_ago = status
        .last_reading
        .map(|t| (chrono::Utc::now() - t).num_seconds());
    let healthy = matches!(last_reading_ago, Some(ago) if ago < STALE_AFTER_SECONDS);

    let response = HealthResponse {
        status: match healthy {
            true => "healthy".to_string(),
            false => "unhealthy".to_string(),
        },
        uptime_seconds: status.uptime_seconds(),
        last_reading_ago_seconds: last_reading_ago,
        telegrams_received: status.telegrams_received,
        telegrams_dropped: status.telegrams_dropped,
        timestamp: system_time,
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

#[utoipa::path(get,
    path = "/api/v1/power",
    summary = "Current net power in kW as a plain number, negative while returning to the grid",
    responses(
        (status = 200, description = "Latest net power reading")
    ),
)]
async fn get_power() -> impl Responder {
    let status = get_meter_status().await;
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(format!("{:.3}", status.net_power))
}

#[utoipa::path(get,
    path = "/api/v1/dayusage",
    summary = "Net energy used since the last day boundary in kWh as a plain number",
    responses(
        (status = 200, description = "Latest day total")
    ),
)]
async fn get_dayusage() -> impl Responder {
    let status = get_meter_status().await;
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(format!("{:.3}", status.day_total))
}

#[utoipa::path(get,
    path = "/api/v1/gauge",
    summary = "Current gauge state for a display client",
    responses(
        (status = 200, description = "Dial angle, direction and display strings", body = GaugeResponse),
        (status = 503, description = "No reading received yet")
    ),
)]
async fn get_gauge() -> impl Responder {
    let status = get_meter_status().await;

    match status.gauge {
        Some(gauge) => {
            let direction = match gauge.direction {
                PowerDirection::Import => "import",
                PowerDirection::Export => "export",
            };
            HttpResponse::Ok().json(GaugeResponse {
                angle: gauge.angle,
                direction: direction.to_string(),
                text: gauge.text,
                day_total_text: status.day_total_text,
            })
        }
        None => HttpResponse::ServiceUnavailable()
            .content_type("text/plain")
            .body("No reading received yet"),
    }
}

#[utoipa::path(get,
    path = "/api/v1/config",
    summary = "Get the whole configuration as stored in the memory of the application",
    responses(
        (status = 200, description = "Get current running config")
    ),
)]
async fn get_config() -> impl Responder {
    let config = CONFIG.read().unwrap().get_complete_config();
    HttpResponse::Ok().content_type("application/json").json(config)
}

impl ApiManager {
    pub fn new() -> Self {
        return ApiManager;
    }

    pub async fn start_thread(&self) {
        let config = get_config_or_panic!("httpd", ConfigBases::Httpd);

        if !config.enabled {
            /* Park instead of returning, a finished task makes main shut
               down the whole gateway */
            info!("HTTP interface is disabled");
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        #[derive(OpenApi)]
        #[openapi(
            info(description = "p1gateway API description"),
            paths(
                    health_check,
                    get_power,
                    get_dayusage,
                    get_gauge,
                    get_config,
            )
        )]
        struct ApiDoc;

        info!("HTTP interface listening on port {}", config.port);
        let running = {
            let server = HttpServer::new(move || {
                App::new()
                    .route("/health", web::get().to(health_check))
                    .route("/api/v1/power", web::get().to(get_power))
                    .route("/api/v1/dayusage", web::get().to(get_dayusage))
                    .route("/api/v1/gauge", web::get().to(get_gauge))
                    .route("/api/v1/config", web::get().to(get_config))
                    .service(
                        SwaggerUi::new("/swagger-ui/{_:.*}")
                            .url("/api/v1/openapi.json", ApiDoc::openapi()),
                    )
            })
            .bind(format!("0.0.0.0:{}", config.port));

            match server {
                Ok(server) => server.run(),
                Err(e) => {
                    error!("Unable to bind the HTTP interface on port {}: {e}", config.port);
                    return;
                }
            }
        };
        let _ = running.await;
    }
}
