use actix_web::HttpResponse;
use chrono::Utc;

// liveness only; says nothing about whether GA4 is reachable
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
