use actix_web::{App, HttpResponse, HttpServer, dev::Server, error::InternalError, web, web::Data};
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::configuration::{Ga4Settings, Settings};
use crate::routes::{analyze, health_check};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    #[allow(clippy::missing_errors_doc)]
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port,
        );

        // port 0 in tests, so report the one the OS actually handed us
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();
        let server = run(listener, configuration.ga4)?;

        Ok(Self { port, server })
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[allow(clippy::missing_errors_doc)]
    // only return when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

// run the actual server
#[allow(clippy::missing_errors_doc)]
fn run(listener: TcpListener, ga4: Ga4Settings) -> Result<Server, anyhow::Error> {
    let ga4 = Data::new(ga4);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health", web::get().to(health_check))
            .route("/analyze", web::post().to(analyze))
            .app_data(ga4.clone())
            // a body that isn't even JSON still gets the {success, error} shape,
            // not actix's plain-text default
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let body = serde_json::json!({
                    "success": false,
                    "error": err.to_string(),
                });
                InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
            }))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
