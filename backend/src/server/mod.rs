//! HTTP server assembly.

pub mod config;

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetricsBuilder;
use std::net::SocketAddr;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use crate::inbound::http::admin::deactivate_code;
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::network::{list_direct_referrals, network_summary};
use crate::inbound::http::registration::register;
use crate::inbound::http::state::HttpState;
use crate::middleware::Trace;

pub use config::AppSettings;

/// Bind the HTTP server with every route and middleware wired.
///
/// The returned [`Server`] is not yet running; await it from the entry
/// point. `health` is shared so the caller can flip readiness once the
/// server is accepting connections.
pub fn run(
    bind_addr: SocketAddr,
    state: HttpState,
    health: web::Data<HealthState>,
) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        let api = web::scope("/api/v1")
            .service(register)
            .service(network_summary)
            .service(list_direct_referrals)
            .service(deactivate_code);

        let app = App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(health.clone())
            .wrap(Trace)
            .service(api)
            .service(ready)
            .service(live);

        #[cfg(feature = "metrics")]
        let app = app.wrap(make_metrics());

        #[cfg(debug_assertions)]
        let app = app.service(
            SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", crate::ApiDoc::openapi()),
        );

        app
    })
    .bind(bind_addr)?;

    Ok(server.run())
}

#[cfg(feature = "metrics")]
fn make_metrics() -> actix_web_prom::PrometheusMetrics {
    PrometheusMetricsBuilder::new("talowa")
        .endpoint("/metrics")
        .build()
        .expect("configure Prometheus metrics")
}
