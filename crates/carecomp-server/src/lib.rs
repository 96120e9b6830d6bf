pub mod context;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;
use carecomp_core::config::Config;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
///
/// Falls back to default settings when `.carecomp/config.yaml` is missing or
/// unreadable.
pub fn build_router(root: PathBuf) -> Router {
    let config = match Config::load(&root) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("using default config: {e}");
            Config::new("carecomp")
        }
    };
    router(state::AppState::new(root, config))
}

pub fn router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Public
        .route("/api/contact", post(routes::contact::submit_contact))
        // Organization
        .route("/api/org", get(routes::org::get_org))
        .route("/api/org/flags", put(routes::org::put_flags))
        .route(
            "/api/org/settings",
            get(routes::org::get_settings).put(routes::org::put_settings),
        )
        .route(
            "/api/org/members",
            get(routes::org::list_members).post(routes::org::upsert_member),
        )
        .route(
            "/api/org/members/{email}",
            axum::routing::delete(routes::org::remove_member),
        )
        // Facilities
        .route(
            "/api/facilities",
            get(routes::facilities::list_facilities).post(routes::facilities::create_facility),
        )
        .route(
            "/api/facilities/{id}",
            get(routes::facilities::get_facility)
                .put(routes::facilities::update_facility)
                .delete(routes::facilities::delete_facility),
        )
        // Staff
        .route(
            "/api/staff",
            get(routes::staff::list_staff).post(routes::staff::create_staff),
        )
        .route(
            "/api/staff/{id}",
            get(routes::staff::get_staff)
                .put(routes::staff::update_staff)
                .delete(routes::staff::delete_staff),
        )
        .route("/api/staff/{id}/active", put(routes::staff::set_staff_active))
        // Competencies
        .route(
            "/api/competencies",
            get(routes::competencies::list_competencies)
                .post(routes::competencies::create_competency),
        )
        .route(
            "/api/competencies/{id}",
            get(routes::competencies::get_competency)
                .put(routes::competencies::update_competency)
                .delete(routes::competencies::delete_competency),
        )
        .route(
            "/api/competencies/{id}/sections/{key}",
            put(routes::competencies::put_section),
        )
        .route(
            "/api/competencies/{id}/archive",
            post(routes::competencies::archive_competency),
        )
        // Assignments
        .route(
            "/api/assignments",
            get(routes::assignments::list_assignments)
                .post(routes::assignments::create_assignment),
        )
        .route("/api/assignments/bulk", post(routes::assignments::bulk_assign))
        .route("/api/assignments/mine", get(routes::assignments::list_mine))
        .route(
            "/api/assignments/progress",
            get(routes::assignments::get_progress),
        )
        .route(
            "/api/assignments/{id}",
            put(routes::assignments::update_assignment)
                .delete(routes::assignments::delete_assignment),
        )
        .route(
            "/api/assignments/{id}/status",
            put(routes::assignments::set_status),
        )
        // Deficiencies and plans of correction
        .route(
            "/api/deficiencies",
            get(routes::deficiencies::list_deficiencies)
                .post(routes::deficiencies::create_deficiency),
        )
        .route(
            "/api/deficiencies/{id}",
            get(routes::deficiencies::get_deficiency)
                .put(routes::deficiencies::update_deficiency)
                .delete(routes::deficiencies::delete_deficiency),
        )
        .route(
            "/api/deficiencies/{id}/status",
            put(routes::deficiencies::set_deficiency_status),
        )
        .route(
            "/api/deficiencies/{id}/poc",
            get(routes::deficiencies::get_poc)
                .post(routes::deficiencies::create_poc)
                .put(routes::deficiencies::update_poc),
        )
        .route(
            "/api/deficiencies/{id}/poc/status",
            put(routes::deficiencies::set_poc_status),
        )
        // Policies
        .route(
            "/api/policies",
            get(routes::policies::list_policies).post(routes::policies::create_policy),
        )
        .route("/api/policies/{id}", get(routes::policies::get_policy))
        .route(
            "/api/policies/{id}/versions",
            post(routes::policies::publish_version),
        )
        .route(
            "/api/policies/{id}/archive",
            post(routes::policies::archive_policy),
        )
        // Drills
        .route(
            "/api/drills",
            get(routes::drills::list_drills).post(routes::drills::schedule_drill),
        )
        .route("/api/drills/{id}", get(routes::drills::get_drill))
        .route("/api/drills/{id}/start", post(routes::drills::start_drill))
        .route("/api/drills/{id}/end", post(routes::drills::end_drill))
        .route("/api/drills/{id}/cancel", post(routes::drills::cancel_drill))
        .route("/api/drills/{id}/stations", post(routes::drills::add_station))
        .route(
            "/api/drills/{id}/stations/order",
            put(routes::drills::reorder_stations),
        )
        .route("/api/drills/{id}/checkins", post(routes::drills::check_in))
        // Tracks
        .route(
            "/api/tracks",
            get(routes::tracks::list_tracks).post(routes::tracks::create_track),
        )
        .route(
            "/api/tracks/assignments",
            get(routes::tracks::list_track_assignments),
        )
        .route("/api/tracks/{id}", get(routes::tracks::get_track))
        .route("/api/tracks/{id}/sections", post(routes::tracks::add_section))
        .route(
            "/api/tracks/sections/{id}/modules",
            post(routes::tracks::add_module),
        )
        .route("/api/tracks/{id}/assign", post(routes::tracks::assign_track))
        .route(
            "/api/tracks/modules/{id}/complete",
            post(routes::tracks::complete_module),
        )
        .route("/api/tracks/{id}/progress", get(routes::tracks::get_progress))
        // Dashboards
        .route(
            "/api/manager/facility/{id}/overview",
            get(routes::dashboard::facility_overview),
        )
        .route("/api/dashboard", get(routes::dashboard::org_dashboard))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the API server on a listener the caller has already bound, so the
/// caller can report the actual address (port 0 picks a free port).
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(root);

    tracing::info!("carecomp API listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
