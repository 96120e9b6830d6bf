use axum::http::StatusCode;
use carecomp_core::competency::{CompetencyInput, CompetencyTemplate};
use carecomp_core::facility::{Facility, FacilityInput};
use carecomp_core::gate::FeatureFlags;
use carecomp_core::org::{Membership, Organization};
use carecomp_core::staff::{StaffInput, StaffMember};
use carecomp_core::types::Role;
use http_body_util::BodyExt;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN: &str = "admin@example.org";
const MANAGER: &str = "manager@example.org";
const STAFF: &str = "staff@example.org";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    dir: TempDir,
    org_id: String,
    facility_id: String,
    staff_id: String,
    other_staff_id: String,
    competency_id: String,
}

impl Fixture {
    fn app(&self) -> axum::Router {
        carecomp_server::build_router(self.dir.path().to_path_buf())
    }
}

/// One organization with an admin, a manager, and a staff member who also
/// has a staff record, plus a facility and a competency.
fn seed() -> Fixture {
    let dir = TempDir::new().unwrap();
    carecomp_core::config::Config::new("test-instance")
        .save(dir.path())
        .unwrap();
    let conn = carecomp_core::db::open(dir.path()).unwrap();

    let org = Organization::create(&conn, "Sunrise Care", FeatureFlags::default()).unwrap();
    Membership::upsert(&conn, &org.id, ADMIN, Role::Admin).unwrap();
    Membership::upsert(&conn, &org.id, MANAGER, Role::Manager).unwrap();
    Membership::upsert(&conn, &org.id, STAFF, Role::Staff).unwrap();

    let facility = Facility::create(
        &conn,
        &org.id,
        FacilityInput {
            name: "Maple House".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    let staff = StaffMember::create(
        &conn,
        &org.id,
        StaffInput {
            facility_id: facility.id.clone(),
            full_name: "Sam Rivera".to_string(),
            email: STAFF.to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    let other = StaffMember::create(
        &conn,
        &org.id,
        StaffInput {
            facility_id: facility.id.clone(),
            full_name: "Lee Park".to_string(),
            email: "lee@example.org".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    let input: CompetencyInput =
        serde_json::from_value(json!({ "title": "Hand Hygiene", "risk_level": "High" })).unwrap();
    let competency = CompetencyTemplate::create(&conn, &org.id, input).unwrap();

    Fixture {
        dir,
        org_id: org.id,
        facility_id: facility.id,
        staff_id: staff.id,
        other_staff_id: other.id,
        competency_id: competency.id,
    }
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    who: Option<(&str, &str)>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some((org, email)) = who {
        builder = builder
            .header(carecomp_server::context::ORG_HEADER, org)
            .header(carecomp_server::context::USER_HEADER, email);
    }
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_as(app: axum::Router, uri: &str, org: &str, email: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, Some((org, email)), None).await
}

async fn post_as(
    app: axum::Router,
    uri: &str,
    org: &str,
    email: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some((org, email)), Some(body)).await
}

async fn post_empty_as(app: axum::Router, uri: &str, org: &str, email: &str) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some((org, email)), None).await
}

async fn put_as(
    app: axum::Router,
    uri: &str,
    org: &str,
    email: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "PUT", uri, Some((org, email)), Some(body)).await
}

// ---------------------------------------------------------------------------
// Contact and org context
// ---------------------------------------------------------------------------

#[tokio::test]
async fn contact_form_needs_no_org_context() {
    let fx = seed();
    let (status, body) = send(
        fx.app(),
        "POST",
        "/api/contact",
        None,
        Some(json!({
            "name": "Jo",
            "email": "jo@example.org",
            "message": "Please call me back."
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ok"], true);
    assert!(body["id"].is_string());
}

#[tokio::test]
async fn contact_form_rejects_missing_message() {
    let fx = seed();
    let (status, body) = send(
        fx.app(),
        "POST",
        "/api/contact",
        None,
        Some(json!({ "name": "Jo", "email": "jo@example.org", "message": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn missing_org_headers_is_bad_request() {
    let fx = seed();
    let (status, body) = send(fx.app(), "GET", "/api/facilities", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("organization"));
}

#[tokio::test]
async fn non_member_is_forbidden() {
    let fx = seed();
    let (status, _) = get_as(fx.app(), "/api/facilities", &fx.org_id, "stranger@example.org").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn get_org_reports_role_and_flags() {
    let fx = seed();
    let (status, body) = get_as(fx.app(), "/api/org", &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Sunrise Care");
    assert_eq!(body["role"], "manager");
    assert_eq!(body["feature_flags"]["drills"], true);
}

// ---------------------------------------------------------------------------
// Roles and feature flags
// ---------------------------------------------------------------------------

#[tokio::test]
async fn staff_cannot_create_facility_but_manager_can() {
    let fx = seed();
    let (status, _) = post_as(
        fx.app(),
        "/api/facilities",
        &fx.org_id,
        STAFF,
        json!({ "name": "Cedar Court" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post_as(
        fx.app(),
        "/api/facilities",
        &fx.org_id,
        MANAGER,
        json!({ "name": "Cedar Court" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Cedar Court");
    assert_eq!(body["org_id"], fx.org_id.as_str());
}

#[tokio::test]
async fn manager_cannot_grant_admin() {
    let fx = seed();
    let (status, _) = post_as(
        fx.app(),
        "/api/org/members",
        &fx.org_id,
        MANAGER,
        json!({ "email": "new@example.org", "role": "admin" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post_as(
        fx.app(),
        "/api/org/members",
        &fx.org_id,
        ADMIN,
        json!({ "email": "New@Example.org", "role": "manager" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "new@example.org");
}

#[tokio::test]
async fn disabled_module_is_forbidden_until_reenabled() {
    let fx = seed();
    let (status, body) = put_as(
        fx.app(),
        "/api/org/flags",
        &fx.org_id,
        ADMIN,
        json!({ "drills": false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feature_flags"]["drills"], false);

    let (status, _) = get_as(fx.app(), "/api/drills", &fx.org_id, ADMIN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = put_as(
        fx.app(),
        "/api/org/flags",
        &fx.org_id,
        ADMIN,
        json!({ "drills": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_as(fx.app(), "/api/drills", &fx.org_id, ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_flag_name_is_rejected() {
    let fx = seed();
    let (status, _) = put_as(
        fx.app(),
        "/api/org/flags",
        &fx.org_id,
        ADMIN,
        json!({ "teleportation": true }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_cannot_demote_or_remove_a_dev_member() {
    let fx = seed();
    {
        let conn = carecomp_core::db::open(fx.dir.path()).unwrap();
        Membership::upsert(&conn, &fx.org_id, "dev@example.org", Role::Dev).unwrap();
    }

    let (status, _) = post_as(
        fx.app(),
        "/api/org/members",
        &fx.org_id,
        ADMIN,
        json!({ "email": "dev@example.org", "role": "staff" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        fx.app(),
        "DELETE",
        "/api/org/members/dev@example.org",
        Some((fx.org_id.as_str(), ADMIN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, members) = get_as(fx.app(), "/api/org/members", &fx.org_id, ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    let dev = members
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["email"] == "dev@example.org")
        .unwrap();
    assert_eq!(dev["role"], "dev");

    // An admin may still remove a manager.
    let (status, _) = send(
        fx.app(),
        "DELETE",
        &format!("/api/org/members/{MANAGER}"),
        Some((fx.org_id.as_str(), ADMIN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn flags_stay_editable_with_admin_and_settings_off() {
    let fx = seed();
    let (status, body) = put_as(
        fx.app(),
        "/api/org/flags",
        &fx.org_id,
        ADMIN,
        json!({ "admin": false, "settings": false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feature_flags"]["admin"], false);
    assert_eq!(body["feature_flags"]["settings"], false);

    let (status, _) = get_as(fx.app(), "/api/org/members", &fx.org_id, ADMIN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = post_as(
        fx.app(),
        "/api/org/members",
        &fx.org_id,
        ADMIN,
        json!({ "email": "new@example.org", "role": "staff" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get_as(fx.app(), "/api/org/settings", &fx.org_id, ADMIN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = put_as(
        fx.app(),
        "/api/org/flags",
        &fx.org_id,
        ADMIN,
        json!({ "admin": true, "settings": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feature_flags"]["admin"], true);

    let (status, _) = get_as(fx.app(), "/api/org/members", &fx.org_id, ADMIN).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn settings_show_rules_and_rename_needs_admin() {
    let fx = seed();
    let (status, body) = get_as(fx.app(), "/api/org/settings", &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Sunrise Care");
    assert_eq!(body["due_soon_days"], 30);

    let (status, _) = put_as(
        fx.app(),
        "/api/org/settings",
        &fx.org_id,
        MANAGER,
        json!({ "name": "Sunrise West" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = put_as(
        fx.app(),
        "/api/org/settings",
        &fx.org_id,
        ADMIN,
        json!({ "name": "Sunrise West" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Sunrise West");

    let (_, org) = get_as(fx.app(), "/api/org", &fx.org_id, STAFF).await;
    assert_eq!(org["name"], "Sunrise West");
}

#[tokio::test]
async fn library_flag_gates_template_browsing() {
    let fx = seed();
    let (status, body) = get_as(fx.app(), "/api/competencies", &fx.org_id, STAFF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = put_as(
        fx.app(),
        "/api/org/flags",
        &fx.org_id,
        ADMIN,
        json!({ "library": false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_as(fx.app(), "/api/competencies", &fx.org_id, STAFF).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get_as(
        fx.app(),
        &format!("/api/competencies/{}", fx.competency_id),
        &fx.org_id,
        STAFF,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn records_of_another_org_are_not_found() {
    let fx = seed();
    let other_org = {
        let conn = carecomp_core::db::open(fx.dir.path()).unwrap();
        let org = Organization::create(&conn, "Elsewhere", FeatureFlags::default()).unwrap();
        Membership::upsert(&conn, &org.id, ADMIN, Role::Admin).unwrap();
        org.id
    };

    let uri = format!("/api/facilities/{}", fx.facility_id);
    let (status, _) = get_as(fx.app(), &uri, &other_org, ADMIN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get_as(fx.app(), &uri, &fx.org_id, ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Maple House");

    let (status, body) = get_as(fx.app(), "/api/staff", &other_org, ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bulk_assign_skips_staff_with_open_assignment() {
    let fx = seed();
    let body = json!({
        "staff_ids": [fx.staff_id, fx.other_staff_id],
        "competency_id": fx.competency_id,
        "due_date": "2030-01-15"
    });
    let (status, first) =
        post_as(fx.app(), "/api/assignments/bulk", &fx.org_id, MANAGER, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["created"].as_array().unwrap().len(), 2);

    let (status, second) =
        post_as(fx.app(), "/api/assignments/bulk", &fx.org_id, MANAGER, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(second["created"].as_array().unwrap().is_empty());
    assert_eq!(second["skipped"].as_array().unwrap().len(), 2);

    let (status, progress) =
        get_as(fx.app(), "/api/assignments/progress", &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["total"], 2);
    assert_eq!(progress["assigned"], 2);
}

#[tokio::test]
async fn malformed_due_date_is_rejected() {
    let fx = seed();
    let (status, _) = post_as(
        fx.app(),
        "/api/assignments",
        &fx.org_id,
        MANAGER,
        json!({
            "staff_id": fx.staff_id,
            "competency_id": fx.competency_id,
            "due_date": "next tuesday"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn staff_completes_own_assignment_only() {
    let fx = seed();
    let mut ids = Vec::new();
    for staff_id in [&fx.staff_id, &fx.other_staff_id] {
        let (status, body) = post_as(
            fx.app(),
            "/api/assignments",
            &fx.org_id,
            MANAGER,
            json!({ "staff_id": staff_id, "competency_id": fx.competency_id }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let (status, body) = put_as(
        fx.app(),
        &format!("/api/assignments/{}/status", ids[0]),
        &fx.org_id,
        STAFF,
        json!({ "status": "Completed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["completed_at"].is_string());

    let (status, _) = put_as(
        fx.app(),
        &format!("/api/assignments/{}/status", ids[1]),
        &fx.org_id,
        STAFF,
        json!({ "status": "completed" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, mine) = get_as(fx.app(), "/api/assignments/mine", &fx.org_id, STAFF).await;
    assert_eq!(status, StatusCode::OK);
    let competencies = mine["competencies"].as_array().unwrap();
    assert_eq!(competencies.len(), 1);
    assert_eq!(competencies[0]["due_status"], "completed");
    assert!(mine["tracks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn staff_cannot_list_all_assignments() {
    let fx = seed();
    let (status, _) = get_as(fx.app(), "/api/assignments", &fx.org_id, STAFF).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Deficiencies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plan_of_correction_lifecycle() {
    let fx = seed();
    let (status, def) = post_as(
        fx.app(),
        "/api/deficiencies",
        &fx.org_id,
        MANAGER,
        json!({
            "facility_id": fx.facility_id,
            "tag_code": "f880",
            "survey_date": "2025-09-01"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(def["tag_code"], "F880");
    let id = def["id"].as_str().unwrap().to_string();

    let poc_uri = format!("/api/deficiencies/{id}/poc");
    let (status, _) = get_as(fx.app(), &poc_uri, &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let plan = json!({
        "corrective_action": "Retrain all aides on glove changes",
        "target_date": "2025-10-01",
        "responsible_party": "DON"
    });
    let (status, _) = post_as(fx.app(), &poc_uri, &fx.org_id, MANAGER, plan.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post_as(fx.app(), &poc_uri, &fx.org_id, MANAGER, plan).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = put_as(
        fx.app(),
        &format!("{poc_uri}/status"),
        &fx.org_id,
        MANAGER,
        json!({ "status": "accepted" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, detail) = get_as(fx.app(), &format!("/api/deficiencies/{id}"), &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["deficiency"]["status"], "in_progress");
    assert_eq!(detail["plan_of_correction"]["status"], "accepted");
}

// ---------------------------------------------------------------------------
// Drills
// ---------------------------------------------------------------------------

#[tokio::test]
async fn drill_transitions_and_checkins() {
    let fx = seed();
    let (status, drill) = post_as(
        fx.app(),
        "/api/drills",
        &fx.org_id,
        MANAGER,
        json!({
            "facility_id": fx.facility_id,
            "drill_type": "Fire",
            "scheduled_for": "2030-03-01T09:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(drill["status"], "scheduled");
    let id = drill["id"].as_str().unwrap().to_string();

    let checkin_uri = format!("/api/drills/{id}/checkins");
    let (status, _) = post_as(
        fx.app(),
        &checkin_uri,
        &fx.org_id,
        STAFF,
        json!({ "name": "Sam Rivera" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post_empty_as(fx.app(), &format!("/api/drills/{id}/end"), &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, started) = post_empty_as(fx.app(), &format!("/api/drills/{id}/start"), &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "active");

    let (status, station) = post_as(
        fx.app(),
        &format!("/api/drills/{id}/stations"),
        &fx.org_id,
        MANAGER,
        json!({ "name": "East exit" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post_as(
        fx.app(),
        &checkin_uri,
        &fx.org_id,
        STAFF,
        json!({ "name": "Sam Rivera", "role": "CNA", "station_id": station["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post_empty_as(fx.app(), &format!("/api/drills/{id}/end"), &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::OK);

    let (status, detail) = get_as(fx.app(), &format!("/api/drills/{id}"), &fx.org_id, STAFF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "completed");
    assert_eq!(detail["stations"].as_array().unwrap().len(), 1);
    assert_eq!(detail["checkins"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn staff_completing_every_module_completes_the_track() {
    let fx = seed();
    let (status, track) = post_as(
        fx.app(),
        "/api/tracks",
        &fx.org_id,
        MANAGER,
        json!({ "title": "New hire orientation" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tid = track["id"].as_str().unwrap().to_string();

    let (_, section) = post_as(
        fx.app(),
        &format!("/api/tracks/{tid}/sections"),
        &fx.org_id,
        MANAGER,
        json!({ "title": "Week one" }),
    )
    .await;
    let sid = section["id"].as_str().unwrap().to_string();
    let mut modules = Vec::new();
    for title in ["Hand hygiene", "Fire safety"] {
        let (status, m) = post_as(
            fx.app(),
            &format!("/api/tracks/sections/{sid}/modules"),
            &fx.org_id,
            MANAGER,
            json!({ "title": title }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        modules.push(m["id"].as_str().unwrap().to_string());
    }

    let (status, _) = post_as(
        fx.app(),
        &format!("/api/tracks/{tid}/assign"),
        &fx.org_id,
        MANAGER,
        json!({ "staff_id": fx.staff_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post_as(
        fx.app(),
        &format!("/api/tracks/modules/{}/complete", modules[0]),
        &fx.org_id,
        STAFF,
        json!({ "staff_id": fx.other_staff_id }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for m in &modules {
        let (status, body) = post_empty_as(
            fx.app(),
            &format!("/api/tracks/modules/{m}/complete"),
            &fx.org_id,
            STAFF,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
    }

    let (status, progress) = get_as(
        fx.app(),
        &format!("/api/tracks/{tid}/progress"),
        &fx.org_id,
        STAFF,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["completed_modules"], 2);
    assert_eq!(progress["total_modules"], 2);

    let (status, rows) = get_as(
        fx.app(),
        &format!("/api/tracks/assignments?track_id={tid}"),
        &fx.org_id,
        STAFF,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows[0]["status"], "completed");
    assert_eq!(rows[0]["due_status"], "completed");
}

#[tokio::test]
async fn overdue_track_assignment_reaches_every_read_path() {
    let fx = seed();
    let (_, track) = post_as(
        fx.app(),
        "/api/tracks",
        &fx.org_id,
        MANAGER,
        json!({ "title": "Annual refresher" }),
    )
    .await;
    let tid = track["id"].as_str().unwrap().to_string();
    for staff_id in [&fx.staff_id, &fx.other_staff_id] {
        let (status, _) = post_as(
            fx.app(),
            &format!("/api/tracks/{tid}/assign"),
            &fx.org_id,
            MANAGER,
            json!({ "staff_id": staff_id, "due_date": "2000-01-01" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, rows) = get_as(fx.app(), "/api/tracks/assignments", &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["due_status"] == "overdue"));
    assert_eq!(rows[0]["track_title"], "Annual refresher");

    let (status, own) = get_as(fx.app(), "/api/tracks/assignments", &fx.org_id, STAFF).await;
    assert_eq!(status, StatusCode::OK);
    let own = own.as_array().unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0]["staff_id"], fx.staff_id.as_str());
    let (status, _) = get_as(
        fx.app(),
        &format!("/api/tracks/assignments?staff_id={}", fx.other_staff_id),
        &fx.org_id,
        STAFF,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, mine) = get_as(fx.app(), "/api/assignments/mine", &fx.org_id, STAFF).await;
    assert_eq!(mine["tracks"].as_array().unwrap().len(), 1);
    assert_eq!(mine["tracks"][0]["due_status"], "overdue");

    let (_, progress) = get_as(fx.app(), "/api/assignments/progress", &fx.org_id, MANAGER).await;
    assert_eq!(progress["total"], 2);
    assert_eq!(progress["overdue"], 2);

    let (_, dash) = get_as(fx.app(), "/api/dashboard", &fx.org_id, MANAGER).await;
    assert_eq!(dash["total"]["overdue"], 2);

    let (_, ov) = get_as(
        fx.app(),
        &format!("/api/manager/facility/{}/overview", fx.facility_id),
        &fx.org_id,
        MANAGER,
    )
    .await;
    assert_eq!(ov["overdue_tracks"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Dashboards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dashboard_counts_per_facility() {
    let fx = seed();
    let (status, _) = post_as(
        fx.app(),
        "/api/assignments",
        &fx.org_id,
        MANAGER,
        json!({
            "staff_id": fx.staff_id,
            "competency_id": fx.competency_id,
            "due_date": "2001-01-01"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, dash) = get_as(fx.app(), "/api/dashboard", &fx.org_id, STAFF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["total"]["total"], 1);
    assert_eq!(dash["total"]["overdue"], 1);
    assert_eq!(dash["facilities"][0]["facility_name"], "Maple House");

    let uri = format!("/api/manager/facility/{}/overview", fx.facility_id);
    let (status, _) = get_as(fx.app(), &uri, &fx.org_id, STAFF).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, ov) = get_as(fx.app(), &uri, &fx.org_id, MANAGER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ov["staff_count"], 2);
    assert_eq!(ov["overdue"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

#[tokio::test]
async fn serve_on_answers_over_a_bound_listener() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let fx = seed();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let root = fx.dir.path().to_path_buf();
    let server = tokio::spawn(carecomp_server::serve_on(root, listener));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/org HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 400"), "got: {response}");

    server.abort();
}
