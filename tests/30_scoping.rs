//! No caller ever sees or touches a record outside its schools.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{items, TestApp};

fn ids(body: &Value) -> Vec<String> {
    items(body)
        .iter()
        .filter_map(|v| v["id"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn student_lists_stay_inside_scope() -> Result<()> {
    let app = TestApp::new().await;
    let fx = &app.fx;

    let (_, res) = app.get("/students", &fx.metro_teacher).await?;
    assert_eq!(ids(&res), vec![fx.carol.id.to_string()]);

    let (_, res) = app.get("/students", &fx.district_admin).await?;
    let seen = ids(&res);
    assert_eq!(seen.len(), 2);
    assert!(!seen.contains(&fx.carol.id.to_string()));

    let (_, res) = app.get("/students", &fx.main_admin).await?;
    assert_eq!(items(&res).len(), 3);

    let (status, _) = app.get("/students", &fx.parent).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn school_override_outside_scope_is_denied() -> Result<()> {
    let app = TestApp::new().await;
    let fx = &app.fx;
    for uri in [
        format!("/students?school_id={}", fx.metro.id),
        format!("/users?school_id={}", fx.metro.id),
        format!("/events?school_id={}", fx.metro.id),
        format!("/attendance?school_id={}", fx.metro.id),
    ] {
        let (status, _) = app.get(&uri, &fx.school_admin).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    let (status, res) = app.get(&format!("/students?school_id={}", fx.south.id), &fx.district_admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&res), vec![fx.bob.id.to_string()]);
    Ok(())
}

#[tokio::test]
async fn single_records_outside_scope_are_denied() -> Result<()> {
    let app = TestApp::new().await;
    let fx = &app.fx;

    let (status, _) = app.get(&format!("/students/{}", fx.alice.id), &fx.metro_teacher).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get(&format!("/events/{}", fx.lesson.id), &fx.metro_teacher).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get(&format!("/students/qr/{}", fx.carol.qr_code), &fx.teacher).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let change = json!({ "name": "Hijacked" });
    let (status, _) = app.put(&format!("/users/{}", fx.metro_teacher.id), &fx.district_admin, Some(change)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&format!("/students/{}", fx.carol.id), &fx.school_admin).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn parents_and_students_see_only_their_own() -> Result<()> {
    let app = TestApp::new().await;
    let fx = &app.fx;

    let (status, res) = app.get("/my-children", &fx.parent).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&res), vec![fx.alice.id.to_string()]);

    let (status, _) = app.get(&format!("/students/{}", fx.bob.id), &fx.parent).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get(&format!("/attendance/student/{}", fx.bob.id), &fx.parent).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, res) = app.get("/my-student", &fx.student_user).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["data"]["id"], json!(fx.alice.id));
    let (status, _) = app.get("/attendance", &fx.student_user).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn district_admin_cannot_reach_other_administrators() -> Result<()> {
    let app = TestApp::new().await;
    let fx = &app.fx;

    let (status, _) = app.get("/users?role=district_admin", &fx.district_admin).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&format!("/users/{}", fx.main_admin.id), &fx.district_admin).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, res) = app.get("/users", &fx.district_admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(items(&res)
        .iter()
        .all(|u| u["role"] != json!("main_admin") && u["role"] != json!("district_admin")));
    Ok(())
}

#[tokio::test]
async fn analytics_are_scoped() -> Result<()> {
    let app = TestApp::new().await;
    let (status, res) = app.get("/analytics", &app.fx.district_admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["data"]["totalSchools"], json!(2));
    assert_eq!(res["data"]["totalStudents"], json!(2));
    assert!(res["data"]["usersByRole"].get("mainAdmins").is_none());

    let (status, _) = app.get("/analytics", &app.fx.teacher).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
