mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;
use school_attendance::testing::PASSWORD;

#[tokio::test]
async fn login_returns_token_and_scope() -> Result<()> {
    let app = TestApp::new().await;
    let body = json!({ "email": "admin@north.test", "password": PASSWORD });
    let (status, res) = app.send(Method::POST, "/auth/login", None, Some(body)).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["success"], json!(true));
    assert_eq!(res["data"]["role"], json!("school_admin"));
    assert_eq!(res["data"]["school_id"], json!(app.fx.north.id));

    let token = res["data"]["token"].as_str().expect("token");
    let (status, me) = app.send(Method::GET, "/auth/me", Some(token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], json!("admin@north.test"));
    assert!(me["data"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let app = TestApp::new().await;
    let body = json!({ "email": "admin@north.test", "password": "nope" });
    let (status, res) = app.send(Method::POST, "/auth/login", None, Some(body)).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(res["error"], json!(true));
    assert_eq!(res["code"], json!("UNAUTHORIZED"));
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() -> Result<()> {
    let app = TestApp::new().await;
    let (status, res) = app.send(Method::GET, "/students", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(res["code"], json!("UNAUTHORIZED"));

    let (status, _) = app.send(Method::GET, "/students", Some("garbage.token.value"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn public_routes_are_open() -> Result<()> {
    let app = TestApp::new().await;
    let (status, res) = app.send(Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(res["data"]["name"].is_string());

    let (status, res) = app.send(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["data"]["database"], json!("memory"));
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_reported_in_the_envelope() -> Result<()> {
    let app = TestApp::new().await;
    let (status, res) = app
        .send(Method::POST, "/auth/login", None, Some(json!({ "email": 42 })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["code"], json!("INVALID_JSON"));
    Ok(())
}

#[tokio::test]
async fn registration_follows_role_rules() -> Result<()> {
    let app = TestApp::new().await;
    let teacher = json!({
        "email": "new.teacher@north.test",
        "password": "pw",
        "role": "teacher",
        "name": "New Teacher",
        "school_id": app.fx.north.id,
    });
    let (status, res) = app.post("/auth/register", &app.fx.school_admin, teacher.clone()).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(res["data"]["role"], json!("teacher"));

    let (status, _) = app.post("/auth/register", &app.fx.school_admin, teacher).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let foreign = json!({
        "email": "x@south.test",
        "password": "pw",
        "role": "parent",
        "name": "Foreign Parent",
        "school_id": app.fx.south.id,
    });
    let (status, _) = app.post("/auth/register", &app.fx.school_admin, foreign.clone()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post("/auth/register", &app.fx.teacher, foreign).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
