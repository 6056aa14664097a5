#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use school_attendance::auth::{generate_jwt, Claims};
use school_attendance::database::models::User;
use school_attendance::testing::Fixture;
use school_attendance::{router, AppState};

/// Router over a freshly seeded in-memory store, driven in-process.
pub struct TestApp {
    pub fx: Fixture,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let fx = Fixture::seeded().await;
        let router = router(AppState::new(fx.shared_store()));
        Self { fx, router }
    }

    pub fn token(user: &User) -> String {
        generate_jwt(&Claims::for_user(user)).expect("token")
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body from {}", uri))?
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, as_user: &User) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, uri, Some(&Self::token(as_user)), None).await
    }

    pub async fn post(&self, uri: &str, as_user: &User, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, uri, Some(&Self::token(as_user)), Some(body)).await
    }

    pub async fn put(&self, uri: &str, as_user: &User, body: Option<Value>) -> Result<(StatusCode, Value)> {
        self.send(Method::PUT, uri, Some(&Self::token(as_user)), body).await
    }

    pub async fn delete(&self, uri: &str, as_user: &User) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, uri, Some(&Self::token(as_user)), None).await
    }
}

/// `data` array of a success envelope.
pub fn items(body: &Value) -> &Vec<Value> {
    body["data"].as_array().expect("data array")
}

pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// The real server binary on a free port, killed on drop.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_school-attendance"))
            .env("PORT", port.to_string())
            .env("HOST", "127.0.0.1")
            .env("APP_ENV", "development")
            .env_remove("ATTENDANCE_API_PORT")
            .env_remove("DATABASE_URL")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
