use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, Response, StatusCode,
    },
    Router,
};
use identity_backend_lib::router::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::test_utils::{seed_identity, setup_test_env};

const BOUNDARY: &str = "identity-test-boundary";

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<String>, Value) {
    let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, cookies, json)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_cookie(method: Method, uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(COOKIE, format!("{name}={value}"))
        .body(Body::empty())
        .unwrap()
}

/// Value of a named cookie among `Set-Cookie` headers
fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies.iter().find_map(|header| {
        header
            .strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    })
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Body {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    for (name, file_name) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\nfake image bytes\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Body::from(body)
}

fn multipart_request(method: Method, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn test_login_sets_cookies_and_current_user_reads_them() {
    let env = setup_test_env().await;
    seed_identity(&env, "alice", "correct").await;
    let app = create_router(env.state.clone());

    let (status, set_cookies, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            json!({"username": "alice", "password": "correct"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"].get("passwordVerifier").is_none());

    let access = cookie_value(&set_cookies, "accessToken").unwrap();
    assert_eq!(body["data"]["accessToken"], access.as_str());
    assert!(set_cookies.iter().all(|c| c.contains("HttpOnly") && c.contains("Path=/")));

    let (status, _, body) = send(
        &app,
        with_cookie(Method::GET, "/api/v1/users/current-user", "accessToken", &access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    let bearer = Request::builder()
        .uri("/api/v1/users/current-user")
        .header(AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, bearer).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unauthenticated_requests_are_rejected() {
    let env = setup_test_env().await;
    let app = create_router(env.state.clone());

    let anonymous = Request::builder()
        .uri("/api/v1/users/current-user")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_001");

    let (status, _, wrong_login) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            json!({"username": "nobody", "password": "whatever"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_login, body);
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let env = setup_test_env().await;
    seed_identity(&env, "alice", "correct").await;
    let app = create_router(env.state.clone());

    let (_, set_cookies, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            json!({"username": "alice", "password": "correct"}),
        ),
    )
    .await;
    let refresh = cookie_value(&set_cookies, "refreshToken").unwrap();

    let (status, set_cookies, body) = send(
        &app,
        with_cookie(Method::POST, "/api/v1/users/refresh-token", "refreshToken", &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = cookie_value(&set_cookies, "refreshToken").unwrap();
    assert_ne!(rotated, refresh);
    assert_eq!(body["data"]["refreshToken"], rotated.as_str());

    let (status, _, _) = send(
        &app,
        with_cookie(Method::POST, "/api/v1/users/refresh-token", "refreshToken", &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Non-browser clients send the token in the body
    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/refresh-token",
            json!({"refreshToken": rotated}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["accessToken"].is_string());

    let empty = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/refresh-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, empty).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookies_and_blocks_refresh() {
    let env = setup_test_env().await;
    seed_identity(&env, "alice", "correct").await;
    let app = create_router(env.state.clone());

    let (_, set_cookies, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            json!({"username": "alice", "password": "correct"}),
        ),
    )
    .await;
    let access = cookie_value(&set_cookies, "accessToken").unwrap();
    let refresh = cookie_value(&set_cookies, "refreshToken").unwrap();

    let (status, set_cookies, _) = send(
        &app,
        with_cookie(Method::POST, "/api/v1/users/logout", "accessToken", &access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cookie_value(&set_cookies, "accessToken").as_deref(), Some(""));
    assert_eq!(cookie_value(&set_cookies, "refreshToken").as_deref(), Some(""));

    let (status, _, _) = send(
        &app,
        with_cookie(Method::POST, "/api/v1/users/refresh-token", "refreshToken", &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_over_multipart() {
    let env = setup_test_env().await;
    let app = create_router(env.state.clone());

    let body = multipart_body(
        &[
            ("fullName", "Dave Example"),
            ("email", "dave@example.com"),
            ("username", "Dave"),
            ("password", "Str0ng-Passw0rd"),
        ],
        &[("avatar", "me.png")],
    );
    let (status, _, body) = send(
        &app,
        multipart_request(Method::POST, "/api/v1/users/register", body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["statusCode"], 201);
    assert_eq!(body["data"]["username"], "dave");
    assert!(body["data"]["avatar"].as_str().unwrap().starts_with("/media/"));
    assert_eq!(body["data"]["coverImage"], "");

    let missing_avatar = multipart_body(
        &[
            ("fullName", "Erin Example"),
            ("email", "erin@example.com"),
            ("username", "erin"),
            ("password", "Str0ng-Passw0rd"),
        ],
        &[],
    );
    let (status, _, _) = send(
        &app,
        multipart_request(Method::POST, "/api/v1/users/register", missing_avatar),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_account_and_avatar() {
    let env = setup_test_env().await;
    seed_identity(&env, "alice", "correct").await;
    let app = create_router(env.state.clone());

    let (_, set_cookies, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            json!({"username": "alice", "password": "correct"}),
        ),
    )
    .await;
    let access = cookie_value(&set_cookies, "accessToken").unwrap();

    let update = Request::builder()
        .method(Method::PATCH)
        .uri("/api/v1/users/update-account")
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, format!("accessToken={access}"))
        .body(Body::from(
            json!({"fullName": "Alice Liddell", "email": "liddell@example.com"}).to_string(),
        ))
        .unwrap();
    let (status, _, body) = send(&app, update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fullName"], "Alice Liddell");
    assert_eq!(body["data"]["email"], "liddell@example.com");

    let mut avatar = multipart_request(
        Method::PATCH,
        "/api/v1/users/avatar",
        multipart_body(&[], &[("avatar", "new.png")]),
    );
    avatar
        .headers_mut()
        .insert(COOKIE, format!("accessToken={access}").parse().unwrap());
    let (status, _, body) = send(&app, avatar).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["avatar"], "/media/alice.png");
}

#[tokio::test]
async fn test_change_password_ends_session() {
    let env = setup_test_env().await;
    seed_identity(&env, "alice", "correct").await;
    let app = create_router(env.state.clone());

    let (_, set_cookies, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            json!({"username": "alice", "password": "correct"}),
        ),
    )
    .await;
    let access = cookie_value(&set_cookies, "accessToken").unwrap();
    let refresh = cookie_value(&set_cookies, "refreshToken").unwrap();

    let change = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/change-password")
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::from(
            json!({"oldPassword": "correct", "newPassword": "N3w-Passw0rd!"}).to_string(),
        ))
        .unwrap();
    let (status, _, _) = send(&app, change).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &app,
        with_cookie(Method::POST, "/api/v1/users/refresh-token", "refreshToken", &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_blank_cookies_fall_back_to_other_sources() {
    let env = setup_test_env().await;
    seed_identity(&env, "alice", "correct").await;
    let app = create_router(env.state.clone());

    let (_, set_cookies, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            json!({"username": "alice", "password": "correct"}),
        ),
    )
    .await;
    let access = cookie_value(&set_cookies, "accessToken").unwrap();
    let refresh = cookie_value(&set_cookies, "refreshToken").unwrap();

    // A jar that kept the cleared cookie still reaches the Bearer header
    let current = Request::builder()
        .uri("/api/v1/users/current-user")
        .header(COOKIE, "accessToken=")
        .header(AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, current).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    let mut rotate = json_request(
        Method::POST,
        "/api/v1/users/refresh-token",
        json!({"refreshToken": refresh}),
    );
    rotate
        .headers_mut()
        .insert(COOKIE, "refreshToken=".parse().unwrap());
    let (status, set_cookies, _) = send(&app, rotate).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(cookie_value(&set_cookies, "refreshToken").unwrap(), refresh);
}
