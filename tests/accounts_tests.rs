mod common;

use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use common::{TestApp, PASSWORD, SMALL_GIF};

#[tokio::test]
async fn signup_then_login() {
    let app = TestApp::new().await;

    let signup = app
        .post_form(
            "/auth/signup/",
            None,
            &[("username", "newbie"), ("password1", PASSWORD), ("password2", PASSWORD)],
        )
        .await;
    assert!(signup.is_redirect_to("/auth/login/"));
    assert_eq!(app.count("SELECT COUNT(*) FROM profiles").await, 1);

    let login = app
        .post_form(
            "/auth/login/",
            None,
            &[("username", "newbie"), ("password", PASSWORD), ("next", "/create/")],
        )
        .await;
    assert!(login.is_redirect_to("/create/"));
    let cookie = login.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn signup_errors_are_shown() {
    let app = TestApp::new().await;
    app.create_user("taken").await;

    let duplicate = app
        .post_form(
            "/auth/signup/",
            None,
            &[("username", "taken"), ("password1", PASSWORD), ("password2", PASSWORD)],
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::OK);
    assert!(duplicate.body.contains("A user with that username already exists."));

    let mismatch = app
        .post_form(
            "/auth/signup/",
            None,
            &[("username", "fresh"), ("password1", PASSWORD), ("password2", "different-pass")],
        )
        .await;
    assert_eq!(mismatch.status, StatusCode::OK);
    assert_eq!(app.count("SELECT COUNT(*) FROM users").await, 1);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = TestApp::new().await;
    app.create_user("auth").await;

    let response = app
        .post_form("/auth/login/", None, &[("username", "auth"), ("password", "wrong-password")])
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Please enter a correct username and password."));
    assert!(response.headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn login_ignores_external_next() {
    let app = TestApp::new().await;
    app.create_user("auth").await;

    let response = app
        .post_form(
            "/auth/login/",
            None,
            &[("username", "auth"), ("password", PASSWORD), ("next", "https://evil.example/")],
        )
        .await;
    assert!(response.is_redirect_to("/"));
}

#[tokio::test]
async fn logout_clears_cookie() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;

    let response = app.get("/auth/logout/", Some(&auth)).await;
    assert_eq!(response.status, StatusCode::OK);
    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn bearer_token_authenticates() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;

    let request = Request::builder()
        .uri("/follow/")
        .header(header::HOST, "testserver")
        .header(header::AUTHORIZATION, format!("Bearer {}", auth.token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK);

    app.state.user_service.delete_user(auth.user.id).await.unwrap();
    let stale = app.get("/follow/", Some(&auth)).await;
    assert!(stale.status.is_redirection());
}

#[tokio::test]
async fn profile_edit_is_self_only() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;
    let other = app.create_user("other").await;

    let foreign = app.get("/profile/auth/edit/", Some(&other)).await;
    assert!(foreign.is_redirect_to("/profile/auth/"));

    let own = app.get("/profile/auth/edit/", Some(&auth)).await;
    assert_eq!(own.status, StatusCode::OK);

    let saved = app
        .post_multipart("/profile/auth/edit/", Some(&auth), &[("bio", "Rust enthusiast")], None)
        .await;
    assert!(saved.is_redirect_to("/profile/auth/"));

    let profile = app.get("/profile/auth/", None).await;
    assert!(profile.body.contains("Rust enthusiast"));

    let too_long = "x".repeat(501);
    let rejected = app
        .post_form("/profile/auth/edit/", Some(&auth), &[("bio", too_long.as_str())])
        .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert!(rejected.body.contains("at most 500 characters"));
}

#[tokio::test]
async fn deleting_user_cascades() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;
    let reader = app.create_user("reader").await;
    let group = app.create_group(&auth, "test-slug").await;
    let post = app.create_post(&reader, "in group", Some(&group)).await;
    app.create_post(&auth, "by auth", None).await;
    app.get("/profile/auth/follow/", Some(&reader)).await;
    app.post_form(&format!("/posts/{}/comment/", post.id), Some(&auth), &[("text", "hi")]).await;

    assert!(app.state.user_service.delete_user(auth.user.id).await.unwrap());

    assert_eq!(app.count("SELECT COUNT(*) FROM profiles").await, 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM posts").await, 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM comments").await, 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM follows").await, 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM post_groups").await, 0);
    let survivor = app.state.post_service.get_post(post.id).await.unwrap();
    assert_eq!(survivor.group_id, None);
}

#[tokio::test]
async fn cross_origin_post_fails_csrf() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/create/")
        .header(header::HOST, "testserver")
        .header(header::ORIGIN, "http://evil.example")
        .header(header::COOKIE, format!("token={}", auth.token))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("text=forged"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body.contains("CSRF"));
    assert_eq!(app.count("SELECT COUNT(*) FROM posts").await, 0);
}

#[tokio::test]
async fn static_pages_and_headers() {
    let app = TestApp::new().await;
    for path in ["/about/author/", "/about/tech/", "/about/project/", "/auth/signup/", "/auth/login/"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status, StatusCode::OK, "{}", path);
        assert_eq!(response.headers["x-content-type-options"], "nosniff");
        assert_eq!(response.headers["x-frame-options"], "DENY");
    }
}

#[tokio::test]
async fn profile_photo_upload() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;

    let saved = app
        .post_multipart(
            "/profile/auth/edit/",
            Some(&auth),
            &[("bio", "")],
            Some(("photo", "me.gif", SMALL_GIF)),
        )
        .await;
    assert!(saved.is_redirect_to("/profile/auth/"));

    let first = app.state.user_service.get_profile(auth.user.id).await.unwrap().photo;
    assert!(first.starts_with("profile/"));
    assert!(app.media.path().join(&first).exists());
    let page = app.get("/profile/auth/", None).await;
    assert!(page.body.contains(&format!("/media/{}", first)));

    app.post_multipart(
        "/profile/auth/edit/",
        Some(&auth),
        &[("bio", "")],
        Some(("photo", "again.gif", SMALL_GIF)),
    )
    .await;
    let second = app.state.user_service.get_profile(auth.user.id).await.unwrap().photo;
    assert_ne!(second, first);
    assert!(!app.media.path().join(&first).exists());
}

#[tokio::test]
async fn invalid_photo_is_rejected() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;

    let response = app
        .post_multipart(
            "/profile/auth/edit/",
            Some(&auth),
            &[("bio", "kept in form")],
            Some(("photo", "me.gif", b"not an image at all")),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Upload a valid image."));
    assert!(response.body.contains("kept in form"));

    let profile = app.state.user_service.get_profile(auth.user.id).await.unwrap();
    assert_eq!(profile.photo, "profile/default.png");
    assert_eq!(profile.bio, "");
}

