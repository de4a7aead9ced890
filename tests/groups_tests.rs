mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn create_group_redirects_to_listing() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;

    let response = app
        .post_form(
            "/group_create/",
            Some(&auth),
            &[("title", "Rustaceans"), ("slug", "rust"), ("description", "All about Rust")],
        )
        .await;
    assert!(response.is_redirect_to("/group/rust/"));

    let listing = app.get("/group/rust/", Some(&auth)).await;
    assert_eq!(listing.status, StatusCode::OK);
    assert!(listing.body.contains("Rustaceans"));
    assert!(listing.body.contains("/group/rust/edit/"));
}

#[tokio::test]
async fn invalid_group_forms_are_rerendered() {
    let app = TestApp::new().await;
    let auth = app.create_user("auth").await;
    app.create_group(&auth, "test-slug").await;

    let duplicate = app
        .post_form(
            "/group_create/",
            Some(&auth),
            &[("title", "Another"), ("slug", "test-slug"), ("description", "desc")],
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::OK);
    assert!(duplicate.body.contains("Group with this Slug already exists."));

    let bad_slug = app
        .post_form(
            "/group_create/",
            Some(&auth),
            &[("title", "Another"), ("slug", "not a slug"), ("description", "desc")],
        )
        .await;
    assert_eq!(bad_slug.status, StatusCode::OK);
    assert_eq!(app.count("SELECT COUNT(*) FROM post_groups").await, 1);
}

#[tokio::test]
async fn only_creator_can_edit_group() {
    let app = TestApp::new().await;
    let creator = app.create_user("creator").await;
    let other = app.create_user("other").await;
    app.create_group(&creator, "test-slug").await;

    let form = app.get("/group/test-slug/edit/", Some(&other)).await;
    assert!(form.is_redirect_to("/group/test-slug/"));

    let attempt = app
        .post_form(
            "/group/test-slug/edit/",
            Some(&other),
            &[("title", "Hijacked"), ("slug", "test-slug"), ("description", "x")],
        )
        .await;
    assert!(attempt.is_redirect_to("/group/test-slug/"));
    let group = app.state.group_service.get_by_slug("test-slug").await.unwrap();
    assert_eq!(group.title, "Тестовая группа");

    let saved = app
        .post_form(
            "/group/test-slug/edit/",
            Some(&creator),
            &[("title", "Renamed"), ("slug", "renamed"), ("description", "new")],
        )
        .await;
    assert!(saved.is_redirect_to("/group/renamed/"));
    assert_eq!(app.get("/group/test-slug/", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_group_keeps_its_posts() {
    let app = TestApp::new().await;
    let creator = app.create_user("creator").await;
    let other = app.create_user("other").await;
    let group = app.create_group(&creator, "test-slug").await;
    let post = app.create_post(&other, "survivor", Some(&group)).await;

    let attempt = app.get("/group/test-slug/delete/", Some(&other)).await;
    assert!(attempt.is_redirect_to("/"));
    assert_eq!(app.count("SELECT COUNT(*) FROM post_groups").await, 1);

    let done = app.post_form("/group/test-slug/delete/", Some(&creator), &[]).await;
    assert!(done.is_redirect_to("/"));
    assert_eq!(app.count("SELECT COUNT(*) FROM post_groups").await, 0);

    let survivor = app.state.post_service.get_post(post.id).await.unwrap();
    assert_eq!(survivor.group_id, None);
}
