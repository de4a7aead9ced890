mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn follow_is_idempotent() {
    let app = TestApp::new().await;
    let _author = app.create_user("author").await;
    let reader = app.create_user("reader").await;

    for _ in 0..2 {
        let response = app.get("/profile/author/follow/", Some(&reader)).await;
        assert!(response.is_redirect_to("/profile/author/"));
    }
    assert_eq!(app.count("SELECT COUNT(*) FROM follows").await, 1);

    let profile = app.get("/profile/author/", Some(&reader)).await;
    assert!(profile.body.contains("Followers: 1"));
    assert!(profile.body.contains("/profile/author/unfollow/"));
}

#[tokio::test]
async fn unfollow_without_follow_is_noop() {
    let app = TestApp::new().await;
    let _author = app.create_user("author").await;
    let reader = app.create_user("reader").await;

    let response = app.post_form("/profile/author/unfollow/", Some(&reader), &[]).await;
    assert!(response.is_redirect_to("/profile/author/"));
    assert_eq!(app.count("SELECT COUNT(*) FROM follows").await, 0);

    app.get("/profile/author/follow/", Some(&reader)).await;
    app.get("/profile/author/unfollow/", Some(&reader)).await;
    assert_eq!(app.count("SELECT COUNT(*) FROM follows").await, 0);
}

#[tokio::test]
async fn self_follow_is_ignored() {
    let app = TestApp::new().await;
    let author = app.create_user("author").await;

    let response = app.get("/profile/author/follow/", Some(&author)).await;
    assert!(response.is_redirect_to("/profile/author/"));
    assert_eq!(app.count("SELECT COUNT(*) FROM follows").await, 0);
}

#[tokio::test]
async fn follow_unknown_author_is_404() {
    let app = TestApp::new().await;
    let reader = app.create_user("reader").await;
    let response = app.get("/profile/nobody/follow/", Some(&reader)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_shows_only_followed_authors() {
    let app = TestApp::new().await;
    let author = app.create_user("author").await;
    let stranger = app.create_user("stranger").await;
    let reader = app.create_user("reader").await;
    app.create_post(&author, "followed author post", None).await;
    app.create_post(&stranger, "stranger post", None).await;

    app.get("/profile/author/follow/", Some(&reader)).await;

    let feed = app.get("/follow/", Some(&reader)).await;
    assert_eq!(feed.status, StatusCode::OK);
    assert!(feed.body.contains("followed author post"));
    assert!(!feed.body.contains("stranger post"));

    let stranger_feed = app.get("/follow/", Some(&stranger)).await;
    assert_eq!(stranger_feed.post_cards(), 0);

    let anonymous = app.get("/follow/", None).await;
    assert!(anonymous.is_redirect_to("/auth/login/?next=%2Ffollow%2F"));
}
