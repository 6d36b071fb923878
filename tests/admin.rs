mod common;

use axum::http::{header, StatusCode};
use common::*;
use imposter::model::{self, database};

#[tokio::test]
async fn pages_need_a_login() {
    let site = site().await;

    let response = get(&site.admin, "/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = get(&site.admin, "/post/1/edit", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = get(&site.admin, "/login", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn builtin_stylesheet_without_a_theme() {
    let site = site().await;

    let response = get(&site.admin, "/static/admin.css", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/css; charset=utf-8"
    );
    assert!(body(response).await.contains(".flash"));

    let response = get(&site.admin, "/static/missing.css", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(response).await, "<h1>Not found</h1>");
}

#[tokio::test]
async fn wrong_password_is_an_unknown_user() {
    let site = site().await;

    let response = post_form(
        &site.admin,
        "/login",
        None,
        &[("username", "admin"), ("password", "wrong")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(response).await.contains("Unknown user"));
}

#[tokio::test]
async fn login_lists_own_posts() {
    let site = site().await;
    let cookie = login(&site.admin, "admin", "secret").await;

    let response = get(&site.admin, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body(response).await;
    assert!(html.contains("You were logged in"), "{}", html);
    assert!(html.contains("Welcome to Imposter!"));
    assert!(html.contains("/post/1/edit"));

    // flashes are shown once
    let html = body(get(&site.admin, "/posts/1", Some(&cookie)).await).await;
    assert!(!html.contains("You were logged in"));

    let response = get(&site.admin, "/posts/9", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&site.admin, "/posts/first", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let site = site().await;
    let cookie = login(&site.admin, "admin", "secret").await;

    let response = get(&site.admin, "/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = get(&site.admin, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn entries_of_other_users_are_not_found() {
    let site = site().await;
    {
        let mut conn = site.pool.acquire().await.unwrap();
        let password = model::hashify(SECRET, "other");
        database::insert_user(&mut conn, "other", &password)
            .await
            .unwrap();
    }
    let cookie = login(&site.admin, "other", "other").await;

    let response = get(&site.admin, "/post/1/edit", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_form(
        &site.admin,
        "/post/1/save",
        Some(&cookie),
        &[
            ("title", "Taken over"),
            ("content", "text"),
            ("format", MARKDOWN),
            ("status", PUBLIC),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let html = body(get(&site.admin, "/", Some(&cookie)).await).await;
    assert!(!html.contains("Welcome to Imposter!"));
}

#[tokio::test]
async fn invalid_form_is_shown_again_without_saving() {
    let site = site().await;
    let cookie = login(&site.admin, "admin", "secret").await;

    let response = post_form(
        &site.admin,
        "/post/new/save",
        Some(&cookie),
        &[
            ("title", "Half done"),
            ("content", ""),
            ("pubdate", "tomorrow"),
            ("format", MARKDOWN),
            ("status", "42"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body(response).await;
    assert!(html.contains("This field is required."), "{}", html);
    assert!(html.contains("YYYY-MM-DD HH:MM"));
    assert!(html.contains("value=\"Half done\""));

    let mut conn = site.pool.acquire().await.unwrap();
    let count = database::count_owned(&mut conn, database::EntryKind::Post, 1)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn saving_sets_slug_once_and_pubdate_on_publish() {
    let site = site().await;
    let cookie = login(&site.admin, "admin", "secret").await;

    let id = new_post(
        &site.admin,
        &cookie,
        &[
            ("title", "Crème Brûlée, again!"),
            ("content", "*tasty*"),
            ("format", MARKDOWN),
            ("status", DRAFT),
        ],
    )
    .await;

    let mut conn = site.pool.acquire().await.unwrap();
    let post = database::owned_post(&mut conn, 1, id).await.unwrap().unwrap();
    assert_eq!(post.slug, "creme-brulee-again");
    assert_eq!(post.pubdate, None);
    assert_eq!(post.content_html.as_deref(), Some("<p><em>tasty</em></p>\n"));
    drop(conn);

    let response = post_form(
        &site.admin,
        &format!("/post/{}/save", id),
        Some(&cookie),
        &[
            ("title", "A new title"),
            ("content", "*tasty*"),
            ("format", MARKDOWN),
            ("status", PUBLIC),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/post/{}/edit", id));

    let mut conn = site.pool.acquire().await.unwrap();
    let post = database::owned_post(&mut conn, 1, id).await.unwrap().unwrap();
    assert_eq!(post.title, "A new title");
    assert_eq!(post.slug, "creme-brulee-again");
    assert!(post.pubdate.is_some());
    assert!(post.pubdate.unwrap() <= model::now());
}

#[tokio::test]
async fn rest_posts_from_a_browser_are_saved() {
    let site = site().await;
    let cookie = login(&site.admin, "admin", "secret").await;

    let id = new_post(
        &site.admin,
        &cookie,
        &[
            ("title", "Written in reST"),
            ("summary", "Short *summary*.\r\n\r\n"),
            ("content", "Heading\r\n=======\r\n\r\nBody text.\r\n\r\n"),
            ("format", REST),
            ("status", DRAFT),
        ],
    )
    .await;

    let mut conn = site.pool.acquire().await.unwrap();
    let post = database::owned_post(&mut conn, 1, id).await.unwrap().unwrap();
    let content_html = post.content_html.unwrap();
    assert!(content_html.contains("<p>Body text.</p>"), "{}", content_html);
    assert!(!content_html.contains('\r'));
    assert!(post.summary_html.unwrap().contains("<em>summary</em>"));
}

#[tokio::test]
async fn duplicate_slug_is_a_title_error() {
    let site = site().await;
    let cookie = login(&site.admin, "admin", "secret").await;

    let response = post_form(
        &site.admin,
        "/post/new/save",
        Some(&cookie),
        &[
            ("title", "Welcome to imposter"),
            ("content", "again"),
            ("format", MARKDOWN),
            ("status", DRAFT),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(response).await.contains("already uses this title"));
}

#[tokio::test]
async fn pages_are_edited_like_posts() {
    let site = site().await;
    let cookie = login(&site.admin, "admin", "secret").await;

    let response = post_form(
        &site.admin,
        "/page/new/save",
        Some(&cookie),
        &[
            ("title", "About me"),
            ("content", "Hi there"),
            ("format", MARKDOWN),
            ("status", PUBLIC),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let id = edited_id(&location(&response));

    let response = get(&site.admin, &format!("/page/{}/edit", id), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body(response).await;
    assert!(html.contains("New page was successfully added"), "{}", html);
    assert!(html.contains("value=\"About me\""));

    let html = body(get(&site.admin, "/pages/1", Some(&cookie)).await).await;
    assert!(html.contains("About me"));

    let html = body(get(&site.frontend, "/page/about-me", None).await).await;
    assert!(html.contains("<p>Hi there</p>"), "{}", html);
}

#[tokio::test]
async fn recalculate_fixes_stale_counts() {
    let site = site().await;
    let cookie = login(&site.admin, "admin", "secret").await;

    sqlx::query("UPDATE tags SET count = 42")
        .execute(&site.pool)
        .await
        .unwrap();

    let response = post_form(&site.admin, "/tags/recalculate", Some(&cookie), &[]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let mut conn = site.pool.acquire().await.unwrap();
    let tags = database::tags(&mut conn).await.unwrap();
    assert!(tags.iter().all(|tag| tag.count == 1));
}
