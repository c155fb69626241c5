//! End-to-end flows against a real PostgreSQL (`TEST_DATABASE_URL` or `DATABASE_URL`)

mod common;

use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{test, App};
use community_service::db::{comment_repo, room_repo, user_repo};
use community_service::routes;
use community_service::websocket::session::store_and_broadcast;
use serde_json::{json, Value};
use serial_test::serial;

const PASSWORD: &str = "Quiet-Harbor-42";

macro_rules! app {
    ($state:expr) => {{
        let state = $state;
        test::init_service(
            App::new()
                .configure(|cfg| state.register(cfg))
                .configure(routes::configure),
        )
        .await
    }};
}

/// Sign up `$username` and return the session cookie
macro_rules! signup {
    ($app:expr, $username:expr) => {{
        let username: &str = $username;
        let req = test::TestRequest::post()
            .uri("/accounts/signup/")
            .set_json(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password1": PASSWORD,
                "password2": PASSWORD,
            }))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        session_cookie(&resp)
    }};
}

/// Post a urlencoded form as the holder of `$cookie`
macro_rules! submit {
    ($app:expr, $uri:expr, $cookie:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri(&$uri)
            .cookie($cookie.clone())
            .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
            .set_payload($body)
            .to_request();
        test::call_service($app, req).await
    }};
}

fn location(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Id of the parenting post titled `title`
fn post_id(list: &Value, title: &str) -> i64 {
    list["posts"]
        .as_array()
        .expect("posts")
        .iter()
        .find(|p| p["title"] == title)
        .and_then(|p| p["id"].as_i64())
        .expect("post in list")
}

fn session_cookie(resp: &actix_web::dev::ServiceResponse) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == "access_token")
        .map(|c| c.into_owned())
        .expect("session cookie")
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn signup_then_post_then_read_through_api() {
    let media = tempfile::tempdir().unwrap();
    let app = app!(common::database_state(media.path()).await);
    let username = common::unique_name("parent");

    let req = test::TestRequest::post()
        .uri("/accounts/signup/")
        .set_json(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password1": PASSWORD,
            "password2": PASSWORD,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&resp);

    let req = test::TestRequest::get().uri("/home/").cookie(cookie.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["user"]["username"], username.as_str());

    let req = test::TestRequest::post()
        .uri("/parenting/create/")
        .cookie(cookie.clone())
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload(format!("title=Nap+schedule+{username}&description=Two+naps+a+day"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let req = test::TestRequest::post()
        .uri("/api/token/")
        .set_json(json!({ "username": username, "password": PASSWORD }))
        .to_request();
    let tokens: Value = test::call_and_read_body_json(&app, req).await;
    let access = tokens["access_token"].as_str().expect("access token").to_string();
    assert_eq!(tokens["token_type"], "Bearer");

    let req = test::TestRequest::get()
        .uri("/api/parenting/")
        .insert_header((header::AUTHORIZATION, format!("Bearer {access}")))
        .to_request();
    let posts: Value = test::call_and_read_body_json(&app, req).await;
    let title = format!("Nap schedule {username}");
    assert!(posts
        .as_array()
        .expect("list")
        .iter()
        .any(|p| p["title"] == title.as_str()));
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn duplicate_username_conflicts() {
    let media = tempfile::tempdir().unwrap();
    let app = app!(common::database_state(media.path()).await);
    let username = common::unique_name("dup");

    for (email, expected) in [
        (format!("{username}@example.com"), StatusCode::SEE_OTHER),
        (format!("{username}.other@example.com"), StatusCode::CONFLICT),
    ] {
        let req = test::TestRequest::post()
            .uri("/accounts/signup/")
            .set_json(json!({
                "username": username,
                "email": email,
                "password1": PASSWORD,
                "password2": PASSWORD,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected);
    }
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn wrong_password_is_unauthorized() {
    let media = tempfile::tempdir().unwrap();
    let app = app!(common::database_state(media.path()).await);
    let username = common::unique_name("signin");

    let req = test::TestRequest::post()
        .uri("/accounts/signup/")
        .set_json(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password1": PASSWORD,
            "password2": PASSWORD,
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SEE_OTHER);

    let req = test::TestRequest::post()
        .uri("/accounts/signin/?next=/tennis/")
        .set_json(json!({ "login": username, "password": "not-it-at-all" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/accounts/signin/?next=/tennis/")
        .set_json(json!({ "login": format!("{username}@EXAMPLE.com"), "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/tennis/");
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn rooms_need_another_member() {
    let media = tempfile::tempdir().unwrap();
    let app = app!(common::database_state(media.path()).await);
    let username = common::unique_name("chat");

    let req = test::TestRequest::post()
        .uri("/accounts/signup/")
        .set_json(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password1": PASSWORD,
            "password2": PASSWORD,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let cookie = session_cookie(&resp);

    let req = test::TestRequest::post()
        .uri("/rooms/create_room/")
        .cookie(cookie)
        .set_json(json!({ "room_name": "Doubles", "post_author": username }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["fields"]["post_author"].is_array());
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn test_post_create_returns_to_the_list() {
    let media = tempfile::tempdir().unwrap();
    let app = app!(common::database_state(media.path()).await);
    let username = common::unique_name("tester");
    let cookie = signup!(&app, &username);

    let resp = submit!(&app, "/test/create/", cookie, "title=Draft&description=Body");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/test/");
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn deleting_a_comment_removes_its_replies() {
    let media = tempfile::tempdir().unwrap();
    let state = common::database_state(media.path()).await;
    let pool = state.pool.clone();
    let app = app!(state);
    let author = common::unique_name("author");
    let replier = common::unique_name("replier");
    let author_cookie = signup!(&app, &author);
    let replier_cookie = signup!(&app, &replier);

    let title = format!("Teething {author}");
    let resp = submit!(
        &app,
        "/parenting/create/",
        author_cookie,
        format!("title={}&description=Cold+spoons", urlencoding::encode(&title))
    );
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let req = test::TestRequest::get().uri("/parenting/").to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    let id = post_id(&list, &title);
    let detail_uri = format!("/parenting/{id}/");

    let resp = submit!(&app, detail_uri, author_cookie, "content=Any+tips%3F");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let req = test::TestRequest::get().uri(&detail_uri).to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    let comment_id = detail["comments"][0]["id"].as_i64().expect("comment id");

    let resp = submit!(
        &app,
        detail_uri,
        replier_cookie,
        format!("content=Frozen+washcloth&parent_comment_id={comment_id}")
    );
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let req = test::TestRequest::get().uri(&detail_uri).to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    let reply_id = detail["comments"][0]["replies"][0]["id"].as_i64().expect("reply id");

    let resp = submit!(&app, detail_uri, author_cookie, format!("delete_comment_id={comment_id}"));
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let req = test::TestRequest::get().uri(&detail_uri).to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["comments"], json!([]));
    assert!(comment_repo::find_comment(pool.get_ref(), reply_id)
        .await
        .unwrap()
        .is_none());
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn only_the_author_or_staff_may_edit() {
    let media = tempfile::tempdir().unwrap();
    let state = common::database_state(media.path()).await;
    let pool = state.pool.clone();
    let app = app!(state);
    let author = common::unique_name("owner");
    let other = common::unique_name("other");
    let author_cookie = signup!(&app, &author);
    let other_cookie = signup!(&app, &other);

    let title = format!("Daycare {author}");
    submit!(
        &app,
        "/parenting/create/",
        author_cookie,
        format!("title={}&description=Waitlists", urlencoding::encode(&title))
    );
    let req = test::TestRequest::get().uri("/parenting/").to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    let update_uri = format!("/parenting/{}/update/", post_id(&list, &title));

    let req = test::TestRequest::get().uri(&update_uri).cookie(other_cookie.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    let resp = submit!(&app, update_uri, other_cookie, "title=Hijacked&description=x");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get().uri(&update_uri).cookie(author_cookie.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    sqlx::query("UPDATE users SET is_staff = TRUE WHERE username = $1")
        .bind(&other)
        .execute(pool.get_ref())
        .await
        .unwrap();
    let req = test::TestRequest::get().uri(&update_uri).cookie(other_cookie.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn post_search_filters_by_date_and_keyword() {
    let media = tempfile::tempdir().unwrap();
    let app = app!(common::database_state(media.path()).await);
    let username = common::unique_name("search");
    let cookie = signup!(&app, &username);

    let title = format!("Colic {username}");
    submit!(
        &app,
        "/parenting/create/",
        cookie,
        format!("title={}&description=Gripe+water", urlencoding::encode(&title))
    );

    let titles = |list: Value| -> Vec<String> {
        list["posts"]
            .as_array()
            .expect("posts")
            .iter()
            .filter_map(|p| p["title"].as_str().map(str::to_string))
            .collect()
    };

    let req = test::TestRequest::get()
        .uri(&format!("/parenting/?search_words={username}&search_field=title"))
        .to_request();
    assert_eq!(titles(test::call_and_read_body_json(&app, req).await), vec![title.clone()]);

    let req = test::TestRequest::get()
        .uri(&format!("/parenting/?search_words={username}&search_field=description"))
        .to_request();
    assert!(titles(test::call_and_read_body_json(&app, req).await).is_empty());

    let req = test::TestRequest::get()
        .uri("/parenting/?search_date=2999-01-01")
        .to_request();
    assert!(titles(test::call_and_read_body_json(&app, req).await).is_empty());
}

#[actix_web::test]
#[serial]
#[ignore = "Requires PostgreSQL database"]
async fn chat_message_is_stored_then_broadcast_as_the_sender() {
    let media = tempfile::tempdir().unwrap();
    let state = common::database_state(media.path()).await;
    let pool = state.pool.clone();
    let registry = state.registry.clone();
    let app = app!(state);
    let buyer = common::unique_name("buyer");
    let seller = common::unique_name("seller");
    signup!(&app, &buyer);
    signup!(&app, &seller);

    let buyer = user_repo::find_user_by_username(pool.get_ref(), &buyer)
        .await
        .unwrap()
        .expect("buyer");
    let seller = user_repo::find_user_by_username(pool.get_ref(), &seller)
        .await
        .unwrap()
        .expect("seller");
    let room = room_repo::create_room(pool.get_ref(), "Pram", buyer.id, seller.id)
        .await
        .unwrap();
    let group = room.group_name();
    let (_, mut rx) = registry.add_subscriber(&group).await;

    let stored = store_and_broadcast(
        pool.get_ref(),
        &registry,
        &group,
        room.id,
        buyer.id,
        "Still available?",
    )
    .await
    .unwrap();

    let frame: Value = serde_json::from_str(&rx.recv().await.expect("frame")).unwrap();
    assert_eq!(frame, json!({ "message": "Still available?", "user": buyer.username }));

    let history = room_repo::room_history(pool.get_ref(), room.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, stored.id);
    assert_eq!(history[0].username, buyer.username);
}
