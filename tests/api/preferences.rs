use reqwest::{Method, StatusCode};

use restock_notify::model::PreferenceFlags;

use crate::helpers::{json, TestApp, USER_ID, USER_WITHOUT_PREFERENCES};

#[tokio::test]
async fn missing_preferences_default_and_persist() {
    let app = TestApp::spawn().await;

    let first = json(app.preferences(USER_WITHOUT_PREFERENCES).await.unwrap()).await;
    let second = json(app.preferences(USER_WITHOUT_PREFERENCES).await.unwrap()).await;

    assert_eq!(USER_WITHOUT_PREFERENCES, first["user_id"]);
    assert_eq!(true, first["email_enabled"]);
    assert_eq!(false, first["push_enabled"]);
    assert_eq!(false, first["sms_enabled"]);
    assert_eq!(true, first["in_app_enabled"]);
    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn update_replaces_every_flag() {
    let app = TestApp::spawn().await;
    let flags = PreferenceFlags {
        email: false,
        push: true,
        sms: true,
        in_app: false,
    };

    let res = app.update_preferences(USER_ID, &flags).await.unwrap();

    assert_eq!(StatusCode::OK, res.status());
    let stored = json(app.preferences(USER_ID).await.unwrap()).await;
    assert_eq!(false, stored["email_enabled"]);
    assert_eq!(true, stored["push_enabled"]);
    assert_eq!(true, stored["sms_enabled"]);
    assert_eq!(false, stored["in_app_enabled"]);
}

#[tokio::test]
async fn unknown_user_is_404() {
    let app = TestApp::spawn().await;

    assert_eq!(
        StatusCode::NOT_FOUND,
        app.preferences(99).await.unwrap().status()
    );
    assert_eq!(
        StatusCode::NOT_FOUND,
        app.update_preferences(99, &PreferenceFlags::default())
            .await
            .unwrap()
            .status()
    );
}

#[tokio::test]
async fn partial_update_is_rejected() {
    let app = TestApp::spawn().await;

    let res = app
        .request(Method::PUT, &format!("preferences/{}", USER_ID))
        .json(&serde_json::json!({ "email": false }))
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
}
