use reqwest::StatusCode;

use crate::helpers::{json, Credentials, TestApp, OTHER_USER_ID, PRODUCT_ID, USER_ID};

#[tokio::test]
async fn operator_endpoints_require_credentials() {
    let app = TestApp::spawn().await;
    let wrong_password = Credentials {
        username: app.operator.username.clone(),
        password: "wrong".into(),
    };
    let wrong_username = Credentials {
        username: "admin".into(),
        password: app.operator.password.clone(),
    };

    for credentials in [None, Some(&wrong_password), Some(&wrong_username)] {
        let retryable = app.retryable(credentials).await.unwrap();
        let retry = app.retry(1, credentials).await.unwrap();
        let retry_all = app.retry_all(credentials).await.unwrap();

        assert_eq!(StatusCode::UNAUTHORIZED, retryable.status());
        assert!(retryable.headers().contains_key("WWW-Authenticate"));
        assert_eq!(StatusCode::UNAUTHORIZED, retry.status());
        assert_eq!(StatusCode::UNAUTHORIZED, retry_all.status());
    }
}

#[tokio::test]
async fn failed_delivery_is_recovered_by_retry() {
    let app = TestApp::spawn().await;
    app.fail_emails(1).await;
    app.expect_emails(1).await;
    app.subscribe(USER_ID, PRODUCT_ID).await.unwrap();
    app.update_stock(PRODUCT_ID, 3).await.unwrap();

    let retryable = json(app.retryable(Some(&app.operator)).await.unwrap()).await;
    let retryable = retryable.as_array().unwrap();
    assert_eq!(1, retryable.len());
    assert_eq!("failed", retryable[0]["status"]);
    assert_eq!(0, retryable[0]["retry_count"]);
    let log_id = retryable[0]["id"].as_i64().unwrap();

    let res = app.retry(log_id, Some(&app.operator)).await.unwrap();

    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(true, json(res).await["retried"]);
    let retried = json(app.delivery_logs(USER_ID, Some("retried")).await.unwrap()).await;
    let retried = retried.as_array().unwrap();
    assert_eq!(1, retried.len());
    assert_eq!(log_id, retried[0]["id"]);
    assert_eq!(1, retried[0]["retry_count"]);
    let retryable = json(app.retryable(Some(&app.operator)).await.unwrap()).await;
    assert!(retryable.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn retry_of_unknown_entry_is_false() {
    let app = TestApp::spawn().await;

    let res = app.retry(404, Some(&app.operator)).await.unwrap();

    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(false, json(res).await["retried"]);
}

#[tokio::test]
async fn retry_sweep_recovers_every_failed_delivery() {
    let app = TestApp::spawn().await;
    app.fail_emails(2).await;
    app.expect_emails(2).await;
    app.subscribe(USER_ID, PRODUCT_ID).await.unwrap();
    app.subscribe(OTHER_USER_ID, PRODUCT_ID).await.unwrap();
    let report = json(app.update_stock(PRODUCT_ID, 3).await.unwrap()).await;
    assert_eq!(2, report["failed"]);

    let sweep = json(app.retry_all(Some(&app.operator)).await.unwrap()).await;

    assert_eq!(2, sweep["attempted"]);
    assert_eq!(2, sweep["recovered"]);
}

#[tokio::test]
async fn unknown_status_filter_is_400() {
    let app = TestApp::spawn().await;

    let res = app.delivery_logs(USER_ID, Some("lost")).await.unwrap();

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
}
