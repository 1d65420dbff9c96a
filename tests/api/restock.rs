use reqwest::StatusCode;

use restock_notify::model::PreferenceFlags;
use restock_notify::repo::SubscriptionRepo;

use crate::helpers::{json, TestApp, OTHER_USER_ID, PRODUCT_ID, STOCKED_PRODUCT_ID, USER_ID};

#[tokio::test]
async fn restock_notifies_subscribers_once() {
    let app = TestApp::spawn().await;
    app.expect_emails(1).await;
    let subscription = json(app.subscribe(USER_ID, PRODUCT_ID).await.unwrap()).await;

    let res = app.update_stock(PRODUCT_ID, 10).await.unwrap();

    assert_eq!(StatusCode::OK, res.status());
    let report = json(res).await;
    assert_eq!(0, report["previous_stock"]);
    assert_eq!(10, report["new_stock"]);
    assert_eq!(true, report["fired"]);
    assert_eq!(1, report["notified"]);
    assert_eq!(0, report["failed"]);

    let id = subscription["id"].as_i64().unwrap();
    let subscription = app.store.find_subscription(id).await.unwrap().unwrap();
    assert!(subscription.is_sent);
    let logs = json(app.delivery_logs(USER_ID, Some("sent")).await.unwrap()).await;
    assert_eq!(1, logs.as_array().unwrap().len());

    // Still in stock: no edge, no e-mail
    let report = json(app.update_stock(PRODUCT_ID, 4).await.unwrap()).await;
    assert_eq!(false, report["fired"]);
}

#[tokio::test]
async fn selling_out_re_arms_subscriptions() {
    let app = TestApp::spawn().await;
    app.expect_emails(2).await;
    app.subscribe(USER_ID, PRODUCT_ID).await.unwrap();

    app.update_stock(PRODUCT_ID, 1).await.unwrap();
    app.update_stock(PRODUCT_ID, 0).await.unwrap();
    let report = json(app.update_stock(PRODUCT_ID, 6).await.unwrap()).await;

    assert_eq!(true, report["fired"]);
    assert_eq!(1, report["notified"]);
}

#[tokio::test]
async fn stocked_product_update_does_not_fire() {
    let app = TestApp::spawn().await;
    app.expect_emails(0).await;
    app.subscribe(USER_ID, STOCKED_PRODUCT_ID).await.unwrap();

    let report = json(app.update_stock(STOCKED_PRODUCT_ID, 9).await.unwrap()).await;

    assert_eq!(3, report["previous_stock"]);
    assert_eq!(false, report["fired"]);
    assert_eq!(Some(9), app.store.stock(STOCKED_PRODUCT_ID));
}

#[tokio::test]
async fn failed_email_is_logged_and_batch_continues() {
    let app = TestApp::spawn().await;
    app.fail_emails(1).await;
    app.expect_emails(1).await;
    app.subscribe(USER_ID, PRODUCT_ID).await.unwrap();
    app.subscribe(OTHER_USER_ID, PRODUCT_ID).await.unwrap();

    let report = json(app.update_stock(PRODUCT_ID, 2).await.unwrap()).await;

    assert_eq!(1, report["failed"]);
    assert_eq!(1, report["notified"]);
    let failed = json(app.delivery_logs(USER_ID, Some("failed")).await.unwrap()).await;
    let failed = failed.as_array().unwrap();
    assert_eq!(1, failed.len());
    assert_eq!(0, failed[0]["retry_count"]);
    assert!(failed[0]["error_message"]
        .as_str()
        .unwrap()
        .starts_with("delivery failed on email"));
}

#[tokio::test]
async fn email_is_skipped_when_the_user_disabled_it() {
    let app = TestApp::spawn().await;
    app.expect_emails(0).await;
    let flags = PreferenceFlags {
        email: false,
        push: false,
        sms: false,
        in_app: true,
    };
    app.update_preferences(USER_ID, &flags).await.unwrap();
    app.subscribe(USER_ID, PRODUCT_ID).await.unwrap();

    let report = json(app.update_stock(PRODUCT_ID, 2).await.unwrap()).await;

    assert_eq!(1, report["notified"]);
}

#[tokio::test]
async fn update_stock_rejects_invalid_requests() {
    let app = TestApp::spawn().await;

    let test_cases = [
        (PRODUCT_ID, -1, StatusCode::BAD_REQUEST, "negative stock"),
        (0, 1, StatusCode::BAD_REQUEST, "non-positive product id"),
        (99, 1, StatusCode::NOT_FOUND, "unknown product"),
    ];

    for (product_id, stock, expected, description) in test_cases {
        let res = app.update_stock(product_id, stock).await.unwrap();

        assert_eq!(
            expected,
            res.status(),
            "API did not fail as expected for {}",
            description
        );
    }
}
