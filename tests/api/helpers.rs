use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response};

use secrecy::Secret;

use serde::Serialize;

use url::Url;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restock_notify::app;
use restock_notify::auth::OperatorCredentials;
use restock_notify::client::EmailClient;
use restock_notify::crypto::SigningKey;
use restock_notify::model::PreferenceFlags;
use restock_notify::repo::{MemoryStore, Repository};
use restock_notify::service::{NotifierConfig, RestockSender, Services};
use restock_notify::telemetry;

lazy_static::lazy_static! {
    // Only print logs when TEST_LOG is set
    static ref TRACING: () = {
        let filter = "info".to_string();
        if std::env::var("TEST_LOG").is_ok() {
            let subscriber = telemetry::create_subscriber(filter, std::io::stdout);
            telemetry::set_subscriber(subscriber).expect("Failed to set subscriber");
        } else {
            let subscriber = telemetry::create_subscriber(filter, std::io::sink);
            telemetry::set_subscriber(subscriber).expect("Failed to set subscriber");
        }
    };
}

pub const USER_ID: i64 = 1;
pub const OTHER_USER_ID: i64 = 2;
pub const USER_WITHOUT_PREFERENCES: i64 = 42;
pub const PRODUCT_ID: i64 = 7;
pub const STOCKED_PRODUCT_ID: i64 = 8;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct NewSubscription {
    pub user_id: i64,
    pub product_id: i64,
}

pub struct TestApp {
    addr: String,

    pub client: Client,
    pub email_server: MockServer,
    pub store: Arc<MemoryStore>,
    pub operator: Credentials,
}

impl TestApp {
    pub async fn spawn() -> Self {
        use rand::{distributions::Alphanumeric, Rng};

        lazy_static::initialize(&TRACING);

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to listen on random port");
        let port = listener.local_addr().unwrap().port();

        let addr = format!("http://127.0.0.1:{}", port);

        let random_string = |len: usize| -> String {
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect()
        };

        let signing_key = SigningKey::new(&Secret::new(random_string(16)))
            .expect("Failed to create crypto signing key");

        let store = Arc::new(MemoryStore::new());
        store.insert_user(USER_ID, "Ada", "ada@example.com");
        store.insert_user(OTHER_USER_ID, "Grace", "grace@example.com");
        store.insert_user(USER_WITHOUT_PREFERENCES, "Alan", "alan@example.com");
        store.insert_product(PRODUCT_ID, "Kettle", 0);
        store.insert_product(STOCKED_PRODUCT_ID, "Toaster", 3);
        let repo: Arc<dyn Repository> = store.clone();

        let email_server = MockServer::start().await;

        let email_client = {
            let sender = "test@test.com"
                .parse()
                .expect("Failed to parse sender email address");
            let api_base_url =
                Url::parse(&email_server.uri()).expect("Failed to parse mock server uri");
            let api_auth_token = Secret::new("TestAuthorization".into());
            let api_timeout = Duration::from_secs(2);

            EmailClient::new(sender, api_timeout, api_base_url, api_auth_token)
                .expect("Failed to create email client")
        };

        let sender = RestockSender::new(
            repo.clone(),
            email_client,
            signing_key.clone(),
            Url::parse(&format!("{}/", addr)).expect("Failed to parse app address"),
            chrono::Duration::hours(1),
        );
        let services = Services::new(repo, Arc::new(sender), NotifierConfig::default());

        let operator = Credentials {
            username: "operator".into(),
            password: random_string(12),
        };
        let operator_credentials =
            OperatorCredentials::hash(&operator.username, &Secret::new(operator.password.clone()))
                .expect("Failed to hash operator password");

        let server = app::run(listener, services, signing_key, operator_credentials)
            .expect("Failed to spawn app instance");
        let _ = tokio::spawn(server);

        let client = Client::new();

        Self {
            addr,
            client,
            email_server,
            store,
            operator,
        }
    }

    /// Accept every e-mail send, expecting exactly `times` of them
    pub async fn expect_emails(&self, times: u64) {
        Mock::given(path("/email"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(times)
            .mount(&self.email_server)
            .await;
    }

    /// Reject the next `times` e-mail sends
    pub async fn fail_emails(&self, times: u64) {
        Mock::given(path("/email"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.email_server)
            .await;
    }

    /// Text bodies of every e-mail the API received, oldest first
    pub async fn sent_email_texts(&self) -> Vec<String> {
        self.email_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|req| {
                let body: serde_json::Value =
                    serde_json::from_slice(&req.body).expect("Failed to parse email body");
                body["TextBody"].as_str().unwrap_or_default().to_string()
            })
            .collect()
    }

    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", &self.addr, url);
        self.client.request(method, url)
    }

    pub fn authorized_request(
        &self,
        method: Method,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> reqwest::RequestBuilder {
        let req = self.request(method, url);
        if let Some(creds) = credentials {
            req.basic_auth(creds.username.clone(), Some(creds.password.clone()))
        } else {
            req
        }
    }

    pub async fn health_check(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "health_check").send().await
    }

    pub async fn subscribe(&self, user_id: i64, product_id: i64) -> reqwest::Result<Response> {
        self.request(Method::POST, "subscriptions")
            .json(&NewSubscription {
                user_id,
                product_id,
            })
            .send()
            .await
    }

    pub async fn unsubscribe(&self, subscription_id: i64) -> reqwest::Result<Response> {
        self.request(Method::DELETE, &format!("subscriptions/{}", subscription_id))
            .send()
            .await
    }

    pub async fn update_stock(&self, product_id: i64, stock: i32) -> reqwest::Result<Response> {
        self.request(Method::PUT, &format!("inventory/{}", product_id))
            .json(&serde_json::json!({ "stock": stock }))
            .send()
            .await
    }

    pub async fn preferences(&self, user_id: i64) -> reqwest::Result<Response> {
        self.request(Method::GET, &format!("preferences/{}", user_id))
            .send()
            .await
    }

    pub async fn update_preferences(
        &self,
        user_id: i64,
        flags: &PreferenceFlags,
    ) -> reqwest::Result<Response> {
        self.request(Method::PUT, &format!("preferences/{}", user_id))
            .json(flags)
            .send()
            .await
    }

    pub async fn delivery_logs(
        &self,
        user_id: i64,
        status: Option<&str>,
    ) -> reqwest::Result<Response> {
        let url = match status {
            Some(status) => format!("deliveries/user/{}?status={}", user_id, status),
            None => format!("deliveries/user/{}", user_id),
        };
        self.request(Method::GET, &url).send().await
    }

    pub async fn retryable(&self, credentials: Option<&Credentials>) -> reqwest::Result<Response> {
        self.authorized_request(Method::GET, "deliveries/retryable", credentials)
            .send()
            .await
    }

    pub async fn retry(
        &self,
        log_id: i64,
        credentials: Option<&Credentials>,
    ) -> reqwest::Result<Response> {
        self.authorized_request(
            Method::POST,
            &format!("deliveries/{}/retry", log_id),
            credentials,
        )
        .send()
        .await
    }

    pub async fn retry_all(&self, credentials: Option<&Credentials>) -> reqwest::Result<Response> {
        self.authorized_request(Method::POST, "deliveries/retry", credentials)
            .send()
            .await
    }
}

/// Read a JSON response body
pub async fn json(res: Response) -> serde_json::Value {
    res.json().await.expect("Failed to parse response body")
}
