use storefront_api::routes::health::health_check;

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert!(response.0.success);
    assert_eq!(response.0.message.as_deref(), Some("Server is running"));

    let body = serde_json::to_value(&response.0).expect("serialize");
    assert_eq!(body["data"]["status"], "ok");
}
