use base64::{engine::general_purpose::STANDARD as base64, Engine as _};

use church_api::errors::AppError;
use church_api::services::momo_gateway::{
    CollectionsApi, MomoGateway, RequestToPayPayload, WireParty,
};

fn gateway(server: &mockito::ServerGuard) -> MomoGateway {
    MomoGateway::new(&server.url(), "sandbox", "donations.example.org")
}

fn payload() -> RequestToPayPayload {
    RequestToPayPayload {
        amount: "5000".to_string(),
        currency: "EUR".to_string(),
        external_id: "DONATION-1700000000000".to_string(),
        payer: WireParty {
            party_id_type: "MSISDN".to_string(),
            party_id: "256712345678".to_string(),
        },
        payer_message: "Church donation".to_string(),
        payee_note: "Thank you for your giving".to_string(),
    }
}

#[tokio::test]
async fn create_api_user_sends_reference_and_subscription_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1_0/apiuser")
        .match_header("x-reference-id", "candidate-1")
        .match_header("ocp-apim-subscription-key", "sub-key")
        .match_body(mockito::Matcher::JsonString(
            r#"{"providerCallbackHost":"donations.example.org"}"#.to_string(),
        ))
        .with_status(201)
        .create_async()
        .await;

    gateway(&server)
        .create_api_user("candidate-1", "sub-key")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn create_api_user_surfaces_the_provider_error_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1_0/apiuser")
        .with_status(401)
        .with_body(r#"{"statusCode":401,"message":"Access denied"}"#)
        .create_async()
        .await;

    let err = gateway(&server)
        .create_api_user("candidate-1", "bad-key")
        .await
        .expect_err("401 must be rejected");

    match err {
        AppError::ProviderRejected(body) => assert!(body.contains("Access denied")),
        other => panic!("expected ProviderRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn create_api_key_returns_the_provisioned_key() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1_0/apiuser/user-1/apikey")
        .match_header("ocp-apim-subscription-key", "sub-key")
        .with_status(201)
        .with_body(r#"{"apiKey":"secret-api-key"}"#)
        .create_async()
        .await;

    let key = gateway(&server)
        .create_api_key("user-1", "sub-key")
        .await
        .unwrap();
    assert_eq!(key, "secret-api-key");
}

#[tokio::test]
async fn create_api_key_rejects_a_body_without_the_key_field() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1_0/apiuser/user-1/apikey")
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;

    let err = gateway(&server)
        .create_api_key("user-1", "sub-key")
        .await
        .expect_err("missing apiKey field");
    assert!(matches!(err, AppError::MalformedResponse(_)));
}

#[tokio::test]
async fn token_exchange_uses_basic_auth_from_the_credential_pair() {
    let expected = format!("Basic {}", base64.encode("user-1:secret-api-key"));

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/collection/token/")
        .match_header("authorization", expected.as_str())
        .match_header("ocp-apim-subscription-key", "sub-key")
        .with_status(200)
        .with_body(r#"{"access_token":"bearer-1","token_type":"access_token","expires_in":3600}"#)
        .create_async()
        .await;

    let token = gateway(&server)
        .fetch_access_token("user-1", "secret-api-key", "sub-key")
        .await
        .unwrap();

    assert_eq!(token, "bearer-1");
    mock.assert_async().await;
}

#[tokio::test]
async fn token_exchange_rejects_a_body_without_access_token() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/collection/token/")
        .with_status(200)
        .with_body(r#"{"token_type":"access_token"}"#)
        .create_async()
        .await;

    let err = gateway(&server)
        .fetch_access_token("user-1", "secret-api-key", "sub-key")
        .await
        .expect_err("missing access_token field");
    assert!(matches!(err, AppError::MalformedResponse(_)));
}

#[tokio::test]
async fn request_to_pay_carries_the_idempotency_reference() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/collection/v1_0/requesttopay")
        .match_header("x-reference-id", "tx-1")
        .match_header("x-target-environment", "sandbox")
        .match_header("authorization", "Bearer bearer-1")
        .match_header("ocp-apim-subscription-key", "sub-key")
        .with_status(202)
        .create_async()
        .await;

    gateway(&server)
        .request_to_pay("tx-1", "bearer-1", "sub-key", &payload())
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn request_to_pay_rejection_keeps_the_provider_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/collection/v1_0/requesttopay")
        .with_status(500)
        .with_body(r#"{"code":"NOT_ENOUGH_FUNDS","message":"The payer does not have enough funds"}"#)
        .create_async()
        .await;

    let err = gateway(&server)
        .request_to_pay("tx-1", "bearer-1", "sub-key", &payload())
        .await
        .expect_err("500 must be rejected");

    match err {
        AppError::ProviderRejected(body) => assert!(body.contains("NOT_ENOUGH_FUNDS")),
        other => panic!("expected ProviderRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn status_fetch_parses_the_provider_disposition() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/collection/v1_0/requesttopay/tx-1")
        .match_header("authorization", "Bearer bearer-1")
        .with_status(200)
        .with_body(
            r#"{
                "amount": "5000",
                "currency": "EUR",
                "externalId": "DONATION-1700000000000",
                "financialTransactionId": "363440463",
                "payer": {"partyIdType": "MSISDN", "partyId": "256712345678"},
                "status": "SUCCESSFUL"
            }"#,
        )
        .create_async()
        .await;

    let status = gateway(&server)
        .fetch_transaction_status("tx-1", "bearer-1", "sub-key")
        .await
        .unwrap();

    assert_eq!(status.status, "SUCCESSFUL");
    assert_eq!(status.financial_transaction_id.as_deref(), Some("363440463"));
    assert_eq!(status.external_id.as_deref(), Some("DONATION-1700000000000"));
    assert_eq!(
        status.payer.as_ref().map(|p| p.party_id.as_str()),
        Some("256712345678")
    );
}

#[tokio::test]
async fn status_fetch_propagates_a_failed_disposition_with_reason() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/collection/v1_0/requesttopay/tx-2")
        .with_status(200)
        .with_body(
            r#"{
                "amount": "5000",
                "currency": "EUR",
                "externalId": "DONATION-1700000000001",
                "payer": {"partyIdType": "MSISDN", "partyId": "256712345678"},
                "status": "FAILED",
                "reason": "PAYER_NOT_FOUND"
            }"#,
        )
        .create_async()
        .await;

    let status = gateway(&server)
        .fetch_transaction_status("tx-2", "bearer-1", "sub-key")
        .await
        .unwrap();

    assert_eq!(status.status, "FAILED");
    assert_eq!(
        status.reason,
        Some(serde_json::Value::String("PAYER_NOT_FOUND".to_string()))
    );
}
