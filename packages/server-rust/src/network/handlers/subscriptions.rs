//! `POST /subscriptions/{email,sms,https}`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::service::subscriptions::success_message;
use crate::traits::SubscriptionProtocol;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub url: Option<String>,
}

impl SubscribeRequest {
    fn endpoint(&self, protocol: SubscriptionProtocol) -> Option<&str> {
        match protocol {
            SubscriptionProtocol::Email => self.email.as_deref(),
            SubscriptionProtocol::Sms => self.phone_number.as_deref(),
            SubscriptionProtocol::Https => self.url.as_deref(),
        }
    }
}

async fn subscribe(
    state: AppState,
    protocol: SubscriptionProtocol,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let receipt = state
        .services
        .subscriptions
        .subscribe(protocol, request.endpoint(protocol))
        .await?;
    Ok(Json(json!({
        "message": success_message(protocol),
        "data": receipt,
    })))
}

pub async fn subscribe_email_handler(
    State(state): State<AppState>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    subscribe(state, SubscriptionProtocol::Email, body).await
}

pub async fn subscribe_sms_handler(
    State(state): State<AppState>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    subscribe(state, SubscriptionProtocol::Sms, body).await
}

pub async fn subscribe_https_handler(
    State(state): State<AppState>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    subscribe(state, SubscriptionProtocol::Https, body).await
}
