//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for orders, balance and withdrawals, and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{
    AuthResponse, BalanceResponse, CredentialsRequest, OrderResponse, WithdrawRequest,
    WithdrawalResponse,
};
use crate::web::state::{AppState, AuthUser};
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use gophermart_core::domain::OrderSubmission;
use gophermart_core::luhn;
use gophermart_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::register_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        submit_order_handler,
        list_orders_handler,
        balance_handler,
        withdraw_handler,
        list_withdrawals_handler,
    ),
    components(
        schemas(
            CredentialsRequest,
            AuthResponse,
            OrderResponse,
            BalanceResponse,
            WithdrawRequest,
            WithdrawalResponse
        )
    ),
    tags(
        (name = "GopherMart API", description = "Loyalty points accrual and withdrawal.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

fn internal(context: &str, e: PortError) -> HandlerError {
    error!("{}: {:?}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
}

//=========================================================================================
// Orders
//=========================================================================================

/// Upload an order number for accrual.
///
/// The body is the bare order number as `text/plain`.
#[utoipa::path(
    post,
    path = "/api/user/orders",
    request_body(content = String, content_type = "text/plain", description = "Order number"),
    responses(
        (status = 200, description = "Order was already uploaded by this user"),
        (status = 202, description = "New order accepted for processing"),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Order was uploaded by another user"),
        (status = 422, description = "Order number fails validation"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn submit_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(login)): Extension<AuthUser>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, HandlerError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("text/plain") {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("only text/plain is supported, got '{}'", content_type),
        ));
    }

    let number = body.trim();
    if number.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "order number is missing".to_string()));
    }
    if !luhn::is_valid(number) {
        info!(%login, order = number, "Rejected invalid order number");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("order number {} is invalid", number),
        ));
    }

    match state.db.add_order(&login, number).await {
        Ok(OrderSubmission::Created(_)) => {
            info!(%login, order = number, "Order accepted");
            Ok(StatusCode::ACCEPTED)
        }
        Ok(OrderSubmission::AlreadyUploaded(_)) => Ok(StatusCode::OK),
        Ok(OrderSubmission::OwnedByAnother) => {
            info!(%login, order = number, "Order already uploaded by another user");
            Err((
                StatusCode::CONFLICT,
                format!("order {} was uploaded by another user", number),
            ))
        }
        Err(e) => Err(internal("Failed to store order", e)),
    }
}

/// List the caller's orders, oldest first.
#[utoipa::path(
    get,
    path = "/api/user/orders",
    responses(
        (status = 200, description = "Uploaded orders", body = [OrderResponse]),
        (status = 204, description = "No orders uploaded"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(login)): Extension<AuthUser>,
) -> Result<Response, HandlerError> {
    let orders = state
        .db
        .get_orders_by_user(&login)
        .await
        .map_err(|e| internal("Failed to load orders", e))?;

    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(body).into_response())
}

//=========================================================================================
// Balance and Withdrawals
//=========================================================================================

/// Current points and total withdrawn.
#[utoipa::path(
    get,
    path = "/api/user/balance",
    responses(
        (status = 200, description = "Balance of the caller", body = BalanceResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn balance_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(login)): Extension<AuthUser>,
) -> Result<Json<BalanceResponse>, HandlerError> {
    let balance = state
        .db
        .get_balance(&login)
        .await
        .map_err(|e| internal("Failed to load balance", e))?;
    Ok(Json(balance.into()))
}

/// Spend points against a new order.
#[utoipa::path(
    post,
    path = "/api/user/balance/withdraw",
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Withdrawal recorded", body = WithdrawalResponse),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Not authenticated"),
        (status = 402, description = "Not enough points"),
        (status = 409, description = "Order already used for a withdrawal"),
        (status = 422, description = "Invalid order number or sum"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn withdraw_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(login)): Extension<AuthUser>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<WithdrawalResponse>, HandlerError> {
    let Json(req) = payload.map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))?;

    if !luhn::is_valid(&req.order) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("order number {} is invalid", req.order),
        ));
    }
    if !req.sum.is_finite() || req.sum <= 0.0 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "sum must be a positive number".to_string(),
        ));
    }

    match state.db.withdraw(&login, &req.order, req.sum).await {
        Ok(withdrawal) => {
            info!(%login, order = %req.order, sum = req.sum, "Points withdrawn");
            Ok(Json(withdrawal.into()))
        }
        Err(PortError::InsufficientFunds { requested, available }) => {
            info!(%login, requested, available, "Withdrawal rejected: insufficient funds");
            Err((
                StatusCode::PAYMENT_REQUIRED,
                "not enough points on balance".to_string(),
            ))
        }
        Err(PortError::Conflict(msg)) => Err((StatusCode::CONFLICT, msg)),
        Err(e) => Err(internal("Failed to withdraw", e)),
    }
}

/// List the caller's withdrawals, oldest first.
#[utoipa::path(
    get,
    path = "/api/user/withdrawals",
    responses(
        (status = 200, description = "Withdrawals", body = [WithdrawalResponse]),
        (status = 204, description = "No withdrawals yet"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_withdrawals_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(login)): Extension<AuthUser>,
) -> Result<Response, HandlerError> {
    let withdrawals = state
        .db
        .get_withdrawals(&login)
        .await
        .map_err(|e| internal("Failed to load withdrawals", e))?;

    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalResponse> =
        withdrawals.into_iter().map(WithdrawalResponse::from).collect();
    Ok(Json(body).into_response())
}
