//! Ticket ledger handlers: provisioning, balance, admin grants.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use studio_core::{BalanceSnapshot, UserId};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Create a zero-balance ledger for the authenticated user.
///
/// Idempotent: calling it again returns the existing ledger's figures.
pub async fn provision(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    let ledger = state.ledgers.provision(auth.user_id).await?;

    tracing::info!(user_id = %auth.user_id, "Ledger provisioned");

    Ok(Json(ledger.snapshot()))
}

/// Get the authenticated user's balance figures.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    let snapshot = state.orchestrator.get_balance(&auth.user_id).await?;

    Ok(Json(snapshot))
}

/// Grant tickets request.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// The user to credit.
    pub user_id: String,
    /// Tickets to add (must be positive).
    pub amount: i64,
}

/// Add tickets to a user's balance (admin only).
///
/// Creates the ledger on first grant if the user was never provisioned.
pub async fn grant_tickets(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantRequest>,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    let user_id = body
        .user_id
        .parse::<UserId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid user id: {}", body.user_id)))?;

    let snapshot = state.ledgers.grant(&user_id, body.amount).await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        amount = body.amount,
        "Tickets granted"
    );

    Ok(Json(snapshot))
}
