use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackVerifyRequest {
    pub order_reference: String,
    pub payment_reference: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct CallbackVerifyResponse {
    pub verified: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/payments/callback-verify", post(verify_callback))
}

/// Advisory check for the browser-delivered gateway callback. A passing
/// signature only means the redirect looked genuine; booking and inventory
/// state move exclusively on the webhook channel, so this handler has no
/// authority to mutate anything.
async fn verify_callback(
    State(state): State<AppState>,
    Json(req): Json<CallbackVerifyRequest>,
) -> Json<CallbackVerifyResponse> {
    let verified = state.signatures.verify_callback(
        &req.order_reference,
        &req.payment_reference,
        &req.signature,
    );
    if !verified {
        // No payload detail: nothing here should help forge a signature.
        tracing::warn!("Client callback signature mismatch");
    }
    Json(CallbackVerifyResponse { verified })
}
