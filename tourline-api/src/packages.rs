use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use uuid::Uuid;

use tourline_core::package::{NewTourPackage, TourPackage};

use crate::auth::decode_claims;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/packages", get(list_packages))
        .route("/v1/packages/{id}", get(get_package))
        .route("/v1/admin/packages", post(create_package))
}

/// POST /v1/admin/packages
/// Publish a tour departure with its full seat capacity available.
async fn create_package(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<NewTourPackage>,
) -> Result<Json<TourPackage>, AppError> {
    let claims = decode_claims(bearer.token(), &state.auth.secret)?;
    if claims.role != "ADMIN" {
        return Err(AppError::AuthorizationError(
            "Admin role required".to_string(),
        ));
    }

    req.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let package = state
        .packages
        .create_package(req)
        .await
        .map_err(AppError::from_store)?;

    Ok(Json(package))
}

async fn list_packages(State(state): State<AppState>) -> Result<Json<Vec<TourPackage>>, AppError> {
    let packages = state
        .packages
        .list_packages()
        .await
        .map_err(AppError::from_store)?;
    Ok(Json(packages))
}

async fn get_package(
    State(state): State<AppState>,
    Path(package_id): Path<Uuid>,
) -> Result<Json<TourPackage>, AppError> {
    let package = state
        .packages
        .get_package(package_id)
        .await
        .map_err(AppError::from_store)?
        .ok_or_else(|| AppError::NotFoundError("Tour package not found".to_string()))?;
    Ok(Json(package))
}
