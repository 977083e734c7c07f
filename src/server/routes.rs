//! `/eu-vat` HTTP routes.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use super::error::AppError;
use crate::core::{CheckRequest, PricingResult, VatService};

type AppState = Arc<VatService>;

/// Router with every VAT route nested under `/eu-vat`.
pub fn router(service: Arc<VatService>) -> Router {
    let api = Router::new()
        .route("/rates/:country_code", get(get_vat_rate))
        .route("/validate-vat-number", post(validate_vat_number))
        .route("/exchange-rates/:country_code", post(get_exchange_rate))
        .route(
            "/exchange-rates/:country_code/:src_currency",
            post(get_exchange_rate_from),
        )
        .route("/check", post(check));

    Router::new()
        .nest("/eu-vat", api)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct RateQuery {
    rate_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    vat_number: String,
}

fn number(value: Decimal) -> Result<f64, AppError> {
    value
        .to_f64()
        .ok_or_else(|| AppError::Internal(format!("{value} has no f64 representation")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

async fn get_vat_rate(
    State(service): State<AppState>,
    Path(country_code): Path<String>,
    Query(query): Query<RateQuery>,
) -> Result<Json<Option<f64>>, AppError> {
    let rate = service
        .get_vat_rate(&country_code, query.rate_type.as_deref())
        .await?;
    Ok(Json(rate.map(number).transpose()?))
}

async fn validate_vat_number(
    State(service): State<AppState>,
    payload: Result<Json<ValidateBody>, JsonRejection>,
) -> Result<Json<bool>, AppError> {
    let req = body(payload)?;
    Ok(Json(service.validate_vat_number(&req.vat_number).await?))
}

async fn get_exchange_rate(
    State(service): State<AppState>,
    Path(country_code): Path<String>,
) -> Result<Json<f64>, AppError> {
    let rate = service.get_exchange_rate(&country_code, None).await?;
    Ok(Json(number(rate)?))
}

async fn get_exchange_rate_from(
    State(service): State<AppState>,
    Path((country_code, src_currency)): Path<(String, String)>,
) -> Result<Json<f64>, AppError> {
    let rate = service
        .get_exchange_rate(&country_code, Some(&src_currency))
        .await?;
    Ok(Json(number(rate)?))
}

async fn check(
    State(service): State<AppState>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<PricingResult>, AppError> {
    let req = body(payload)?;
    Ok(Json(service.check(req).await?))
}
