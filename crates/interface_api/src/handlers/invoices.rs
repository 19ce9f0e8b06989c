//! Invoice handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_kernel::Money;
use domain_billing::NewPayment;
use uuid::Uuid;

use crate::dto::invoices::*;
use crate::dto::ValidatedJson;
use crate::{error::ApiError, AppState};

/// Issues the invoice for a completed work order
pub async fn generate_invoice(
    State(state): State<AppState>,
    Path(work_order_id): Path<Uuid>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let invoice = state.engine.generate_invoice(work_order_id.into()).await?;
    let today = state.engine.today();
    Ok((StatusCode::CREATED, Json(InvoiceResponse::new(&invoice, today)?)))
}

/// Looks up the invoice issued for a work order
pub async fn get_work_order_invoice(
    State(state): State<AppState>,
    Path(work_order_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice = state
        .engine
        .invoice_for_work_order(work_order_id.into())
        .await?;
    Ok(Json(InvoiceResponse::new(&invoice, state.engine.today())?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice = state.engine.get_invoice(id.into()).await?;
    Ok(Json(InvoiceResponse::new(&invoice, state.engine.today())?))
}

/// Records a payment against an invoice
pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let currency = request.currency.unwrap_or(state.config.billing.currency);
    let mut payment = NewPayment::new(Money::new(request.amount, currency), request.method);
    if let Some(reference) = request.reference {
        payment = payment.with_reference(reference);
    }

    let invoice = state.engine.record_payment(id.into(), payment).await?;
    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::new(&invoice, state.engine.today())?),
    ))
}

/// Marks a draft invoice as sent
pub async fn send_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.engine.mark_invoice_sent(id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}
