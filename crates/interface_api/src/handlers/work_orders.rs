//! Work order handlers
//!
//! Each route maps onto one named lifecycle operation; there is no generic
//! status update.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_kernel::{ClientId, ContractId, Money, ProductId, TechnicianId};
use domain_workorder::{MaterialUsage, ServiceCategory, TimeEntry, WorkOrder};
use uuid::Uuid;

use crate::dto::work_orders::*;
use crate::dto::ValidatedJson;
use crate::{error::ApiError, AppState};

type WorkOrderResult = Result<Json<WorkOrderResponse>, ApiError>;
type CreatedResult = Result<(StatusCode, Json<WorkOrderResponse>), ApiError>;

/// Registers a new work order in `REQUESTED`
pub async fn open_work_order(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateWorkOrderRequest>,
) -> CreatedResult {
    let mut work_order = WorkOrder::new(
        ClientId::from(request.client_id),
        ServiceCategory::new(&request.service_category),
        request.title,
        request.priority,
    );
    if let Some(contract_id) = request.contract_id {
        work_order = work_order.with_contract(ContractId::from(contract_id));
    }
    if let Some(amount) = request.budget {
        if amount.is_sign_negative() {
            return Err(ApiError::validation("budget cannot be negative"));
        }
        let currency = request.currency.unwrap_or(state.config.billing.currency);
        work_order = work_order.with_budget(Money::new(amount, currency));
    }

    let created = state.work_orders.open(work_order).await?;
    Ok((StatusCode::CREATED, Json((&created).into())))
}

pub async fn get_work_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> WorkOrderResult {
    let work_order = state.work_orders.get(id.into()).await?;
    Ok(Json((&work_order).into()))
}

pub async fn schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ScheduleRequest>,
) -> WorkOrderResult {
    let work_order = state
        .work_orders
        .schedule(id.into(), request.start, request.end)
        .await?;
    Ok(Json((&work_order).into()))
}

pub async fn start(State(state): State<AppState>, Path(id): Path<Uuid>) -> WorkOrderResult {
    let work_order = state.work_orders.start(id.into()).await?;
    Ok(Json((&work_order).into()))
}

pub async fn hold(State(state): State<AppState>, Path(id): Path<Uuid>) -> WorkOrderResult {
    let work_order = state.work_orders.hold(id.into()).await?;
    Ok(Json((&work_order).into()))
}

pub async fn complete(State(state): State<AppState>, Path(id): Path<Uuid>) -> WorkOrderResult {
    let work_order = state.work_orders.complete(id.into()).await?;
    Ok(Json((&work_order).into()))
}

pub async fn cancel(State(state): State<AppState>, Path(id): Path<Uuid>) -> WorkOrderResult {
    let work_order = state.work_orders.cancel(id.into()).await?;
    Ok(Json((&work_order).into()))
}

pub async fn assign_technician(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AssignTechnicianRequest>,
) -> WorkOrderResult {
    let work_order = state
        .work_orders
        .assign_technician(id.into(), TechnicianId::from(request.technician_id))
        .await?;
    Ok(Json((&work_order).into()))
}

/// Records hours worked
pub async fn log_time(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<LogTimeRequest>,
) -> CreatedResult {
    let mut entry = TimeEntry::new(
        TechnicianId::from(request.technician_id),
        request.hours,
        request.work_date,
    )?;
    if let Some(description) = request.description {
        entry = entry.with_description(description);
    }

    let work_order = state.work_orders.log_time(id.into(), entry).await?;
    Ok((StatusCode::CREATED, Json((&work_order).into())))
}

/// Records materials consumed, priced in the billing currency
pub async fn add_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AddMaterialRequest>,
) -> CreatedResult {
    let currency = state.config.billing.currency;
    let mut usage = MaterialUsage::new(
        ProductId::from(request.product_id),
        request.product_name,
        Money::new(request.list_price, currency),
        request.quantity,
    )?;
    if let Some(price) = request.unit_price {
        usage = usage.with_unit_price(Money::new(price, currency))?;
    }

    let work_order = state.work_orders.add_material(id.into(), usage).await?;
    Ok((StatusCode::CREATED, Json((&work_order).into())))
}
