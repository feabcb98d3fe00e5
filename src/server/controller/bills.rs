//! bill endpoints. Customer-facing ones are public; staff ones resolve the
//! bearer token first and leave role decisions to the policy table.

use std::time::Duration;

use actix_web::{get, patch, post, web, HttpRequest, Responder};
use log::{info, warn};
use tokio::time;
use uuid::Uuid;

use crate::server::auth;
use crate::server::controller::error::CustomError;
use crate::server::controller::DB_TIMEOUT_SECONDS;
use crate::server::model::bill::{
    AddConfirmedItemsRequest, AddPendingItemsParams, BillRangeFilter, BillStatus, CreatableOrders,
    GetManyBillsParams, OpenBillParams, OpenConfirmedBillRequest,
};
use crate::server::state::AppState;

// public endpoints

#[post("/v1/bills")]
/// open a pending bill on a table, customer self-ordering
pub(crate) async fn open_pending_bill(
    params: web::Query<OpenBillParams>,
    body: web::Json<CreatableOrders>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let bill = data
        .bills()
        .open_pending_one(params.restaurant_id, params.table_id, &body)
        .await?;
    Ok(web::Json(bill))
}

#[patch("/v1/bills/{billID}/items")]
/// add pending items to an open bill, grouped under the customer's name
pub(crate) async fn add_pending_bill_items(
    bill_id: web::Path<Uuid>,
    params: web::Query<AddPendingItemsParams>,
    body: web::Json<Vec<Uuid>>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let bill = data
        .bills()
        .add_many_pending_order_items(
            params.restaurant_id,
            bill_id.into_inner(),
            &params.customer_name,
            &body,
        )
        .await?;
    Ok(web::Json(bill))
}

#[get("/v1/bills/active")]
/// the open bill currently seated on a table, null when the table is free
pub(crate) async fn get_active_bill(
    params: web::Query<OpenBillParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let bill = data
        .bills()
        .get_active_for_table(params.restaurant_id, params.table_id)
        .await?;
    Ok(web::Json(bill))
}

// staff endpoints

#[post("/v1/bills/new")]
/// open an already-confirmed bill on a table from the roster
pub(crate) async fn open_confirmed_bill(
    req: HttpRequest,
    body: web::Json<OpenConfirmedBillRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data.bills().open_confirmed_one(&user, body.table_id).await?;
    Ok(web::Json(bill))
}

#[post("/v1/bills/instant")]
/// a counter sale settled on the spot, no table involved
pub(crate) async fn open_instant_bill(
    req: HttpRequest,
    body: web::Json<AddConfirmedItemsRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data
        .bills()
        .open_insta_one(&user, &body.customer_name, &body.menu_item_ids)
        .await?;
    Ok(web::Json(bill))
}

#[post("/v1/bills/{billID}/items")]
/// append items that skip the confirmation queue
pub(crate) async fn add_confirmed_bill_items(
    req: HttpRequest,
    bill_id: web::Path<Uuid>,
    body: web::Json<AddConfirmedItemsRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data
        .bills()
        .add_many_confirmed_order_items(
            &user,
            bill_id.into_inner(),
            &body.customer_name,
            &body.menu_item_ids,
        )
        .await?;
    Ok(web::Json(bill))
}

#[patch("/v1/bills/{billID}/confirm")]
pub(crate) async fn confirm_bill(
    req: HttpRequest,
    bill_id: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data.bills().confirm_one(&user, bill_id.into_inner()).await?;
    Ok(web::Json(bill))
}

#[patch("/v1/bills/{billID}/close")]
pub(crate) async fn close_bill(
    req: HttpRequest,
    bill_id: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data.bills().close_one(&user, bill_id.into_inner()).await?;
    info!("bill={} closed by user={}", bill.id, user.id);
    Ok(web::Json(bill))
}

#[patch("/v1/bills/{billID}/decline")]
pub(crate) async fn decline_bill(
    req: HttpRequest,
    bill_id: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data.bills().decline_one(&user, bill_id.into_inner()).await?;
    info!("bill={} declined by user={}", bill.id, user.id);
    Ok(web::Json(bill))
}

#[patch("/v1/bills/{billID}/confirm/items")]
pub(crate) async fn confirm_bill_items(
    req: HttpRequest,
    bill_id: web::Path<Uuid>,
    body: web::Json<Vec<Uuid>>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data
        .bills()
        .confirm_many_pending_order_items(&user, bill_id.into_inner(), &body)
        .await?;
    Ok(web::Json(bill))
}

#[patch("/v1/bills/{billID}/decline/items")]
pub(crate) async fn decline_bill_items(
    req: HttpRequest,
    bill_id: web::Path<Uuid>,
    body: web::Json<Vec<Uuid>>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data
        .bills()
        .decline_many_pending_order_items(&user, bill_id.into_inner(), &body)
        .await?;
    Ok(web::Json(bill))
}

#[patch("/v1/bills/{billID}/remove/items")]
pub(crate) async fn remove_bill_items(
    req: HttpRequest,
    bill_id: web::Path<Uuid>,
    body: web::Json<Vec<Uuid>>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let bill = data
        .bills()
        .remove_many_order_items(&user, bill_id.into_inner(), &body)
        .await?;
    Ok(web::Json(bill))
}

#[get("/v1/bills")]
/// bills of the caller's organization inside a date window, by status
pub(crate) async fn get_bills(
    req: HttpRequest,
    params: web::Query<GetManyBillsParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    let GetManyBillsParams {
        start_date,
        end_date,
        status_list,
    } = params.into_inner();
    let status_list = status_list
        .split(',')
        .map(|status| status.trim().parse::<BillStatus>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| CustomError::bad("Invalid data"))?;
    let filter = BillRangeFilter {
        start_date,
        end_date,
        status_list,
    };

    let sleep = time::sleep(Duration::from_secs(DB_TIMEOUT_SECONDS));
    tokio::pin!(sleep);
    let bills = data.bills();
    tokio::select! {
        result = bills.get_many_by_range(&user, &filter) => {
            result.map(web::Json)
        },
        _ = &mut sleep => {
            warn!("timeout listing bills for organization={}", user.organization_id);
            Err(CustomError::Timeout)
        }
    }
}
