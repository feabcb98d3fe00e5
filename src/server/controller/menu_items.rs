use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

use crate::server::auth;
use crate::server::controller::error::CustomError;
use crate::server::model::menu_item::{CreatableMenuItem, ListMenuItemsParams, UpdatableMenuItem};
use crate::server::model::user::{LoggedUser, Role};
use crate::server::repository::MenuItemsStore;
use crate::server::state::AppState;

#[get("/v1/menu-items")]
/// everything currently orderable in a restaurant, for the customer menu
pub(crate) async fn get_menu_items(
    params: web::Query<ListMenuItemsParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let items = data
        .store()
        .list_active_in_restaurant(params.restaurant_id)
        .await?;
    Ok(web::Json(items))
}

#[post("/v1/menu-items")]
pub(crate) async fn create_menu_items(
    req: HttpRequest,
    body: web::Json<Vec<CreatableMenuItem>>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = admin(&req, &data).await?;
    if body.is_empty() {
        return Err(CustomError::bad("No items provided"));
    }
    let items = data.store().create_many(user.organization_id, &body).await?;
    Ok(web::Json(items))
}

#[patch("/v1/menu-items/{id}")]
pub(crate) async fn update_menu_item(
    req: HttpRequest,
    item_id: web::Path<Uuid>,
    body: web::Json<UpdatableMenuItem>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = admin(&req, &data).await?;
    let item = data
        .store()
        .update_one(user.organization_id, item_id.into_inner(), &body)
        .await?;
    Ok(web::Json(item))
}

#[delete("/v1/menu-items/{id}")]
/// takes the item off its menu; history referencing it stays intact
pub(crate) async fn delete_menu_item(
    req: HttpRequest,
    item_id: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = admin(&req, &data).await?;
    data.store()
        .detach_one(user.organization_id, item_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok())
}

async fn admin(req: &HttpRequest, data: &web::Data<AppState>) -> Result<LoggedUser, CustomError> {
    let user = auth::logged_user(req, data.store()).await?;
    if user.role != Role::Admin {
        return Err(CustomError::forbidden(
            "You do not have permission to manage menu items",
        ));
    }
    Ok(user)
}
