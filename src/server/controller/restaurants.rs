use actix_web::{get, patch, web, HttpRequest, Responder};
use uuid::Uuid;

use crate::server::auth;
use crate::server::controller::error::CustomError;
use crate::server::model::restaurant::UpdatableRestaurant;
use crate::server::model::user::Role;
use crate::server::repository::RestaurantsStore;
use crate::server::state::AppState;

#[get("/v1/restaurants/{restaurantID}")]
/// public restaurant page: profile plus its tables
pub(crate) async fn get_restaurant(
    restaurant_id: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let restaurant = data
        .store()
        .find_by_id(restaurant_id.into_inner())
        .await?
        .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
    Ok(web::Json(restaurant))
}

#[patch("/v1/restaurants/my")]
/// update the caller's restaurant profile, service fee included
pub(crate) async fn update_my_restaurant(
    req: HttpRequest,
    body: web::Json<UpdatableRestaurant>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let user = auth::logged_user(&req, data.store()).await?;
    if user.role != Role::Admin {
        return Err(CustomError::forbidden(
            "You do not have permission to update the restaurant",
        ));
    }
    let restaurant = data
        .store()
        .update_for_organization(user.organization_id, &body)
        .await?;
    Ok(web::Json(restaurant))
}
