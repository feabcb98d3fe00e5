//! main file for the server

pub(crate) mod auth;
pub(crate) mod controller;
pub(crate) mod database;
pub(crate) mod model;
pub(crate) mod policy;
pub(crate) mod repository;
pub(crate) mod service;
pub(crate) mod state;
pub(crate) mod util;

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;

use crate::server::database::pool::Pool;
use crate::server::model::config::ServerConfig;
use crate::server::repository::PgStore;
use crate::server::state::AppState;

/// Run the server
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let read_pool = Pool::new("db-read");
    read_pool
        .init(&config.db_read_conn_str)
        .await
        .map_err(std::io::Error::other)?;
    let write_pool = Pool::new("db-write");
    write_pool
        .init(&config.db_write_conn_str)
        .await
        .map_err(std::io::Error::other)?;
    let state = AppState::new(PgStore::new(read_pool, write_pool));
    info!("connection pools are ready, listening on {}", config.addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .service(controller::bills::open_pending_bill)
            .service(controller::bills::add_pending_bill_items)
            .service(controller::bills::get_active_bill)
            .service(controller::bills::open_confirmed_bill)
            .service(controller::bills::open_instant_bill)
            .service(controller::bills::add_confirmed_bill_items)
            .service(controller::bills::confirm_bill)
            .service(controller::bills::close_bill)
            .service(controller::bills::decline_bill)
            .service(controller::bills::confirm_bill_items)
            .service(controller::bills::decline_bill_items)
            .service(controller::bills::remove_bill_items)
            .service(controller::bills::get_bills)
            .service(controller::restaurants::get_restaurant)
            .service(controller::restaurants::update_my_restaurant)
            .service(controller::menu_items::get_menu_items)
            .service(controller::menu_items::create_menu_items)
            .service(controller::menu_items::update_menu_item)
            .service(controller::menu_items::delete_menu_item)
    })
    .bind(config.addr)?
    .run()
    .await
}
