use std::time::Duration;

use crate::{
    backend::BookingBackend, booking_manager::BookingManager, configuration::Configuration,
    configuration_handler::ConfigurationHandler, database_interface::DatabaseInterface,
    http::create_app, local_storage::LocalStorage,
};
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod booking_manager;
mod catalog;
mod configuration;
mod configuration_handler;
mod database_interface;
mod error;
mod http;
mod local_storage;
mod notifier;
mod schema;
mod slots;
#[cfg(test)]
mod testutils;
mod types;

#[derive(Clone)]
struct AppState<T: BookingBackend, C: Configuration> {
    booking_manager: BookingManager<T>,
    configuration: C,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("detailing_booking=info,tower_http=info")),
        )
        .init();

    println!("#####################");
    println!("# Detailing Booking #");
    println!("#####################");

    let configuration = ConfigurationHandler::parse_arguments();

    let address = format!("0.0.0.0:{}", configuration.port());
    println!("Accessible at:\n{address}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) => {
                    error!(?err, "Failed to establish database connection. Retry in 1 sec. You may want to restart without DATABASE_URL (bookings kept in memory).");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        };
        create_app(backend, configuration)
    } else {
        warn!("No database configured, bookings are lost on restart");
        create_app(LocalStorage::default(), configuration)
    };

    axum::serve(listener, app).await
}
