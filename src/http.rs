use crate::{
    backend::BookingBackend,
    booking_manager::BookingManager,
    catalog::{ADDONS, SERVICES},
    configuration::Configuration,
    error::AppError,
    notifier::notifier_for,
    slots::Slot,
    types::{Availability, Booking, BookingStats, BookingUpdate, NewBooking},
    AppState,
};
use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_valid::Valid;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::fs;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

pub const ADMIN_HEADER: &str = "x-admin-password";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotQuery {
    service_type: Option<String>,
    exclude_booking_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    #[serde(default)]
    include_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsQuery {
    date: NaiveDate,
    service_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DayBlockRequest {
    date: NaiveDate,
    reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DayRequest {
    date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotBlockRequest {
    date: NaiveDate,
    slot: Slot,
    reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotRequest {
    date: NaiveDate,
    slot: Slot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequest {
    service_type: String,
    #[serde(default)]
    addons: Vec<String>,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn cors_layer(origin: Option<String>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(|origin| origin.parse::<HeaderValue>()) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(err)) => {
            warn!(%err, "Invalid CORS origin, allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

pub fn create_app<T: BookingBackend, C: Configuration>(backend: T, configuration: C) -> Router {
    let cors = cors_layer(configuration.cors_origin());
    let notifier = notifier_for(configuration.mail_settings());
    let state = AppState {
        booking_manager: BookingManager::new(backend, notifier),
        configuration,
    };

    let public = Router::new()
        .route("/", get(get_frontend::<T, C>))
        .route("/api/services", get(get_services))
        .route("/api/quote", post(quote::<T, C>))
        .route(
            "/api/availability/slots/{date}",
            get(available_slots::<T, C>),
        )
        .route("/api/bookings", post(create_booking::<T, C>))
        .route(
            "/api/bookings/{id}",
            get(get_booking::<T, C>).delete(cancel_booking::<T, C>),
        );

    let admin = Router::new()
        .route("/api/admin/me", get(admin_me))
        .route("/api/admin/stats", get(stats::<T, C>))
        .route("/api/admin/bookings", get(list_bookings::<T, C>))
        .route(
            "/api/admin/bookings/cleanup",
            delete(cleanup_bookings::<T, C>),
        )
        .route("/api/admin/bookings/{id}", put(update_booking::<T, C>))
        .route("/api/admin/bookings/{id}/hide", put(hide_booking::<T, C>))
        .route(
            "/api/admin/bookings/{id}/cancel",
            post(admin_cancel_booking::<T, C>),
        )
        .route(
            "/api/admin/bookings/{id}/slot-options",
            get(slot_options::<T, C>),
        )
        .route("/api/availability/{date}", get(day_availability::<T, C>))
        .route("/api/availability/block-day", post(block_day::<T, C>))
        .route("/api/availability/unblock-day", post(unblock_day::<T, C>))
        .route("/api/availability/block-slot", post(block_slot::<T, C>))
        .route(
            "/api/availability/unblock-slot",
            post(unblock_slot::<T, C>),
        )
        .route(
            "/api/availability/booking-details/{date}/{slot}",
            get(booking_details::<T, C>),
        )
        .route(
            "/api/availability/current-slots/{id}",
            get(current_slots::<T, C>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<T, C>,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn admin_auth<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(auth_header) = request.headers().get(ADMIN_HEADER) else {
        return Err(AppError::Unauthorized("Missing credentials"));
    };
    let authorized = matches!(
        auth_header.to_str(),
        Ok(password) if password == state.configuration.admin_password()
    );
    if !authorized {
        warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(AppError::Unauthorized("Unauthorized"));
    }
    Ok(next.run(request).await)
}

async fn get_frontend<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<Html<String>, AppError> {
    let contents = fs::read_to_string(state.configuration.frontend_path()).await?;
    Ok(Html(contents))
}

async fn get_services() -> Json<Value> {
    Json(json!({ "services": SERVICES, "addons": ADDONS }))
}

async fn quote<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Value>, AppError> {
    let total = state
        .booking_manager
        .quote(&request.service_type, &request.addons)?;
    Ok(Json(json!({ "totalCents": total })))
}

async fn available_slots<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state.booking_manager.start_slots(
        date,
        query.service_type.as_deref(),
        query.exclude_booking_id,
    )?;
    Ok(Json(json!({ "availableSlots": slots })))
}

async fn create_booking<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Valid(Json(request)): Valid<Json<NewBooking>>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.booking_manager.create_booking(request, now())?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "bookingId": booking.booking_id })),
    ))
}

async fn get_booking<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.booking_manager.booking(id)?))
}

async fn cancel_booking<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.booking_manager.cancel_by_customer(id)?))
}

async fn admin_me() -> Json<Value> {
    Json(json!({ "admin": true }))
}

async fn stats<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<Json<BookingStats>, AppError> {
    Ok(Json(state.booking_manager.stats(now())?))
}

async fn list_bookings<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(
        state
            .booking_manager
            .bookings(query.include_hidden, now())?,
    ))
}

async fn update_booking<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
    Valid(Json(update)): Valid<Json<BookingUpdate>>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.booking_manager.update_booking(id, update)?))
}

async fn hide_booking<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.booking_manager.hide_booking(id)?;
    Ok(Json(json!({ "message": "Booking hidden" })))
}

async fn admin_cancel_booking<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.booking_manager.cancel_by_admin(id)?))
}

async fn cleanup_bookings<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<Json<Value>, AppError> {
    let hidden = state.booking_manager.cleanup_bookings()?;
    Ok(Json(json!({ "hiddenCount": hidden })))
}

async fn slot_options<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
    Query(query): Query<OptionsQuery>,
) -> Result<Json<Value>, AppError> {
    let options = state.booking_manager.edit_slot_options(
        id,
        query.date,
        query.service_type.as_deref(),
    )?;
    Ok(Json(json!({ "options": options })))
}

async fn day_availability<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<Vec<Availability>>, AppError> {
    Ok(Json(state.booking_manager.day_availability(date)?))
}

async fn block_day<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<DayBlockRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .booking_manager
        .block_day(request.date, request.reason)?;
    Ok(Json(json!({ "message": "Day blocked" })))
}

async fn unblock_day<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<DayRequest>,
) -> Result<Json<Value>, AppError> {
    state.booking_manager.unblock_day(request.date)?;
    Ok(Json(json!({ "message": "Day unblocked" })))
}

async fn block_slot<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<SlotBlockRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .booking_manager
        .block_slot(request.date, request.slot, request.reason)?;
    Ok(Json(json!({ "message": "Slot blocked" })))
}

async fn unblock_slot<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<SlotRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .booking_manager
        .unblock_slot(request.date, request.slot)?;
    Ok(Json(json!({ "message": "Slot unblocked" })))
}

async fn booking_details<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path((date, slot)): Path<(NaiveDate, Slot)>,
) -> Result<Json<Value>, AppError> {
    let details = state.booking_manager.booking_details(date, slot)?;
    Ok(Json(json!({ "booking": details })))
}

async fn current_slots<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slots = state.booking_manager.current_slots(id)?;
    Ok(Json(json!({ "currentSlots": slots })))
}
