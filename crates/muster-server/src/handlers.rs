//! API request handlers for the registry.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use muster_auth::{issue_token, verify_password, AuthError};
use muster_store::{Client, ClientUpdate, NewImage, StoreError, VmImage};

use crate::auth::AuthUser;
use crate::AppState;

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Structured failure body; never a stack trace.
        let body = serde_json::json!({
            "message": self.message,
            "data": null,
            "error": self.status.canonical_reason().unwrap_or("Error"),
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => ApiError::bad_request(format!("Already registered: {}", what)),
            StoreError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            other => {
                tracing::error!(error = %other, "store operation failed");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken(_) => {
                warn!(error = %err, "rejected credential");
                ApiError::unauthorized("Invalid auth token")
            }
            other => {
                tracing::error!(error = %other, "credential operation failed");
                ApiError::internal("Internal server error")
            }
        }
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login: the resolved user minus its password hash, plus the
/// issued bearer token.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

/// Request to register a new client
#[derive(Debug, Deserialize)]
pub struct RegisterClientRequest {
    pub mac_address: String,
    pub ip_address: String,
    pub hostname: String,
    pub client_version: String,
    /// Ids of the VM images installed on the machine.
    #[serde(default)]
    pub vm_list_on_machine: Vec<i64>,
}

/// Request to update an existing client, addressed by MAC
#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub mac_address: String,
    pub ip_address: String,
    pub hostname: String,
    pub client_version: String,
    /// When present, the installed-image association is reset to this list;
    /// when absent it is left untouched.
    #[serde(default)]
    pub vm_list_on_machine: Option<Vec<i64>>,
}

/// Request to register a new VM image
#[derive(Debug, Deserialize)]
pub struct AddImageRequest {
    pub image_name: String,
    pub image_file: String,
    pub image_version: String,
    pub image_hash: String,
}

/// Request to modify an existing VM image, keyed on id
#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    pub image_id: i64,
    pub image_name: String,
    pub image_file: String,
    pub image_version: String,
    pub image_hash: String,
}

/// Response from the simple create endpoints
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub message: String,
}

/// Flat client field map returned by the query endpoints
#[derive(Debug, Serialize)]
pub struct ClientPayload {
    pub mac_address: String,
    pub ip_address: String,
    pub hostname: String,
    pub client_version: String,
    pub vm_list_on_machine: Vec<i64>,
}

impl From<Client> for ClientPayload {
    fn from(client: Client) -> Self {
        Self {
            mac_address: client.mac_address,
            ip_address: client.ip_address,
            hostname: client.hostname,
            client_version: client.client_version,
            vm_list_on_machine: client.images,
        }
    }
}

/// Echo response from the update endpoints
#[derive(Debug, Serialize)]
pub struct UpdateResponse<T> {
    pub message: String,
    pub data: T,
    pub error: Option<String>,
}

/// Filters for listing clients
#[derive(Debug, Deserialize)]
pub struct ListClientsQuery {
    pub client_version: Option<String>,
    pub image_hash: Option<String>,
}

/// Filters for listing images
#[derive(Debug, Deserialize)]
pub struct ListImagesQuery {
    pub name: Option<String>,
    pub hash: Option<String>,
}

/// Server identity endpoint
pub async fn server_info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "server_name": state.config.server_name,
        "server_version": env!("CARGO_PKG_VERSION"),
        "host": state.config.host,
    }))
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "muster-server"
    }))
}

/// Exchange username/password for a bearer token
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    info!("Login attempt for user: {}", payload.username);

    let user = {
        let db = state.db.lock().await;
        db.get_user_by_name(&payload.username)?
    };

    let user = user.ok_or_else(|| ApiError::bad_request("Unknown user"))?;

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(username = %user.username, "login rejected: bad password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(&user.username, &state.config.token_secret)?;

    info!(username = %user.username, "login accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(LoginResponse {
            user_id: user.user_id,
            username: user.username,
            token,
        }),
    ))
}

/// Register a new client
pub async fn register_client_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<RegisterClientRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    info!(by = %user.username, "Registering client: {}", payload.mac_address);

    let client = Client {
        mac_address: payload.mac_address.clone(),
        ip_address: payload.ip_address,
        hostname: payload.hostname,
        client_version: payload.client_version,
        images: payload.vm_list_on_machine,
    };

    let mut db = state.db.lock().await;
    db.add_client(&client)?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            message: format!("Client registered: {}", payload.mac_address),
        }),
    ))
}

/// Update an existing client's data
pub async fn update_client_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateClientRequest>,
) -> Result<(StatusCode, Json<UpdateResponse<ClientPayload>>), ApiError> {
    info!(by = %user.username, "Updating client: {}", payload.mac_address);

    let update = ClientUpdate {
        mac_address: payload.mac_address,
        ip_address: payload.ip_address,
        hostname: payload.hostname,
        client_version: payload.client_version,
        images: payload.vm_list_on_machine,
    };

    let mut db = state.db.lock().await;
    let client = db.update_client(&update)?;

    Ok((
        StatusCode::CREATED,
        Json(UpdateResponse {
            message: format!("Client updated: {}", client.mac_address),
            data: client.into(),
            error: None,
        }),
    ))
}

/// Get one client by MAC address
pub async fn get_client_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(mac_address): Path<String>,
) -> Result<Json<ClientPayload>, ApiError> {
    let db = state.db.lock().await;
    let client = db.get_client(&mac_address)?;

    match client {
        Some(client) => Ok(Json(client.into())),
        None => Err(ApiError::not_found(format!(
            "Client not found: {}",
            mac_address
        ))),
    }
}

/// Get the ids of the VM images installed on a client
pub async fn get_client_vms_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(mac_address): Path<String>,
) -> Result<Json<Vec<i64>>, ApiError> {
    let db = state.db.lock().await;

    match db.get_client(&mac_address)? {
        Some(client) => Ok(Json(client.images)),
        None => Err(ApiError::not_found(format!(
            "Client not found: {}",
            mac_address
        ))),
    }
}

/// List clients, optionally filtered by software version or installed-image
/// content hash
pub async fn list_clients_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<Vec<ClientPayload>>, ApiError> {
    let db = state.db.lock().await;

    let clients = if let Some(hash) = &query.image_hash {
        db.list_clients_with_image(hash)?
    } else if let Some(version) = &query.client_version {
        db.list_clients_by_version(version)?
    } else {
        db.list_clients()?
    };

    Ok(Json(clients.into_iter().map(Into::into).collect()))
}

/// Register a new VM image
pub async fn add_image_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<AddImageRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let image = NewImage {
        image_name: payload.image_name,
        image_file: payload.image_file,
        image_version: payload.image_version,
        image_hash: payload.image_hash,
    };

    info!(by = %user.username, "Registering image: {}", image.tag());

    let mut db = state.db.lock().await;
    let image = db.add_image(&image)?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            message: format!("Image registered: {} (id {})", image.tag(), image.image_id),
        }),
    ))
}

/// Modify an existing VM image, keyed on id
pub async fn update_image_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateImageRequest>,
) -> Result<(StatusCode, Json<UpdateResponse<VmImage>>), ApiError> {
    info!(by = %user.username, "Updating image: {}", payload.image_id);

    let image = VmImage {
        image_id: payload.image_id,
        image_name: payload.image_name,
        image_file: payload.image_file,
        image_version: payload.image_version,
        image_hash: payload.image_hash,
    };

    let mut db = state.db.lock().await;
    let image = db.update_image(&image)?;

    Ok((
        StatusCode::CREATED,
        Json(UpdateResponse {
            message: format!("Image updated: {}", image.tag()),
            data: image,
            error: None,
        }),
    ))
}

/// Get one image by id
pub async fn get_image_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(image_id): Path<i64>,
) -> Result<Json<VmImage>, ApiError> {
    let db = state.db.lock().await;

    match db.get_image(image_id)? {
        Some(image) => Ok(Json(image)),
        None => Err(ApiError::not_found(format!("Image not found: {}", image_id))),
    }
}

/// List images, optionally filtered by name or content hash
pub async fn list_images_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ListImagesQuery>,
) -> Result<Json<Vec<VmImage>>, ApiError> {
    let db = state.db.lock().await;

    let images = if let Some(name) = &query.name {
        db.find_images_by_name(name)?
    } else if let Some(hash) = &query.hash {
        db.find_images_by_hash(hash)?
    } else {
        db.list_images()?
    };

    Ok(Json(images))
}
