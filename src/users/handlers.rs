use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::{
    state::AppState,
    users::{
        dto::{
            ApiRequest, CreateUserInput, Envelope, ErrorDetails, ListQuery,
            MissingFields, PaginationMeta, UpdateUserInput, UserListData, UserResponse,
        },
        errors::{FieldErrors, UserError},
    },
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api", get(api).post(api))
        .route("/api.php", get(api).post(api))
}

#[instrument(skip(state, query, body))]
pub async fn api(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> ApiReply {
    dispatch(&state, ApiRequest::new(query, &body)).await
}

/// Operation selected by the `action` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    View,
    Create,
    Update,
    Delete,
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(Action::List),
            "view" => Ok(Action::View),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(()),
        }
    }
}

/// Status plus JSON body of one API call.
#[derive(Debug)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiReply {
    fn new<T: Serialize>(status: StatusCode, envelope: Envelope<T>) -> Self {
        match serde_json::to_value(&envelope) {
            Ok(body) => Self { status, body },
            Err(e) => {
                error!(error = %e, "response serialization failed");
                Self::internal()
            }
        }
    }

    fn data<T: Serialize>(status: StatusCode, message: Option<&str>, data: T) -> Self {
        Self::new(
            status,
            Envelope {
                success: true,
                message: message.map(str::to_string),
                data: Some(data),
                errors: None,
            },
        )
    }

    fn message(status: StatusCode, success: bool, message: &str) -> Self {
        Self::new::<()>(
            status,
            Envelope {
                success,
                message: Some(message.to_string()),
                data: None,
                errors: None,
            },
        )
    }

    fn fail(status: StatusCode, message: &str) -> Self {
        Self::message(status, false, message)
    }

    fn fail_with(status: StatusCode, message: &str, details: ErrorDetails) -> Self {
        Self::new::<()>(
            status,
            Envelope {
                success: false,
                message: Some(message.to_string()),
                data: None,
                errors: Some(details),
            },
        )
    }

    fn missing(message: &str, missing: MissingFields) -> Self {
        Self::fail_with(
            StatusCode::BAD_REQUEST,
            message,
            ErrorDetails::Required {
                required_fields: missing.0,
            },
        )
    }

    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "success": false, "message": "internal error" }),
        }
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ActionResult = Result<ApiReply, anyhow::Error>;

/// Runs one API call. Failures outside the per-action error branches are
/// logged with an error id and collapsed into a generic 500.
pub async fn dispatch(state: &AppState, req: ApiRequest) -> ApiReply {
    let Some(raw_action) = req.param("action") else {
        return ApiReply::fail(StatusCode::BAD_REQUEST, "action not specified");
    };
    let Ok(action) = raw_action.parse::<Action>() else {
        warn!(action = %raw_action, "invalid action");
        return ApiReply::fail(StatusCode::BAD_REQUEST, "invalid action");
    };

    let result = match action {
        Action::List => list_users(state, &req).await,
        Action::View => view_user(state, &req).await,
        Action::Create => create_user(state, &req).await,
        Action::Update => update_user(state, &req).await,
        Action::Delete => delete_user(state, &req).await,
    };

    result.unwrap_or_else(|e| {
        let error_id = Uuid::new_v4();
        error!(
            %error_id,
            ?action,
            query = ?req.query,
            body = %serde_json::Value::Object(req.body.clone()),
            error = ?e,
            "unhandled api error"
        );
        ApiReply::internal()
    })
}

/// Parses the `id` parameter, or returns the 400 reply to send instead.
fn user_id(req: &ApiRequest) -> Result<i64, ApiReply> {
    let raw = req
        .param("id")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiReply::fail(StatusCode::BAD_REQUEST, "user id not specified"))?;
    parse_id(&raw)
}

fn parse_id(raw: &str) -> Result<i64, ApiReply> {
    raw.parse::<i64>()
        .map_err(|_| ApiReply::fail(StatusCode::BAD_REQUEST, "invalid user id"))
}

/// Loads a user for a success reply; a vanished row is a server-side fault.
async fn refetch(state: &AppState, id: i64) -> Result<UserResponse, anyhow::Error> {
    match state.users.find_by_id(id).await {
        Ok(Some(user)) => Ok(user.into()),
        Ok(None) => Err(anyhow::anyhow!("user {id} missing right after write")),
        Err(e) => Err(internal(e)),
    }
}

/// Repository errors that reach here have no structured reply.
fn internal(e: UserError) -> anyhow::Error {
    match e {
        UserError::Internal(e) => e,
        other => anyhow::Error::new(other),
    }
}

async fn list_users(state: &AppState, req: &ApiRequest) -> ActionResult {
    let Some(q) = ListQuery::from_request(req, state.config.default_page_size) else {
        return Ok(ApiReply::fail(
            StatusCode::BAD_REQUEST,
            "invalid pagination parameters",
        ));
    };
    debug!(page = q.page, page_size = q.page_size, search = %q.search, "list users");

    let users = state
        .users
        .search(&q.search, q.page, q.page_size)
        .await
        .map_err(internal)?;
    let total_pages = state
        .users
        .total_pages(q.page_size, &q.search)
        .await
        .map_err(internal)?;

    debug!(returned = users.len(), total_pages, "list users result");
    Ok(ApiReply::data(
        StatusCode::OK,
        None,
        UserListData {
            users: users.into_iter().map(UserResponse::from).collect(),
            pagination: PaginationMeta {
                page: q.page,
                total_pages,
                page_size: q.page_size,
            },
        },
    ))
}

async fn view_user(state: &AppState, req: &ApiRequest) -> ActionResult {
    let id = match user_id(req) {
        Ok(id) => id,
        Err(reply) => return Ok(reply),
    };
    match state.users.find_by_id(id).await.map_err(internal)? {
        Some(user) => Ok(ApiReply::data(StatusCode::OK, None, UserResponse::from(user))),
        None => Ok(ApiReply::fail(StatusCode::NOT_FOUND, "user not found")),
    }
}

async fn create_user(state: &AppState, req: &ApiRequest) -> ActionResult {
    let input = match CreateUserInput::from_request(req) {
        Ok(input) => input,
        Err(missing) => return Ok(ApiReply::missing("incomplete data", missing)),
    };

    match state.users.create(input.into()).await {
        Ok(id) => Ok(ApiReply::data(
            StatusCode::CREATED,
            Some("user created"),
            refetch(state, id).await?,
        )),
        Err(UserError::ValidationFailed(errors)) => Ok(ApiReply::fail_with(
            StatusCode::BAD_REQUEST,
            "could not create user",
            ErrorDetails::Fields(errors),
        )),
        // Existing email answers 200 with success=false, unlike the other failures.
        Err(UserError::DuplicateEmail) => Ok(ApiReply::message(
            StatusCode::OK,
            false,
            "email already registered",
        )),
        Err(e) => Err(internal(e)),
    }
}

async fn update_user(state: &AppState, req: &ApiRequest) -> ActionResult {
    let input = match UpdateUserInput::from_request(req) {
        Ok(input) => input,
        Err(missing) => return Ok(ApiReply::missing("missing required fields", missing)),
    };
    let id = match parse_id(&input.id) {
        Ok(id) => id,
        Err(reply) => return Ok(reply),
    };

    let failed = |errors: FieldErrors| {
        ApiReply::fail_with(
            StatusCode::BAD_REQUEST,
            "could not update user",
            ErrorDetails::Fields(errors),
        )
    };

    match state.users.update(id, input.into_record()).await {
        Ok(()) => Ok(ApiReply::data(
            StatusCode::OK,
            Some("user updated"),
            refetch(state, id).await?,
        )),
        Err(UserError::NotFound) => Ok(ApiReply::fail(StatusCode::NOT_FOUND, "user not found")),
        Err(UserError::ValidationFailed(errors)) => Ok(failed(errors)),
        Err(UserError::DuplicateEmail) => Ok(failed(FieldErrors::single(
            "email",
            "email already registered",
        ))),
        Err(UserError::UpdateFailed) => Ok(failed(FieldErrors::single(
            "update",
            "failed to update user",
        ))),
        Err(e) => Err(internal(e)),
    }
}

async fn delete_user(state: &AppState, req: &ApiRequest) -> ActionResult {
    let id = match user_id(req) {
        Ok(id) => id,
        Err(reply) => return Ok(reply),
    };
    if state.users.delete(id).await.map_err(internal)? {
        Ok(ApiReply::message(StatusCode::OK, true, "user deleted"))
    } else {
        Ok(ApiReply::fail(StatusCode::NOT_FOUND, "user not found"))
    }
}
