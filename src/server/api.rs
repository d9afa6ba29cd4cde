use std::error::Error;
use std::path::PathBuf;
use axum::{
    routing::post,
    Router,
    Json,
    extract::{ State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::{ header, HeaderValue, Method, StatusCode },
};
use serde_json::Value;
use tower_http::cors::{ AllowOrigin, Any, CorsLayer };
use tower_http::services::ServeDir;
use log::{ info, warn };

use crate::error::RelayError;
use crate::models::chat::RelayResponse;
use crate::relay::Relay;

#[derive(Clone)]
struct AppState {
    relay: Relay,
}

/// HTTP surface of the relay.
#[derive(Debug, Clone)]
pub struct ApiOptions {
    /// Allowed CORS origin; `*` allows any.
    pub cors_origin: String,
    /// Directory served at `/` for the chat page, if any.
    pub public_dir: Option<PathBuf>,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            cors_origin: "*".to_string(),
            public_dir: None,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamOverloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::UpstreamOther(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(RelayResponse::Failure { error: self.to_string() })).into_response()
    }
}

fn cors_layer(origin: &str) -> Result<CorsLayer, Box<dyn Error + Send + Sync>> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        let value = HeaderValue::from_str(origin.trim()).map_err(|e|
            format!("Invalid CORS origin '{}': {}", origin, e)
        )?;
        AllowOrigin::exact(value)
    };

    Ok(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    )
}

pub fn router(relay: Relay, options: &ApiOptions) -> Result<Router, Box<dyn Error + Send + Sync>> {
    let cors = cors_layer(&options.cors_origin)?;

    let mut app = Router::new()
        .route("/api/chat", post(chat_handler))
        .with_state(AppState { relay });

    if let Some(dir) = &options.public_dir {
        info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    Ok(app.layer(cors))
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("Unreadable chat request body: {}", rejection.body_text());
            return RelayError::Validation(rejection.body_text()).into_response();
        }
    };

    match state.relay.forward(&body).await {
        Ok(result) => (StatusCode::OK, Json(RelayResponse::Success { result })).into_response(),
        Err(e) => e.into_response(),
    }
}
