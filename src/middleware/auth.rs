use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// Verifies the bearer credential against the identity bridge and stores
/// the resolved `Identity` in request extensions for the handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    // Bridge failures on the HTTP path surface as Unauthorized.
    let identity = state
        .bridge
        .authenticate(token)
        .await
        .map_err(|e| match e {
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "identity bridge unavailable");
                AppError::Unauthorized
            }
            other => other,
        })?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
