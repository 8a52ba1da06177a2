use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::auth::{AuthError, Authenticator, Principal};
use super::domain::{
    ApplicationId, EvidenceKind, EvidenceUploads, InstallationFacts, ValidationReport,
};
use super::evidence::EvidenceStore;
use super::repository::ApplicationRepository;
use super::service::{ApplicationService, ApplicationServiceError};

/// Shared handler state: the lifecycle service plus the credential validator.
pub struct ApplicationRouterState<R, E> {
    pub service: Arc<ApplicationService<R, E>>,
    pub authenticator: Arc<dyn Authenticator>,
}

impl<R, E> Clone for ApplicationRouterState<R, E> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            authenticator: Arc::clone(&self.authenticator),
        }
    }
}

/// Router builder exposing HTTP endpoints for intake and retrieval.
pub fn application_router<R, E>(state: ApplicationRouterState<R, E>) -> Router
where
    R: ApplicationRepository + 'static,
    E: EvidenceStore + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(submit_handler::<R, E>))
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<R, E>),
        )
        .route(
            "/api/v1/applications/:application_id/report",
            get(report_handler::<R, E>),
        )
        .with_state(state)
}

pub(crate) async fn submit_handler<R, E>(
    State(state): State<ApplicationRouterState<R, E>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EvidenceStore + 'static,
{
    let principal = match authenticate(state.authenticator.as_ref(), &headers).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let (facts, uploads) = match read_submission(multipart).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    match state.service.submit(&principal, facts, uploads).await {
        Ok(record) => {
            let payload = json!({
                "application_id": record.id,
                "message": "Application submitted successfully. Verification is running in the background.",
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn application_handler<R, E>(
    State(state): State<ApplicationRouterState<R, E>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EvidenceStore + 'static,
{
    let principal = match authenticate(state.authenticator.as_ref(), &headers).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let id = match parse_identifier(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.get_application(&principal, &id).await {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn report_handler<R, E>(
    State(state): State<ApplicationRouterState<R, E>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EvidenceStore + 'static,
{
    let principal = match authenticate(state.authenticator.as_ref(), &headers).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let id = match parse_identifier(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.get_report(&principal, &id).await {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn authenticate(
    authenticator: &dyn Authenticator,
    headers: &HeaderMap,
) -> Result<Principal, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Err(unauthorized(&AuthError::MissingCredentials));
    };

    authenticator
        .authenticate(token)
        .await
        .map_err(|error| unauthorized(&error))
}

fn unauthorized(error: &AuthError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
}

fn parse_identifier(raw: &str) -> Result<ApplicationId, Response> {
    ApplicationId::parse(raw).map_err(|_| {
        let payload = json!({ "error": "invalid application id format" });
        (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
    })
}

/// Reads the multipart submission into installation facts and evidence bytes.
///
/// Unknown or unparsable fields are collected into one aggregated validation
/// failure; range checks and evidence presence are the service's concern.
async fn read_submission(
    mut multipart: Multipart,
) -> Result<(InstallationFacts, EvidenceUploads), Response> {
    let mut address: Option<String> = None;
    let mut latitude: Option<String> = None;
    let mut longitude: Option<String> = None;
    let mut system_capacity_kw: Option<String> = None;
    let mut declared_panel_count: Option<String> = None;
    let mut uploads = EvidenceUploads::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => return Err(malformed_body(&error.to_string())),
        };

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let evidence_kind = EvidenceKind::ALL
            .into_iter()
            .find(|kind| kind.label() == name);

        if let Some(kind) = evidence_kind {
            match field.bytes().await {
                Ok(bytes) => uploads.set(kind, bytes.to_vec()),
                Err(error) => return Err(malformed_body(&error.to_string())),
            }
            continue;
        }

        let value = match field.text().await {
            Ok(value) => value,
            Err(error) => return Err(malformed_body(&error.to_string())),
        };

        match name.as_str() {
            "address" => address = Some(value),
            "latitude" => latitude = Some(value),
            "longitude" => longitude = Some(value),
            "system_capacity_kw" => system_capacity_kw = Some(value),
            "declared_panel_count" => declared_panel_count = Some(value),
            _ => {}
        }
    }

    let mut validation = ValidationReport::default();

    let address = address.unwrap_or_else(|| {
        validation.flag("address", "field is required");
        String::new()
    });
    let latitude = parse_number(&mut validation, "latitude", latitude.as_deref());
    let longitude = parse_number(&mut validation, "longitude", longitude.as_deref());
    let system_capacity_kw = parse_number(
        &mut validation,
        "system_capacity_kw",
        system_capacity_kw.as_deref(),
    );
    let declared_panel_count = parse_count(
        &mut validation,
        "declared_panel_count",
        declared_panel_count.as_deref(),
    );

    if let Err(error) = validation.finish() {
        return Err(error_response(ApplicationServiceError::Validation(error)));
    }

    Ok((
        InstallationFacts {
            address,
            latitude,
            longitude,
            system_capacity_kw,
            declared_panel_count,
        },
        uploads,
    ))
}

fn parse_number(validation: &mut ValidationReport, field: &str, raw: Option<&str>) -> f64 {
    match raw {
        None => {
            validation.flag(field, "field is required");
            0.0
        }
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                validation.flag(field, "must be a number");
                0.0
            }
        },
    }
}

fn parse_count(validation: &mut ValidationReport, field: &str, raw: Option<&str>) -> u32 {
    match raw {
        None => {
            validation.flag(field, "field is required");
            0
        }
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(value) => value,
            Err(_) => {
                validation.flag(field, "must be a positive integer");
                0
            }
        },
    }
}

fn malformed_body(detail: &str) -> Response {
    let payload = json!({ "error": format!("malformed multipart body: {detail}") });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn error_response(error: ApplicationServiceError) -> Response {
    match error {
        ApplicationServiceError::Validation(error) => {
            let payload = json!({
                "error": error.to_string(),
                "violations": error.violations,
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        ApplicationServiceError::NotFound => {
            let payload = json!({ "error": "application not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        ApplicationServiceError::ReportPending { status } => {
            let payload = json!({
                "error": "verification for this application is still in progress",
                "status": status.label(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
