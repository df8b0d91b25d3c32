//! # API REST
//!
//! REST API implementation for the EMR drafting service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status mapping, API key checks)
//!
//! Uses `api-shared` for wire types and `emr-core` for all record logic. The concrete extraction
//! client is injected by the binary, so this crate never touches the network itself.

#![warn(rust_2018_idioms)]

use api_shared::{
    validate_api_key, EmrDraftReq, ErrorRes, EvidenceBlockDto, EvidenceItemDto, EvidenceLineDto,
    EvidenceReq, EvidenceRes, HealthRes, HealthService, MedicalEmrDto, ParseConversationReq,
    ParseConversationRes, RewriteReq, StatementDto, StatementSourceDto, StructuredRecordDto,
    TurnDto, API_KEY_HEADER,
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use emr_core::{
    parse_conversation, CoreConfig, EmrError, EmrResult, EvidenceId, EvidenceIdSet,
    EvidenceIndex, EvidenceLine, ExtractionClient, FailureClass, GenerationRequest, Language,
    LogSnapshot, MedicalRewriteEngine, Orchestrator, Statement, StatementSource,
    StructuredRecord,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorRes>)>;

/// Application state shared across REST handlers.
///
/// The orchestrator is absent when no extraction credentials were configured; the draft route
/// then answers with a server-misconfiguration error while the other routes keep working.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    orchestrator: Option<Arc<Orchestrator<Arc<dyn ExtractionClient>>>>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        cfg: CoreConfig,
        client: Option<Arc<dyn ExtractionClient>>,
        api_key: Option<String>,
    ) -> Self {
        let language = cfg.language();
        Self {
            cfg: Arc::new(cfg),
            orchestrator: client.map(|c| Arc::new(Orchestrator::new(c, language))),
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .map(Arc::from),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, parse, build_evidence, rewrite_emr, emr_draft),
    components(schemas(
        HealthRes,
        ErrorRes,
        ParseConversationReq,
        ParseConversationRes,
        TurnDto,
        EvidenceReq,
        EvidenceRes,
        StatementDto,
        StatementSourceDto,
        EvidenceBlockDto,
        RewriteReq,
        MedicalEmrDto,
        EmrDraftReq,
        EvidenceLineDto,
        EvidenceItemDto,
        StructuredRecordDto,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
///
/// When an API key is configured every route except `/health` and the docs requires a matching
/// `x-api-key` header.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/conversation/parse", post(parse))
        .route("/evidence", post(build_evidence))
        .route("/emr/rewrite", post(rewrite_emr))
        .route("/emr-draft", post(emr_draft))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = validate_api_key(provided, expected) {
            tracing::warn!(error = %e, path = %request.uri().path(), "rejected request");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorRes {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

/// Map a core failure to a status code and an opaque body.
fn error_response(err: EmrError) -> (StatusCode, Json<ErrorRes>) {
    let status = match err.class() {
        FailureClass::ClientError => {
            tracing::warn!(error = %err, "rejected request input");
            StatusCode::BAD_REQUEST
        }
        FailureClass::Misconfigured => {
            tracing::error!(error = %err, "service misconfigured");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        FailureClass::Upstream => {
            tracing::error!(error = ?err, "extraction failed");
            StatusCode::BAD_GATEWAY
        }
    };
    (
        status,
        Json(ErrorRes {
            error: err.public_message().into(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/conversation/parse",
    request_body = ParseConversationReq,
    responses(
        (status = 200, description = "Role-attributed turns", body = ParseConversationRes)
    )
)]
/// Split a role-marked transcript into turns. Unmarked text yields no turns.
#[axum::debug_handler]
async fn parse(
    State(_state): State<AppState>,
    Json(req): Json<ParseConversationReq>,
) -> Json<ParseConversationRes> {
    let turns = parse_conversation(&req.text);
    Json(ParseConversationRes {
        turns: turns.iter().map(TurnDto::from).collect(),
    })
}

#[utoipa::path(
    post,
    path = "/evidence",
    request_body = EvidenceReq,
    responses(
        (status = 200, description = "Indexed evidence blocks", body = EvidenceRes),
        (status = 400, description = "Blank statement or unsupported language", body = ErrorRes)
    )
)]
/// Index a statement log into citable evidence blocks.
#[axum::debug_handler]
async fn build_evidence(
    State(state): State<AppState>,
    Json(req): Json<EvidenceReq>,
) -> ApiResult<EvidenceRes> {
    index_statements(&state, req)
        .map(Json)
        .map_err(error_response)
}

fn index_statements(state: &AppState, req: EvidenceReq) -> EmrResult<EvidenceRes> {
    let language = match req.language.as_deref() {
        Some(value) => value.parse::<Language>()?,
        None => state.cfg.language(),
    };

    let statements = req
        .statements
        .into_iter()
        .map(|s| match StatementSource::from(s.source) {
            StatementSource::Image => Statement::image(&s.text),
            source => Statement::new(&s.text, source),
        })
        .collect::<EmrResult<Vec<_>>>()?;

    let index = EvidenceIndex::build(&LogSnapshot::from_statements(statements), language)?;
    Ok(EvidenceRes {
        blocks: index.blocks().iter().map(EvidenceBlockDto::from).collect(),
        valid_ids: index.valid_ids().iter().map(ToString::to_string).collect(),
    })
}

#[utoipa::path(
    post,
    path = "/emr/rewrite",
    request_body = RewriteReq,
    responses(
        (status = 200, description = "Deterministic draft", body = MedicalEmrDto),
        (status = 400, description = "Blank transcript", body = ErrorRes)
    )
)]
/// Rewrite a transcript into a draft record without calling any external service.
#[axum::debug_handler]
async fn rewrite_emr(
    State(_state): State<AppState>,
    Json(req): Json<RewriteReq>,
) -> ApiResult<MedicalEmrDto> {
    if req.text.trim().is_empty() {
        return Err(error_response(EmrError::InputMissing));
    }
    let emr = MedicalRewriteEngine::new().rewrite_transcript(&req.text);
    Ok(Json(emr.into()))
}

#[utoipa::path(
    post,
    path = "/emr-draft",
    request_body = EmrDraftReq,
    responses(
        (status = 200, description = "Validated structured record", body = StructuredRecordDto),
        (status = 400, description = "Missing conversation or malformed evidence id", body = ErrorRes),
        (status = 500, description = "Extraction service not configured", body = ErrorRes),
        (status = 502, description = "Extraction failed or returned an invalid record", body = ErrorRes)
    )
)]
/// Generate an evidence-linked structured record through the extraction service.
///
/// References to evidence ids that are not part of the request's evidence list are dropped.
#[axum::debug_handler]
async fn emr_draft(
    State(state): State<AppState>,
    Json(req): Json<EmrDraftReq>,
) -> ApiResult<StructuredRecordDto> {
    generate_draft(&state, req)
        .await
        .map(|record| Json(record.into()))
        .map_err(error_response)
}

async fn generate_draft(state: &AppState, req: EmrDraftReq) -> EmrResult<StructuredRecord> {
    let evidence = req
        .evidence
        .unwrap_or_default()
        .into_iter()
        .map(|line| {
            Ok(EvidenceLine {
                id: EvidenceId::parse(&line.id)?,
                text: line.text,
            })
        })
        .collect::<EmrResult<Vec<_>>>()?;

    let request = GenerationRequest::new(
        &req.conversation,
        req.history.as_deref().unwrap_or_default(),
        evidence,
    )?;
    let orchestrator = state
        .orchestrator
        .as_ref()
        .ok_or(EmrError::MissingCredentials)?;
    let valid_ids = EvidenceIdSet::from_lines(request.evidence());

    let timeout = state.cfg.extraction().timeout();
    tokio::time::timeout(
        timeout,
        orchestrator.generate_structured(&request, &valid_ids),
    )
    .await
    .map_err(|_| {
        EmrError::UpstreamUnavailable(format!("no response within {}s", timeout.as_secs()))
    })?
}
