use std::path::PathBuf;

use axum::body::{to_bytes, Body};
use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_template::engine::Engine;
use axum_template::RenderHtml;
use derive_new::new;
use serde::Deserialize;
use snafu::{Location, ResultExt, Snafu};
use tera::Tera;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::counter::{Counter, CounterError};
use crate::error::{ApplicationError, BindAddressSnafu, LoadTemplatesSnafu, WebServerSnafu};
use crate::widget::{self, Widget, UNAVAILABLE, UNKNOWN};

/// Documentation pages larger than this are served without the widget.
const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, new)]
pub struct App {
    pub engine: Engine<Tera>,
    pub counter: Counter,
    pub docs_dir: PathBuf,
}

impl App {
    pub fn from_config(config: &Config, counter: Counter) -> Result<App, ApplicationError> {
        let engine = Engine::from(widget::templates().context(LoadTemplatesSnafu)?);
        Ok(App::new(engine, counter, config.docs_dir.clone()))
    }

    /// Builds the footer widget for one page load: both placeholders start
    /// out loading, then either get the numbers or the fixed fallback token.
    pub async fn widget(&self, path: &str) -> Widget {
        let mut footer = Widget::new();

        match self.counter.counts(path).await {
            Ok(counts) => footer.set_counts(counts),
            Err(err) if err.is_unavailable_dependency() => {
                tracing::warn!(path, "counting script never reported");
                footer.degrade(UNKNOWN);
            }
            Err(err) => {
                tracing::error!(%err, path, "failed to resolve view counts");
                footer.degrade(UNAVAILABLE);
            }
        }

        footer
    }
}

pub async fn serve(config: Config, counter: Counter) -> Result<(), ApplicationError> {
    let app = App::from_config(&config, counter)?;
    let router = create_router(app);

    let listener = tokio::net::TcpListener::bind(config.host)
        .await
        .context(BindAddressSnafu {
            address: config.host,
        })?;

    tracing::info!(address = %config.host, "serving documentation site");
    axum::serve(listener, router).await.context(WebServerSnafu)
}

pub fn create_router(app: App) -> Router {
    let docs = Router::new()
        .fallback_service(ServeDir::new(&app.docs_dir))
        .layer(middleware::from_fn_with_state(app.clone(), attach_widget));

    Router::new()
        .route("/widget", get(widget_fragment))
        .route("/counts", get(counts))
        .route("/counters", post(publish_counters))
        .fallback_service(docs)
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

#[derive(Debug, Snafu)]
enum ApiError {
    #[snafu(display("failed to resolve view counts: {source}"))]
    FetchCounts {
        source: CounterError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "root_path")]
    path: String,
}

fn root_path() -> String {
    "/".to_string()
}

/// The populated widget fragment, for sites that embed it themselves.
async fn widget_fragment(
    State(app): State<App>, Query(query): Query<PageQuery>,
) -> impl IntoResponse {
    let footer = app.widget(&query.path).await;
    RenderHtml(widget::TEMPLATE, app.engine.clone(), footer)
}

/// Raw numbers for embedders that render their own markup.
async fn counts(
    State(app): State<App>, Query(query): Query<PageQuery>,
) -> Result<Json<crate::model::Counts>, ApiError> {
    let counts = app
        .counter
        .counts(&query.path)
        .await
        .context(FetchCountsSnafu)?;

    Ok(Json(counts))
}

/// Ingest endpoint the third-party counting script publishes through. Only
/// exists in script mode; backend deployments don't accept pushed counters.
async fn publish_counters(
    State(app): State<App>, Json(counts): Json<crate::counter::script::ScriptCounts>,
) -> StatusCode {
    match &app.counter {
        Counter::Script(script) => {
            tracing::debug!(site = counts.site.pv, page = counts.page.pv, "script reported");
            script.counters().publish(counts);
            StatusCode::NO_CONTENT
        }
        Counter::Backend(_) => StatusCode::NOT_FOUND,
    }
}

/// Injects the populated widget as the last child of every served
/// documentation page. Assets and failed responses pass through untouched.
async fn attach_widget(State(app): State<App>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if method != Method::GET || !response.status().is_success() || !is_html(response.headers()) {
        return response;
    }

    if oversized(response.headers()) {
        tracing::warn!(%path, "documentation page too large for widget injection");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_PAGE_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(%err, %path, "failed to buffer documentation page");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let page = String::from_utf8_lossy(&bytes);

    let footer = app.widget(&path).await;
    let html = match footer.render(&app.engine) {
        Ok(fragment) => widget::attach(&page, &fragment),
        Err(err) => {
            // The page must survive a broken widget.
            tracing::error!(%err, "failed to render the view counter widget");
            page.into_owned()
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

fn oversized(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        .is_some_and(|length| length > MAX_PAGE_BYTES)
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"))
}
