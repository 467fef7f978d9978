pub mod config;
pub mod processing;
pub mod state;
pub mod templates;

use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use processing::types::{parse_lap_distances, parse_utc_offset};
use processing::{ConversionOptions, FitProcessError, TimestampZone, convert_fit_bytes};
use state::{AppState, StoredDocument};
use templates::{render_converted, render_landing_page};
use uuid::Uuid;

const TCX_CONTENT_TYPE: &str = "application/vnd.garmin.tcx+xml";

pub fn build_app() -> Router {
    build_app_with_state(AppState::new())
}

pub fn build_app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/upload", post(handle_upload))
        .route("/download/:id", get(download))
        .with_state(state)
}

async fn landing_page() -> Html<String> {
    Html(render_landing_page())
}

/// Form fields of an upload besides the file itself.
#[derive(Default)]
struct UploadForm {
    options: ConversionOptions,
    local_timezone: bool,
    timezone_offset: Option<String>,
}

impl UploadForm {
    fn apply(&mut self, name: &str, value: &str) -> Result<(), FitProcessError> {
        let checked = value == "true" || value == "on";
        match name {
            "recalculate_distance" => self.options.recalculate_distance = checked,
            "recalculate_speed" => self.options.recalculate_speed = checked,
            "calibrate" => self.options.calibrate = checked,
            "per_lap_calibration" => self.options.per_lap_calibration = checked,
            "local_timezone" => self.local_timezone = checked,
            "manual_lap_distances" => self.options.manual_lap_distances = parse_lap_distances(value)?,
            "calibration_factor" if !value.trim().is_empty() => {
                let factor = value.trim().parse::<f64>().map_err(|_| {
                    FitProcessError::InvalidOptions(format!("invalid calibration factor '{value}'"))
                })?;
                self.options.calibration_factor = Some(factor);
            }
            "timezone_offset" if !value.trim().is_empty() => {
                self.timezone_offset = Some(value.trim().to_string());
            }
            _ => {}
        }
        Ok(())
    }

    fn into_options(self) -> Result<ConversionOptions, FitProcessError> {
        let mut options = self.options;
        options.timezone = match (self.timezone_offset, self.local_timezone) {
            (Some(offset), _) => TimestampZone::Offset(parse_utc_offset(&offset)?),
            (None, true) => TimestampZone::LocalAuto,
            (None, false) => TimestampZone::Utc,
        };
        Ok(options)
    }
}

async fn handle_upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut uploaded: Option<(Option<String>, Vec<u8>)> = None;
    let mut form = UploadForm::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            let file_name = field.file_name().map(str::to_string);
            match field.bytes().await {
                Ok(bytes) => uploaded = Some((file_name, bytes.to_vec())),
                Err(err) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read uploaded file: {err}"),
                    )
                        .into_response();
                }
            }
            continue;
        }

        if let Ok(value) = field.text().await {
            if let Err(err) = form.apply(&name, &value) {
                return render_processing_error(err);
            }
        }
    }

    let Some((file_name, file_bytes)) = uploaded else {
        return (StatusCode::BAD_REQUEST, "No file provided").into_response();
    };
    let options = match form.into_options() {
        Ok(options) => options,
        Err(err) => return render_processing_error(err),
    };

    match convert_fit_bytes(&file_bytes, &options) {
        Ok(converted) => {
            let id = Uuid::new_v4().to_string();
            let file_name = tcx_file_name(file_name.as_deref());
            tracing::info!(%id, %file_name, laps = converted.laps.len(), "stored converted document");
            let html = render_converted(&converted, &format!("/download/{id}"));
            state.insert(
                id,
                StoredDocument {
                    file_name,
                    bytes: converted.tcx_bytes,
                },
            );
            Html(html).into_response()
        }
        Err(err) => render_processing_error(err),
    }
}

async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.get(&id) {
        Some(document) => (
            [
                (header::CONTENT_TYPE, TCX_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", document.file_name),
                ),
            ],
            document.bytes,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Document not found or expired").into_response(),
    }
}

/// Name of the uploaded file with a `.tcx` extension, restricted to safe characters.
fn tcx_file_name(uploaded: Option<&str>) -> String {
    let stem = uploaded
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name))
        .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem))
        .map(|stem| {
            stem.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect::<String>()
        })
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "activity".to_string());
    format!("{stem}.tcx")
}

fn render_processing_error(error: FitProcessError) -> Response {
    let status = match error {
        FitProcessError::SerializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    tracing::warn!(%error, "conversion failed");
    (status, error.to_string()).into_response()
}
