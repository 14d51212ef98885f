use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Serialize;
use serde_json::Value;

use super::AppState;
use crate::{
    error::{Result, ServiceErr},
    features::{FeatureVector, FieldError},
};

/// Response body of `POST /predict`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: f64,
}

/// `POST /predict`: median house value, in $100,000 units, of one district.
///
/// The body is validated before the model is touched; a body that isn't
/// JSON, or whose fields are missing or not numbers, gets a 422 listing
/// every offending field. Bodies refused before decoding (no JSON content
/// type, over the size limit) keep their own status.
pub async fn predict(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Prediction>> {
    let Json(body) = body.map_err(|rejection| match rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            ServiceErr::Validation(vec![FieldError::body(rejection.body_text(), "json_invalid")])
        }
        other => ServiceErr::Rejected(other),
    })?;

    let features = FeatureVector::from_json(&body).map_err(ServiceErr::Validation)?;
    let prediction = state.model.predict(&features).await?;

    Ok(Json(Prediction { prediction }))
}
