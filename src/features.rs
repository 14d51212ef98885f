use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The model's input columns, in training order.
pub const FEATURE_NAMES: [&str; 8] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// Name of the target column in headered CSV files.
pub const TARGET_NAME: &str = "MedHouseVal";

/// One housing-district sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeatureVector {
    pub med_inc: f64,
    pub house_age: f64,
    pub ave_rooms: f64,
    pub ave_bedrms: f64,
    pub population: f64,
    pub ave_occup: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// A single field-level validation failure, serialized as
/// `{"loc": ["body", "<field>"], "msg": "...", "type": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldError {
    fn new(loc: &[&str], msg: impl Into<String>, kind: &'static str) -> Self {
        Self {
            loc: loc.iter().map(|s| s.to_string()).collect(),
            msg: msg.into(),
            kind,
        }
    }

    /// An error about the request body as a whole.
    pub fn body(msg: impl Into<String>, kind: &'static str) -> Self {
        Self::new(&["body"], msg, kind)
    }
}

impl FeatureVector {
    /// Builds a vector from values laid out in `FEATURE_NAMES` order.
    pub fn from_row(row: [f64; 8]) -> Self {
        let [
            med_inc,
            house_age,
            ave_rooms,
            ave_bedrms,
            population,
            ave_occup,
            latitude,
            longitude,
        ] = row;

        Self {
            med_inc,
            house_age,
            ave_rooms,
            ave_bedrms,
            population,
            ave_occup,
            latitude,
            longitude,
        }
    }

    /// Returns the values in `FEATURE_NAMES` order.
    pub fn to_row(&self) -> [f64; 8] {
        [
            self.med_inc,
            self.house_age,
            self.ave_rooms,
            self.ave_bedrms,
            self.population,
            self.ave_occup,
            self.latitude,
            self.longitude,
        ]
    }

    /// Validates a JSON request body.
    ///
    /// Every field is checked so the caller gets all the failures at once.
    /// Numbers and numeric strings are accepted, non-finite values are not.
    /// Unknown fields are ignored.
    ///
    /// # Args
    /// * `body` - The decoded JSON body.
    ///
    /// # Returns
    /// The feature vector, or one `FieldError` per offending field.
    pub fn from_json(body: &Value) -> Result<Self, Vec<FieldError>> {
        let Value::Object(fields) = body else {
            return Err(vec![FieldError::body(
                "input should be a valid object",
                "model_attributes_type",
            )]);
        };

        let mut row = [0.0; 8];
        let mut errors = Vec::new();

        for (slot, name) in row.iter_mut().zip(FEATURE_NAMES) {
            match field(fields, name) {
                Ok(value) => *slot = value,
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self::from_row(row))
    }
}

fn field(fields: &Map<String, Value>, name: &str) -> Result<f64, FieldError> {
    let loc = ["body", name];

    let value = match fields.get(name) {
        None => return Err(FieldError::new(&loc, "field required", "missing")),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    let Some(value) = value else {
        return Err(FieldError::new(
            &loc,
            "input should be a valid number",
            "float_type",
        ));
    };

    if !value.is_finite() {
        return Err(FieldError::new(
            &loc,
            "input should be a finite number",
            "finite_number",
        ));
    }

    Ok(value)
}
