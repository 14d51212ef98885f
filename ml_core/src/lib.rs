mod data;
mod error;
mod forest;
mod metrics;
mod model;
mod tree;

pub use data::Dataset;
pub use error::{MlError, Result};
pub use forest::{ForestParams, RandomForestRegressor};
pub use metrics::{mean_squared_error, r2_score, root_mean_squared_error};
pub use model::Regressor;
pub use tree::{RegressionTree, TreeParams};
