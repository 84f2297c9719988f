mod centroid;
mod error;
mod estimator;
mod linear;
mod mean;
mod model;

pub use centroid::NearestCentroid;
pub use error::{MlErr, Result};
pub use estimator::Estimator;
pub use linear::LinearRegression;
pub use mean::MeanRegressor;
pub use model::{Capability, Model};
