use thiserror::Error;

use crate::scalar::ScalarError;

#[derive(Error, Debug)]
pub enum DashlingError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error(transparent)]
    Scalar(#[from] ScalarError),

    #[error("Invalid MPD: {0}")]
    MpdParsing(String),

    #[error("Manifest validation failed: {0}")]
    Validation(String),

    #[error("Invalid URL template: {0}")]
    Template(String),

    #[error("Invalid timing schema: {0:?}")]
    InvalidTimingSchema(String),

    #[error("No representation found")]
    NoRepresentationFound,

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    XmlError(#[from] quick_xml::Error),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    TimeRangeError(#[from] chrono::OutOfRangeError),
}

pub type DashlingResult<T> = Result<T, DashlingError>;
