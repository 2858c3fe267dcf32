//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use zsdk_domain::SdkError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SdkError);

impl From<InfraError> for SdkError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SdkError> for InfraError {
    fn from(value: SdkError) -> Self {
        Self(value)
    }
}

trait IntoSdkError {
    fn into_sdk(self) -> SdkError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SdkError */
/* -------------------------------------------------------------------------- */

impl IntoSdkError for HttpError {
    fn into_sdk(self) -> SdkError {
        if self.is_timeout() {
            return SdkError::Network(format!("HTTP request timed out: {self}"));
        }

        if self.is_connect() {
            return SdkError::Network(format!("HTTP connection failure: {self}"));
        }

        if self.is_builder() {
            return SdkError::Config(format!("invalid HTTP request: {self}"));
        }

        if self.is_decode() {
            return SdkError::Serialization(format!("failed to decode HTTP body: {self}"));
        }

        SdkError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_sdk())
    }
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → SdkError */
/* -------------------------------------------------------------------------- */

impl From<url::ParseError> for InfraError {
    fn from(value: url::ParseError) -> Self {
        Self(SdkError::Config(format!("invalid URL: {value}")))
    }
}

/// Whether a transport-level failure is worth another attempt.
///
/// Timeouts, refused or reset connections and failures while sending or
/// reading the body are transient. Builder and redirect-policy errors are not.
pub fn is_transient(err: &HttpError) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
