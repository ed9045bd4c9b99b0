use thiserror::Error;

/// A DMS coordinate string that could not be converted to decimal degrees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("expected degrees, minutes, seconds and hemisphere in {input:?}")]
    MissingComponent { input: String },

    #[error("invalid {component} value {value:?}")]
    InvalidNumber {
        component: &'static str,
        value: String,
    },

    #[error("hemisphere {hemisphere:?} is not valid for {axis}")]
    InvalidHemisphere { hemisphere: String, axis: &'static str },
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Transport(String),

    #[error("geocoding response could not be decoded: {0}")]
    Decode(String),

    #[error("geocoding service answered {status}: {message}")]
    Service { status: String, message: String },
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Transport(String),

    #[error("weather response is missing {0}")]
    MissingField(&'static str),
}

/// Why an invitation code cannot be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvitationError {
    #[error("invitation code is invalid")]
    Invalid,

    #[error("invitation has expired")]
    Expired,
}

impl InvitationError {
    /// Machine-readable code returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            InvitationError::Invalid => "INVITATION_CODE_INVALID",
            InvitationError::Expired => "INVITATION_EXPIRED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role {0:?}")]
pub struct RoleError(pub String);
