//! Domain logic for Canopeum, a tree-planting site tracker.
//!
//! This crate holds everything that does not need a database or a network:
//! - Roles and the access predicates built on top of them
//! - DMS coordinate parsing and address selection
//! - Site summary aggregation (plant counts, sponsor progress)
//! - Invitation expiry rules
//! - Pagination envelopes for the social feed
//! - The collaborator traits for geocoding and weather
//!
//! Concrete collaborators live in `canopeum-remote`; the server builds them at
//! startup and passes them around as `Arc<dyn Geocoder>` and
//! `Arc<dyn WeatherProvider>`.

mod error;

pub mod coordinate;
pub mod i18n;
pub mod invitation;
pub mod pagination;
pub mod permission;
pub mod role;
pub mod summary;
pub mod weather;

pub use coordinate::{Axis, Coordinate, DisabledGeocoder, Geocoder, NormalizeError, UNKNOWN_ADDRESS};
pub use error::{CoordinateError, GeocodeError, InvitationError, RoleError, WeatherError};
pub use i18n::{Language, Translation};
pub use pagination::{Page, PageRequest};
pub use permission::{Actor, Method};
pub use role::Role;
pub use weather::{Weather, WeatherProvider};
