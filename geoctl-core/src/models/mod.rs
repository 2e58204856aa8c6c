//! Domain models with validation at construction
//!
//! Payloads arrive as JSON objects and are validated field by field before
//! anything reaches the database. Invalid input returns ValidationError, not
//! panic.

pub mod city;
pub mod codes;
pub mod country;
pub mod fields;
pub mod pagination;
pub mod state;
pub mod validation;

pub use city::{City, CityKey, CityPatch, Coordinates, StateSource};
pub use codes::{CountryCode, StateCode};
pub use country::{Continent, Country, CountryPatch};
pub use fields::{normalize_code, normalize_name, Payload};
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use state::{State, StateKey, StatePatch};
pub use validation::ValidationError;
