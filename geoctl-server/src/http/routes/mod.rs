//! Route handlers organized by resource

use serde::Deserialize;

pub mod cities;
pub mod countries;
pub mod endpoints;
pub mod health;
pub mod states;

/// `?sort=field` or `?sort=-field`
#[derive(Debug, Default, Deserialize)]
pub struct SortParam {
    pub sort: Option<String>,
}

/// Every routed path, sorted
pub fn paths() -> Vec<&'static str> {
    let mut paths: Vec<&'static str> = [
        health::PATHS,
        countries::PATHS,
        states::PATHS,
        cities::PATHS,
        endpoints::PATHS,
    ]
    .concat();
    paths.sort_unstable();
    paths
}
