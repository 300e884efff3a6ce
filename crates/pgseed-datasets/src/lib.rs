//! Built-in datasets: entity definitions plus the fixture rows that seed them.

pub mod books;
pub mod products;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pgseed_core::{Batch, Dataset};

pub const DATASET_NAMES: &[&str] = &[books::NAME, products::NAME];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetName {
    Books,
    Products,
}

impl DatasetName {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetName::Books => books::NAME,
            DatasetName::Products => products::NAME,
        }
    }

    pub fn dataset(self) -> Dataset {
        match self {
            DatasetName::Books => books::dataset(),
            DatasetName::Products => products::dataset(),
        }
    }

    pub fn fixtures(self) -> Vec<Batch> {
        match self {
            DatasetName::Books => books::fixtures(),
            DatasetName::Products => products::fixtures(),
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            books::NAME => Ok(DatasetName::Books),
            products::NAME => Ok(DatasetName::Products),
            other => Err(format!(
                "unknown dataset '{other}' (expected one of: {})",
                DATASET_NAMES.join(", ")
            )),
        }
    }
}

/// Look up a dataset by name.
pub fn find_dataset(name: &str) -> Option<Dataset> {
    name.parse::<DatasetName>().ok().map(DatasetName::dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgseed_core::validate_definitions;

    #[test]
    fn every_dataset_is_valid() {
        for name in DATASET_NAMES {
            let dataset = find_dataset(name).expect("dataset");
            validate_definitions(&dataset.definitions).expect("valid definitions");
        }
    }

    #[test]
    fn parses_known_names_only() {
        assert_eq!("books".parse::<DatasetName>(), Ok(DatasetName::Books));
        assert_eq!("products".parse::<DatasetName>(), Ok(DatasetName::Products));
        let err = "movies".parse::<DatasetName>().unwrap_err();
        assert!(err.contains("books, products"));
        assert!(find_dataset("movies").is_none());
    }
}
