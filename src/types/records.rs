//! Domain records stored by the facades
//!
//! All records keep unknown fields so that data written by other app
//! versions survives a read-modify-write cycle untouched.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;

/// A client, customer, or supplier record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique within its category. Numeric ids written by older builds
    /// are read as their decimal string.
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Fields this crate does not interpret (email, phone, address, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Client {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// Which `ClientsState` array a client belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClientCategory {
    Company,
    Individual,
    Vendor,
}

impl fmt::Display for ClientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCategory::Company => f.write_str("company"),
            ClientCategory::Individual => f.write_str("individual"),
            ClientCategory::Vendor => f.write_str("vendor"),
        }
    }
}

/// The whole clients document.
///
/// Missing or `null` arrays deserialize as empty, so a value of this type
/// is always normalized.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ClientsState {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub companies: Vec<Client>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub individuals: Vec<Client>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vendors: Vec<Client>,
}

impl ClientsState {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// At least one client in any category.
    pub fn has_data(&self) -> bool {
        !self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.companies.len() + self.individuals.len() + self.vendors.len()
    }

    pub fn category(&self, category: ClientCategory) -> &Vec<Client> {
        match category {
            ClientCategory::Company => &self.companies,
            ClientCategory::Individual => &self.individuals,
            ClientCategory::Vendor => &self.vendors,
        }
    }

    pub fn category_mut(&mut self, category: ClientCategory) -> &mut Vec<Client> {
        match category {
            ClientCategory::Company => &mut self.companies,
            ClientCategory::Individual => &mut self.individuals,
            ClientCategory::Vendor => &mut self.vendors,
        }
    }
}

/// Business profile shown on invoices and quotes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contact_email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contact_phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vat_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub registration_number: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompanyDetails {
    /// A record counts as present only once it has a name.
    pub fn has_data(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(id)) => Ok(id),
        Some(Value::Number(id)) => Ok(id.to_string()),
        Some(other) => Err(D::Error::custom(format!(
            "client id must be a string or number, got {}",
            other
        ))),
    }
}

/// `{success, data, error}` envelope handed to UI consumers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<Result<T, StorageError>> for Outcome<T> {
    fn from(result: Result<T, StorageError>) -> Self {
        match result {
            Ok(data) => Outcome {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => Outcome {
                success: false,
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}
