use bson::doc;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use super::shared::Address;
use crate::store::IndexSpec;

pub const PROPERTY_COLLECTION_NAME: &str = "properties";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum PropertyStatus {
    #[default]
    Available,
    UnderOffer,
    Sold,
    Rented,
    OffMarket,
}

/// Listed real-estate unit
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Apartment, house, land, office...
    pub property_type: String,
    pub status: PropertyStatus,
    pub price: f64,
    pub address: Address,
    pub bedrooms: i32,
    pub bathrooms: i32,
    /// Floor area in square meters
    pub area: f64,
    pub listing_agent: Option<String>,
    pub features: Vec<String>,
    /// Download urls; the blobs live in object storage.
    pub images: Vec<String>,
}

impl IntoIndexes for Property {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![
            IndexSpec::new(
                "property_status_index",
                doc! { "company_id": 1, "status": 1 },
            ),
            IndexSpec::new("property_price_index", doc! { "company_id": 1, "price": 1 }),
        ]
    }
}

impl Entity for Property {
    const COLLECTION: &'static str = PROPERTY_COLLECTION_NAME;

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
