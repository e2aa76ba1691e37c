use shared::domain::{ProductEntry, ProductId, PLACEHOLDER_IMAGE};

const SAMPLE_PRODUCTS: [(&str, &str); 5] = [
    ("1", "Oura Ring"),
    ("2", "Garmin Varia Light"),
    ("3", "Whoop Health Tracker"),
    ("4", "Cyclplus Electric Bike Pump"),
    ("5", "Assioma Power Pedals"),
];

/// Fixed product list; nothing is fetched.
pub struct ProductLister;

impl ProductLister {
    pub const TITLE: &'static str = "Top Reviewed Products Today";

    pub fn entries() -> Vec<ProductEntry> {
        SAMPLE_PRODUCTS
            .iter()
            .map(|(id, name)| ProductEntry {
                id: ProductId::from(*id),
                name: (*name).to_string(),
                image: PLACEHOLDER_IMAGE.to_string(),
            })
            .collect()
    }
}
