//! Asset number generation: `PREFIX/<roman category order>/<site order>`.

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{asset, category, site},
    errors::ServiceError,
};

const ROMAN_TABLE: [(i32, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Standard subtractive roman numeral for 1..=3999.
pub fn to_roman(value: i32) -> Result<String, ServiceError> {
    if !(1..=3999).contains(&value) {
        return Err(ServiceError::ValidationError(format!(
            "category order {} cannot be written as a roman numeral (expected 1..=3999)",
            value
        )));
    }

    let mut remaining = value;
    let mut out = String::new();
    for (weight, glyph) in ROMAN_TABLE {
        while remaining >= weight {
            out.push_str(glyph);
            remaining -= weight;
        }
    }
    Ok(out)
}

/// Joins the three parts. The site number is zero-padded to three digits.
pub fn compose(prefix: &str, category_order: i32, site_order: i32) -> Result<String, ServiceError> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(ServiceError::ValidationError(
            "asset number prefix must not be empty".into(),
        ));
    }
    if prefix.contains('/') {
        return Err(ServiceError::ValidationError(
            "asset number prefix must not contain '/'".into(),
        ));
    }
    if site_order < 1 {
        return Err(ServiceError::ValidationError(format!(
            "site order {} is not a valid site number",
            site_order
        )));
    }

    Ok(format!(
        "{}/{}/{:03}",
        prefix,
        to_roman(category_order)?,
        site_order
    ))
}

/// Zero-padded running number used as the prefix when none is supplied.
pub fn running_prefix(sequence: u64, width: usize) -> String {
    format!("{:0width$}", sequence, width = width)
}

/// Looks up category and site orders and produces asset numbers.
#[derive(Clone)]
pub struct AssetNumberService {
    db_pool: Arc<DbPool>,
    prefix_width: usize,
}

impl AssetNumberService {
    pub fn new(db_pool: Arc<DbPool>, prefix_width: usize) -> Self {
        Self {
            db_pool,
            prefix_width,
        }
    }

    /// Generates a number for the category+site pair. Without a prefix the
    /// next free running number for that pair is used.
    #[instrument(skip(self))]
    pub async fn generate(
        &self,
        category_id: Uuid,
        site_id: Uuid,
        prefix: Option<String>,
    ) -> Result<String, ServiceError> {
        let db = &*self.db_pool;

        let category = category::Entity::find_by_id(category_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category", category_id))?;
        let site = site::Entity::find_by_id(site_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Site", site_id))?;

        if let Some(prefix) = prefix.filter(|p| !p.trim().is_empty()) {
            return compose(&prefix, category.sort_order, site.sort_order);
        }

        let existing = asset::Entity::find()
            .filter(asset::Column::CategoryId.eq(category_id))
            .filter(asset::Column::SiteId.eq(site_id))
            .count(db)
            .await?;

        let mut sequence = existing + 1;
        loop {
            let candidate = compose(
                &running_prefix(sequence, self.prefix_width),
                category.sort_order,
                site.sort_order,
            )?;
            let taken = asset::Entity::find()
                .filter(asset::Column::NoAsset.eq(candidate.as_str()))
                .count(db)
                .await?
                > 0;
            if !taken {
                debug!(%candidate, "generated asset number");
                return Ok(candidate);
            }
            sequence += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, "I")]
    #[case(4, "IV")]
    #[case(9, "IX")]
    #[case(14, "XIV")]
    #[case(40, "XL")]
    #[case(90, "XC")]
    #[case(400, "CD")]
    #[case(900, "CM")]
    #[case(1994, "MCMXCIV")]
    #[case(3999, "MMMCMXCIX")]
    fn roman_numerals(#[case] value: i32, #[case] expected: &str) {
        assert_eq!(to_roman(value).unwrap(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    #[case(4000)]
    fn roman_out_of_range_is_rejected(#[case] value: i32) {
        assert!(matches!(
            to_roman(value),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn composes_prefix_roman_and_padded_site() {
        assert_eq!(compose("0007", 3, 2).unwrap(), "0007/III/002");
        assert_eq!(compose(" IT ", 14, 120).unwrap(), "IT/XIV/120");
        assert!(compose("", 1, 1).is_err());
        assert!(compose("A/B", 1, 1).is_err());
        assert!(compose("IT", 1, 0).is_err());
    }

    #[test]
    fn running_prefix_pads_to_width() {
        assert_eq!(running_prefix(1, 4), "0001");
        assert_eq!(running_prefix(12345, 4), "12345");
    }

    proptest! {
        #[test]
        fn composition_is_deterministic(cat in 1i32..3999, site in 1i32..999) {
            let a = compose("AST", cat, site).unwrap();
            let b = compose("AST", cat, site).unwrap();
            prop_assert_eq!(&a, &b);
            let parts: Vec<&str> = a.split('/').collect();
            prop_assert_eq!(parts.len(), 3);
            prop_assert_eq!(parts[2].parse::<i32>().unwrap(), site);
        }
    }
}
