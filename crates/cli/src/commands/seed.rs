//! Demo data for local development.
//!
//! Inserts a small catalog, the two standard coupons and a home page
//! banner. Rows that already exist (same slug or code) are left alone, so
//! the command can be run repeatedly.

use bazaar_core::db::banners::NewBanner;
use bazaar_core::db::categories::NewCategory;
use bazaar_core::db::coupons::NewCoupon;
use bazaar_core::db::products::NewProduct;
use bazaar_core::db::{
    BannerRepository, CategoryRepository, CouponRepository, ProductRepository, RepositoryError,
};
use bazaar_core::{CategoryId, DiscountType};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;

/// `(slug, name, description)`
const CATEGORIES: &[(&str, &str, &str)] = &[
    ("apparel", "Apparel", "Shirts, hoodies and everyday wear"),
    ("home", "Home", "Mugs, prints and things for your desk"),
    ("accessories", "Accessories", "Bags, caps and small goods"),
];

struct DemoProduct {
    category: &'static str,
    name: &'static str,
    sku: &'static str,
    /// Price in cents.
    price: i64,
    stock: i32,
    featured: bool,
}

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct { category: "apparel", name: "Classic Tee", sku: "APP-TEE-001", price: 2_500, stock: 120, featured: true },
    DemoProduct { category: "apparel", name: "Zip Hoodie", sku: "APP-HOOD-001", price: 5_900, stock: 40, featured: true },
    DemoProduct { category: "home", name: "Ceramic Mug", sku: "HOM-MUG-001", price: 1_400, stock: 200, featured: false },
    DemoProduct { category: "home", name: "Desk Print", sku: "HOM-PRT-001", price: 3_200, stock: 3, featured: false },
    DemoProduct { category: "accessories", name: "Canvas Tote", sku: "ACC-TOTE-001", price: 1_800, stock: 75, featured: true },
    DemoProduct { category: "accessories", name: "Dad Cap", sku: "ACC-CAP-001", price: 2_200, stock: 0, featured: false },
];

#[derive(Debug, Default)]
struct Tally {
    inserted: usize,
    skipped: usize,
}

impl Tally {
    /// Count an insert result, treating a uniqueness conflict as "already there".
    fn record<T>(&mut self, result: Result<T, RepositoryError>) -> Result<(), RepositoryError> {
        match result {
            Ok(_) => self.inserted += 1,
            Err(RepositoryError::Conflict(_)) => self.skipped += 1,
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

/// Seed the demo data set.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails for
/// a reason other than the row already existing.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let mut tally = Tally::default();

    seed_catalog(&pool, &mut tally).await?;

    let coupons = CouponRepository::new(&pool);
    for coupon in standard_coupons() {
        tally.record(coupons.create(&coupon).await)?;
    }

    tally.record(BannerRepository::new(&pool).create(&welcome_banner()).await)?;

    info!("Seeding complete!");
    info!("  Rows inserted: {}", tally.inserted);
    info!("  Rows skipped (already exist): {}", tally.skipped);
    Ok(())
}

async fn seed_catalog(pool: &PgPool, tally: &mut Tally) -> Result<(), RepositoryError> {
    let categories = CategoryRepository::new(pool);
    for (order, (slug, name, description)) in (0_i32..).zip(CATEGORIES) {
        let new = NewCategory {
            name: (*name).to_string(),
            slug: (*slug).to_string(),
            description: Some((*description).to_string()),
            parent_id: None,
            image_url: None,
            display_order: order,
            is_active: true,
        };
        tally.record(categories.create(&new).await)?;
    }

    let existing = categories.list_all().await?;
    let category_id = |slug: &str| -> Option<CategoryId> {
        existing.iter().find(|c| c.slug == slug).map(|c| c.id)
    };

    let products = ProductRepository::new(pool);
    for demo in PRODUCTS {
        tally.record(products.create(&demo_product(demo, category_id(demo.category))).await)?;
    }
    Ok(())
}

fn demo_product(demo: &DemoProduct, category_id: Option<CategoryId>) -> NewProduct {
    NewProduct {
        name: demo.name.to_string(),
        slug: None,
        description: Some(format!("{} from the Bazaar demo catalog.", demo.name)),
        short_description: None,
        category_id,
        price: Decimal::new(demo.price, 2),
        compare_at_price: None,
        cost_price: None,
        sku: Some(demo.sku.to_string()),
        barcode: None,
        stock_quantity: demo.stock,
        low_stock_threshold: 5,
        weight: None,
        images: Vec::new(),
        is_active: true,
        is_featured: demo.featured,
        seo_title: None,
        seo_description: None,
    }
}

/// `SUMMER25` (25% off) and `FREESHIP` (9.99 off, the flat shipping fee).
fn standard_coupons() -> [NewCoupon; 2] {
    let coupon = |code: &str, description: &str, discount_type: DiscountType, discount_value: Decimal| NewCoupon {
        code: code.to_string(),
        description: Some(description.to_string()),
        discount_type,
        discount_value,
        min_purchase_amount: None,
        max_discount_amount: None,
        usage_limit: None,
        valid_from: None,
        valid_until: None,
        is_active: true,
    };
    [
        coupon(
            "SUMMER25",
            "25% off everything",
            DiscountType::Percentage,
            Decimal::from(25),
        ),
        coupon(
            "FREESHIP",
            "Shipping on us",
            DiscountType::Fixed,
            Decimal::new(999, 2),
        ),
    ]
}

fn welcome_banner() -> NewBanner {
    NewBanner {
        title: "Summer sale".to_string(),
        description: Some("Use SUMMER25 for 25% off".to_string()),
        image_url: "/images/banners/summer.jpg".to_string(),
        link_url: Some("/products".to_string()),
        display_order: 0,
        is_active: true,
        valid_from: None,
        valid_until: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_demo_rows_pass_validation() {
        for demo in PRODUCTS {
            demo_product(demo, None).validate().unwrap();
        }
        for coupon in standard_coupons() {
            coupon.validate().unwrap();
        }
        welcome_banner().validate().unwrap();
    }

    #[test]
    fn test_every_product_has_a_category() {
        for demo in PRODUCTS {
            assert!(CATEGORIES.iter().any(|(slug, _, _)| *slug == demo.category));
        }
    }

    #[test]
    fn test_tally_skips_conflicts() {
        let mut tally = Tally::default();
        tally.record(Ok(())).unwrap();
        tally
            .record::<()>(Err(RepositoryError::Conflict("dup".into())))
            .unwrap();
        assert!(tally.record::<()>(Err(RepositoryError::NotFound)).is_err());
        assert_eq!((tally.inserted, tally.skipped), (1, 1));
    }
}
