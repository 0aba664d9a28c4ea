//! Demo catalog loaded by the in-memory repository.

use common::{Money, ProductId};

use crate::models::{Category, Product, StockRecord};

pub fn categories() -> Vec<Category> {
    vec![
        Category {
            id: "cat-1".to_string(),
            name: "Electronics".to_string(),
            description: "Devices and gadgets".to_string(),
            is_active: true,
        },
        Category {
            id: "cat-2".to_string(),
            name: "Home & Kitchen".to_string(),
            description: "Everyday household items".to_string(),
            is_active: true,
        },
    ]
}

fn product(id: &str, name: &str, description: &str, price: i64, category: (&str, &str)) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: description.to_string(),
        price: Money::usd(price),
        category_id: category.0.to_string(),
        category_name: category.1.to_string(),
        image_url: format!("https://example.com/images/{id}.jpg"),
        is_active: true,
    }
}

pub fn products() -> Vec<Product> {
    let electronics = ("cat-1", "Electronics");
    vec![
        product(
            "prod-1",
            "Wireless Headphones",
            "Over-ear headphones with noise cancellation",
            9999,
            electronics,
        ),
        product(
            "prod-2",
            "Smart Watch",
            "Fitness tracking and notifications",
            19999,
            electronics,
        ),
        product(
            "prod-3",
            "Coffee Mug",
            "Ceramic mug, 350 ml",
            1599,
            ("cat-2", "Home & Kitchen"),
        ),
    ]
}

pub fn stocks() -> Vec<StockRecord> {
    vec![
        StockRecord::new("prod-1", 3),
        StockRecord::new("prod-2", 1),
        StockRecord::new("prod-3", 2),
    ]
}
