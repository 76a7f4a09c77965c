//! Common test utilities

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// Setup test database - truncate all tables for a fresh state
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query(
        "TRUNCATE TABLE payments, sale_items, cash_movements, sales, cash_sessions, \
         products, categories, audit_logs CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}

/// Insert a product and return its id
pub async fn seed_product(pool: &PgPool, name: &str, price: Decimal, stock: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, price, stock) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(name)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await
        .expect("Failed to seed product");
    id
}

/// Current stock of a product
pub async fn product_stock(pool: &PgPool, id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Failed to read stock")
}
