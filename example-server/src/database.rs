use std::sync::Arc;

use axum_db_explorer::literal::Literal;
use axum_db_explorer::schema::QueryOptions;
use axum_db_explorer::{DatabaseAdapter, DatabaseError, Dialect, MySqlAdapter, PostgresAdapter, QueryLimits, TableTarget};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::ConnectionConfig;

/// Open a pool for the connection and wrap it in the matching adapter
pub async fn connect(
    connection: &ConnectionConfig,
    limits: QueryLimits,
) -> Result<Arc<dyn DatabaseAdapter>, sqlx::Error> {
    let adapter: Arc<dyn DatabaseAdapter> = match connection.dialect {
        Dialect::Postgres => {
            let pool = PgPoolOptions::new().max_connections(8).connect(&connection.url).await?;
            Arc::new(PostgresAdapter::new(pool).with_limits(limits))
        }
        Dialect::MySql => {
            let pool = MySqlPoolOptions::new().max_connections(8).connect(&connection.url).await?;
            Arc::new(MySqlAdapter::new(pool).with_limits(limits))
        }
        Dialect::MsSql => {
            return Err(sqlx::Error::Configuration(
                format!("connection {}: no SQL Server driver available", connection.id).into(),
            ))
        }
    };

    info!(connection = %connection.id, dialect = %connection.dialect, "connected");
    Ok(adapter)
}

/// Create the sample tables and fill them once
pub async fn setup(adapter: &dyn DatabaseAdapter) -> Result<(), DatabaseError> {
    let id_column = match adapter.dialect() {
        Dialect::MySql => "id INT AUTO_INCREMENT PRIMARY KEY",
        _ => "id SERIAL PRIMARY KEY",
    };
    let options = QueryOptions::default();

    let tables = [
        format!(
            "CREATE TABLE IF NOT EXISTS users (
                {id_column},
                name VARCHAR(100) NOT NULL,
                email VARCHAR(200) UNIQUE NOT NULL,
                is_active BOOLEAN DEFAULT TRUE
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS products (
                {id_column},
                name VARCHAR(100) NOT NULL,
                price DECIMAL(10, 2) NOT NULL,
                stock INT DEFAULT 0,
                category VARCHAR(50)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS orders (
                {id_column},
                user_id INT NOT NULL,
                product_id INT NOT NULL,
                quantity INT NOT NULL,
                status VARCHAR(20) DEFAULT 'pending',
                CONSTRAINT orders_user_fk FOREIGN KEY (user_id) REFERENCES users(id),
                CONSTRAINT orders_product_fk FOREIGN KEY (product_id) REFERENCES products(id)
            )"
        ),
    ];

    for statement in &tables {
        adapter.execute_query(statement, &options).await?;
    }

    seed_sample_data(adapter).await
}

async fn seed_sample_data(adapter: &dyn DatabaseAdapter) -> Result<(), DatabaseError> {
    let count = adapter
        .execute_query("SELECT COUNT(*) AS count FROM users", &QueryOptions::default())
        .await?;
    let seeded = count
        .rows
        .first()
        .and_then(|row| row.get("count"))
        .and_then(|value| value.as_i64())
        .is_some_and(|count| count > 0);

    if seeded {
        // Data already seeded
        return Ok(());
    }

    let target = |table: &str| TableTarget::new(None, "public", table);
    let number = |value: usize| Literal::Number(value.to_string());

    let first_names = ["Alice", "Bob", "Charlie", "Diana", "Evan", "Fiona", "George", "Hannah"];
    let last_names = ["Johnson", "Smith", "Brown", "Prince", "Davis", "Wilson", "O'Neil", "Taylor"];

    for index in 0..50 {
        let first = first_names[index % first_names.len()];
        let last = last_names[(index / first_names.len()) % last_names.len()];
        let email = format!("{}.{}{}@example.com", first.to_lowercase(), last.to_lowercase().replace('\'', ""), index);

        adapter
            .insert_row(
                &target("users"),
                &[
                    ("name".to_string(), Literal::Text(format!("{first} {last}"))),
                    ("email".to_string(), Literal::Text(email)),
                    ("is_active".to_string(), Literal::Boolean(index % 5 != 0)),
                ],
            )
            .await?;
    }

    let categories = ["Electronics", "Furniture", "Stationery", "Kitchen"];
    let product_types = ["Laptop", "Chair", "Notebook", "Kettle", "Monitor", "Desk"];

    for index in 0..30 {
        let price = format!("{:.2}", 5.99 + index as f64 * 12.5);
        adapter
            .insert_row(
                &target("products"),
                &[
                    ("name".to_string(), Literal::Text(format!("{} {}", product_types[index % product_types.len()], index + 1))),
                    ("price".to_string(), Literal::Number(price)),
                    ("stock".to_string(), number((index * 7 + 5) % 500)),
                    ("category".to_string(), Literal::Text(categories[index % categories.len()].to_string())),
                ],
            )
            .await?;
    }

    let statuses = ["pending", "processing", "shipped", "completed", "cancelled"];

    for index in 0..200 {
        adapter
            .insert_row(
                &target("orders"),
                &[
                    ("user_id".to_string(), number(index % 50 + 1)),
                    ("product_id".to_string(), number(index % 30 + 1)),
                    ("quantity".to_string(), number(index % 10 + 1)),
                    ("status".to_string(), Literal::Text(statuses[index % statuses.len()].to_string())),
                ],
            )
            .await?;
    }

    info!("sample data seeded: 50 users, 30 products, 200 orders");
    Ok(())
}
