//! Promotes an existing account to the `admin` role.
//!
//! Usage: `grant_admin <username>` (reads `DATABASE_URL` like the server).

use newsdesk::{
    config::AppConfig,
    models::Role,
    repository::{PostgresRepository, Repository},
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let username = std::env::args()
        .nth(1)
        .expect("Usage: grant_admin <username>");

    let config = AppConfig::load();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = PostgresRepository::new(pool);
    match repo.set_role(&username, Role::Admin).await {
        Ok(true) => println!("{username} is now an admin"),
        Ok(false) => {
            eprintln!("no user named {username}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("failed to update role: {e}");
            std::process::exit(1);
        }
    }
}
