// Creates an agent account directly in the database. Usage:
//   create_agent <email> <username> <password> [--admin]

use bcrypt::{hash, DEFAULT_COST};
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, Row};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: create_agent <email> <username> <password> [--admin]");
        std::process::exit(1);
    }
    let email = args[1].trim().to_lowercase();
    let username = args[2].trim().to_string();
    let password = args[3].clone();
    let is_admin = args.iter().any(|a| a == "--admin");

    if email.is_empty() || !email.contains('@') {
        eprintln!("Invalid email address");
        std::process::exit(1);
    }
    if password.len() < 6 {
        eprintln!("Password must be at least 6 characters long");
        std::process::exit(1);
    }

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    let existing = sqlx::query("SELECT id FROM users WHERE email = $1 OR username = $2")
        .bind(&email)
        .bind(&username)
        .fetch_optional(&pool)
        .await?;
    if existing.is_some() {
        eprintln!("User with this email or username already exists");
        std::process::exit(1);
    }

    let password_hash = hash(&password, DEFAULT_COST)?;

    let row = sqlx::query(
        r#"
        INSERT INTO users (email, username, password_hash, is_active, is_admin)
        VALUES ($1, $2, $3, true, $4)
        RETURNING id
        "#,
    )
    .bind(&email)
    .bind(&username)
    .bind(&password_hash)
    .bind(is_admin)
    .fetch_one(&pool)
    .await?;

    let id: i32 = row.get("id");
    println!("Created agent {} ({}) admin={}", id, username, is_admin);

    pool.close().await;
    Ok(())
}
