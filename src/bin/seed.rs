use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use little_lemon_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@littlelemon.test", "admin123", true).await?;
    let manager_id =
        ensure_user(&pool, "manager", "manager@littlelemon.test", "manager123", false).await?;
    let crew_id = ensure_user(&pool, "crew", "crew@littlelemon.test", "crew123", false).await?;
    let customer_id =
        ensure_user(&pool, "customer", "customer@littlelemon.test", "customer123", false).await?;

    ensure_group_member(&pool, manager_id, "Manager").await?;
    ensure_group_member(&pool, crew_id, "Delivery crew").await?;

    seed_menu(&pool).await?;

    println!(
        "Seed completed. Admin: {admin_id}, Manager: {manager_id}, Crew: {crew_id}, Customer: {customer_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    is_staff: bool,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, is_staff)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (username) DO UPDATE SET is_staff = EXCLUDED.is_staff
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(is_staff)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {username} (is_staff={is_staff})");
    Ok(row.0)
}

async fn ensure_group_member(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    group_name: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_groups (user_id, group_id)
        SELECT $1, id FROM groups WHERE name = $2
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(group_name)
    .execute(pool)
    .await?;
    Ok(())
}

async fn seed_menu(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let menu = vec![
        ("Mains", "Grilled Salmon", 1850, true),
        ("Mains", "Lemon Chicken", 1450, false),
        ("Starters", "Bruschetta", 650, false),
        ("Starters", "Greek Salad", 750, true),
        ("Desserts", "Lemon Tart", 550, false),
    ];

    for (category, title, price, featured) in menu {
        let category_id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO categories (id, title)
            VALUES ($1, $2)
            ON CONFLICT (title) DO UPDATE SET title = EXCLUDED.title
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category)
        .fetch_one(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO menu_items (id, title, price, featured, category_id)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM menu_items WHERE title = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(price as i64)
        .bind(featured)
        .bind(category_id.0)
        .execute(pool)
        .await?;
    }

    println!("Seeded menu");
    Ok(())
}
