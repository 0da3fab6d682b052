use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use storefront_api::db::{create_pool, run_migrations};
use uuid::Uuid;

struct SeedProduct {
    name: &'static str,
    slug: &'static str,
    category: &'static str,
    description: &'static str,
    price: i64,
    sale_price: Option<i64>,
    stock: i32,
    featured: bool,
}

const CATEGORIES: [(&str, &str, &str); 3] = [
    ("Apparel", "apparel", "Shirts, hoodies and jackets"),
    ("Accessories", "accessories", "Bags, caps and small goods"),
    ("Footwear", "footwear", "Sneakers and boots"),
];

const PRODUCTS: [SeedProduct; 6] = [
    SeedProduct {
        name: "Classic Tee",
        slug: "classic-tee",
        category: "apparel",
        description: "Heavyweight cotton t-shirt",
        price: 2_500,
        sale_price: None,
        stock: 120,
        featured: true,
    },
    SeedProduct {
        name: "Trail Hoodie",
        slug: "trail-hoodie",
        category: "apparel",
        description: "Fleece-lined pullover hoodie",
        price: 6_500,
        sale_price: Some(4_999),
        stock: 40,
        featured: true,
    },
    SeedProduct {
        name: "Canvas Tote",
        slug: "canvas-tote",
        category: "accessories",
        description: "Everyday canvas tote bag",
        price: 1_800,
        sale_price: None,
        stock: 75,
        featured: false,
    },
    SeedProduct {
        name: "Wool Beanie",
        slug: "wool-beanie",
        category: "accessories",
        description: "Merino wool beanie",
        price: 2_200,
        sale_price: Some(1_500),
        stock: 3,
        featured: false,
    },
    SeedProduct {
        name: "Runner Sneaker",
        slug: "runner-sneaker",
        category: "footwear",
        description: "Lightweight running sneaker",
        price: 12_000,
        sale_price: None,
        stock: 25,
        featured: true,
    },
    SeedProduct {
        name: "Hiking Boot",
        slug: "hiking-boot",
        category: "footwear",
        description: "Waterproof leather hiking boot",
        price: 18_500,
        sale_price: Some(15_900),
        stock: 2,
        featured: false,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user_with_role(&pool, "admin", "admin@example.com", "admin12345", "admin").await?;
    let user_id = ensure_user_with_role(&pool, "customer", "user@example.com", "user12345", "user").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, first_name, last_name, password_hash, role)
        VALUES ($1, $2, $3, $4, 'Demo', $5, $6)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for (name, slug, description) in CATEGORIES {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, slug, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .bind(description)
        .execute(pool)
        .await?;
    }

    for product in PRODUCTS {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, category_id, name, slug, description, price, sale_price, stock, available, featured)
            SELECT $1, c.id, $2, $3, $4, $5, $6, $7, TRUE, $8
            FROM categories c
            WHERE c.slug = $9
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(product.slug)
        .bind(product.description)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(product.stock)
        .bind(product.featured)
        .bind(product.category)
        .execute(pool)
        .await?;
    }

    println!("Seeded {} categories and {} products", CATEGORIES.len(), PRODUCTS.len());
    Ok(())
}
