use crate::models::laika::{LaikaPost, LaikaProfile, Pet, DEFAULT_LAIKA_IMAGE};
use crate::search::{PostSearch, Predicates};
use sqlx::{PgConnection, PgPool, QueryBuilder};

const SELECT_POSTS: &str = r#"
    SELECT p.*, u.username AS author_username
    FROM laika_posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Posts matching `search`, most recently updated first
pub async fn list_posts(pool: &PgPool, search: &PostSearch) -> Result<Vec<LaikaPost>, sqlx::Error> {
    let mut qb = QueryBuilder::new(SELECT_POSTS);
    search.push_predicates(&mut Predicates::new(&mut qb));
    qb.push(" ORDER BY p.updated_at DESC, p.id DESC");

    qb.build_query_as::<LaikaPost>().fetch_all(pool).await
}

pub async fn find_post(pool: &PgPool, post_id: i64) -> Result<Option<LaikaPost>, sqlx::Error> {
    sqlx::query_as::<_, LaikaPost>(&format!("{SELECT_POSTS} WHERE p.id = $1"))
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// `image` of `None` stores the default picture
pub async fn create_post(
    pool: &PgPool,
    author_id: i64,
    title: &str,
    description: &str,
    image: Option<&str>,
) -> Result<LaikaPost, sqlx::Error> {
    sqlx::query_as::<_, LaikaPost>(
        r#"
        WITH p AS (
            INSERT INTO laika_posts (author_id, title, description, image)
            VALUES ($1, $2, $3, COALESCE($4, $5))
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(author_id)
    .bind(title)
    .bind(description)
    .bind(image)
    .bind(DEFAULT_LAIKA_IMAGE)
    .fetch_one(pool)
    .await
}

pub async fn update_post(
    pool: &PgPool,
    post_id: i64,
    title: &str,
    description: &str,
    image: &str,
) -> Result<LaikaPost, sqlx::Error> {
    sqlx::query_as::<_, LaikaPost>(
        r#"
        WITH p AS (
            UPDATE laika_posts
            SET title = $2, description = $3, image = $4, updated_at = CURRENT_DATE
            WHERE id = $1
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(post_id)
    .bind(title)
    .bind(description)
    .bind(image)
    .fetch_one(pool)
    .await
}

pub async fn delete_post(pool: &PgPool, post_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM laika_posts WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_profile(pool: &PgPool, user_id: i64) -> Result<Option<LaikaProfile>, sqlx::Error> {
    sqlx::query_as::<_, LaikaProfile>("SELECT * FROM laika_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Get-or-create the profile; a provided `image` replaces the current one
async fn upsert_profile(
    conn: &mut PgConnection,
    user_id: i64,
    image: Option<&str>,
) -> Result<LaikaProfile, sqlx::Error> {
    sqlx::query_as::<_, LaikaProfile>(
        r#"
        INSERT INTO laika_profiles (user_id, image)
        VALUES ($1, COALESCE($2, $3))
        ON CONFLICT (user_id) DO UPDATE
        SET image = COALESCE($2, laika_profiles.image)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(image)
    .bind(DEFAULT_LAIKA_IMAGE)
    .fetch_one(conn)
    .await
}

pub async fn find_pet_by_owner(pool: &PgPool, owner_id: i64) -> Result<Option<Pet>, sqlx::Error> {
    sqlx::query_as::<_, Pet>("SELECT * FROM laika_pets WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

/// Create or overwrite the single pet an owner may have
async fn upsert_pet(
    conn: &mut PgConnection,
    owner_id: i64,
    pet_name: &str,
    species: &str,
    species_type: &str,
    description: &str,
) -> Result<Pet, sqlx::Error> {
    sqlx::query_as::<_, Pet>(
        r#"
        INSERT INTO laika_pets (owner_id, pet_name, species, species_type, description)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (owner_id) DO UPDATE
        SET pet_name = EXCLUDED.pet_name,
            species = EXCLUDED.species,
            species_type = EXCLUDED.species_type,
            description = EXCLUDED.description
        RETURNING *
        "#,
    )
    .bind(owner_id)
    .bind(pet_name)
    .bind(species)
    .bind(species_type)
    .bind(description)
    .fetch_one(conn)
    .await
}

/// The owner's pet as entered on the profile form
#[derive(Debug, Clone, Copy)]
pub struct PetFields<'a> {
    pub pet_name: &'a str,
    pub species: &'a str,
    pub species_type: &'a str,
    pub description: &'a str,
}

/// Upsert the profile and the owner's pet together, or neither
pub async fn save_profile(
    pool: &PgPool,
    user_id: i64,
    image: Option<&str>,
    pet: PetFields<'_>,
) -> Result<(LaikaProfile, Pet), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let profile = upsert_profile(&mut tx, user_id, image).await?;
    let pet = upsert_pet(
        &mut tx,
        user_id,
        pet.pet_name,
        pet.species,
        pet.species_type,
        pet.description,
    )
    .await?;

    tx.commit().await?;
    Ok((profile, pet))
}
