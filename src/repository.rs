use crate::models::{
    Booking, CartItem, Category, Medicine, NewBooking, NewCartItem, NewCategory, NewMedicine, Role,
    UserRecord,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool, types::Json};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the persistence layer.
///
/// Unlike a missing row (modelled as `Option`/`bool` in the trait), these are
/// infrastructure failures and always reach the caller as a server error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A write collided with a uniqueness constraint. The message is safe to
    /// show to the client.
    #[error("{0}")]
    Conflict(String),

    /// A stored value could not be mapped back into the domain model.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The contract between the HTTP layer and the store. Handlers and the
/// authorization gate only ever see `Arc<dyn Repository>`, so tests can swap in
/// an in-memory implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Cheap round-trip used by `/health` and at start-up.
    async fn ping(&self) -> RepoResult<()>;

    // --- Catalogue ---
    async fn list_medicines(&self) -> RepoResult<Vec<Medicine>>;
    async fn list_discounted(&self) -> RepoResult<Vec<Medicine>>;
    async fn medicines_by_category(&self, category: &str) -> RepoResult<Vec<Medicine>>;
    async fn medicines_page(&self, offset: i64, limit: i64) -> RepoResult<Vec<Medicine>>;
    async fn count_medicines(&self) -> RepoResult<i64>;
    async fn create_medicine(&self, medicine: NewMedicine, seller_email: &str) -> RepoResult<Medicine>;
    async fn medicines_by_seller(&self, seller_email: &str) -> RepoResult<Vec<Medicine>>;

    // --- Categories ---
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn create_category(&self, category: NewCategory) -> RepoResult<Category>;
    async fn update_category(&self, id: Uuid, category: NewCategory) -> RepoResult<Option<Category>>;
    async fn delete_category(&self, id: Uuid) -> RepoResult<bool>;

    // --- Users ---
    async fn find_user(&self, email: &str) -> RepoResult<Option<UserRecord>>;
    /// Inserts only if no record exists for the email. Returns `None` when another
    /// writer got there first.
    async fn insert_user(&self, user: UserRecord) -> RepoResult<Option<UserRecord>>;
    async fn set_user_status(&self, email: &str, status: &str) -> RepoResult<Option<UserRecord>>;
    /// Privileged role change; also clears any pending role request.
    async fn set_user_role(&self, email: &str, role: Role) -> RepoResult<Option<UserRecord>>;
    async fn list_users(&self) -> RepoResult<Vec<UserRecord>>;

    // --- Cart (all owner-scoped) ---
    async fn add_cart_item(&self, item: NewCartItem) -> RepoResult<CartItem>;
    async fn cart_for(&self, email: &str) -> RepoResult<Vec<CartItem>>;
    async fn update_cart_quantity(&self, id: Uuid, email: &str, quantity: i32) -> RepoResult<Option<CartItem>>;
    async fn remove_cart_item(&self, id: Uuid, email: &str) -> RepoResult<bool>;

    // --- Bookings ---
    /// Records the booking and empties the owner's cart as one unit of work.
    /// Either both happen or neither does.
    async fn create_booking(&self, booking: NewBooking) -> RepoResult<Booking>;
    async fn bookings_for(&self, email: &str) -> RepoResult<Vec<Booking>>;
    async fn list_bookings(&self) -> RepoResult<Vec<Booking>>;
    async fn set_booking_status(&self, id: Uuid, status: &str) -> RepoResult<Option<Booking>>;
}

/// RepositoryState
///
/// The handle injected into `AppState` and shared by every request.
pub type RepositoryState = Arc<dyn Repository>;

/// Raw `users` row. The profile column is JSONB and is flattened back into
/// `UserRecord` on the way out.
#[derive(FromRow)]
struct UserRow {
    email: String,
    role: String,
    status: Option<String>,
    profile: Json<Map<String, Value>>,
    timestamp: i64,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| RepositoryError::DataCorruption(format!("user {}: {e}", row.email)))?;

        Ok(UserRecord {
            email: row.email,
            role,
            status: row.status,
            timestamp: row.timestamp,
            profile: row.profile.0,
        })
    }
}

const CATEGORY_EXISTS: &str = "category name already exists";

const MEDICINE_COLUMNS: &str = "id, name, generic_name, description, image, category, company, unit, \
     price, discount_percentage, discount_status, seller_email, created_at";
const USER_COLUMNS: &str = "email, role, status, profile, \"timestamp\"";
const CART_COLUMNS: &str = "id, email, medicine_id, name, image, price, quantity, created_at";
const BOOKING_COLUMNS: &str = "id, email, items, total_price, transaction_id, status, created_at";

/// PostgresRepository
///
/// The production `Repository`, backed by a pool opened in `main` and closed
/// on shutdown.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_medicines(&self, sql: &str, bind: Option<&str>) -> RepoResult<Vec<Medicine>> {
        let mut query = sqlx::query_as::<_, Medicine>(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `Database`.
fn conflict_on_unique(err: sqlx::Error, message: &str) -> RepositoryError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            RepositoryError::Conflict(message.to_string())
        }
        other => RepositoryError::Database(other),
    }
}

fn to_users(rows: Vec<UserRow>) -> RepoResult<Vec<UserRecord>> {
    rows.into_iter().map(UserRecord::try_from).collect()
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_medicines(&self) -> RepoResult<Vec<Medicine>> {
        self.fetch_medicines(
            &format!("SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY created_at DESC"),
            None,
        )
        .await
    }

    async fn list_discounted(&self) -> RepoResult<Vec<Medicine>> {
        self.fetch_medicines(
            &format!(
                "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE discount_status = true ORDER BY created_at DESC"
            ),
            None,
        )
        .await
    }

    async fn medicines_by_category(&self, category: &str) -> RepoResult<Vec<Medicine>> {
        self.fetch_medicines(
            &format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE category = $1 ORDER BY name"),
            Some(category),
        )
        .await
    }

    /// Stable ordering is required so consecutive pages never overlap.
    async fn medicines_page(&self, offset: i64, limit: i64) -> RepoResult<Vec<Medicine>> {
        let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY created_at, id OFFSET $1 LIMIT $2");
        Ok(sqlx::query_as::<_, Medicine>(&sql)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_medicines(&self) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM medicines")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn create_medicine(&self, medicine: NewMedicine, seller_email: &str) -> RepoResult<Medicine> {
        let sql = format!(
            "INSERT INTO medicines (id, name, generic_name, description, image, category, company, unit, \
             price, discount_percentage, discount_status, seller_email, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW()) RETURNING {MEDICINE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Medicine>(&sql)
            .bind(Uuid::new_v4())
            .bind(medicine.name)
            .bind(medicine.generic_name)
            .bind(medicine.description)
            .bind(medicine.image)
            .bind(medicine.category)
            .bind(medicine.company)
            .bind(medicine.unit)
            .bind(medicine.price)
            .bind(medicine.discount_percentage)
            .bind(medicine.discount_status)
            .bind(seller_email)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn medicines_by_seller(&self, seller_email: &str) -> RepoResult<Vec<Medicine>> {
        self.fetch_medicines(
            &format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE seller_email = $1 ORDER BY created_at DESC"),
            Some(seller_email),
        )
        .await
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT id, name, image, created_at FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn create_category(&self, category: NewCategory) -> RepoResult<Category> {
        Ok(sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, image, created_at) VALUES ($1, $2, $3, NOW()) \
             RETURNING id, name, image, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(category.name)
        .bind(category.image)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, CATEGORY_EXISTS))?)
    }

    async fn update_category(&self, id: Uuid, category: NewCategory) -> RepoResult<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, image = $3 WHERE id = $1 RETURNING id, name, image, created_at",
        )
        .bind(id)
        .bind(category.name)
        .bind(category.image)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, CATEGORY_EXISTS))?)
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_user(&self, email: &str) -> RepoResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    /// `ON CONFLICT DO NOTHING` keeps the one-record-per-email invariant even when
    /// two first sign-ins race.
    async fn insert_user(&self, user: UserRecord) -> RepoResult<Option<UserRecord>> {
        let sql = format!(
            "INSERT INTO users (email, role, status, profile, \"timestamp\") VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (email) DO NOTHING RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(&user.status)
            .bind(Json(&user.profile))
            .bind(user.timestamp)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn set_user_status(&self, email: &str, status: &str) -> RepoResult<Option<UserRecord>> {
        let sql = format!("UPDATE users SET status = $2 WHERE email = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn set_user_role(&self, email: &str, role: Role) -> RepoResult<Option<UserRecord>> {
        let sql = format!("UPDATE users SET role = $2, status = NULL WHERE email = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn list_users(&self) -> RepoResult<Vec<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY \"timestamp\"");
        let rows = sqlx::query_as::<_, UserRow>(&sql).fetch_all(&self.pool).await?;
        to_users(rows)
    }

    async fn add_cart_item(&self, item: NewCartItem) -> RepoResult<CartItem> {
        let sql = format!(
            "INSERT INTO cart_items (id, email, medicine_id, name, image, price, quantity, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING {CART_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(Uuid::new_v4())
            .bind(item.email)
            .bind(item.medicine_id)
            .bind(item.name)
            .bind(item.image)
            .bind(item.price)
            .bind(item.quantity)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn cart_for(&self, email: &str) -> RepoResult<Vec<CartItem>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM cart_items WHERE email = $1 ORDER BY created_at");
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_cart_quantity(&self, id: Uuid, email: &str, quantity: i32) -> RepoResult<Option<CartItem>> {
        let sql = format!(
            "UPDATE cart_items SET quantity = $3 WHERE id = $1 AND email = $2 RETURNING {CART_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(id)
            .bind(email)
            .bind(quantity)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn remove_cart_item(&self, id: Uuid, email: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND email = $2")
            .bind(id)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_booking(&self, booking: NewBooking) -> RepoResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO bookings (id, email, items, total_price, transaction_id, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING {BOOKING_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, Booking>(&sql)
            .bind(Uuid::new_v4())
            .bind(&booking.email)
            .bind(Json(&booking.items))
            .bind(booking.total_price)
            .bind(&booking.transaction_id)
            .bind(&booking.status)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM cart_items WHERE email = $1")
            .bind(&booking.email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn bookings_for(&self, email: &str) -> RepoResult<Vec<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE email = $1 ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, Booking>(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_bookings(&self) -> RepoResult<Vec<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, Booking>(&sql).fetch_all(&self.pool).await?)
    }

    async fn set_booking_status(&self, id: Uuid, status: &str) -> RepoResult<Option<Booking>> {
        let sql = format!("UPDATE bookings SET status = $2 WHERE id = $1 RETURNING {BOOKING_COLUMNS}");
        Ok(sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?)
    }
}
