#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use medzone_api::{
    AppState,
    auth::{Claims, issue_credential},
    config::AppConfig,
    models::{
        Booking, CartItem, Category, Medicine, NewBooking, NewCartItem, NewCategory, NewMedicine,
        Role, UserRecord,
    },
    payments::{MockPaymentService, PaymentState},
    repository::{RepoResult, Repository, RepositoryError, RepositoryState},
};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret-value-1234567890";
pub const CATEGORY_EXISTS: &str = "category name already exists";

// --- In-memory Repository ---

/// Stand-in store for handler and router tests. Every collection is a plain
/// vector behind a mutex; `fail_lookups` turns every call into an
/// infrastructure error.
#[derive(Default)]
pub struct InMemoryRepository {
    pub users: Mutex<Vec<UserRecord>>,
    pub medicines: Mutex<Vec<Medicine>>,
    pub categories: Mutex<Vec<Category>>,
    pub cart: Mutex<Vec<CartItem>>,
    pub bookings: Mutex<Vec<Booking>>,
    pub fail_lookups: bool,
}

impl InMemoryRepository {
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_lookups: true,
            ..Self::default()
        }
    }

    fn check(&self) -> RepoResult<()> {
        if self.fail_lookups {
            Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    pub fn user(&self, email: &str) -> Option<UserRecord> {
        self.users.lock().unwrap().iter().find(|u| u.email == email).cloned()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn ping(&self) -> RepoResult<()> {
        self.check()
    }

    async fn list_medicines(&self) -> RepoResult<Vec<Medicine>> {
        self.check()?;
        Ok(self.medicines.lock().unwrap().clone())
    }

    async fn list_discounted(&self) -> RepoResult<Vec<Medicine>> {
        self.check()?;
        Ok(self
            .medicines
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.discount_status)
            .cloned()
            .collect())
    }

    async fn medicines_by_category(&self, category: &str) -> RepoResult<Vec<Medicine>> {
        self.check()?;
        Ok(self
            .medicines
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.category == category)
            .cloned()
            .collect())
    }

    async fn medicines_page(&self, offset: i64, limit: i64) -> RepoResult<Vec<Medicine>> {
        self.check()?;
        Ok(self
            .medicines
            .lock()
            .unwrap()
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_medicines(&self) -> RepoResult<i64> {
        self.check()?;
        Ok(self.medicines.lock().unwrap().len() as i64)
    }

    async fn create_medicine(&self, medicine: NewMedicine, seller_email: &str) -> RepoResult<Medicine> {
        self.check()?;
        let stored = Medicine {
            id: Uuid::new_v4(),
            name: medicine.name,
            generic_name: medicine.generic_name,
            description: medicine.description,
            image: medicine.image,
            category: medicine.category,
            company: medicine.company,
            unit: medicine.unit,
            price: medicine.price,
            discount_percentage: medicine.discount_percentage,
            discount_status: medicine.discount_status,
            seller_email: Some(seller_email.to_string()),
            created_at: Utc::now(),
        };
        self.medicines.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn medicines_by_seller(&self, seller_email: &str) -> RepoResult<Vec<Medicine>> {
        self.check()?;
        Ok(self
            .medicines
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.seller_email.as_deref() == Some(seller_email))
            .cloned()
            .collect())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.check()?;
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn create_category(&self, category: NewCategory) -> RepoResult<Category> {
        self.check()?;
        let mut categories = self.categories.lock().unwrap();
        if categories.iter().any(|c| c.name == category.name) {
            return Err(RepositoryError::Conflict(CATEGORY_EXISTS.to_string()));
        }
        let stored = Category {
            id: Uuid::new_v4(),
            name: category.name,
            image: category.image,
            created_at: Utc::now(),
        };
        categories.push(stored.clone());
        Ok(stored)
    }

    async fn update_category(&self, id: Uuid, category: NewCategory) -> RepoResult<Option<Category>> {
        self.check()?;
        let mut categories = self.categories.lock().unwrap();
        if categories.iter().any(|c| c.id != id && c.name == category.name) {
            return Err(RepositoryError::Conflict(CATEGORY_EXISTS.to_string()));
        }
        Ok(categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.name = category.name;
            c.image = category.image;
            c.clone()
        }))
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut categories = self.categories.lock().unwrap();
        let before = categories.len();
        categories.retain(|c| c.id != id);
        Ok(categories.len() < before)
    }

    async fn find_user(&self, email: &str) -> RepoResult<Option<UserRecord>> {
        self.check()?;
        Ok(self.user(email))
    }

    async fn insert_user(&self, user: UserRecord) -> RepoResult<Option<UserRecord>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Ok(None);
        }
        users.push(user.clone());
        Ok(Some(user))
    }

    async fn set_user_status(&self, email: &str, status: &str) -> RepoResult<Option<UserRecord>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        Ok(users.iter_mut().find(|u| u.email == email).map(|u| {
            u.status = Some(status.to_string());
            u.clone()
        }))
    }

    async fn set_user_role(&self, email: &str, role: Role) -> RepoResult<Option<UserRecord>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        Ok(users.iter_mut().find(|u| u.email == email).map(|u| {
            u.role = role;
            u.status = None;
            u.clone()
        }))
    }

    async fn list_users(&self) -> RepoResult<Vec<UserRecord>> {
        self.check()?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn add_cart_item(&self, item: NewCartItem) -> RepoResult<CartItem> {
        self.check()?;
        let stored = CartItem {
            id: Uuid::new_v4(),
            email: item.email,
            medicine_id: item.medicine_id,
            name: item.name,
            image: item.image,
            price: item.price,
            quantity: item.quantity,
            created_at: Utc::now(),
        };
        self.cart.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn cart_for(&self, email: &str) -> RepoResult<Vec<CartItem>> {
        self.check()?;
        Ok(self
            .cart
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.email == email)
            .cloned()
            .collect())
    }

    async fn update_cart_quantity(&self, id: Uuid, email: &str, quantity: i32) -> RepoResult<Option<CartItem>> {
        self.check()?;
        let mut cart = self.cart.lock().unwrap();
        Ok(cart
            .iter_mut()
            .find(|c| c.id == id && c.email == email)
            .map(|c| {
                c.quantity = quantity;
                c.clone()
            }))
    }

    async fn remove_cart_item(&self, id: Uuid, email: &str) -> RepoResult<bool> {
        self.check()?;
        let mut cart = self.cart.lock().unwrap();
        let before = cart.len();
        cart.retain(|c| !(c.id == id && c.email == email));
        Ok(cart.len() < before)
    }

    async fn create_booking(&self, booking: NewBooking) -> RepoResult<Booking> {
        self.check()?;
        // Both collections stay locked for the whole write.
        let mut cart = self.cart.lock().unwrap();
        let mut bookings = self.bookings.lock().unwrap();
        let stored = Booking {
            id: Uuid::new_v4(),
            email: booking.email,
            items: booking.items,
            total_price: booking.total_price,
            transaction_id: booking.transaction_id,
            status: booking.status,
            created_at: Utc::now(),
        };
        cart.retain(|c| c.email != stored.email);
        bookings.push(stored.clone());
        Ok(stored)
    }

    async fn bookings_for(&self, email: &str) -> RepoResult<Vec<Booking>> {
        self.check()?;
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.email == email)
            .cloned()
            .collect())
    }

    async fn list_bookings(&self) -> RepoResult<Vec<Booking>> {
        self.check()?;
        Ok(self.bookings.lock().unwrap().clone())
    }

    async fn set_booking_status(&self, id: Uuid, status: &str) -> RepoResult<Option<Booking>> {
        self.check()?;
        let mut bookings = self.bookings.lock().unwrap();
        Ok(bookings.iter_mut().find(|b| b.id == id).map(|b| {
            b.status = status.to_string();
            b.clone()
        }))
    }
}

// --- State & Fixtures ---

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_SECRET.to_string(),
        ..AppConfig::default()
    }
}

/// Builds an `AppState` around `repo` and hands back the concrete repository so
/// tests can inspect what the handlers wrote.
pub fn test_state(repo: InMemoryRepository) -> (AppState, Arc<InMemoryRepository>) {
    test_state_with_payments(repo, MockPaymentService::new())
}

pub fn test_state_with_payments(
    repo: InMemoryRepository,
    payments: MockPaymentService,
) -> (AppState, Arc<InMemoryRepository>) {
    let repo = Arc::new(repo);
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        payments: Arc::new(payments) as PaymentState,
        config: test_config(),
    };
    (state, repo)
}

pub fn user(email: &str, role: Role) -> UserRecord {
    UserRecord {
        email: email.to_string(),
        role,
        status: None,
        timestamp: 1_700_000_000_000,
        profile: Map::new(),
    }
}

pub fn medicine(name: &str, category: &str, discounted: bool) -> Medicine {
    Medicine {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category: category.to_string(),
        price: 12.5,
        discount_status: discounted,
        created_at: Utc::now(),
        ..Medicine::default()
    }
}

pub fn cart_item(email: &str) -> CartItem {
    CartItem {
        id: Uuid::new_v4(),
        email: email.to_string(),
        medicine_id: Uuid::new_v4(),
        name: "Napa Extra".to_string(),
        image: None,
        price: 3.0,
        quantity: 1,
        created_at: Utc::now(),
    }
}

// --- Tokens ---

pub fn claims_for(email: &str, ttl: Duration) -> Claims {
    Claims::from_claim_set(
        json!({ "email": email }).as_object().cloned().unwrap(),
        Utc::now(),
        ttl,
    )
    .unwrap()
}

pub fn token_for(email: &str) -> String {
    issue_credential(&claims_for(email, Duration::days(365)), TEST_SECRET).unwrap()
}

/// A correctly signed token that expired an hour ago.
pub fn expired_token_for(email: &str) -> String {
    let claims = Claims::from_claim_set(
        json!({ "email": email }).as_object().cloned().unwrap(),
        Utc::now() - Duration::hours(2),
        Duration::hours(1),
    )
    .unwrap();
    issue_credential(&claims, TEST_SECRET).unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

// --- HTTP ---

/// Sends one request through the full router and returns the status plus the
/// JSON body (`Value::Null` when the body is empty or not JSON).
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
