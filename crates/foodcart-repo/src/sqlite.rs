use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use foodcart_types::domain::catalog::{Category, MenuEntry, Product, Restaurant};
use foodcart_types::domain::geo::{CachePolicy, Coordinate, GeocodeEntry};
use foodcart_types::domain::order::{Order, OrderLine, OrderStatus, PaymentMethod};
use foodcart_types::domain::phone::PhoneNumber;
use foodcart_types::ports::{CatalogRepository, GeocodeCache, OrderRepository, RepoError};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
    policy: CachePolicy,
}

fn db_err(e: impl ToString) -> RepoError {
    RepoError::DbError(e.to_string())
}

fn parse_id(s: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(s).map_err(db_err)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(db_err)?
        .with_timezone(&Utc))
}

// Fixed-width so that text comparison in SQL orders correctly.
fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_opt_ts(s: Option<&str>) -> Result<Option<DateTime<Utc>>, RepoError> {
    s.map(parse_ts).transpose()
}

const ORDER_COLUMNS: &str = "id, firstname, lastname, phonenumber, address, status, payment, comment, restaurant_id, registered_at, called_at, delivered_at, updated_at";

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.price_cents, p.description, p.image_url, p.special_status, c.id AS category_id, c.name AS category_name
     FROM products p LEFT JOIN categories c ON c.id = p.category_id";

#[derive(FromRow)]
struct DbOrder {
    id: String,
    firstname: String,
    lastname: String,
    phonenumber: String,
    address: String,
    status: String,
    payment: Option<String>,
    comment: String,
    restaurant_id: Option<String>,
    registered_at: String,
    called_at: Option<String>,
    delivered_at: Option<String>,
    updated_at: String,
}

#[derive(FromRow)]
struct DbOrderLine {
    product_id: String,
    quantity: i64,
    unit_price_cents: i64,
}

impl DbOrder {
    fn into_order(self, lines: Vec<DbOrderLine>) -> Result<Order, RepoError> {
        let status = OrderStatus::from_str(&self.status).map_err(RepoError::DbError)?;
        let payment = self
            .payment
            .as_deref()
            .map(PaymentMethod::from_str)
            .transpose()
            .map_err(RepoError::DbError)?;
        let lines = lines
            .into_iter()
            .map(|l| {
                Ok::<_, RepoError>(OrderLine {
                    product_id: parse_id(&l.product_id)?,
                    quantity: u32::try_from(l.quantity).map_err(db_err)?,
                    unit_price_cents: l.unit_price_cents,
                })
            })
            .collect::<Result<Vec<_>, RepoError>>()?;
        Ok(Order {
            id: parse_id(&self.id)?,
            firstname: self.firstname,
            lastname: self.lastname,
            phonenumber: PhoneNumber::parse(&self.phonenumber).map_err(db_err)?,
            address: self.address,
            status,
            payment,
            comment: self.comment,
            restaurant_id: self.restaurant_id.as_deref().map(parse_id).transpose()?,
            lines,
            registered_at: parse_ts(&self.registered_at)?,
            called_at: parse_opt_ts(self.called_at.as_deref())?,
            delivered_at: parse_opt_ts(self.delivered_at.as_deref())?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbRestaurant {
    id: String,
    name: String,
    address: String,
    contact_phone: String,
}

impl DbRestaurant {
    fn into_restaurant(self) -> Result<Restaurant, RepoError> {
        Ok(Restaurant {
            id: parse_id(&self.id)?,
            name: self.name,
            address: self.address,
            contact_phone: self.contact_phone,
        })
    }
}

#[derive(FromRow)]
struct DbProduct {
    id: String,
    name: String,
    price_cents: i64,
    description: String,
    image_url: String,
    special_status: bool,
    category_id: Option<String>,
    category_name: Option<String>,
}

impl DbProduct {
    fn into_product(self) -> Result<Product, RepoError> {
        let category = match (self.category_id, self.category_name) {
            (Some(id), Some(name)) => Some(Category {
                id: parse_id(&id)?,
                name,
            }),
            _ => None,
        };
        Ok(Product {
            id: parse_id(&self.id)?,
            name: self.name,
            price_cents: self.price_cents,
            category,
            description: self.description,
            image_url: self.image_url,
            special_status: self.special_status,
        })
    }
}

#[derive(FromRow)]
struct DbGeocode {
    address: String,
    lon: f64,
    lat: f64,
    created_at: String,
}

impl SqliteRepo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        Self::with_cache_policy(database_url, CachePolicy::default()).await
    }

    pub async fn with_cache_policy(database_url: &str, policy: CachePolicy) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_init.sql");
        for statement in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool, policy })
    }

    async fn load_lines(&self, order_id: &str) -> Result<Vec<DbOrderLine>, RepoError> {
        sqlx::query_as(
            "SELECT product_id, quantity, unit_price_cents FROM order_lines WHERE order_id = ? ORDER BY rowid",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn hydrate(&self, rows: Vec<DbOrder>) -> Result<Vec<Order>, RepoError> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.load_lines(&row.id).await?;
            orders.push(row.into_order(lines)?);
        }
        Ok(orders)
    }

    async fn get_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Order>, RepoError> {
        let row: Option<DbOrder> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE phonenumber = ?"
        ))
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    fn ttl_cutoff(&self) -> Option<String> {
        let ttl = chrono::Duration::from_std(self.policy.ttl?).ok()?;
        Utc::now().checked_sub_signed(ttl).map(fmt_ts)
    }

    pub async fn geocode_entry_count(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM geocodes")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count.unsigned_abs())
    }

    async fn prune_geocodes(&self) -> Result<(), RepoError> {
        if let Some(cutoff) = self.ttl_cutoff() {
            sqlx::query("DELETE FROM geocodes WHERE created_at <= ?")
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        if let Some(max) = self.policy.max_entries {
            let max = i64::try_from(max).unwrap_or(i64::MAX);
            sqlx::query(
                "DELETE FROM geocodes WHERE address NOT IN
                 (SELECT address FROM geocodes ORDER BY created_at DESC, rowid DESC LIMIT ?)",
            )
            .bind(max)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn get_or_create_by_phone(&self, order: Order) -> Result<(Order, bool), RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let inserted = sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (phonenumber) DO NOTHING"
        ))
        .bind(order.id.to_string())
        .bind(&order.firstname)
        .bind(&order.lastname)
        .bind(order.phonenumber.as_str())
        .bind(&order.address)
        .bind(order.status.as_str())
        .bind(order.payment.map(|p| p.as_str()))
        .bind(&order.comment)
        .bind(order.restaurant_id.map(|id| id.to_string()))
        .bind(fmt_ts(order.registered_at))
        .bind(order.called_at.map(fmt_ts))
        .bind(order.delivered_at.map(fmt_ts))
        .bind(fmt_ts(order.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            let existing = self
                .get_by_phone(&order.phonenumber)
                .await?
                .ok_or_else(|| RepoError::DbError("order vanished after conflict".into()))?;
            return Ok((existing, false));
        }

        for line in &order.lines {
            sqlx::query(
                "INSERT INTO order_lines (order_id, product_id, quantity, unit_price_cents) VALUES (?, ?, ?, ?)",
            )
            .bind(order.id.to_string())
            .bind(line.product_id.to_string())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price_cents)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok((order, true))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        let row: Option<DbOrder> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn list(&self) -> Result<Vec<Order>, RepoError> {
        let rows: Vec<DbOrder> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY registered_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        self.hydrate(rows).await
    }

    async fn list_in_process(&self) -> Result<Vec<Order>, RepoError> {
        let rows: Vec<DbOrder> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status <> ? ORDER BY registered_at"
        ))
        .bind(OrderStatus::Ready.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        self.hydrate(rows).await
    }

    async fn save(&self, order: &Order) -> Result<bool, RepoError> {
        let updated = sqlx::query(
            "UPDATE orders SET status = ?, restaurant_id = ?, called_at = ?, delivered_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(order.status.as_str())
        .bind(order.restaurant_id.map(|id| id.to_string()))
        .bind(order.called_at.map(fmt_ts))
        .bind(order.delivered_at.map(fmt_ts))
        .bind(fmt_ts(order.updated_at))
        .bind(order.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(updated.rows_affected() > 0)
    }
}

#[async_trait]
impl CatalogRepository for SqliteRepo {
    async fn create_restaurant(&self, restaurant: Restaurant) -> Result<Restaurant, RepoError> {
        sqlx::query("INSERT INTO restaurants (id, name, address, contact_phone) VALUES (?, ?, ?, ?)")
            .bind(restaurant.id.to_string())
            .bind(&restaurant.name)
            .bind(&restaurant.address)
            .bind(&restaurant.contact_phone)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(restaurant)
    }

    async fn get_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, RepoError> {
        let row: Option<DbRestaurant> =
            sqlx::query_as("SELECT id, name, address, contact_phone FROM restaurants WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(|r| r.into_restaurant()).transpose()
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, RepoError> {
        let rows: Vec<DbRestaurant> = sqlx::query_as(
            "SELECT id, name, address, contact_phone FROM restaurants ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(|r| r.into_restaurant()).collect()
    }

    async fn create_category(&self, category: Category) -> Result<Category, RepoError> {
        sqlx::query("INSERT INTO categories (id, name) VALUES (?, ?)")
            .bind(category.id.to_string())
            .bind(&category.name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(category)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, RepoError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, name FROM categories WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(|(id, name)| Ok::<_, RepoError>(Category { id: parse_id(&id)?, name }))
            .transpose()
    }

    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        sqlx::query(
            "INSERT INTO products (id, name, price_cents, category_id, description, image_url, special_status)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product.id.to_string())
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.category.as_ref().map(|c| c.id.to_string()))
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.special_status)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(product)
    }

    async fn get_products(&self, ids: &[Uuid]) -> Result<Vec<Product>, RepoError> {
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            let row: Option<DbProduct> = sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            if let Some(row) = row {
                products.push(row.into_product()?);
            }
        }
        Ok(products)
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<DbProduct> = sqlx::query_as(&format!("{PRODUCT_SELECT} ORDER BY p.name, p.id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(|r| r.into_product()).collect()
    }

    async fn list_available_products(&self) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<DbProduct> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT}
             WHERE p.id IN (SELECT product_id FROM menu_items WHERE availability = 1)
             ORDER BY p.name, p.id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(|r| r.into_product()).collect()
    }

    async fn set_menu_entry(&self, entry: MenuEntry) -> Result<MenuEntry, RepoError> {
        sqlx::query(
            "INSERT INTO menu_items (restaurant_id, product_id, availability) VALUES (?, ?, ?)
             ON CONFLICT (restaurant_id, product_id) DO UPDATE SET availability = excluded.availability",
        )
        .bind(entry.restaurant_id.to_string())
        .bind(entry.product_id.to_string())
        .bind(entry.availability)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(entry)
    }

    async fn list_menu_entries(&self) -> Result<Vec<MenuEntry>, RepoError> {
        let rows: Vec<(String, String, bool)> =
            sqlx::query_as("SELECT restaurant_id, product_id, availability FROM menu_items")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.into_iter()
            .map(|(r, p, availability)| {
                Ok::<_, RepoError>(MenuEntry {
                    restaurant_id: parse_id(&r)?,
                    product_id: parse_id(&p)?,
                    availability,
                })
            })
            .collect()
    }

    async fn restaurants_stocking(&self, product_id: Uuid) -> Result<Vec<Restaurant>, RepoError> {
        let rows: Vec<DbRestaurant> = sqlx::query_as(
            "SELECT r.id, r.name, r.address, r.contact_phone
             FROM restaurants r JOIN menu_items m ON m.restaurant_id = r.id
             WHERE m.product_id = ? AND m.availability = 1
             ORDER BY r.name, r.id",
        )
        .bind(product_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(|r| r.into_restaurant()).collect()
    }
}

#[async_trait]
impl GeocodeCache for SqliteRepo {
    async fn lookup(&self, address: &str) -> Result<Option<GeocodeEntry>, RepoError> {
        let row: Option<DbGeocode> =
            sqlx::query_as("SELECT address, lon, lat, created_at FROM geocodes WHERE address = ?")
                .bind(address)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let entry = GeocodeEntry {
            address: row.address,
            coordinate: Coordinate::new(row.lon, row.lat),
            created_at: parse_ts(&row.created_at)?,
        };
        if entry.is_expired(&self.policy, Utc::now()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn store(&self, address: &str, coordinate: Coordinate) -> Result<Coordinate, RepoError> {
        self.prune_geocodes().await?;
        sqlx::query(
            "INSERT INTO geocodes (address, lon, lat, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (address) DO NOTHING",
        )
        .bind(address)
        .bind(coordinate.lon)
        .bind(coordinate.lat)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        let (lon, lat): (f64, f64) = sqlx::query_as("SELECT lon, lat FROM geocodes WHERE address = ?")
            .bind(address)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        self.prune_geocodes().await?;
        Ok(Coordinate::new(lon, lat))
    }
}
