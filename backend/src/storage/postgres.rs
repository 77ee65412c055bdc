//! PostgreSQL inventory store
//!
//! A unit of work wraps one `sqlx` transaction. Operation and stock rows are
//! locked with `SELECT ... FOR UPDATE`, so a row touched by one validation is
//! held until that validation commits or rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    AdjustmentLine, DashboardCounts, DeliveryLine, LedgerEntry, Location, LocationType,
    LowStockItem, MovementQuery, NewLedgerEntry, Operation, OperationBody, OperationKind,
    OperationStatus, Product, ReceiptLine, StockFilter, StockKey, StockRecord, TransferLine,
    Vendor,
};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use super::{CatalogKind, CatalogRef, InventoryStore, LedgerTotals, StockTx};
use crate::error::{AppError, AppResult};

const OPERATION_COLUMNS: &str = "id, kind, reference, status, note, vendor_id, customer_name, \
     from_location_id, to_location_id, reason, created_by, created_at, validated_by, \
     validated_at, canceled_by, canceled_at";

const LEDGER_COLUMNS: &str = "id, seq, product_id, location_id, kind, operation_id, \
     location_from, location_to, qty_change, balance_after, note, user_id, timestamp";

const PRODUCT_COLUMNS: &str = "id, code, name, category, unit_of_measure, reorder_threshold, \
     reorder_target, created_by, updated_by, created_at, updated_at";

const LOCATION_COLUMNS: &str = "id, code, name, location_type, parent_id, created_at";

const VENDOR_COLUMNS: &str = "id, code, name, contact_name, email, phone, created_at";

const PENDING_STATUSES: [&str; 3] = ["draft", "waiting", "ready"];

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    code: String,
    name: String,
    category: Option<String>,
    unit_of_measure: String,
    reorder_threshold: Option<i64>,
    reorder_target: Option<i64>,
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            code: row.code,
            name: row.name,
            category: row.category,
            unit_of_measure: row.unit_of_measure,
            reorder_threshold: row.reorder_threshold,
            reorder_target: row.reorder_target,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: Uuid,
    code: String,
    name: String,
    location_type: String,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LocationRow> for Location {
    type Error = AppError;

    fn try_from(row: LocationRow) -> AppResult<Self> {
        let location_type = LocationType::parse(&row.location_type).ok_or_else(|| {
            AppError::Persistence(format!("unknown location type '{}'", row.location_type))
        })?;
        Ok(Location {
            id: row.id,
            code: row.code,
            name: row.name,
            location_type,
            parent_id: row.parent_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct VendorRow {
    id: Uuid,
    code: String,
    name: String,
    contact_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        Vendor {
            id: row.id,
            code: row.code,
            name: row.name,
            contact_name: row.contact_name,
            email: row.email,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockRow {
    product_id: Uuid,
    location_id: Uuid,
    qty: i64,
    reserved: i64,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for StockRecord {
    fn from(row: StockRow) -> Self {
        StockRecord {
            product_id: row.product_id,
            location_id: row.location_id,
            qty: row.qty,
            reserved: row.reserved,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    id: Uuid,
    seq: i64,
    product_id: Uuid,
    location_id: Uuid,
    kind: String,
    operation_id: Uuid,
    location_from: Option<Uuid>,
    location_to: Option<Uuid>,
    qty_change: i64,
    balance_after: i64,
    note: Option<String>,
    user_id: Uuid,
    timestamp: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: LedgerRow) -> AppResult<Self> {
        Ok(LedgerEntry {
            id: row.id,
            seq: row.seq,
            product_id: row.product_id,
            location_id: row.location_id,
            kind: parse_kind(&row.kind)?,
            operation_id: row.operation_id,
            location_from: row.location_from,
            location_to: row.location_to,
            qty_change: row.qty_change,
            balance_after: row.balance_after,
            note: row.note,
            user_id: row.user_id,
            timestamp: row.timestamp,
        })
    }
}

#[derive(Debug, FromRow)]
struct OperationRow {
    id: Uuid,
    kind: String,
    reference: String,
    status: String,
    note: Option<String>,
    vendor_id: Option<Uuid>,
    customer_name: Option<String>,
    from_location_id: Option<Uuid>,
    to_location_id: Option<Uuid>,
    reason: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    validated_by: Option<Uuid>,
    validated_at: Option<DateTime<Utc>>,
    canceled_by: Option<Uuid>,
    canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct LineRow {
    operation_id: Uuid,
    product_id: Uuid,
    location_id: Option<Uuid>,
    qty: i64,
    note: Option<String>,
}

impl LineRow {
    fn location(&self) -> AppResult<Uuid> {
        self.location_id.ok_or_else(|| {
            AppError::Persistence(format!(
                "line of operation {} has no location",
                self.operation_id
            ))
        })
    }
}

#[derive(Debug, FromRow)]
struct LowStockRow {
    product_id: Uuid,
    product_code: String,
    product_name: String,
    location_id: Uuid,
    qty: i64,
    reorder_threshold: i64,
}

fn parse_kind(s: &str) -> AppResult<OperationKind> {
    OperationKind::parse(s)
        .ok_or_else(|| AppError::Persistence(format!("unknown operation kind '{}'", s)))
}

fn parse_status(s: &str) -> AppResult<OperationStatus> {
    OperationStatus::parse(s)
        .ok_or_else(|| AppError::Persistence(format!("unknown operation status '{}'", s)))
}

/// Rebuild an operation from its header row and its lines in position order
fn assemble(row: OperationRow, lines: Vec<LineRow>) -> AppResult<Operation> {
    let body = match parse_kind(&row.kind)? {
        OperationKind::Receipt => OperationBody::Receipt {
            vendor_id: row.vendor_id,
            lines: lines
                .into_iter()
                .map(|l| {
                    Ok(ReceiptLine {
                        location_id: l.location()?,
                        product_id: l.product_id,
                        expected_qty: l.qty,
                        note: l.note,
                    })
                })
                .collect::<AppResult<_>>()?,
        },
        OperationKind::Delivery => OperationBody::Delivery {
            customer_name: row.customer_name,
            lines: lines
                .into_iter()
                .map(|l| {
                    Ok(DeliveryLine {
                        location_id: l.location()?,
                        product_id: l.product_id,
                        qty: l.qty,
                        note: l.note,
                    })
                })
                .collect::<AppResult<_>>()?,
        },
        OperationKind::Transfer => {
            let (Some(from_location_id), Some(to_location_id)) =
                (row.from_location_id, row.to_location_id)
            else {
                return Err(AppError::Persistence(format!(
                    "transfer {} is missing a location",
                    row.id
                )));
            };
            OperationBody::Transfer {
                from_location_id,
                to_location_id,
                lines: lines
                    .into_iter()
                    .map(|l| TransferLine {
                        product_id: l.product_id,
                        qty: l.qty,
                        note: l.note,
                    })
                    .collect(),
            }
        }
        OperationKind::Adjustment => OperationBody::Adjustment {
            reason: row.reason,
            lines: lines
                .into_iter()
                .map(|l| {
                    Ok(AdjustmentLine {
                        location_id: l.location()?,
                        product_id: l.product_id,
                        counted_qty: l.qty,
                        note: l.note,
                    })
                })
                .collect::<AppResult<_>>()?,
        },
    };

    Ok(Operation {
        id: row.id,
        reference: row.reference,
        status: parse_status(&row.status)?,
        note: row.note,
        created_by: row.created_by,
        created_at: row.created_at,
        validated_by: row.validated_by,
        validated_at: row.validated_at,
        canceled_by: row.canceled_by,
        canceled_at: row.canceled_at,
        body,
    })
}

/// Flatten the lines of a body into (product, location, qty, note) rows
fn line_values(body: &OperationBody) -> Vec<(Uuid, Option<Uuid>, i64, Option<String>)> {
    match body {
        OperationBody::Receipt { lines, .. } => lines
            .iter()
            .map(|l| (l.product_id, Some(l.location_id), l.expected_qty, l.note.clone()))
            .collect(),
        OperationBody::Delivery { lines, .. } => lines
            .iter()
            .map(|l| (l.product_id, Some(l.location_id), l.qty, l.note.clone()))
            .collect(),
        OperationBody::Transfer { lines, .. } => lines
            .iter()
            .map(|l| (l.product_id, None, l.qty, l.note.clone()))
            .collect(),
        OperationBody::Adjustment { lines, .. } => lines
            .iter()
            .map(|l| (l.product_id, Some(l.location_id), l.counted_qty, l.note.clone()))
            .collect(),
    }
}

async fn load_lines<'e, E: PgExecutor<'e>>(executor: E, ids: &[Uuid]) -> AppResult<Vec<LineRow>> {
    let lines = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT operation_id, product_id, location_id, qty, note
        FROM operation_lines
        WHERE operation_id = ANY($1)
        ORDER BY operation_id, position
        "#,
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;
    Ok(lines)
}

/// Attach lines to their headers, keeping header order
fn assemble_all(rows: Vec<OperationRow>, lines: Vec<LineRow>) -> AppResult<Vec<Operation>> {
    let mut by_operation: std::collections::HashMap<Uuid, Vec<LineRow>> =
        std::collections::HashMap::new();
    for line in lines {
        by_operation.entry(line.operation_id).or_default().push(line);
    }
    rows.into_iter()
        .map(|row| {
            let lines = by_operation.remove(&row.id).unwrap_or_default();
            assemble(row, lines)
        })
        .collect()
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// One PostgreSQL transaction
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StockTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn get_stock(&self, key: StockKey) -> AppResult<Option<StockRecord>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT product_id, location_id, qty, reserved, updated_at
            FROM stock
            WHERE product_id = $1 AND location_id = $2
            "#,
        )
        .bind(key.product_id)
        .bind(key.location_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(StockRecord::from))
    }

    async fn list_stock(&self, filter: &StockFilter) -> AppResult<Vec<StockRecord>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT product_id, location_id, qty, reserved, updated_at
            FROM stock
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
            ORDER BY product_id, location_id
            "#,
        )
        .bind(filter.product_id)
        .bind(filter.location_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(StockRecord::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_movements(
        &self,
        query: &MovementQuery,
        limit: u32,
    ) -> AppResult<Vec<LedgerEntry>> {
        let sql = format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM stock_ledger
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2 OR location_from = $2 OR location_to = $2)
              AND ($3::uuid IS NULL OR operation_id = $3)
              AND ($4::text IS NULL OR kind = $4)
            ORDER BY seq DESC
            LIMIT $5
            "#
        );
        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(query.product_id)
            .bind(query.location_id)
            .bind(query.operation_id)
            .bind(query.kind.map(|k| k.as_str()))
            .bind(i64::from(limit))
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn ledger_totals(&self, key: StockKey) -> AppResult<LedgerTotals> {
        let (qty_change, entries) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COALESCE(SUM(qty_change), 0)::BIGINT, COUNT(*)
            FROM stock_ledger
            WHERE product_id = $1 AND location_id = $2
            "#,
        )
        .bind(key.product_id)
        .bind(key.location_id)
        .fetch_one(&self.db)
        .await?;
        Ok(LedgerTotals {
            qty_change,
            entries,
        })
    }

    async fn get_operation(&self, id: Uuid) -> AppResult<Option<Operation>> {
        let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = $1");
        let Some(row) = sqlx::query_as::<_, OperationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let lines = load_lines(&self.db, &[id]).await?;
        assemble(row, lines).map(Some)
    }

    async fn list_operations(
        &self,
        kind: OperationKind,
        status: Option<OperationStatus>,
    ) -> AppResult<Vec<Operation>> {
        let sql = format!(
            r#"
            SELECT {OPERATION_COLUMNS}
            FROM operations
            WHERE kind = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, reference DESC
            "#
        );
        let rows = sqlx::query_as::<_, OperationRow>(&sql)
            .bind(kind.as_str())
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let lines = load_lines(&self.db, &ids).await?;
        assemble_all(rows, lines)
    }

    async fn dashboard_counts(&self) -> AppResult<DashboardCounts> {
        let (total_products, total_locations, pending_receipts, pending_deliveries) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM products),
                    (SELECT COUNT(*) FROM locations),
                    (SELECT COUNT(*) FROM operations WHERE kind = 'receipt' AND status = ANY($1)),
                    (SELECT COUNT(*) FROM operations WHERE kind = 'delivery' AND status = ANY($1))
                "#,
            )
            .bind(&PENDING_STATUSES[..])
            .fetch_one(&self.db)
            .await?;
        Ok(DashboardCounts {
            total_products,
            total_locations,
            pending_receipts,
            pending_deliveries,
        })
    }

    async fn low_stock(&self, limit: u32) -> AppResult<Vec<LowStockItem>> {
        let rows = sqlx::query_as::<_, LowStockRow>(
            r#"
            SELECT p.id AS product_id, p.code AS product_code, p.name AS product_name,
                   s.location_id, s.qty, p.reorder_threshold
            FROM stock s
            JOIN products p ON p.id = s.product_id
            WHERE p.reorder_threshold IS NOT NULL AND s.qty < p.reorder_threshold
            ORDER BY s.qty::float8 / p.reorder_threshold ASC, p.code
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| LowStockItem {
                product_id: r.product_id,
                product_code: r.product_code,
                product_name: r.product_name,
                location_id: r.location_id,
                qty: r.qty,
                reorder_threshold: r.reorder_threshold,
            })
            .collect())
    }

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn get_location(&self, id: Uuid) -> AppResult<Option<Location>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1");
        let row = sqlx::query_as::<_, LocationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(Location::try_from).transpose()
    }

    async fn get_vendor(&self, id: Uuid) -> AppResult<Option<Vendor>> {
        let sql = format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = $1");
        let row = sqlx::query_as::<_, VendorRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Vendor::from))
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY code");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list_locations(&self) -> AppResult<Vec<Location>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY code");
        let rows = sqlx::query_as::<_, LocationRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(Location::try_from).collect()
    }

    async fn list_vendors(&self) -> AppResult<Vec<Vendor>> {
        let sql = format!("SELECT {VENDOR_COLUMNS} FROM vendors ORDER BY code");
        let rows = sqlx::query_as::<_, VendorRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Vendor::from).collect())
    }
}

#[async_trait]
impl StockTx for PgTx {
    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn find_location(&mut self, id: Uuid) -> AppResult<Option<Location>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1");
        let row = sqlx::query_as::<_, LocationRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Location::try_from).transpose()
    }

    async fn find_vendor(&mut self, id: Uuid) -> AppResult<Option<Vendor>> {
        let sql = format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = $1");
        let row = sqlx::query_as::<_, VendorRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Vendor::from))
    }

    async fn code_in_use(&mut self, kind: CatalogKind, code: &str) -> AppResult<bool> {
        let sql = match kind {
            CatalogKind::Product => "SELECT EXISTS(SELECT 1 FROM products WHERE code = $1)",
            CatalogKind::Location => "SELECT EXISTS(SELECT 1 FROM locations WHERE code = $1)",
            CatalogKind::Vendor => "SELECT EXISTS(SELECT 1 FROM vendors WHERE code = $1)",
        };
        let exists = sqlx::query_scalar::<_, bool>(sql)
            .bind(code)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, category, unit_of_measure, reorder_threshold,
                reorder_target, created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.unit_of_measure)
        .bind(product.reorder_threshold)
        .bind(product.reorder_target)
        .bind(product.created_by)
        .bind(product.updated_by)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_location(&mut self, location: &Location) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (id, code, name, location_type, parent_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(location.id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(location.location_type.as_str())
        .bind(location.parent_id)
        .bind(location.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_vendor(&mut self, vendor: &Vendor) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vendors (id, code, name, contact_name, email, phone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(vendor.id)
        .bind(&vendor.code)
        .bind(&vendor.name)
        .bind(&vendor.contact_name)
        .bind(&vendor.email)
        .bind(&vendor.phone)
        .bind(vendor.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET code = $2, name = $3, category = $4, unit_of_measure = $5,
                reorder_threshold = $6, reorder_target = $7, updated_by = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.unit_of_measure)
        .bind(product.reorder_threshold)
        .bind(product.reorder_target)
        .bind(product.updated_by)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_location(&mut self, location: &Location) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE locations
            SET code = $2, name = $3, location_type = $4, parent_id = $5
            WHERE id = $1
            "#,
        )
        .bind(location.id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(location.location_type.as_str())
        .bind(location.parent_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_vendor(&mut self, vendor: &Vendor) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE vendors
            SET code = $2, name = $3, contact_name = $4, email = $5, phone = $6
            WHERE id = $1
            "#,
        )
        .bind(vendor.id)
        .bind(&vendor.code)
        .bind(&vendor.name)
        .bind(&vendor.contact_name)
        .bind(&vendor.email)
        .bind(&vendor.phone)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn count_references(&mut self, item: CatalogRef) -> AppResult<i64> {
        let sql = match item {
            CatalogRef::Product(_) => {
                r#"
                SELECT (SELECT COUNT(*) FROM stock WHERE product_id = $1)
                     + (SELECT COUNT(*) FROM operation_lines WHERE product_id = $1)
                "#
            }
            CatalogRef::Location(_) => {
                r#"
                SELECT (SELECT COUNT(*) FROM stock WHERE location_id = $1)
                     + (SELECT COUNT(*) FROM operation_lines WHERE location_id = $1)
                     + (SELECT COUNT(*) FROM locations WHERE parent_id = $1)
                     + (SELECT COUNT(*) FROM operations
                        WHERE from_location_id = $1 OR to_location_id = $1)
                "#
            }
            CatalogRef::Vendor(_) => "SELECT COUNT(*) FROM operations WHERE vendor_id = $1",
        };
        let count = sqlx::query_scalar::<_, i64>(sql)
            .bind(item.id())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn delete_catalog(&mut self, item: CatalogRef) -> AppResult<()> {
        let sql = match item {
            CatalogRef::Product(_) => "DELETE FROM products WHERE id = $1",
            CatalogRef::Location(_) => "DELETE FROM locations WHERE id = $1",
            CatalogRef::Vendor(_) => "DELETE FROM vendors WHERE id = $1",
        };
        sqlx::query(sql)
            .bind(item.id())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_operation(&mut self, operation: &Operation) -> AppResult<()> {
        let (customer_name, from_location_id, to_location_id, reason) = match &operation.body {
            OperationBody::Delivery { customer_name, .. } => (customer_name.clone(), None, None, None),
            OperationBody::Transfer {
                from_location_id,
                to_location_id,
                ..
            } => (None, Some(*from_location_id), Some(*to_location_id), None),
            OperationBody::Adjustment { reason, .. } => (None, None, None, reason.clone()),
            OperationBody::Receipt { .. } => (None, None, None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO operations (
                id, kind, reference, status, note, vendor_id, customer_name,
                from_location_id, to_location_id, reason, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(operation.id)
        .bind(operation.kind().as_str())
        .bind(&operation.reference)
        .bind(operation.status.as_str())
        .bind(&operation.note)
        .bind(operation.body.vendor_id())
        .bind(customer_name)
        .bind(from_location_id)
        .bind(to_location_id)
        .bind(reason)
        .bind(operation.created_by)
        .bind(operation.created_at)
        .execute(&mut *self.tx)
        .await?;

        for (position, (product_id, location_id, qty, note)) in
            line_values(&operation.body).into_iter().enumerate()
        {
            sqlx::query(
                r#"
                INSERT INTO operation_lines (operation_id, position, product_id, location_id, qty, note)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(operation.id)
            .bind(position as i32)
            .bind(product_id)
            .bind(location_id)
            .bind(qty)
            .bind(note)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn lock_operation(&mut self, id: Uuid) -> AppResult<Option<Operation>> {
        let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, OperationRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };
        let lines = load_lines(&mut *self.tx, &[id]).await?;
        assemble(row, lines).map(Some)
    }

    async fn update_operation_status(&mut self, operation: &Operation) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE operations
            SET status = $2, validated_by = $3, validated_at = $4, canceled_by = $5, canceled_at = $6
            WHERE id = $1
            "#,
        )
        .bind(operation.id)
        .bind(operation.status.as_str())
        .bind(operation.validated_by)
        .bind(operation.validated_at)
        .bind(operation.canceled_by)
        .bind(operation.canceled_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn ensure_stock_row(
        &mut self,
        key: StockKey,
        now: DateTime<Utc>,
    ) -> AppResult<StockRecord> {
        sqlx::query(
            r#"
            INSERT INTO stock (product_id, location_id, qty, reserved, updated_at)
            VALUES ($1, $2, 0, 0, $3)
            ON CONFLICT (product_id, location_id) DO NOTHING
            "#,
        )
        .bind(key.product_id)
        .bind(key.location_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        self.lock_stock(key)
            .await?
            .ok_or_else(|| AppError::Persistence(format!("stock row for {} vanished", key)))
    }

    async fn lock_stock(&mut self, key: StockKey) -> AppResult<Option<StockRecord>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT product_id, location_id, qty, reserved, updated_at
            FROM stock
            WHERE product_id = $1 AND location_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.product_id)
        .bind(key.location_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(StockRecord::from))
    }

    async fn apply_delta(
        &mut self,
        key: StockKey,
        delta: i64,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE stock
            SET qty = qty + $3, updated_at = $4
            WHERE product_id = $1 AND location_id = $2
            RETURNING qty
            "#,
        )
        .bind(key.product_id)
        .bind(key.location_id)
        .bind(delta)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::Persistence(format!("no stock row for {}", key)))
    }

    async fn set_reserved(
        &mut self,
        key: StockKey,
        reserved: i64,
        now: DateTime<Utc>,
    ) -> AppResult<StockRecord> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            UPDATE stock
            SET reserved = $3, updated_at = $4
            WHERE product_id = $1 AND location_id = $2
            RETURNING product_id, location_id, qty, reserved, updated_at
            "#,
        )
        .bind(key.product_id)
        .bind(key.location_id)
        .bind(reserved)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::Persistence(format!("no stock row for {}", key)))?;
        Ok(row.into())
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> AppResult<LedgerEntry> {
        let sql = format!(
            r#"
            INSERT INTO stock_ledger (
                id, product_id, location_id, kind, operation_id, location_from,
                location_to, qty_change, balance_after, note, user_id, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {LEDGER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(entry.product_id)
            .bind(entry.location_id)
            .bind(entry.kind.as_str())
            .bind(entry.operation_id)
            .bind(entry.location_from)
            .bind(entry.location_to)
            .bind(entry.qty_change)
            .bind(entry.balance_after)
            .bind(&entry.note)
            .bind(entry.user_id)
            .bind(entry.timestamp)
            .fetch_one(&mut *self.tx)
            .await?;
        row.try_into()
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
