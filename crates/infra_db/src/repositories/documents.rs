//! Document repository
//!
//! Quotes, bookings, invoices and payments are stored whole as JSONB. The
//! surrounding columns carry the tenant scope, natural keys and the
//! optimistic `lock_version`; the column value is authoritative and
//! overrides whatever version the JSON body was serialized with.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{BookingId, TenantId};
use domain_billing::{Invoice, InvoiceStatus, Payment};
use domain_booking::Booking;
use domain_quote::Quote;

use crate::error::DatabaseError;

/// An aggregate persisted as one JSONB row
pub trait StoredDocument: Serialize + DeserializeOwned + Send + Unpin {
    const ENTITY: &'static str;
    const TABLE: &'static str;

    fn row_key(&self) -> (Uuid, Uuid);
    fn stored_version(&self) -> u64;
    fn apply_version(&mut self, lock_version: u64);
}

macro_rules! stored_document {
    ($ty:ty, $entity:literal, $table:literal) => {
        impl StoredDocument for $ty {
            const ENTITY: &'static str = $entity;
            const TABLE: &'static str = $table;

            fn row_key(&self) -> (Uuid, Uuid) {
                (*self.tenant_id().as_uuid(), *self.id().as_uuid())
            }

            fn stored_version(&self) -> u64 {
                self.lock_version()
            }

            fn apply_version(&mut self, lock_version: u64) {
                self.set_lock_version(lock_version);
            }
        }
    };
}

stored_document!(Quote, "Quote", "quotes");
stored_document!(Booking, "Booking", "bookings");
stored_document!(Invoice, "Invoice", "invoices");
stored_document!(Payment, "Payment", "payments");

/// Row shape shared by every document table
#[derive(Debug, sqlx::FromRow)]
pub struct DocumentRow {
    pub document: Value,
    pub lock_version: i64,
}

impl DocumentRow {
    pub fn decode<T: StoredDocument>(self) -> Result<T, DatabaseError> {
        let mut doc: T = serde_json::from_value(self.document)?;
        doc.apply_version(to_version(self.lock_version)?);
        Ok(doc)
    }
}

fn to_version(value: i64) -> Result<u64, DatabaseError> {
    u64::try_from(value).map_err(|_| DatabaseError::SerializationError(format!("negative lock_version {}", value)))
}

fn to_column(version: u64) -> Result<i64, DatabaseError> {
    i64::try_from(version).map_err(|_| DatabaseError::SerializationError(format!("lock_version {} out of range", version)))
}

fn decode_all<T: StoredDocument>(rows: Vec<DocumentRow>) -> Result<Vec<T>, DatabaseError> {
    rows.into_iter().map(DocumentRow::decode).collect()
}

/// Reads and writes JSONB documents
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find<T: StoredDocument>(&self, tenant_id: TenantId, id: Uuid) -> Result<Option<T>, DatabaseError> {
        let sql = format!(
            "SELECT document, lock_version FROM {} WHERE tenant_id = $1 AND id = $2",
            T::TABLE
        );
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(DocumentRow::decode)
            .transpose()
    }

    pub async fn quote_versions(&self, tenant_id: TenantId, quote_number: &str) -> Result<Vec<Quote>, DatabaseError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, lock_version FROM quotes
            WHERE tenant_id = $1 AND quote_number = $2
            ORDER BY version
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(quote_number)
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    /// Deletes the quote only when its stored version still matches
    pub async fn delete_quote(&self, tenant_id: TenantId, id: Uuid, lock_version: u64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM quotes WHERE tenant_id = $1 AND id = $2 AND lock_version = $3")
            .bind(tenant_id.as_uuid())
            .bind(id)
            .bind(to_column(lock_version)?)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT lock_version FROM quotes WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Err(DatabaseError::version_conflict("Quote", id)),
            None => Err(DatabaseError::not_found("Quote", id)),
        }
    }

    /// Sent and partially paid invoices due before `before`
    pub async fn invoices_due_before(&self, tenant_id: TenantId, before: NaiveDate) -> Result<Vec<Invoice>, DatabaseError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, lock_version FROM invoices
            WHERE tenant_id = $1 AND status = ANY($2) AND due_date < $3
            ORDER BY due_date, invoice_number
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(vec![InvoiceStatus::Sent.as_str(), InvoiceStatus::Partial.as_str()])
        .bind(before)
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    pub async fn payment_by_gateway_id(
        &self,
        tenant_id: TenantId,
        gateway_transaction_id: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, lock_version FROM payments
            WHERE tenant_id = $1 AND gateway_transaction_id = $2
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(gateway_transaction_id)
        .fetch_optional(&self.pool)
        .await?
        .map(DocumentRow::decode)
        .transpose()
    }

    pub async fn payments_for_booking(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<Vec<Payment>, DatabaseError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, lock_version FROM payments
            WHERE tenant_id = $1 AND booking_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    /// Owner of a gateway charge, searched across tenants
    pub async fn tenant_for_gateway_charge(&self, gateway_transaction_id: &str) -> Result<Option<TenantId>, DatabaseError> {
        let tenant: Option<Uuid> = sqlx::query_scalar(
            "SELECT tenant_id FROM payments WHERE gateway_transaction_id = $1 LIMIT 1",
        )
        .bind(gateway_transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant.map(TenantId::from_uuid))
    }
}

/// Inserts a new document (`lock_version` 0) or replaces the stored one at the
/// expected version. Returns the version now stored.
pub async fn save_quote(conn: &mut PgConnection, quote: &Quote) -> Result<u64, DatabaseError> {
    let document = serde_json::to_value(quote)?;
    let (tenant_id, id) = quote.row_key();
    let result = if quote.lock_version() == 0 {
        sqlx::query(
            r#"
            INSERT INTO quotes (tenant_id, id, quote_number, version, status, lock_version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 1, $6, $7, $8)
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(quote.quote_number())
        .bind(quote.version() as i32)
        .bind(quote.status().as_str())
        .bind(&document)
        .bind(quote.created_at())
        .bind(quote.updated_at())
        .execute(&mut *conn)
        .await?
    } else {
        sqlx::query(
            r#"
            UPDATE quotes
            SET status = $3, document = $4, updated_at = $5, lock_version = lock_version + 1
            WHERE tenant_id = $1 AND id = $2 AND lock_version = $6
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(quote.status().as_str())
        .bind(&document)
        .bind(quote.updated_at())
        .bind(to_column(quote.lock_version())?)
        .execute(&mut *conn)
        .await?
    };
    expect_one(result.rows_affected(), quote)
}

pub async fn save_booking(conn: &mut PgConnection, booking: &Booking) -> Result<u64, DatabaseError> {
    let document = serde_json::to_value(booking)?;
    let (tenant_id, id) = booking.row_key();
    let result = if booking.lock_version() == 0 {
        sqlx::query(
            r#"
            INSERT INTO bookings (tenant_id, id, booking_number, status, lock_version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 1, $5, $6, $7)
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(booking.booking_number())
        .bind(booking.status().as_str())
        .bind(&document)
        .bind(booking.created_at())
        .bind(booking.updated_at())
        .execute(&mut *conn)
        .await?
    } else {
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = $3, document = $4, updated_at = $5, lock_version = lock_version + 1
            WHERE tenant_id = $1 AND id = $2 AND lock_version = $6
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(booking.status().as_str())
        .bind(&document)
        .bind(booking.updated_at())
        .bind(to_column(booking.lock_version())?)
        .execute(&mut *conn)
        .await?
    };
    expect_one(result.rows_affected(), booking)
}

pub async fn save_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<u64, DatabaseError> {
    let document = serde_json::to_value(invoice)?;
    let (tenant_id, id) = invoice.row_key();
    let result = if invoice.lock_version() == 0 {
        sqlx::query(
            r#"
            INSERT INTO invoices (tenant_id, id, invoice_number, booking_id, status, due_date, lock_version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $8, $9)
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(invoice.invoice_number())
        .bind(invoice.booking_id().map(|b| *b.as_uuid()))
        .bind(invoice.status().as_str())
        .bind(invoice.due_date())
        .bind(&document)
        .bind(invoice.created_at())
        .bind(invoice.updated_at())
        .execute(&mut *conn)
        .await?
    } else {
        sqlx::query(
            r#"
            UPDATE invoices
            SET status = $3, due_date = $4, document = $5, updated_at = $6, lock_version = lock_version + 1
            WHERE tenant_id = $1 AND id = $2 AND lock_version = $7
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(invoice.status().as_str())
        .bind(invoice.due_date())
        .bind(&document)
        .bind(invoice.updated_at())
        .bind(to_column(invoice.lock_version())?)
        .execute(&mut *conn)
        .await?
    };
    expect_one(result.rows_affected(), invoice)
}

pub async fn save_payment(conn: &mut PgConnection, payment: &Payment) -> Result<u64, DatabaseError> {
    let document = serde_json::to_value(payment)?;
    let (tenant_id, id) = payment.row_key();
    let gateway_id = payment.gateway().map(|g| g.gateway_transaction_id.as_str());
    let result = if payment.lock_version() == 0 {
        sqlx::query(
            r#"
            INSERT INTO payments (tenant_id, id, transaction_id, booking_id, invoice_id, gateway_transaction_id,
                                  status, lock_version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $9, $10)
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(payment.transaction_id())
        .bind(payment.booking_id().as_uuid())
        .bind(payment.invoice_id().map(|i| *i.as_uuid()))
        .bind(gateway_id)
        .bind(payment.status().as_str())
        .bind(&document)
        .bind(payment.created_at())
        .bind(payment.updated_at())
        .execute(&mut *conn)
        .await?
    } else {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = $3, gateway_transaction_id = $4, document = $5, updated_at = $6, lock_version = lock_version + 1
            WHERE tenant_id = $1 AND id = $2 AND lock_version = $7
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(payment.status().as_str())
        .bind(gateway_id)
        .bind(&document)
        .bind(payment.updated_at())
        .bind(to_column(payment.lock_version())?)
        .execute(&mut *conn)
        .await?
    };
    expect_one(result.rows_affected(), payment)
}

fn expect_one<T: StoredDocument>(rows_affected: u64, doc: &T) -> Result<u64, DatabaseError> {
    if rows_affected != 1 {
        return Err(DatabaseError::version_conflict(T::ENTITY, doc.row_key().1));
    }
    Ok(doc.stored_version() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conversion_rejects_negative() {
        assert!(to_version(-1).is_err());
        assert_eq!(to_version(3).unwrap(), 3);
        assert_eq!(to_column(7).unwrap(), 7);
    }

    #[test]
    fn test_tables_are_distinct() {
        let tables = [Quote::TABLE, Booking::TABLE, Invoice::TABLE, Payment::TABLE];
        for (i, a) in tables.iter().enumerate() {
            for b in &tables[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
