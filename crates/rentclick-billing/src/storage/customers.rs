use crate::domain::customers::Customer;
use crate::domain::types::CustomerId;
use crate::error::{RentalError, Result};
use crate::storage::connection::DatabaseConnection;
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn list_customers(&self) -> Result<Vec<Customer>>;
    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>>;
    async fn create_customer(&self, customer: &Customer) -> Result<()>;
    async fn update_customer(&self, customer: &Customer) -> Result<()>;
    async fn delete_customer(&self, id: &CustomerId) -> Result<()>;
}

pub struct SqlCustomerRepository {
    connection: Arc<DatabaseConnection>,
}

impl SqlCustomerRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn customer_from_row(r: &sqlx::postgres::PgRow) -> Customer {
        Customer {
            id: CustomerId::from_uuid(r.get("customer_id")),
            name: r.get("name"),
            phone: r.get("phone"),
            id_number: r.get("id_number"),
            document_url: r.get("document_url"),
            signature_url: r.get("signature_url"),
        }
    }
}

#[async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(
            r#"
            SELECT customer_id, name, phone, id_number, document_url, signature_url
            FROM customers
            ORDER BY created_at, name
            "#,
        )
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("list_customers", e))?;

        Ok(rows.iter().map(Self::customer_from_row).collect())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT customer_id, name, phone, id_number, document_url, signature_url
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("get_customer", e))?;

        Ok(row.map(|r| Self::customer_from_row(&r)))
    }

    async fn create_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers
            (customer_id, name, phone, id_number, document_url, signature_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.id_number)
        .bind(&customer.document_url)
        .bind(&customer.signature_url)
        .execute(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("create_customer", e))?;

        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = $2, phone = $3, id_number = $4, document_url = $5,
                signature_url = $6, updated_at = NOW()
            WHERE customer_id = $1
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.id_number)
        .bind(&customer.document_url)
        .bind(&customer.signature_url)
        .execute(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("update_customer", e))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::not_found("customer", customer.id));
        }
        Ok(())
    }

    async fn delete_customer(&self, id: &CustomerId) -> Result<()> {
        let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(id.as_uuid())
            .execute(self.connection.pool())
            .await
            .map_err(|e| RentalError::database("delete_customer", e))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::not_found("customer", id));
        }
        Ok(())
    }
}
