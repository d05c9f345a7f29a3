use crate::domain::types::CustomerId;
use crate::error::{RentalError, Result};
use crate::files::FileStorage;
use crate::notifications::Notifier;
use crate::storage::{CustomerRepository, RentalRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Phone recorded for anonymous walk-in customers
pub const WALK_IN_PHONE: &str = "000-0000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub id_number: Option<String>,
    pub document_url: Option<String>,
    pub signature_url: Option<String>,
}

impl Customer {
    pub fn new(name: String, phone: String) -> Self {
        Self {
            id: CustomerId::new(),
            name,
            phone,
            id_number: None,
            document_url: None,
            signature_url: None,
        }
    }

    /// Case-insensitive match on name; substring match on phone and id number.
    /// A blank query matches everyone.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        let lowered = query.to_lowercase();
        self.name.to_lowercase().contains(&lowered)
            || self.phone.contains(query)
            || self
                .id_number
                .as_deref()
                .is_some_and(|id_number| id_number.contains(query))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub id_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub id_number: Option<String>,
}

/// Which uploaded file a customer attachment is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerAttachment {
    Document,
    Signature,
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RentalError::invalid_input(format!("Customer {} is required", field)));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn search_customers<'a>(customers: &'a [Customer], query: &str) -> Vec<&'a Customer> {
    customers.iter().filter(|c| c.matches_query(query)).collect()
}

pub struct CustomerManager {
    customers: Arc<dyn CustomerRepository>,
    rentals: Arc<dyn RentalRepository>,
    files: Arc<dyn FileStorage>,
    notifier: Arc<Notifier>,
}

impl CustomerManager {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        rentals: Arc<dyn RentalRepository>,
        files: Arc<dyn FileStorage>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            customers,
            rentals,
            files,
            notifier,
        }
    }

    pub async fn list(&self) -> Result<Vec<Customer>> {
        self.customers.list_customers().await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Customer>> {
        let customers = self.customers.list_customers().await?;
        Ok(customers.into_iter().filter(|c| c.matches_query(query)).collect())
    }

    pub async fn get(&self, id: &CustomerId) -> Result<Customer> {
        self.customers
            .get_customer(id)
            .await?
            .ok_or_else(|| RentalError::not_found("customer", id))
    }

    /// Register a customer and notify the administrator.
    pub async fn register(&self, input: NewCustomer) -> Result<Customer> {
        let mut customer = Customer::new(
            required(&input.name, "name")?,
            required(&input.phone, "phone")?,
        );
        customer.id_number = optional(input.id_number);

        self.customers.create_customer(&customer).await?;
        info!(customer_id = %customer.id, "Registered customer");

        if let Err(e) = self.notifier.customer_registered(&customer).await {
            warn!(customer_id = %customer.id, error = %e, "Failed to send new customer notification");
        }

        Ok(customer)
    }

    /// Reuse a customer with the same name (case-insensitive) and phone,
    /// or register a new one.
    pub async fn find_or_register(&self, name: &str, phone: &str) -> Result<Customer> {
        let name = required(name, "name")?;
        let phone = required(phone, "phone")?;
        let lowered = name.to_lowercase();

        let existing = self
            .customers
            .list_customers()
            .await?
            .into_iter()
            .find(|c| c.name.to_lowercase() == lowered && c.phone == phone);

        match existing {
            Some(customer) => Ok(customer),
            None => {
                self.register(NewCustomer {
                    name,
                    phone,
                    id_number: None,
                })
                .await
            }
        }
    }

    /// Anonymous customer for a walk-in quick checkout. No notification is sent.
    pub async fn register_walk_in(&self, name: Option<String>, now: DateTime<Utc>) -> Result<Customer> {
        let name = optional(name)
            .unwrap_or_else(|| format!("Walk-in customer {}", now.format("%Y-%m-%d %H:%M:%S")));
        let customer = Customer::new(name, WALK_IN_PHONE.to_string());
        self.customers.create_customer(&customer).await?;
        info!(customer_id = %customer.id, "Registered walk-in customer");
        Ok(customer)
    }

    pub async fn update(&self, id: &CustomerId, update: CustomerUpdate) -> Result<Customer> {
        let mut customer = self.get(id).await?;
        if let Some(name) = update.name {
            customer.name = required(&name, "name")?;
        }
        if let Some(phone) = update.phone {
            customer.phone = required(&phone, "phone")?;
        }
        if update.id_number.is_some() {
            customer.id_number = optional(update.id_number);
        }
        self.customers.update_customer(&customer).await?;
        Ok(customer)
    }

    pub async fn attach(
        &self,
        id: &CustomerId,
        attachment: CustomerAttachment,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Customer> {
        let mut customer = self.get(id).await?;
        let folder = match attachment {
            CustomerAttachment::Document => "documents",
            CustomerAttachment::Signature => "signatures",
        };
        let url = self
            .files
            .upload(&format!("customers/{}/{}/{}", customer.id, folder, file_name), bytes)
            .await?;

        match attachment {
            CustomerAttachment::Document => customer.document_url = Some(url),
            CustomerAttachment::Signature => customer.signature_url = Some(url),
        }
        self.customers.update_customer(&customer).await?;
        Ok(customer)
    }

    /// Delete a customer with no rentals. With `purge_history`, completed
    /// rentals are deleted first; active rentals always block deletion.
    pub async fn delete(&self, id: &CustomerId, purge_history: bool) -> Result<()> {
        let customer = self.get(id).await?;
        let rentals = self.rentals.list_rentals_for_customer(&customer.id).await?;

        if rentals.iter().any(|r| r.is_active()) {
            return Err(RentalError::invalid_state(
                "customer",
                customer.id,
                "customer has active rentals",
            ));
        }
        if !rentals.is_empty() && !purge_history {
            return Err(RentalError::invalid_state(
                "customer",
                customer.id,
                format!("customer has {} rental records", rentals.len()),
            ));
        }

        for rental in &rentals {
            self.rentals.delete_rental(&rental.id).await?;
        }
        self.customers.delete_customer(&customer.id).await?;

        info!(
            customer_id = %customer.id,
            purged_rentals = rentals.len(),
            "Deleted customer"
        );
        Ok(())
    }
}
