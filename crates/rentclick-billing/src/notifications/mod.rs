//! Administrator emails for completed rentals and new customers

mod email;

pub use email::{EmailMessage, EmailSender, LogEmailSender, RecordingEmailSender, WebhookEmailSender};

use crate::config::NotificationConfig;
use crate::domain::billing::format_duration;
use crate::domain::customers::Customer;
use crate::domain::lifecycle::ChargeLine;
use crate::domain::types::Money;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub admin_email: String,
    pub company_name: String,
}

impl From<&NotificationConfig> for NotificationSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
            admin_email: config.admin_email.clone(),
            company_name: config.company_name.clone(),
        }
    }
}

pub struct Notifier {
    sender: Arc<dyn EmailSender>,
    settings: NotificationSettings,
}

impl Notifier {
    pub fn new(sender: Arc<dyn EmailSender>, settings: NotificationSettings) -> Self {
        Self { sender, settings }
    }

    /// Webhook delivery when a URL is configured, log-only otherwise
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let sender: Arc<dyn EmailSender> = match &config.webhook_url {
            Some(url) => Arc::new(WebhookEmailSender::new(
                url.clone(),
                Duration::from_secs(config.request_timeout_seconds),
            )?),
            None => Arc::new(LogEmailSender),
        };
        Ok(Self::new(sender, NotificationSettings::from(config)))
    }

    pub fn disabled() -> Self {
        Self::new(
            Arc::new(LogEmailSender),
            NotificationSettings {
                enabled: false,
                admin_email: String::new(),
                company_name: String::new(),
            },
        )
    }

    async fn deliver(&self, subject: String, body: String) -> Result<()> {
        if !self.settings.enabled {
            debug!(subject = %subject, "Notifications disabled, skipping");
            return Ok(());
        }
        let message = EmailMessage {
            to: self.settings.admin_email.clone(),
            subject,
            body,
        };
        self.sender.send(&message).await
    }

    pub async fn customer_registered(&self, customer: &Customer) -> Result<()> {
        let (subject, body) = customer_registered_message(&self.settings.company_name, customer);
        self.deliver(subject, body).await
    }

    /// One message per customer, listing every vehicle returned in the batch.
    pub async fn rental_completed(
        &self,
        customer: &Customer,
        lines: &[ChargeLine],
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let (subject, body) =
            rental_completed_message(&self.settings.company_name, customer, lines, completed_at);
        self.deliver(subject, body).await
    }
}

fn customer_registered_message(company: &str, customer: &Customer) -> (String, String) {
    let subject = format!("{}: new customer {}", company, customer.name);
    let mut lines = vec![
        "A new customer was registered.".to_string(),
        String::new(),
        format!("Name: {}", customer.name),
        format!("Phone: {}", customer.phone),
    ];
    let optional = [
        ("ID number", &customer.id_number),
        ("Document", &customer.document_url),
        ("Signature", &customer.signature_url),
    ];
    lines.extend(
        optional
            .into_iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v))),
    );
    (subject, to_body(lines))
}

fn rental_completed_message(
    company: &str,
    customer: &Customer,
    lines: &[ChargeLine],
    completed_at: DateTime<Utc>,
) -> (String, String) {
    let total: Money = lines.iter().map(|l| l.cost).sum();
    let subject = format!("{}: rental completed for {}", company, customer.name);

    let mut body = vec![
        format!("Customer: {} ({})", customer.name, customer.phone),
        format!("Returned at: {}", completed_at.format("%Y-%m-%d %H:%M")),
        String::new(),
    ];
    body.extend(lines.iter().map(charge_summary));
    body.push(String::new());
    body.push(format!("Total: {}", total));
    (subject, to_body(body))
}

fn charge_summary(line: &ChargeLine) -> String {
    let summary = format!(
        "{}: {} ({} h x {}) = {}",
        line.vehicle_label,
        format_duration(line.actual_duration),
        line.billable_hours,
        line.hourly_rate,
        line.cost
    );
    if line.overdue_minutes > 0 {
        format!("{}, overdue by {}", summary, format_duration(line.overdue_minutes))
    } else {
        summary
    }
}

/// Newline-terminated
fn to_body(lines: Vec<String>) -> String {
    let mut body = lines.join("\n");
    body.push('\n');
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CustomerId, RentalId, VehicleId, VehicleType};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn settings(enabled: bool) -> NotificationSettings {
        NotificationSettings {
            enabled,
            admin_email: "owner@example.com".to_string(),
            company_name: "Beach Bikes".to_string(),
        }
    }

    fn line(label: &str, minutes: i64, overdue: i64, cost: Money) -> ChargeLine {
        ChargeLine {
            rental_id: RentalId::new(),
            customer_id: CustomerId::new(),
            vehicle_id: VehicleId::new(),
            vehicle_label: label.to_string(),
            vehicle_type: VehicleType::StandardBike,
            hourly_rate: Money::from_decimal(dec!(15)),
            start_date: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            planned_duration: 60,
            actual_duration: minutes,
            overdue_minutes: overdue,
            billable_hours: 2,
            cost,
        }
    }

    #[tokio::test]
    async fn test_rental_completed_message() {
        let sender = Arc::new(RecordingEmailSender::default());
        let notifier = Notifier::new(sender.clone(), settings(true));
        let customer = Customer::new("Dana".to_string(), "050".to_string());
        let completed_at = Utc.with_ymd_and_hms(2024, 1, 1, 11, 10, 0).unwrap();

        notifier
            .rental_completed(
                &customer,
                &[
                    line("Bike #B-1", 70, 10, Money::from_decimal(dec!(30))),
                    line("Bike #B-2", 70, 10, Money::from_decimal(dec!(30))),
                ],
                completed_at,
            )
            .await
            .unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@example.com");
        assert_eq!(sent[0].subject, "Beach Bikes: rental completed for Dana");
        assert!(sent[0].body.contains("Bike #B-1: 1:10 (2 h x 15) = 30, overdue by 0:10"));
        assert!(sent[0].body.contains("Total: 60"));
    }

    #[test]
    fn test_message_bodies_are_line_per_field() {
        let mut customer = Customer::new("Dana".to_string(), "050".to_string());
        customer.document_url = Some("http://files/doc.png".to_string());

        let (subject, body) = customer_registered_message("Beach Bikes", &customer);
        assert_eq!(subject, "Beach Bikes: new customer Dana");
        assert_eq!(
            body,
            "A new customer was registered.\n\nName: Dana\nPhone: 050\nDocument: http://files/doc.png\n"
        );

        let completed_at = Utc.with_ymd_and_hms(2024, 1, 1, 11, 10, 0).unwrap();
        let (_, body) = rental_completed_message(
            "Beach Bikes",
            &customer,
            &[line("Bike #B-1", 55, 0, Money::from_decimal(dec!(15)))],
            completed_at,
        );
        assert_eq!(
            body,
            "Customer: Dana (050)\nReturned at: 2024-01-01 11:10\n\nBike #B-1: 0:55 (2 h x 15) = 15\n\nTotal: 15\n"
        );
    }

    #[tokio::test]
    async fn test_disabled_notifier_sends_nothing() {
        let sender = Arc::new(RecordingEmailSender::default());
        let notifier = Notifier::new(sender.clone(), settings(false));
        let customer = Customer::new("Dana".to_string(), "050".to_string());

        notifier.customer_registered(&customer).await.unwrap();
        assert!(sender.sent().is_empty());
    }
}
