use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::phone::PhoneNumber;

/// Order lifecycle, in the order stages are passed through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    ManagerProcessing,
    Cooking,
    Delivery,
    Ready,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::ManagerProcessing => "manager-processing",
            OrderStatus::Cooking => "cooking",
            OrderStatus::Delivery => "delivery",
            OrderStatus::Ready => "ready",
        }
    }

    pub fn is_in_process(&self) -> bool {
        *self != OrderStatus::Ready
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager-processing" => Ok(OrderStatus::ManagerProcessing),
            "cooking" => Ok(OrderStatus::Cooking),
            "delivery" => Ok(OrderStatus::Delivery),
            "ready" => Ok(OrderStatus::Ready),
            other => Err(format!("unknown order status {other}")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Online,
    Card,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "online",
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(PaymentMethod::Online),
            "card" => Ok(PaymentMethod::Card),
            "cash" => Ok(PaymentMethod::Cash),
            other => Err(format!("unknown payment method {other}")),
        }
    }
}

/// Field name to messages, for everything wrong with a submitted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    Validation(ValidationErrors),
    #[error("cannot move order from {from} back to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product: Uuid,
    pub quantity: i64,
}

/// Largest quantity accepted for a single order line.
pub const MAX_LINE_QUANTITY: u32 = 32_767;

/// An order as submitted by a customer, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub phonenumber: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub payment: Option<PaymentMethod>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub products: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: u32,
    /// Captured when the order was placed; later price changes do not apply.
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub phonenumber: PhoneNumber,
    pub address: String,
    pub status: OrderStatus,
    pub payment: Option<PaymentMethod>,
    pub comment: String,
    pub restaurant_id: Option<Uuid>,
    pub lines: Vec<OrderLine>,
    pub registered_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validates a submission against the current catalog prices.
    ///
    /// All failing fields are reported together. Repeated products are merged
    /// into one line with the quantities summed.
    pub fn new(input: NewOrder, prices: &HashMap<Uuid, i64>) -> Result<Self, OrderError> {
        let mut errors = ValidationErrors::default();

        if input.firstname.trim().is_empty() {
            errors.add("firstname", "this field is required");
        }
        if input.address.trim().is_empty() {
            errors.add("address", "this field is required");
        }
        let phonenumber = match PhoneNumber::parse(&input.phonenumber) {
            Ok(p) => Some(p),
            Err(e) => {
                errors.add("phonenumber", e.to_string());
                None
            }
        };

        if input.products.is_empty() {
            errors.add("products", "at least one product is required");
        }
        let mut lines: Vec<OrderLine> = Vec::with_capacity(input.products.len());
        for line in &input.products {
            if line.quantity < 1 {
                errors.add("quantity", format!("quantity for {} must be at least 1", line.product));
                continue;
            }
            let quantity = match u32::try_from(line.quantity) {
                Ok(q) if q <= MAX_LINE_QUANTITY => q,
                _ => {
                    errors.add("quantity", format!("quantity for {} is too large", line.product));
                    continue;
                }
            };
            let Some(&unit_price_cents) = prices.get(&line.product) else {
                errors.add("products", format!("no product with id = {}", line.product));
                continue;
            };
            match lines.iter_mut().find(|l| l.product_id == line.product) {
                Some(existing) => match existing.quantity.checked_add(quantity) {
                    Some(q) if q <= MAX_LINE_QUANTITY => existing.quantity = q,
                    _ => errors.add(
                        "quantity",
                        format!("quantity for {} is too large", line.product),
                    ),
                },
                None => lines.push(OrderLine {
                    product_id: line.product,
                    quantity,
                    unit_price_cents,
                }),
            }
        }

        if errors.is_empty() && checked_total(&lines).is_none() {
            errors.add("products", "order total is too large");
        }

        let phonenumber = match phonenumber {
            Some(p) if errors.is_empty() => p,
            _ => return Err(OrderError::Validation(errors)),
        };

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            firstname: input.firstname,
            lastname: input.lastname,
            phonenumber,
            address: input.address,
            status: OrderStatus::ManagerProcessing,
            payment: input.payment,
            comment: input.comment,
            restaurant_id: None,
            lines,
            registered_at: now,
            called_at: None,
            delivered_at: None,
            updated_at: now,
        })
    }

    /// Saturates at `i64::MAX`; orders built through [`Order::new`] never do.
    pub fn total_cents(&self) -> i64 {
        checked_total(&self.lines).unwrap_or(i64::MAX)
    }

    /// Distinct products in line order.
    pub fn product_ids(&self) -> Vec<Uuid> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    /// Moves the order forward. Returns `false` when the status is unchanged.
    pub fn update_status(&mut self, status: OrderStatus) -> Result<bool, OrderError> {
        if status == self.status {
            return Ok(false);
        }
        if status < self.status {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }
        let now = Utc::now();
        if status >= OrderStatus::Delivery && self.called_at.is_none() {
            self.called_at = Some(now);
        }
        if status == OrderStatus::Ready {
            self.delivered_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
        Ok(true)
    }

    pub fn assign_restaurant(&mut self, restaurant_id: Uuid) {
        self.restaurant_id = Some(restaurant_id);
        self.updated_at = Utc::now();
    }
}

fn checked_total(lines: &[OrderLine]) -> Option<i64> {
    lines.iter().try_fold(0i64, |acc, l| {
        i64::from(l.quantity)
            .checked_mul(l.unit_price_cents)
            .and_then(|line| acc.checked_add(line))
    })
}
