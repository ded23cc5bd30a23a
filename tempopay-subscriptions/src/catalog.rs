//! Static catalog of subscribable services.

use serde::{Deserialize, Serialize};
use tempopay_lib::{Address, Amount};

use crate::{Result, SubscriptionError};

/// A service users can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Monthly price in whole token units
    pub price: Amount,
    /// Address charges are paid to
    pub payee: Address,
}

impl Service {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        price: Amount,
        payee: Address,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            price,
            payee,
        }
    }

    /// Memo text attached to every charge.
    pub fn charge_memo(&self) -> String {
        format!("{} subscription", self.name)
    }
}

/// Ordered, immutable list of services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    services: Vec<Service>,
}

impl Catalog {
    /// Build a catalog. Service ids must be unique.
    pub fn new(services: Vec<Service>) -> Result<Self> {
        for (i, service) in services.iter().enumerate() {
            if services[..i].iter().any(|s| s.id == service.id) {
                return Err(SubscriptionError::InvalidArgument(format!(
                    "duplicate service id: {}",
                    service.id
                ))
                .into());
            }
            if !service.price.is_positive() {
                return Err(SubscriptionError::InvalidArgument(format!(
                    "service {} must have a positive price",
                    service.id
                ))
                .into());
            }
        }
        Ok(Self { services })
    }

    /// The services offered by the demo wallet.
    pub fn demo() -> Self {
        let payee = |byte: u8| Address::new([byte; 20]);
        Self {
            services: vec![
                Service::new(
                    "streamwave",
                    "StreamWave",
                    "Originals and live sports in one plan.",
                    Amount::from_units(24),
                    payee(0x11),
                ),
                Service::new(
                    "echo",
                    "EchoLane",
                    "Hi-fi music with offline mixes.",
                    Amount::from_units(19),
                    payee(0x22),
                ),
                Service::new(
                    "spark",
                    "Spark AI",
                    "Personal AI assistant for work and ideas.",
                    Amount::from_units(32),
                    payee(0x33),
                ),
                Service::new(
                    "north",
                    "NorthShield",
                    "Fast VPN with global routing.",
                    Amount::from_units(14),
                    payee(0x44),
                ),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Like [`Self::get`], failing with [`SubscriptionError::UnknownService`].
    pub fn require(&self, id: &str) -> Result<&Service> {
        self.get(id)
            .ok_or_else(|| SubscriptionError::UnknownService(id.to_string()).into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::demo()
    }
}
