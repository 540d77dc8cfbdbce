//! Domain records stored by resource managers and the coordinator.
//!
//! - [`ReservableItem`]: flight seats, cars or rooms at one key
//! - [`Customer`]: a customer and the reservations recorded against them
//! - [`ReservedItem`]: one line of a customer's reservations

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tandem_common::types::{customer_key, CustomerId};

/// An inventory record owned by a resource manager.
///
/// `count` is the number still available, `reserved` the number handed out
/// to customers. Deleting an item is only allowed while `reserved` is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservableItem {
    /// Store key, e.g. `room-nyc`.
    pub key: String,
    /// Human label: the location, or the flight number.
    pub label: String,
    /// Units available.
    pub count: u32,
    /// Price per unit.
    pub price: u32,
    /// Units reserved by customers.
    pub reserved: u32,
}

impl ReservableItem {
    /// Creates an item with nothing reserved.
    pub fn new(key: impl Into<String>, label: impl Into<String>, count: u32, price: u32) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            count,
            price,
            reserved: 0,
        }
    }

    /// Adds stock. The price is only replaced when `price` is positive.
    pub fn restock(&mut self, count: u32, price: u32) {
        self.count = self.count.saturating_add(count);
        if price > 0 {
            self.price = price;
        }
    }

    /// Moves one unit from available to reserved. Returns false if none is left.
    pub fn take_one(&mut self) -> bool {
        if self.count == 0 {
            return false;
        }
        self.count -= 1;
        self.reserved += 1;
        true
    }

    /// Moves up to `count` units from reserved back to available.
    pub fn give_back(&mut self, count: u32) {
        let returned = count.min(self.reserved);
        self.reserved -= returned;
        self.count = self.count.saturating_add(returned);
    }
}

impl fmt::Display for ReservableItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} available, {} reserved, ${}",
            self.key, self.label, self.count, self.reserved, self.price
        )
    }
}

/// One line of a customer's reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedItem {
    /// Key of the reserved item.
    pub key: String,
    /// Label of the reserved item.
    pub label: String,
    /// Units reserved.
    pub count: u32,
    /// Price at the most recent reservation.
    pub price: u32,
}

/// A customer record, owned by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    id: CustomerId,
    reservations: BTreeMap<String, ReservedItem>,
}

impl Customer {
    /// Creates a customer without reservations.
    pub fn new(id: CustomerId) -> Self {
        Self {
            id,
            reservations: BTreeMap::new(),
        }
    }

    /// Returns the customer ID.
    pub fn id(&self) -> CustomerId {
        self.id
    }

    /// Returns the store key of this customer.
    pub fn key(&self) -> String {
        customer_key(self.id)
    }

    /// Records one more unit of `key` at `price`.
    pub fn reserve(&mut self, key: &str, label: &str, price: u32) {
        let entry = self
            .reservations
            .entry(key.to_string())
            .or_insert_with(|| ReservedItem {
                key: key.to_string(),
                label: label.to_string(),
                count: 0,
                price,
            });
        entry.count += 1;
        entry.price = price;
    }

    /// Returns the reservation recorded for `key`.
    pub fn reservation(&self, key: &str) -> Option<&ReservedItem> {
        self.reservations.get(key)
    }

    /// Returns all reservations in key order.
    pub fn reservations(&self) -> impl Iterator<Item = &ReservedItem> {
        self.reservations.values()
    }

    /// Returns the total number of reserved units.
    pub fn reserved_units(&self) -> u32 {
        self.reservations.values().map(|r| r.count).sum()
    }

    /// Renders the customer's bill, one line per reservation in key order.
    pub fn bill(&self) -> String {
        let mut bill = format!("Bill for customer {}\n", self.id);
        for item in self.reservations.values() {
            bill.push_str(&format!("{} {} ${}\n", item.count, item.key, item.price));
        }
        bill
    }
}
