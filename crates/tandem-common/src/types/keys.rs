//! Resource keys.
//!
//! Every item in the system is named by a string key namespaced by its
//! domain prefix (`flight-`, `car-`, `room-`, `customer-`). The prefix is
//! also how the coordinator finds the participant that owns a key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::CustomerId;

/// The domain a key belongs to.
///
/// The declaration order is the canonical order in which the coordinator
/// visits enlisted participants at commit and abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Flight seats, keyed by flight number.
    Flight,
    /// Rental cars, keyed by location.
    Car,
    /// Hotel rooms, keyed by location.
    Room,
    /// Customers, owned by the coordinator itself.
    Customer,
}

impl ResourceKind {
    /// All reservable kinds (those owned by a participant).
    pub const RESERVABLE: [ResourceKind; 3] =
        [ResourceKind::Flight, ResourceKind::Car, ResourceKind::Room];

    /// Returns the key prefix for this kind, including the trailing dash.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            ResourceKind::Flight => "flight-",
            ResourceKind::Car => "car-",
            ResourceKind::Room => "room-",
            ResourceKind::Customer => "customer-",
        }
    }

    /// Returns a short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ResourceKind::Flight => "flight",
            ResourceKind::Car => "car",
            ResourceKind::Room => "room",
            ResourceKind::Customer => "customer",
        }
    }

    /// Builds the key for an item of this kind.
    ///
    /// Identifiers are lower-cased so that `NYC` and `nyc` name the same item.
    #[must_use]
    pub fn key(self, id: impl fmt::Display) -> String {
        format!("{}{}", self.prefix(), id.to_string().to_lowercase())
    }

    /// Resolves the kind of a key by its prefix.
    #[must_use]
    pub fn of_key(key: &str) -> Option<ResourceKind> {
        [
            ResourceKind::Flight,
            ResourceKind::Car,
            ResourceKind::Room,
            ResourceKind::Customer,
        ]
        .into_iter()
        .find(|kind| key.starts_with(kind.prefix()))
    }

    /// Returns true if items of this kind are owned by a participant.
    #[must_use]
    pub const fn is_reservable(self) -> bool {
        !matches!(self, ResourceKind::Customer)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flight" | "flights" => Ok(ResourceKind::Flight),
            "car" | "cars" => Ok(ResourceKind::Car),
            "room" | "rooms" => Ok(ResourceKind::Room),
            "customer" | "customers" => Ok(ResourceKind::Customer),
            other => Err(format!("unknown resource kind '{other}'")),
        }
    }
}

/// Key of a flight.
#[must_use]
pub fn flight_key(number: u32) -> String {
    ResourceKind::Flight.key(number)
}

/// Key of the cars at a location.
#[must_use]
pub fn car_key(location: &str) -> String {
    ResourceKind::Car.key(location)
}

/// Key of the rooms at a location.
#[must_use]
pub fn room_key(location: &str) -> String {
    ResourceKind::Room.key(location)
}

/// Key of a customer record.
#[must_use]
pub fn customer_key(id: CustomerId) -> String {
    ResourceKind::Customer.key(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_building() {
        assert_eq!(flight_key(101), "flight-101");
        assert_eq!(car_key("Montreal"), "car-montreal");
        assert_eq!(room_key("NYC"), "room-nyc");
        assert_eq!(customer_key(CustomerId::new(7)), "customer-7");
    }

    #[test]
    fn test_kind_of_key() {
        assert_eq!(ResourceKind::of_key("room-nyc"), Some(ResourceKind::Room));
        assert_eq!(ResourceKind::of_key("car-nyc"), Some(ResourceKind::Car));
        assert_eq!(ResourceKind::of_key("flight-1"), Some(ResourceKind::Flight));
        assert_eq!(
            ResourceKind::of_key("customer-9"),
            Some(ResourceKind::Customer)
        );
        assert_eq!(ResourceKind::of_key("boat-1"), None);
    }

    #[test]
    fn test_kind_ordering_and_parse() {
        assert!(ResourceKind::Flight < ResourceKind::Car);
        assert!(ResourceKind::Room < ResourceKind::Customer);
        assert_eq!("Rooms".parse::<ResourceKind>(), Ok(ResourceKind::Room));
        assert!("boats".parse::<ResourceKind>().is_err());
        assert!(!ResourceKind::Customer.is_reservable());
    }
}
