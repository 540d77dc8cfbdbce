//! Shell command parsing.

use std::fmt;
use std::str::FromStr;

use tandem_common::types::{CustomerId, ResourceKind, TxnId};
use thiserror::Error;

/// Errors produced while parsing a shell line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The command name is not known.
    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    /// The command got the wrong number of arguments.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// An argument could not be parsed.
    #[error("invalid {what} '{value}'")]
    InvalidArgument {
        /// What the argument was supposed to be.
        what: &'static str,
        /// The offending text.
        value: String,
    },
}

/// Which location-keyed resource a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    /// Rental cars.
    Cars,
    /// Hotel rooms.
    Rooms,
}

impl Place {
    /// Returns the resource kind.
    pub fn kind(self) -> ResourceKind {
        match self {
            Place::Cars => ResourceKind::Car,
            Place::Rooms => ResourceKind::Room,
        }
    }
}

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Begin a transaction.
    Start,
    /// Commit a transaction.
    Commit(TxnId),
    /// Abort a transaction.
    Abort(TxnId),
    /// Add seats to a flight.
    AddFlight {
        /// Transaction.
        xid: TxnId,
        /// Flight number.
        number: u32,
        /// Seats to add.
        seats: u32,
        /// Seat price.
        price: u32,
    },
    /// Add cars or rooms at a location.
    AddPlace {
        /// Cars or rooms.
        place: Place,
        /// Transaction.
        xid: TxnId,
        /// Location.
        location: String,
        /// Units to add.
        count: u32,
        /// Unit price.
        price: u32,
    },
    /// Create a customer, with a generated id unless one is given.
    NewCustomer(TxnId, Option<CustomerId>),
    /// Delete a flight.
    DeleteFlight(TxnId, u32),
    /// Delete the cars or rooms at a location.
    DeletePlace(Place, TxnId, String),
    /// Delete a customer.
    DeleteCustomer(TxnId, CustomerId),
    /// Seats available on a flight.
    QueryFlight(TxnId, u32),
    /// Units available at a location.
    QueryPlace(Place, TxnId, String),
    /// Seat price of a flight.
    QueryFlightPrice(TxnId, u32),
    /// Unit price at a location.
    QueryPlacePrice(Place, TxnId, String),
    /// A customer's bill.
    QueryCustomer(TxnId, CustomerId),
    /// Reserve a seat.
    ReserveFlight(TxnId, CustomerId, u32),
    /// Reserve a car or room.
    ReservePlace(Place, TxnId, CustomerId, String),
    /// Reserve several items at once.
    Bundle {
        /// Transaction.
        xid: TxnId,
        /// Customer.
        customer: CustomerId,
        /// Location for the car and room.
        location: String,
        /// Whether to reserve a car.
        car: bool,
        /// Whether to reserve a room.
        room: bool,
        /// Flight numbers, repeated for several seats.
        flights: Vec<u32>,
    },
    /// Items of a kind with few units left.
    LowStock(TxnId, ResourceKind, u32),
    /// Every customer and their reservations.
    Summary(TxnId),
    /// Show help.
    Help,
    /// Leave the shell.
    Quit,
}

/// Help text listing every command.
pub const HELP: &str = "\
start
commit <xid>
abort <xid>
add-flight <xid> <number> <seats> <price>
add-cars|add-rooms <xid> <location> <count> <price>
new-customer <xid> [id]
delete-flight <xid> <number>
delete-cars|delete-rooms <xid> <location>
delete-customer <xid> <id>
query-flight <xid> <number>
query-cars|query-rooms <xid> <location>
query-flight-price <xid> <number>
query-cars-price|query-rooms-price <xid> <location>
query-customer <xid> <id>
reserve-flight <xid> <customer> <number>
reserve-car|reserve-room <xid> <customer> <location>
bundle <xid> <customer> <location> <car:bool> <room:bool> <flight>...
low-stock <xid> <flight|car|room> <threshold>
summary <xid>
help
quit";

/// Every command name, for completion.
pub const COMMAND_NAMES: &[&str] = &[
    "start",
    "commit",
    "abort",
    "add-flight",
    "add-cars",
    "add-rooms",
    "new-customer",
    "delete-flight",
    "delete-cars",
    "delete-rooms",
    "delete-customer",
    "query-flight",
    "query-cars",
    "query-rooms",
    "query-flight-price",
    "query-cars-price",
    "query-rooms-price",
    "query-customer",
    "reserve-flight",
    "reserve-car",
    "reserve-room",
    "bundle",
    "low-stock",
    "summary",
    "help",
    "quit",
];

fn number<T: FromStr>(what: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidArgument {
        what,
        value: value.to_string(),
    })
}

fn xid(value: &str) -> Result<TxnId, ParseError> {
    number("xid", value).map(TxnId::new)
}

fn customer(value: &str) -> Result<CustomerId, ParseError> {
    number("customer id", value).map(CustomerId::new)
}

fn flag(value: &str) -> Result<bool, ParseError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(ParseError::InvalidArgument {
            what: "flag",
            value: value.to_string(),
        }),
    }
}

fn place_of(name: &str) -> Place {
    if name.contains("car") {
        Place::Cars
    } else {
        Place::Rooms
    }
}

impl Command {
    /// Parses one line. Returns `None` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((name, args)) = words.split_first() else {
            return Ok(None);
        };
        let name = name.to_ascii_lowercase();

        let cmd = match (name.as_str(), args) {
            ("start", []) => Command::Start,
            ("start", _) => return Err(ParseError::Usage("start")),
            ("commit", [x]) => Command::Commit(xid(x)?),
            ("commit", _) => return Err(ParseError::Usage("commit <xid>")),
            ("abort", [x]) => Command::Abort(xid(x)?),
            ("abort", _) => return Err(ParseError::Usage("abort <xid>")),

            ("add-flight", [x, n, s, p]) => Command::AddFlight {
                xid: xid(x)?,
                number: number("flight number", n)?,
                seats: number("seat count", s)?,
                price: number("price", p)?,
            },
            ("add-flight", _) => return Err(ParseError::Usage("add-flight <xid> <number> <seats> <price>")),
            ("add-cars" | "add-rooms", [x, loc, c, p]) => Command::AddPlace {
                place: place_of(&name),
                xid: xid(x)?,
                location: (*loc).to_string(),
                count: number("count", c)?,
                price: number("price", p)?,
            },
            ("add-cars" | "add-rooms", _) => {
                return Err(ParseError::Usage("add-cars|add-rooms <xid> <location> <count> <price>"))
            }

            ("new-customer", [x]) => Command::NewCustomer(xid(x)?, None),
            ("new-customer", [x, id]) => Command::NewCustomer(xid(x)?, Some(customer(id)?)),
            ("new-customer", _) => return Err(ParseError::Usage("new-customer <xid> [id]")),

            ("delete-flight", [x, n]) => Command::DeleteFlight(xid(x)?, number("flight number", n)?),
            ("delete-flight", _) => return Err(ParseError::Usage("delete-flight <xid> <number>")),
            ("delete-cars" | "delete-rooms", [x, loc]) => {
                Command::DeletePlace(place_of(&name), xid(x)?, (*loc).to_string())
            }
            ("delete-cars" | "delete-rooms", _) => {
                return Err(ParseError::Usage("delete-cars|delete-rooms <xid> <location>"))
            }
            ("delete-customer", [x, id]) => Command::DeleteCustomer(xid(x)?, customer(id)?),
            ("delete-customer", _) => return Err(ParseError::Usage("delete-customer <xid> <id>")),

            ("query-flight", [x, n]) => Command::QueryFlight(xid(x)?, number("flight number", n)?),
            ("query-flight", _) => return Err(ParseError::Usage("query-flight <xid> <number>")),
            ("query-cars" | "query-rooms", [x, loc]) => {
                Command::QueryPlace(place_of(&name), xid(x)?, (*loc).to_string())
            }
            ("query-cars" | "query-rooms", _) => {
                return Err(ParseError::Usage("query-cars|query-rooms <xid> <location>"))
            }
            ("query-flight-price", [x, n]) => {
                Command::QueryFlightPrice(xid(x)?, number("flight number", n)?)
            }
            ("query-flight-price", _) => return Err(ParseError::Usage("query-flight-price <xid> <number>")),
            ("query-cars-price" | "query-rooms-price", [x, loc]) => {
                Command::QueryPlacePrice(place_of(&name), xid(x)?, (*loc).to_string())
            }
            ("query-cars-price" | "query-rooms-price", _) => {
                return Err(ParseError::Usage("query-cars-price|query-rooms-price <xid> <location>"))
            }
            ("query-customer", [x, id]) => Command::QueryCustomer(xid(x)?, customer(id)?),
            ("query-customer", _) => return Err(ParseError::Usage("query-customer <xid> <id>")),

            ("reserve-flight", [x, c, n]) => {
                Command::ReserveFlight(xid(x)?, customer(c)?, number("flight number", n)?)
            }
            ("reserve-flight", _) => return Err(ParseError::Usage("reserve-flight <xid> <customer> <number>")),
            ("reserve-car" | "reserve-room", [x, c, loc]) => {
                Command::ReservePlace(place_of(&name), xid(x)?, customer(c)?, (*loc).to_string())
            }
            ("reserve-car" | "reserve-room", _) => {
                return Err(ParseError::Usage("reserve-car|reserve-room <xid> <customer> <location>"))
            }

            ("bundle", [x, c, loc, car, room, flights @ ..]) => Command::Bundle {
                xid: xid(x)?,
                customer: customer(c)?,
                location: (*loc).to_string(),
                car: flag(car)?,
                room: flag(room)?,
                flights: flights
                    .iter()
                    .map(|n| number("flight number", n))
                    .collect::<Result<_, _>>()?,
            },
            ("bundle", _) => {
                return Err(ParseError::Usage(
                    "bundle <xid> <customer> <location> <car:bool> <room:bool> <flight>...",
                ))
            }

            ("low-stock", [x, kind, threshold]) => {
                let kind = ResourceKind::from_str(kind)
                    .ok()
                    .filter(|kind| kind.is_reservable())
                    .ok_or_else(|| ParseError::InvalidArgument {
                        what: "resource kind",
                        value: (*kind).to_string(),
                    })?;
                Command::LowStock(xid(x)?, kind, number("threshold", threshold)?)
            }
            ("low-stock", _) => return Err(ParseError::Usage("low-stock <xid> <flight|car|room> <threshold>")),
            ("summary", [x]) => Command::Summary(xid(x)?),
            ("summary", _) => return Err(ParseError::Usage("summary <xid>")),

            ("help" | "?", _) => Command::Help,
            ("quit" | "exit" | "q", _) => Command::Quit,
            _ => return Err(ParseError::UnknownCommand(name)),
        };

        Ok(Some(cmd))
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Cars => write!(f, "cars"),
            Place::Rooms => write!(f, "rooms"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_lifecycle_commands() {
        assert_eq!(parse("start"), Command::Start);
        assert_eq!(parse("COMMIT 4"), Command::Commit(TxnId::new(4)));
        assert_eq!(parse("abort 9"), Command::Abort(TxnId::new(9)));
        assert_eq!(parse("quit"), Command::Quit);
        assert_eq!(parse("help"), Command::Help);
    }

    #[test]
    fn test_inventory_commands() {
        assert_eq!(
            parse("add-flight 1 12 100 300"),
            Command::AddFlight {
                xid: TxnId::new(1),
                number: 12,
                seats: 100,
                price: 300,
            }
        );
        assert_eq!(
            parse("add-rooms 1 NYC 5 100"),
            Command::AddPlace {
                place: Place::Rooms,
                xid: TxnId::new(1),
                location: "NYC".to_string(),
                count: 5,
                price: 100,
            }
        );
        assert_eq!(
            parse("query-cars-price 2 SFO"),
            Command::QueryPlacePrice(Place::Cars, TxnId::new(2), "SFO".to_string())
        );
        assert_eq!(
            parse("delete-cars 2 SFO"),
            Command::DeletePlace(Place::Cars, TxnId::new(2), "SFO".to_string())
        );
    }

    #[test]
    fn test_customer_commands() {
        assert_eq!(parse("new-customer 3"), Command::NewCustomer(TxnId::new(3), None));
        assert_eq!(
            parse("new-customer 3 7"),
            Command::NewCustomer(TxnId::new(3), Some(CustomerId::new(7)))
        );
        assert_eq!(
            parse("reserve-room 3 7 NYC"),
            Command::ReservePlace(Place::Rooms, TxnId::new(3), CustomerId::new(7), "NYC".to_string())
        );
    }

    #[test]
    fn test_bundle() {
        assert_eq!(
            parse("bundle 1 7 NYC true no 12 12 40"),
            Command::Bundle {
                xid: TxnId::new(1),
                customer: CustomerId::new(7),
                location: "NYC".to_string(),
                car: true,
                room: false,
                flights: vec![12, 12, 40],
            }
        );
        assert!(matches!(
            Command::parse("bundle 1 7 NYC maybe true"),
            Err(ParseError::InvalidArgument { what: "flag", .. })
        ));
    }

    #[test]
    fn test_low_stock() {
        assert_eq!(
            parse("low-stock 1 flight 3"),
            Command::LowStock(TxnId::new(1), ResourceKind::Flight, 3)
        );
        assert!(Command::parse("low-stock 1 customer 3").is_err());
        assert_eq!(parse("summary 4"), Command::Summary(TxnId::new(4)));
        assert_eq!(Command::parse("summary"), Err(ParseError::Usage("summary <xid>")));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            Command::parse("fly 1"),
            Err(ParseError::UnknownCommand("fly".to_string()))
        );
        assert_eq!(Command::parse("commit"), Err(ParseError::Usage("commit <xid>")));
        assert!(matches!(
            Command::parse("query-flight x 12"),
            Err(ParseError::InvalidArgument { what: "xid", .. })
        ));
    }

    #[test]
    fn test_every_name_parses_or_reports_usage() {
        for name in COMMAND_NAMES {
            match Command::parse(name) {
                Ok(_) | Err(ParseError::Usage(_)) => {}
                Err(err) => panic!("{name}: {err}"),
            }
        }
    }
}
