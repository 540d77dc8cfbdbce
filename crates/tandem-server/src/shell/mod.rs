//! The operator shell.
//!
//! One command per line. [`Shell::execute_line`] parses a line, runs it
//! against the coordinator and renders the reply as text; the `tandemd`
//! binary feeds it from an interactive editor, a file or `--command`.

mod command;

use std::sync::Arc;

use tandem_common::error::{TxnError, TxnResult};
use tandem_coordinator::Coordinator;

pub use command::{Command, ParseError, Place, COMMAND_NAMES, HELP};

/// What the caller should do after a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print the text and keep going.
    Output(String),
    /// Print the error and keep going.
    Error(String),
    /// Nothing to print.
    Empty,
    /// Leave the shell.
    Quit,
}

/// Executes shell commands against a coordinator.
#[derive(Debug, Clone)]
pub struct Shell {
    coordinator: Arc<Coordinator>,
}

impl Shell {
    /// Creates a shell over `coordinator`.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Parses and runs one line.
    pub fn execute_line(&self, line: &str) -> Reply {
        match Command::parse(line) {
            Ok(None) => Reply::Empty,
            Ok(Some(Command::Quit)) => Reply::Quit,
            Ok(Some(Command::Help)) => Reply::Output(HELP.to_string()),
            Ok(Some(cmd)) => match self.execute(&cmd) {
                Ok(text) => Reply::Output(text),
                Err(err) => {
                    tracing::debug!("{:?} failed: {}", cmd, err);
                    Reply::Error(render_error(&err))
                }
            },
            Err(err) => Reply::Error(err.to_string()),
        }
    }

    /// Runs a parsed command and renders its result.
    pub fn execute(&self, cmd: &Command) -> TxnResult<String> {
        let tm = &self.coordinator;
        let text = match cmd {
            Command::Start => format!("xid {}", tm.start()?),
            Command::Commit(xid) => tm.commit(*xid)?.to_string(),
            Command::Abort(xid) => {
                tm.abort(*xid)?;
                "aborted".to_string()
            }

            Command::AddFlight { xid, number, seats, price } => {
                tm.add_flight(*xid, *number, *seats, *price)?.to_string()
            }
            Command::AddPlace { place, xid, location, count, price } => match place {
                Place::Cars => tm.add_cars(*xid, location, *count, *price)?,
                Place::Rooms => tm.add_rooms(*xid, location, *count, *price)?,
            }
            .to_string(),

            Command::NewCustomer(xid, None) => format!("customer {}", tm.new_customer(*xid)?),
            Command::NewCustomer(xid, Some(id)) => tm.new_customer_with_id(*xid, *id)?.to_string(),

            Command::DeleteFlight(xid, number) => tm.delete_flight(*xid, *number)?.to_string(),
            Command::DeletePlace(place, xid, location) => match place {
                Place::Cars => tm.delete_cars(*xid, location)?,
                Place::Rooms => tm.delete_rooms(*xid, location)?,
            }
            .to_string(),
            Command::DeleteCustomer(xid, id) => tm.delete_customer(*xid, *id)?.to_string(),

            Command::QueryFlight(xid, number) => tm.query_flight(*xid, *number)?.to_string(),
            Command::QueryPlace(place, xid, location) => match place {
                Place::Cars => tm.query_cars(*xid, location)?,
                Place::Rooms => tm.query_rooms(*xid, location)?,
            }
            .to_string(),
            Command::QueryFlightPrice(xid, number) => {
                tm.query_flight_price(*xid, *number)?.to_string()
            }
            Command::QueryPlacePrice(place, xid, location) => match place {
                Place::Cars => tm.query_cars_price(*xid, location)?,
                Place::Rooms => tm.query_rooms_price(*xid, location)?,
            }
            .to_string(),
            Command::QueryCustomer(xid, id) => {
                let bill = tm.query_customer_info(*xid, *id)?;
                if bill.is_empty() {
                    format!("no customer {id}")
                } else {
                    bill.trim_end().to_string()
                }
            }

            Command::ReserveFlight(xid, id, number) => {
                tm.reserve_flight(*xid, *id, *number)?.to_string()
            }
            Command::ReservePlace(place, xid, id, location) => match place {
                Place::Cars => tm.reserve_car(*xid, *id, location)?,
                Place::Rooms => tm.reserve_room(*xid, *id, location)?,
            }
            .to_string(),
            Command::Bundle { xid, customer, location, car, room, flights } => tm
                .bundle(*xid, *customer, flights, location, *car, *room)?
                .to_string(),

            Command::LowStock(xid, kind, threshold) => {
                let items = tm.low_stock(*xid, *kind, *threshold)?;
                if items.is_empty() {
                    format!("no {} at or below {}", kind.name(), threshold)
                } else {
                    items
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }

            Command::Summary(xid) => {
                let customers = tm.summary(*xid)?;
                if customers.is_empty() {
                    "no customers".to_string()
                } else {
                    customers
                        .iter()
                        .map(|customer| customer.bill().trim_end().to_string())
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }

            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        };
        Ok(text)
    }
}

/// Renders an error with its stable code.
pub fn render_error(err: &TxnError) -> String {
    format!("error[{:#06x}] {}: {}", err.code().as_u16(), err.code(), err)
}
