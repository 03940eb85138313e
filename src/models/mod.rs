mod client;
mod client_update;
mod outcome;
mod phone_number;

pub use client::Client;
pub use client_update::ClientUpdate;
pub use outcome::{DeleteOutcome, UpdateOutcome};
pub use phone_number::PhoneNumber;
