//! Database query functions organized by table.

pub mod oracle;
pub mod prices;
pub mod pricers;
pub mod settings;
