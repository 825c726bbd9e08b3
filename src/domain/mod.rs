//! Domain model: identifiers, money, catalog products, carts, the order
//! aggregate with its lifecycle rules, and the ports to external collaborators.

pub mod cart;
pub mod ids;
pub mod money;
pub mod order;
pub mod ports;
pub mod product;
pub mod state_machine;
