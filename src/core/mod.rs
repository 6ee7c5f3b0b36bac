// Core module - Link session, device registry and terminal stores
pub mod communication;
pub mod registry;
pub mod session;
pub mod terminal;
