//! Domain module
//!
//! Core domain types and business rules.

pub mod clock;
pub mod context;
pub mod error;
pub mod money;
pub mod types;

pub use clock::Clock;
pub use context::OperationContext;
pub use error::DomainError;
pub use money::{round2, within_cent, CENT};
pub use types::{
    CashMovement, CashSession, Category, MovementKind, Page, Payment, Product, Role, Sale,
    SaleItem, SessionStatus, TenderGroup, TenderType,
};
