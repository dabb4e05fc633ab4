// Groups and shared expenses, kept in memory alongside the watch core
pub mod handlers;
pub mod models;
pub mod repository;

pub use models::{Expense, Group, GroupStats, PaymentFilter, SplitMode};
pub use repository::GroupRepository;
