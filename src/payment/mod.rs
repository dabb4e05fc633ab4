// Payment request building blocks: single-use references and transfer URIs
pub mod reference;
pub mod request;

pub use reference::PaymentReference;
pub use request::{lamports_to_decimal, PaymentRequest, TransferRequest};
