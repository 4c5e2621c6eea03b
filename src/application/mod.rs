pub mod analytics;
pub mod export;
pub mod order_service;
pub mod outbound;
pub mod refund_service;

#[cfg(test)]
pub(crate) mod test_support;
