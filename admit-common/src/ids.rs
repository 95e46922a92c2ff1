//! Ticket identifier generation

use uuid::Uuid;

/// Default prefix for generated ticket IDs
pub const DEFAULT_TICKET_ID_PREFIX: &str = "NACOS";

/// Number of hex characters taken from the UUID
const SHORT_ID_LEN: usize = 8;

/// Generates ticket IDs like `NACOS-8F3A2C9D`
#[derive(Debug, Clone)]
pub struct TicketIdGenerator {
    prefix: String,
}

impl TicketIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate a fresh ticket ID from a UUIDv4
    pub fn generate(&self) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.prefix, hex[..SHORT_ID_LEN].to_uppercase())
    }
}

impl Default for TicketIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TICKET_ID_PREFIX)
    }
}

/// Build the store-unique derivation key for one ticket of an order
pub fn derivation_key(order_ref: &str, ticket_id: &str) -> String {
    format!("{}-{}", order_ref, ticket_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_shape() {
        let gen = TicketIdGenerator::default();
        let id = gen.generate();

        assert!(id.starts_with("NACOS-"));
        let suffix = &id["NACOS-".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_custom_prefix() {
        let gen = TicketIdGenerator::new("GALA");
        assert!(gen.generate().starts_with("GALA-"));
        assert_eq!(gen.prefix(), "GALA");
    }

    #[test]
    fn test_ids_differ() {
        let gen = TicketIdGenerator::default();
        assert_ne!(gen.generate(), gen.generate());
    }

    #[test]
    fn test_derivation_key() {
        assert_eq!(derivation_key("TX-100", "NACOS-ABCD1234"), "TX-100-NACOS-ABCD1234");
    }
}
