//! Document id generation.

/// Random id of the form `<prefix>_<16 hex chars>`.
pub fn new_id(prefix: &str) -> String {
    let bytes: [u8; 8] = rand::random();
    format!("{prefix}_{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_prefixed_and_distinct() {
        let a = new_id("ord");
        let b = new_id("ord");
        assert!(a.starts_with("ord_"));
        assert_eq!(a.len(), "ord_".len() + 16);
        assert_ne!(a, b);
    }
}
