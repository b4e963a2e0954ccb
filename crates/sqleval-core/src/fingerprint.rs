use sha2::{Digest, Sha256};

/// Digest of an ordered list of queries, used to spot stale outcome caches.
pub fn queries_digest(queries: &[String]) -> String {
    let mut h = Sha256::new();
    for q in queries {
        h.update(q.trim().as_bytes());
        h.update(b"\n");
    }
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_order_sensitive_and_trim_insensitive() {
        let a = vec!["SELECT 1".to_string(), "SELECT 2".to_string()];
        let b = vec!["SELECT 2".to_string(), "SELECT 1".to_string()];
        let c = vec![" SELECT 1 ".to_string(), "SELECT 2".to_string()];
        assert_ne!(queries_digest(&a), queries_digest(&b));
        assert_eq!(queries_digest(&a), queries_digest(&c));
        assert_eq!(queries_digest(&[]).len(), 64);
    }
}
