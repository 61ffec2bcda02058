/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms, collision-free at marketplace scale)
///
/// Used for user and crop listing identifiers.
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}

/// Generate an order token: `FM-<base36 millis>-<base36 random>`, uppercase.
pub fn order_token() -> String {
    prefixed_token("FM")
}

/// Generate a subscription token: `SUB-<base36 millis>-<base36 random>`, uppercase.
pub fn subscription_token() -> String {
    prefixed_token("SUB")
}

fn prefixed_token(prefix: &str) -> String {
    use rand::Rng;
    let ts = base36(now_millis() as u64);
    let suffix = base36(rand::thread_rng().gen_range(0..36u64.pow(5)));
    format!("{}-{}-{}", prefix, ts, suffix).to_uppercase()
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base36_digits() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn test_order_token_shape() {
        let token = order_token();
        assert!(token.starts_with("FM-"));
        assert_eq!(token, token.to_uppercase());
        assert_eq!(token.split('-').count(), 3);
    }

    #[test]
    fn test_subscription_token_shape() {
        let token = subscription_token();
        assert!(token.starts_with("SUB-"));
        assert_eq!(token.split('-').count(), 3);
    }

    #[test]
    fn test_snowflake_increases_over_time() {
        let a = snowflake_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = snowflake_id();
        assert!(b > a);
    }
}
