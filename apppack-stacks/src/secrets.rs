//! Random values generated for internal fields

use rand::Rng;
use uuid::Uuid;

const LOWER_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Load-balancer listener rules an app may claim
pub const PRIORITY_RANGE: std::ops::Range<i64> = 200..50000;

fn draw(charset: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

/// Initial database password; rotated by the template after first use
pub fn one_time_password() -> String {
    draw(LOWER_ALNUM, 30)
}

/// Redis AUTH token
pub fn auth_token() -> String {
    draw(ALNUM, 64)
}

pub fn rule_priority() -> i64 {
    rand::rng().random_range(PRIORITY_RANGE)
}

/// External id for the cross-account role trust policy
pub fn external_id() -> String {
    Uuid::new_v4().simple().to_string()
}
