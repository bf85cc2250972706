//! MD5 password digest
//!
//! MD5 here is a wire-compatibility requirement, not a security choice.

use md5::{Digest, Md5};

/// Prefix the server expects in front of the hex digest
pub const MD5_PREFIX: &str = "md5";

/// Compute the MD5 password response.
///
/// `"md5" + hex(md5(hex(md5(password + user)) + salt))`, lowercase hex.
pub fn md5_password(user: &str, password: &str, salt: &[u8; 4]) -> String {
    let mut inner = Md5::new();
    inner.update(password.as_bytes());
    inner.update(user.as_bytes());
    let inner_hex = format!("{:x}", inner.finalize());

    let mut outer = Md5::new();
    outer.update(inner_hex.as_bytes());
    outer.update(salt);

    format!("{}{:x}", MD5_PREFIX, outer.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_password_known_vector() {
        assert_eq!(
            md5_password("alice", "secret", &[1, 2, 3, 4]),
            "md598a0412b9c31436fc53776e863350083"
        );
        assert_eq!(
            md5_password("user", "pencil", &[0xDE, 0xAD, 0xBE, 0xEF]),
            "md50f5b636d891e9860623ac8ca91fc9dfc"
        );
    }

    #[test]
    fn test_md5_password_shape() {
        let digest = md5_password("bob", "", &[0, 0, 0, 0]);
        assert_eq!(digest.len(), 35);
        assert!(digest.starts_with("md5"));
        assert!(digest[3..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_md5_password_depends_on_salt() {
        assert_ne!(
            md5_password("alice", "secret", &[1, 2, 3, 4]),
            md5_password("alice", "secret", &[4, 3, 2, 1])
        );
    }
}
