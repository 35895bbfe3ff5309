use identity_backend_lib::auth::{
    hash_password_secure, validate_password_strength, PasswordRequirements, PasswordScheme,
    ScryptScheme,
};
use identity_backend_lib::config::PasswordSettings;

fn cheap() -> ScryptScheme {
    ScryptScheme::new(4).unwrap()
}

#[test]
fn test_password_hashing_and_verification() {
    let scheme = cheap();
    let hash = scheme.hash("SecureP@ssw0rd").unwrap();

    assert_ne!(hash, "SecureP@ssw0rd");
    assert!(hash.starts_with("$scrypt$"));
    assert!(scheme.verify(&hash, "SecureP@ssw0rd"));
    assert!(!scheme.verify(&hash, "SecureP@ssw0rD"));
    assert!(!scheme.verify("not a phc string", "SecureP@ssw0rd"));
}

#[test]
fn test_hashes_are_salted() {
    let scheme = cheap();
    let a = scheme.hash("SecureP@ssw0rd").unwrap();
    let b = scheme.hash("SecureP@ssw0rd").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_hash_password_secure_clears_plaintext() {
    let scheme = cheap();
    let mut plain = "SecureP@ssw0rd".to_string();
    let hash = hash_password_secure(&scheme, &mut plain).unwrap();
    assert!(plain.is_empty());
    assert!(scheme.verify(&hash, "SecureP@ssw0rd"));
}

#[test]
fn test_password_strength_validation() {
    let requirements = PasswordRequirements::default();

    assert!(validate_password_strength("SecureP@ssw0rd", &requirements));
    assert!(!validate_password_strength("Sh0rt!", &requirements));
    assert!(!validate_password_strength("securep@ssw0rd", &requirements));
    assert!(!validate_password_strength("SECUREP@SSW0RD", &requirements));
    assert!(!validate_password_strength("SecureP@ssword", &requirements));
    assert!(!validate_password_strength("SecurePassw0rd", &requirements));
}

#[test]
fn test_requirements_follow_settings() {
    let settings = PasswordSettings {
        min_length: 8,
        require_uppercase: false,
        require_lowercase: true,
        require_digit: true,
        require_special: false,
        scrypt_log_n: 4,
    };
    let requirements = PasswordRequirements::from(&settings);
    assert!(validate_password_strength("password1", &requirements));
    assert!(!validate_password_strength("password", &requirements));
}
