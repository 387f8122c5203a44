use meme_api::config::{ConfigError, Settings};

const VARS: &[(&str, &str)] = &[
    ("DATABASE_URL", "postgres://memes@localhost/memes"),
    ("JWT_SECRET", "env-secret-that-is-long-enough-123456"),
    ("JWT_ISSUER", "memes.env"),
    ("JWT_AUDIENCE", "memes.env"),
    ("COOKIE_DOMAIN", "memes.env"),
    ("BIND_ADDR", "127.0.0.1:9999"),
];

fn set_all() {
    for (k, v) in VARS {
        std::env::set_var(k, v);
    }
}

#[test]
#[serial_test::serial]
fn settings_read_from_process_environment() {
    set_all();
    let s = Settings::from_env().unwrap();
    assert_eq!(s.bind_addr, "127.0.0.1:9999");
    assert_eq!(s.auth.issuer, "memes.env");
    assert_eq!(s.auth.cookie_domain, "memes.env");
    assert_eq!(s.auth.cookie_name, "__Secure-refresh_token");
}

#[test]
#[serial_test::serial]
fn blank_required_variable_counts_as_missing() {
    set_all();
    std::env::set_var("COOKIE_DOMAIN", "  ");
    assert_eq!(Settings::from_env().unwrap_err(), ConfigError::Missing("COOKIE_DOMAIN"));
    std::env::remove_var("COOKIE_DOMAIN");
    assert_eq!(Settings::from_env().unwrap_err(), ConfigError::Missing("COOKIE_DOMAIN"));
}
