use ma_image_loader::engine::key::{derive_key, normalize_url};
use ma_image_loader::error::LoadError;

fn key_of(url: &str) -> String {
    derive_key(&normalize_url(url).unwrap()).to_string()
}

#[test]
fn test_key_is_deterministic() {
    assert_eq!(key_of("http://a/img.png"), key_of("http://a/img.png"));
}

#[test]
fn test_key_is_128_bit_uppercase_hex() {
    let key = key_of("http://example.com/x.png");
    assert_eq!(key.len(), 32);
    assert!(key
        .chars()
        .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
}

#[test]
fn test_key_follows_normalization() {
    // Implicit root path.
    assert_eq!(key_of("http://a"), key_of("http://a/"));
    // Scheme/host case and default port.
    assert_eq!(
        key_of("HTTP://Example.COM:80/x.png"),
        key_of("http://example.com/x.png")
    );
    // Surrounding whitespace.
    assert_eq!(key_of("  http://a/img.png "), key_of("http://a/img.png"));
}

#[test]
fn test_distinct_urls_get_distinct_keys() {
    assert_ne!(key_of("http://a/img.png"), key_of("http://a/img2.png"));
    assert_ne!(key_of("http://a/img.png"), key_of("https://a/img.png"));
    assert_ne!(key_of("http://a/img.png?s=1"), key_of("http://a/img.png?s=2"));
}

#[test]
fn test_relative_or_garbage_url_is_rejected() {
    assert!(matches!(
        normalize_url("img.png"),
        Err(LoadError::InvalidUrl(_))
    ));
    assert!(matches!(
        normalize_url("http://"),
        Err(LoadError::InvalidUrl(_))
    ));
    assert_eq!(
        normalize_url("not a url").unwrap_err().to_string(),
        "Url is not correct."
    );
}
