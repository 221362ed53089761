//! Field validators for repository input types.

use std::borrow::Cow;

use rust_decimal::Decimal;
use validator::ValidationError;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Amount must be strictly positive.
///
/// # Errors
///
/// Returns a `positive` validation error for zero or negative amounts.
pub fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_positive() && !value.is_zero() {
        Ok(())
    } else {
        Err(error("positive", "must be greater than 0"))
    }
}

/// Amount must be zero or more.
///
/// # Errors
///
/// Returns a `non_negative` validation error for negative amounts.
pub fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        Err(error("non_negative", "cannot be negative"))
    } else {
        Ok(())
    }
}

/// Optional amount, when present, must be strictly positive.
///
/// # Errors
///
/// See [`positive_amount`].
pub fn optional_positive(value: Option<Decimal>) -> Result<(), ValidationError> {
    value.as_ref().map_or(Ok(()), positive_amount)
}

/// Optional amount, when present, must be zero or more.
///
/// # Errors
///
/// See [`non_negative_amount`].
pub fn optional_non_negative(value: Option<Decimal>) -> Result<(), ValidationError> {
    value.as_ref().map_or(Ok(()), non_negative_amount)
}

/// Products carry at most four image URLs.
///
/// # Errors
///
/// Returns a `max_images` validation error past the limit.
pub fn image_list(images: &[String]) -> Result<(), ValidationError> {
    if images.len() > 4 {
        return Err(error("max_images", "at most 4 images are allowed"));
    }
    if images.iter().any(|url| url.trim().is_empty()) {
        return Err(error("image_url", "image URLs cannot be empty"));
    }
    Ok(())
}

/// Lowercase words joined by hyphens.
///
/// # Errors
///
/// Returns a `slug` validation error for anything else.
pub fn slug(value: &str) -> Result<(), ValidationError> {
    let valid = !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--")
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(error(
            "slug",
            "must contain only lowercase letters, digits and single hyphens",
        ))
    }
}

/// Derive a slug from a display name: `"Summer Hat (Blue)"` → `"summer-hat-blue"`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_amount() {
        assert!(positive_amount(&Decimal::new(1, 2)).is_ok());
        assert!(positive_amount(&Decimal::ZERO).is_err());
        assert!(positive_amount(&Decimal::new(-5, 0)).is_err());
    }

    #[test]
    fn test_non_negative_amount() {
        assert!(non_negative_amount(&Decimal::ZERO).is_ok());
        assert!(non_negative_amount(&Decimal::new(-1, 2)).is_err());
        assert!(optional_non_negative(None).is_ok());
    }

    #[test]
    fn test_image_list() {
        let four = vec!["https://cdn.example/a.jpg".to_owned(); 4];
        assert!(image_list(&four).is_ok());
        let five = vec!["https://cdn.example/a.jpg".to_owned(); 5];
        assert!(image_list(&five).is_err());
        assert!(image_list(&[" ".to_owned()]).is_err());
    }

    #[test]
    fn test_slug() {
        assert!(slug("summer-hat-2").is_ok());
        assert!(slug("Summer").is_err());
        assert!(slug("a--b").is_err());
        assert!(slug("-a").is_err());
        assert!(slug("").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Summer Hat (Blue)"), "summer-hat-blue");
        assert_eq!(slugify("  Ärger & Co  "), "rger-co");
        assert_eq!(slugify("100% Cotton"), "100-cotton");
    }
}
