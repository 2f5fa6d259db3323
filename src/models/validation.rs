use rust_decimal::Decimal;
use std::collections::HashSet;

use super::{
    CreateCategoryRequest, CreateProductRequest, ImageVariant, RegisterRequest, ValidationError,
    ValidationResult,
};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MAX_CATEGORY_NAME_LENGTH: usize = 9;
pub const CATEGORY_NAME_RULE: &str = "Must be lowercase letters and less than 10 characters";
pub const MAX_PRODUCT_NAME_LENGTH: usize = 200;
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;
pub const MAX_IMAGE_URL_LENGTH: usize = 1000;
pub const MAX_VARIANTS_COUNT: usize = 6;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_ID_LENGTH: usize = 100;
pub const MIN_PRICE: Decimal = Decimal::ZERO;
pub const MAX_PRICE: Decimal = Decimal::from_parts(9999999, 0, 0, false, 2); // 99999.99

impl Validate for CreateCategoryRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_category_name(&self.name)
    }
}

impl Validate for CreateProductRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_product_name(&self.name)?;
        validate_description(&self.description)?;
        validate_image_url(&self.image_url)?;
        validate_variants(&self.variants)?;
        if let Some(category_id) = &self.category_id {
            if !category_id.trim().is_empty() {
                validate_id("category_id", category_id)?;
            }
        }
        Ok(())
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        Ok(())
    }
}

impl Validate for ImageVariant {
    fn validate(&self) -> ValidationResult<()> {
        validate_price(&self.price)
    }
}

/// Category names are 1 to 9 lowercase ASCII letters
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_CATEGORY_NAME_LENGTH
        && name.chars().all(|c| c.is_ascii_lowercase());

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            expected: CATEGORY_NAME_RULE.to_string(),
        });
    }

    Ok(())
}

/// Validate product name
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "name".to_string(),
        });
    }

    if trimmed.len() > MAX_PRODUCT_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max_length: MAX_PRODUCT_NAME_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    if trimmed
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err(ValidationError::InvalidValue {
            field: "name".to_string(),
            value: name.to_string(),
            reason: "Contains invalid control characters".to_string(),
        });
    }

    Ok(())
}

pub fn validate_description(description: &str) -> ValidationResult<()> {
    let trimmed = description.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "description".to_string(),
        });
    }

    if trimmed.len() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max_length: MAX_DESCRIPTION_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    Ok(())
}

/// Image references are CDN paths or absolute http(s) URLs
pub fn validate_image_url(image_url: &str) -> ValidationResult<()> {
    let trimmed = image_url.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "image_url".to_string(),
        });
    }

    if trimmed.len() > MAX_IMAGE_URL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "image_url".to_string(),
            max_length: MAX_IMAGE_URL_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    if trimmed.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "image_url".to_string(),
            expected: "URL or path without whitespace".to_string(),
        });
    }

    Ok(())
}

/// At least one variant, no repeated type/licence pair, sane prices
pub fn validate_variants(variants: &[ImageVariant]) -> ValidationResult<()> {
    if variants.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "variants".to_string(),
        });
    }

    if variants.len() > MAX_VARIANTS_COUNT {
        return Err(ValidationError::InvalidValue {
            field: "variants".to_string(),
            value: variants.len().to_string(),
            reason: format!("At most {} variants are allowed", MAX_VARIANTS_COUNT),
        });
    }

    let mut seen = HashSet::new();
    for (index, variant) in variants.iter().enumerate() {
        validate_price(&variant.price).map_err(|err| match err {
            ValidationError::OutOfRange { min, max, value, .. } => ValidationError::OutOfRange {
                field: format!("variants[{}].price", index),
                min,
                max,
                value,
            },
            other => other,
        })?;

        if !seen.insert((variant.variant_type, variant.license)) {
            return Err(ValidationError::InvalidValue {
                field: format!("variants[{}]", index),
                value: format!("{}/{}", variant.variant_type, variant.license),
                reason: "Duplicate variant".to_string(),
            });
        }
    }

    Ok(())
}

/// Prices are non-negative with at most two decimal places
pub fn validate_price(price: &Decimal) -> ValidationResult<()> {
    if *price < MIN_PRICE || *price > MAX_PRICE {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: MIN_PRICE.to_string(),
            max: MAX_PRICE.to_string(),
            value: price.to_string(),
        });
    }

    if price.normalize().scale() > 2 {
        return Err(ValidationError::InvalidValue {
            field: "price".to_string(),
            value: price.to_string(),
            reason: "Price cannot have more than 2 decimal places".to_string(),
        });
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "email".to_string(),
        });
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max_length: MAX_EMAIL_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    let well_formed = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !trimmed.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            expected: "name@domain.tld".to_string(),
        });
    }

    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "password".to_string(),
        });
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min_length: MIN_PASSWORD_LENGTH,
            actual_length: password.chars().count(),
        });
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max_length: MAX_PASSWORD_LENGTH,
            actual_length: password.chars().count(),
        });
    }

    Ok(())
}

/// Validate a path or body identifier
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let trimmed = id.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: field.to_string(),
        });
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            expected: "alphanumeric characters, hyphens, and underscores".to_string(),
        });
    }

    if trimmed.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: MAX_ID_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    Ok(())
}
