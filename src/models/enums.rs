use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        match self {
            Role::Admin => true,
            Role::User => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Payment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    /// Only a pending order may move, and only to a final state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Failed)
        )
    }

    pub fn is_final(&self) -> bool {
        match self {
            OrderStatus::Pending => false,
            OrderStatus::Completed | OrderStatus::Failed => true,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

/// Size/aspect variants an image is sold in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VariantType {
    Square,
    Wide,
    Portrait,
}

/// Pixel dimensions of a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl VariantType {
    pub fn dimensions(&self) -> Dimensions {
        match self {
            VariantType::Square => Dimensions {
                width: 1200,
                height: 1200,
            },
            VariantType::Wide => Dimensions {
                width: 1920,
                height: 1080,
            },
            VariantType::Portrait => Dimensions {
                width: 1080,
                height: 1440,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VariantType::Square => "Square (1:1)",
            VariantType::Wide => "Widescreen (16:9)",
            VariantType::Portrait => "Portrait (3:4)",
        }
    }

    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            VariantType::Square => "1:1",
            VariantType::Wide => "16:9",
            VariantType::Portrait => "3:4",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantType::Square => write!(f, "SQUARE"),
            VariantType::Wide => write!(f, "WIDE"),
            VariantType::Portrait => write!(f, "PORTRAIT"),
        }
    }
}

impl FromStr for VariantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SQUARE" => Ok(VariantType::Square),
            "WIDE" => Ok(VariantType::Wide),
            "PORTRAIT" => Ok(VariantType::Portrait),
            _ => Err(format!("Invalid variant type: {}", s)),
        }
    }
}

/// Usage licence attached to a purchased variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum License {
    Personal,
    Commercial,
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            License::Personal => write!(f, "personal"),
            License::Commercial => write!(f, "commercial"),
        }
    }
}

impl FromStr for License {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "personal" => Ok(License::Personal),
            "commercial" => Ok(License::Commercial),
            _ => Err(format!("Invalid license: {}", s)),
        }
    }
}
