use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(OrderId);
id_newtype!(ProductId);
id_newtype!(ReviewId);
id_newtype!(LineItemId);

/// Independently paginated collections exposed by the store API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Orders,
    Products,
    Reviews,
}

impl Resource {
    pub fn path(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Products => "products",
            Self::Reviews => "reviews",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Well-known screens that may be asked to refresh by a sibling screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenRole {
    OrdersList,
    ProductsList,
    ReviewsList,
}

impl ScreenRole {
    pub fn for_resource(resource: Resource) -> Self {
        match resource {
            Resource::Orders => Self::OrdersList,
            Resource::Products => Self::ProductsList,
            Resource::Reviews => Self::ReviewsList,
        }
    }
}

/// Store API generation. Each generation has its own path prefix and its own
/// status-summary response schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiGeneration {
    /// Dokan multi-vendor API: status summary is an object of counts.
    #[default]
    Dokan,
    /// WooCommerce REST v3: status summary is an array of `{slug, name}`.
    WcV3,
}

impl ApiGeneration {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Dokan => "/wp-json/dokan/v1",
            Self::WcV3 => "/wp-json/wc/v3",
        }
    }

    pub fn status_summary_path(self) -> &'static str {
        match self {
            Self::Dokan => "orders/summary",
            Self::WcV3 => "reports/orders/totals",
        }
    }

    /// Cheap authenticated endpoint used to verify credentials at sign-in.
    pub fn sign_in_probe_path(self) -> &'static str {
        match self {
            Self::Dokan => "reports/summary",
            Self::WcV3 => "reports/sales",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dokan" | "dokan_v1" | "dokan/v1" => Some(Self::Dokan),
            "wc_v3" | "wcv3" | "wc/v3" | "woocommerce" => Some(Self::WcV3),
            _ => None,
        }
    }
}
