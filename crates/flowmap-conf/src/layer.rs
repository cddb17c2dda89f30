//! Precedence layers and app load order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A configuration layer, lowest precedence first.
///
/// The derived `Ord` is the precedence order: a value from a greater layer
/// overrides a value from a lesser one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    SystemDefault,
    SystemLocal,
    AppDefault,
    AppLocal,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::SystemDefault,
        Layer::SystemLocal,
        Layer::AppDefault,
        Layer::AppLocal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::SystemDefault => "system_default",
            Layer::SystemLocal => "system_local",
            Layer::AppDefault => "app_default",
            Layer::AppLocal => "app_local",
        }
    }

    /// Whether this layer lives under `apps/<app>/`.
    pub fn is_app(&self) -> bool {
        matches!(self, Layer::AppDefault | Layer::AppLocal)
    }

    /// Leaf directory name inside `system/` or `apps/<app>/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Layer::SystemDefault | Layer::AppDefault => "default",
            Layer::SystemLocal | Layer::AppLocal => "local",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load-order key for apps sharing a layer.
///
/// The app ordered last wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppOrder {
    /// `zeta` overrides `alpha`.
    #[default]
    Lexicographic,
    /// `alpha` overrides `zeta`.
    ReverseLexicographic,
}

impl AppOrder {
    /// Compare two app names in load order. `None` (system layers) sorts first.
    pub fn compare(&self, a: Option<&str>, b: Option<&str>) -> Ordering {
        match (self, a, b) {
            (AppOrder::ReverseLexicographic, Some(x), Some(y)) => y.cmp(x),
            _ => a.cmp(&b),
        }
    }
}

impl std::str::FromStr for AppOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexicographic" => Ok(AppOrder::Lexicographic),
            "reverse-lexicographic" | "reverse_lexicographic" => {
                Ok(AppOrder::ReverseLexicographic)
            }
            other => Err(format!("unknown app order: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_precedence_order() {
        assert!(Layer::SystemDefault < Layer::SystemLocal);
        assert!(Layer::SystemLocal < Layer::AppDefault);
        assert!(Layer::AppDefault < Layer::AppLocal);
    }

    #[test]
    fn test_app_order_lexicographic() {
        let order = AppOrder::Lexicographic;
        assert_eq!(order.compare(Some("alpha"), Some("zeta")), Ordering::Less);
        assert_eq!(order.compare(None, Some("alpha")), Ordering::Less);
    }

    #[test]
    fn test_app_order_reverse() {
        let order = AppOrder::ReverseLexicographic;
        assert_eq!(order.compare(Some("alpha"), Some("zeta")), Ordering::Greater);
        assert_eq!(order.compare(Some("x"), Some("x")), Ordering::Equal);
    }

    #[test]
    fn test_app_order_from_str() {
        assert_eq!(
            "reverse-lexicographic".parse::<AppOrder>().unwrap(),
            AppOrder::ReverseLexicographic
        );
        assert!("random".parse::<AppOrder>().is_err());
    }
}
