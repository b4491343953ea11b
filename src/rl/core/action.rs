//! Action Space
//!
//! Seven discrete trade types, each carrying a fixed size fraction that the
//! multi-agent layer may override when it damps orders for market impact.

use serde::{Deserialize, Serialize};

/// Number of discrete actions
pub const NUM_ACTIONS: usize = 7;

/// Discrete trade type
///
/// Buy sizes scale the per-trade budget (`max_position_size` of portfolio
/// value, capped by cash). Sell sizes are a fraction of the shares held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionType {
    /// No trade
    #[default]
    Hold = 0,
    /// Buy with 10% of the budget
    BuySmall = 1,
    /// Buy with 25% of the budget
    BuyMedium = 2,
    /// Buy with 50% of the budget
    BuyLarge = 3,
    /// Sell 10% of held shares
    SellSmall = 4,
    /// Sell 25% of held shares
    SellMedium = 5,
    /// Sell 50% of held shares
    SellLarge = 6,
}

impl ActionType {
    /// Convert from action index
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Hold),
            1 => Some(Self::BuySmall),
            2 => Some(Self::BuyMedium),
            3 => Some(Self::BuyLarge),
            4 => Some(Self::SellSmall),
            5 => Some(Self::SellMedium),
            6 => Some(Self::SellLarge),
            _ => None,
        }
    }

    /// Convert to action index
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Get all possible actions, in index order
    pub fn all() -> &'static [ActionType] {
        &[
            Self::Hold,
            Self::BuySmall,
            Self::BuyMedium,
            Self::BuyLarge,
            Self::SellSmall,
            Self::SellMedium,
            Self::SellLarge,
        ]
    }

    /// Fixed size fraction for this trade type
    pub fn default_size(self) -> f64 {
        match self {
            Self::Hold => 0.0,
            Self::BuySmall | Self::SellSmall => 0.1,
            Self::BuyMedium | Self::SellMedium => 0.25,
            Self::BuyLarge | Self::SellLarge => 0.5,
        }
    }

    pub fn is_buy(self) -> bool {
        matches!(self, Self::BuySmall | Self::BuyMedium | Self::BuyLarge)
    }

    pub fn is_sell(self) -> bool {
        matches!(self, Self::SellSmall | Self::SellMedium | Self::SellLarge)
    }

    /// Largest trade in the same direction (Hold stays Hold)
    pub fn largest(self) -> Self {
        if self.is_buy() {
            Self::BuyLarge
        } else if self.is_sell() {
            Self::SellLarge
        } else {
            Self::Hold
        }
    }

    /// Smallest trade in the same direction (Hold stays Hold)
    pub fn smallest(self) -> Self {
        if self.is_buy() {
            Self::BuySmall
        } else if self.is_sell() {
            Self::SellSmall
        } else {
            Self::Hold
        }
    }

    /// Short label for logs and tables
    pub fn name(self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::BuySmall => "BUY_SMALL",
            Self::BuyMedium => "BUY_MEDIUM",
            Self::BuyLarge => "BUY_LARGE",
            Self::SellSmall => "SELL_SMALL",
            Self::SellMedium => "SELL_MEDIUM",
            Self::SellLarge => "SELL_LARGE",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A trade decision: type plus size fraction in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    pub size: f64,
}

impl Action {
    /// Action with the fixed size of its type
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            size: action_type.default_size(),
        }
    }

    /// Action with an externally chosen size, clamped to [0, 1]
    pub fn with_size(action_type: ActionType, size: f64) -> Self {
        let size = if size.is_finite() {
            size.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { action_type, size }
    }

    pub fn hold() -> Self {
        Self::new(ActionType::Hold)
    }

    /// Action for a policy output index; out-of-range indices map to Hold
    pub fn from_index(index: usize) -> Self {
        Self::new(ActionType::from_index(index).unwrap_or(ActionType::Hold))
    }

    pub fn index(&self) -> usize {
        self.action_type.to_index()
    }

    /// Copy of this action with its size scaled by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self::with_size(self.action_type, self.size * factor)
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::hold()
    }
}

impl From<ActionType> for Action {
    fn from(action_type: ActionType) -> Self {
        Self::new(action_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_index_roundtrip() {
        for action in ActionType::all() {
            let recovered = ActionType::from_index(action.to_index()).unwrap();
            assert_eq!(*action, recovered);
        }
        assert_eq!(ActionType::all().len(), NUM_ACTIONS);
        assert!(ActionType::from_index(NUM_ACTIONS).is_none());
    }

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(Action::new(ActionType::Hold).size, 0.0);
        assert_eq!(Action::new(ActionType::BuySmall).size, 0.1);
        assert_eq!(Action::new(ActionType::SellMedium).size, 0.25);
        assert_eq!(Action::new(ActionType::BuyLarge).size, 0.5);
    }

    #[test]
    fn test_size_override_is_clamped() {
        assert_eq!(Action::with_size(ActionType::BuyLarge, 1.7).size, 1.0);
        assert_eq!(Action::with_size(ActionType::BuyLarge, -0.2).size, 0.0);
        assert_eq!(Action::with_size(ActionType::BuyLarge, f64::NAN).size, 0.0);
    }

    #[test]
    fn test_scaled_keeps_type() {
        let action = Action::new(ActionType::SellLarge).scaled(0.5);
        assert_eq!(action.action_type, ActionType::SellLarge);
        assert!((action.size - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_direction_helpers() {
        assert_eq!(ActionType::BuySmall.largest(), ActionType::BuyLarge);
        assert_eq!(ActionType::SellLarge.smallest(), ActionType::SellSmall);
        assert_eq!(ActionType::Hold.largest(), ActionType::Hold);
        assert!(ActionType::BuyMedium.is_buy());
        assert!(!ActionType::Hold.is_sell());
    }

    #[test]
    fn test_default_is_hold() {
        assert_eq!(ActionType::default(), ActionType::Hold);
        assert_eq!(Action::default().action_type, ActionType::Hold);
    }
}
