//! Trading decisions returned by strategy scripts.

use event_bus::{OrderSide, OrderType};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::runtime::engine::Bindings;
use crate::runtime::value::ScriptValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Action {
    /// Case-insensitive; anything unrecognised is a hold.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Action::Buy,
            "sell" => Action::Sell,
            _ => Action::Hold,
        }
    }

    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Action::Buy => Some(OrderSide::Buy),
            Action::Sell => Some(OrderSide::Sell),
            Action::Hold => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
            Action::Hold => write!(f, "hold"),
        }
    }
}

/// What an invocation produced, before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptResult {
    /// Return value of an event callback.
    Callback(ScriptValue),
    /// Module-level variables of a script without callbacks.
    Legacy(Bindings),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Signal {
    pub action: Action,
    pub quantity: f64,
    pub price: f64,
    pub order_type: OrderType,
    pub reason: String,
}

impl Signal {
    pub fn hold() -> Self {
        Self::default()
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }

    /// Resolves a script result into a signal.
    ///
    /// A callback returning a mapping is read field by field; `None` or any
    /// other value is a hold. Legacy results read the same fields from
    /// module-level variables. Missing fields take the hold/market
    /// defaults and unknown fields are ignored.
    pub fn normalize(result: &ScriptResult) -> Self {
        match result {
            ScriptResult::Callback(ScriptValue::Dict(map)) => {
                Self::from_fields(|key| map.get(key))
            }
            ScriptResult::Callback(_) => Self::hold(),
            ScriptResult::Legacy(bindings) => Self::from_fields(|key| bindings.variable(key)),
        }
    }

    fn from_fields<'a>(field: impl Fn(&str) -> Option<&'a ScriptValue>) -> Self {
        let action = field("action")
            .and_then(ScriptValue::as_str)
            .map(Action::parse)
            .unwrap_or_default();
        let order_type = match field("type")
            .or_else(|| field("order_type"))
            .and_then(ScriptValue::as_str)
        {
            Some(t) if t.trim().eq_ignore_ascii_case("limit") => OrderType::Limit,
            _ => OrderType::Market,
        };
        let reason = match field("reason") {
            None | Some(ScriptValue::None) => String::new(),
            Some(ScriptValue::Str(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        Self {
            action,
            quantity: non_negative(field("quantity")),
            price: non_negative(field("price")),
            order_type,
            reason,
        }
    }
}

fn non_negative(value: Option<&ScriptValue>) -> f64 {
    let number = match value {
        Some(ScriptValue::Str(s)) => s.trim().parse::<f64>().ok(),
        Some(v) => v.as_f64(),
        None => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => n,
        _ => 0.0,
    }
}
