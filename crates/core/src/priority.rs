use std::fmt;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

/// Priority on the three-step scale every task and activity resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum PriorityLevel {
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 3] = [PriorityLevel::Low, PriorityLevel::Normal, PriorityLevel::High];

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            PriorityLevel::Low => "Low",
            PriorityLevel::Normal => "Normal",
            PriorityLevel::High => "High",
        }
    }

    pub fn class_key(self) -> &'static str {
        match self {
            PriorityLevel::Low => "priority-low",
            PriorityLevel::Normal => "priority-normal",
            PriorityLevel::High => "priority-high",
        }
    }

    pub fn from_number(value: i64) -> Option<Self> {
        match value {
            1 => Some(PriorityLevel::Low),
            2 => Some(PriorityLevel::Normal),
            3 => Some(PriorityLevel::High),
            _ => None,
        }
    }

    /// Resolves numeric strings and the words low/normal/high; anything else is normal.
    pub fn from_text(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        if let Ok(number) = lowered.parse::<i64>() {
            return Self::from_number(number).unwrap_or_default();
        }
        match lowered.as_str() {
            "low" => PriorityLevel::Low,
            "high" => PriorityLevel::High,
            _ => PriorityLevel::Normal,
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| {
                    number
                        .as_f64()
                        .filter(|float| float.fract() == 0.0)
                        .map(|float| float as i64)
                })
                .and_then(Self::from_number)
                .unwrap_or_default(),
            Value::String(text) => Self::from_text(text),
            _ => PriorityLevel::Normal,
        }
    }
}

impl From<PriorityLevel> for u8 {
    fn from(level: PriorityLevel) -> Self {
        level.level()
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl ValueEnum for PriorityLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        let (name, number) = match self {
            PriorityLevel::Low => ("low", "1"),
            PriorityLevel::Normal => ("normal", "2"),
            PriorityLevel::High => ("high", "3"),
        };
        Some(clap::builder::PossibleValue::new(name).alias(number))
    }
}

/// Resolves any priority representation, treating an absent value as normal.
pub fn priority_level(value: Option<&Value>) -> PriorityLevel {
    value.map(PriorityLevel::from_value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(None, 2)]
    #[case(Some(json!(null)), 2)]
    #[case(Some(json!("")), 2)]
    #[case(Some(json!(1)), 1)]
    #[case(Some(json!(2)), 2)]
    #[case(Some(json!(3)), 3)]
    #[case(Some(json!("1")), 1)]
    #[case(Some(json!("3")), 3)]
    #[case(Some(json!("low")), 1)]
    #[case(Some(json!("high")), 3)]
    #[case(Some(json!("normal")), 2)]
    #[case(Some(json!("bogus")), 2)]
    #[case(Some(json!(99)), 2)]
    #[case(Some(json!(3.0)), 3)]
    #[case(Some(json!(" HIGH ")), 3)]
    #[case(Some(json!(true)), 2)]
    fn resolves_every_representation(#[case] input: Option<Value>, #[case] expected: u8) {
        assert_eq!(priority_level(input.as_ref()).level(), expected);
    }

    #[test]
    fn labels_and_class_keys_follow_level() {
        assert_eq!(PriorityLevel::Low.label(), "Low");
        assert_eq!(PriorityLevel::Normal.label(), "Normal");
        assert_eq!(PriorityLevel::High.class_key(), "priority-high");
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_value(PriorityLevel::High).unwrap(), json!(3));
    }
}
