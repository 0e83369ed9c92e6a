//! Expression trees.
//!
//! Every expression node is an [`Expression`]: an [`ExpressionKind`] carrying
//! the node's attributes, plus its child expressions in document order. The
//! JSON form is `{"type": "<element>", ...attributes, "children": [...]}`.

use serde::{Deserialize, Serialize};

use super::shape::Shape;
use crate::identifier::Identifier;
use crate::value::BaseType;

fn default_true() -> bool {
    true
}

fn default_step() -> i32 {
    1
}

fn default_one() -> IntegerOrVariable {
    IntegerOrVariable::Literal(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(flatten)]
    pub kind: ExpressionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Expression>,
}

impl Expression {
    pub fn new(kind: ExpressionKind, children: Vec<Expression>) -> Self {
        Expression { kind, children }
    }

    pub fn leaf(kind: ExpressionKind) -> Self {
        Expression {
            kind,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// An integer attribute that may instead name a template variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntegerOrVariable {
    Literal(i32),
    Variable(Identifier),
}

/// A float attribute that may instead name a template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FloatOrVariable {
    Literal(f64),
    Variable(Identifier),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToleranceMode {
    #[default]
    Exact,
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundingMode {
    #[default]
    SignificantFigures,
    DecimalPlaces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MathConstant {
    Pi,
    E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MathFunction {
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Asin,
    Acos,
    Atan,
    Atan2,
    Asec,
    Acsc,
    Acot,
    Sinh,
    Cosh,
    Tanh,
    Sech,
    Csch,
    Coth,
    Log,
    Ln,
    Exp,
    Abs,
    Signum,
    Floor,
    Ceil,
    ToDegrees,
    ToRadians,
}

impl MathFunction {
    /// Number of arguments the function takes.
    pub fn arity(self) -> usize {
        match self {
            MathFunction::Atan2 => 2,
            _ => 1,
        }
    }
}

/// Item filter shared by the item subset expressions of test outcome
/// processing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSubset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_identifier: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_category: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_category: Vec<Identifier>,
}

impl ItemSubset {
    /// Whether an item with the given sections and categories passes the
    /// filter.
    pub fn accepts(&self, sections: &[Identifier], categories: &[Identifier]) -> bool {
        if let Some(section) = &self.section_identifier {
            if !sections.contains(section) {
                return false;
            }
        }
        if !self.include_category.is_empty()
            && !self.include_category.iter().any(|c| categories.contains(c))
        {
            return false;
        }
        !self.exclude_category.iter().any(|c| categories.contains(c))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ExpressionKind {
    // ── general ──
    BaseValue {
        base_type: BaseType,
        value: String,
    },
    Variable {
        identifier: Identifier,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight_identifier: Option<Identifier>,
    },
    Default {
        identifier: Identifier,
    },
    Correct {
        identifier: Identifier,
    },
    MapResponse {
        identifier: Identifier,
    },
    MapResponsePoint {
        identifier: Identifier,
    },
    Null,
    RandomInteger {
        #[serde(default)]
        min: i32,
        max: i32,
        #[serde(default = "default_step")]
        step: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
    RandomFloat {
        #[serde(default)]
        min: f64,
        max: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
    MathConstant {
        name: MathConstant,
    },

    // ── item subsets (test outcome processing only) ──
    TestVariables {
        variable_identifier: Identifier,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight_identifier: Option<Identifier>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_type: Option<BaseType>,
        #[serde(default)]
        subset: ItemSubset,
    },
    NumberCorrect {
        #[serde(default)]
        subset: ItemSubset,
    },
    NumberIncorrect {
        #[serde(default)]
        subset: ItemSubset,
    },
    NumberPresented {
        #[serde(default)]
        subset: ItemSubset,
    },
    NumberResponded {
        #[serde(default)]
        subset: ItemSubset,
    },
    NumberSelected {
        #[serde(default)]
        subset: ItemSubset,
    },
    OutcomeMaximum {
        outcome_identifier: Identifier,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight_identifier: Option<Identifier>,
        #[serde(default)]
        subset: ItemSubset,
    },
    OutcomeMinimum {
        outcome_identifier: Identifier,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight_identifier: Option<Identifier>,
        #[serde(default)]
        subset: ItemSubset,
    },

    // ── containers ──
    Multiple,
    Ordered,
    ContainerSize,
    IsNull,
    Index {
        n: IntegerOrVariable,
    },
    FieldValue {
        field_identifier: Identifier,
    },
    Random,
    Member,
    Delete,
    Contains,
    Substring {
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    Repeat {
        #[serde(default = "default_one")]
        number_repeats: IntegerOrVariable,
    },

    // ── logic and comparison ──
    Not,
    And,
    Or,
    AnyN {
        min: IntegerOrVariable,
        max: IntegerOrVariable,
    },
    Match,
    StringMatch {
        case_sensitive: bool,
        #[serde(default)]
        substring: bool,
    },
    PatternMatch {
        pattern: String,
    },
    Equal {
        #[serde(default)]
        tolerance_mode: ToleranceMode,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tolerance: Vec<FloatOrVariable>,
        #[serde(default = "default_true")]
        include_lower_bound: bool,
        #[serde(default = "default_true")]
        include_upper_bound: bool,
    },
    EqualRounded {
        #[serde(default)]
        rounding_mode: RoundingMode,
        figures: IntegerOrVariable,
    },
    Inside {
        shape: Shape,
        #[serde(default)]
        coords: Vec<i32>,
    },
    Lt,
    Gt,
    Lte,
    Gte,
    #[serde(rename = "durationLT")]
    DurationLt,
    #[serde(rename = "durationGTE")]
    DurationGte,

    // ── arithmetic ──
    Sum,
    Product,
    Subtract,
    Divide,
    Power,
    IntegerDivide,
    IntegerModulus,
    Truncate,
    Round,
    IntegerToFloat,
    RoundTo {
        #[serde(default)]
        rounding_mode: RoundingMode,
        figures: IntegerOrVariable,
    },
    Min,
    Max,
    Gcd,
    Lcm,
    MathOperator {
        name: MathFunction,
    },
}

impl ExpressionKind {
    /// Element name, used for node paths and messages.
    pub fn name(&self) -> &'static str {
        use ExpressionKind::*;
        match self {
            BaseValue { .. } => "baseValue",
            Variable { .. } => "variable",
            Default { .. } => "default",
            Correct { .. } => "correct",
            MapResponse { .. } => "mapResponse",
            MapResponsePoint { .. } => "mapResponsePoint",
            Null => "null",
            RandomInteger { .. } => "randomInteger",
            RandomFloat { .. } => "randomFloat",
            MathConstant { .. } => "mathConstant",
            TestVariables { .. } => "testVariables",
            NumberCorrect { .. } => "numberCorrect",
            NumberIncorrect { .. } => "numberIncorrect",
            NumberPresented { .. } => "numberPresented",
            NumberResponded { .. } => "numberResponded",
            NumberSelected { .. } => "numberSelected",
            OutcomeMaximum { .. } => "outcomeMaximum",
            OutcomeMinimum { .. } => "outcomeMinimum",
            Multiple => "multiple",
            Ordered => "ordered",
            ContainerSize => "containerSize",
            IsNull => "isNull",
            Index { .. } => "index",
            FieldValue { .. } => "fieldValue",
            Random => "random",
            Member => "member",
            Delete => "delete",
            Contains => "contains",
            Substring { .. } => "substring",
            Repeat { .. } => "repeat",
            Not => "not",
            And => "and",
            Or => "or",
            AnyN { .. } => "anyN",
            Match => "match",
            StringMatch { .. } => "stringMatch",
            PatternMatch { .. } => "patternMatch",
            Equal { .. } => "equal",
            EqualRounded { .. } => "equalRounded",
            Inside { .. } => "inside",
            Lt => "lt",
            Gt => "gt",
            Lte => "lte",
            Gte => "gte",
            DurationLt => "durationLT",
            DurationGte => "durationGTE",
            Sum => "sum",
            Product => "product",
            Subtract => "subtract",
            Divide => "divide",
            Power => "power",
            IntegerDivide => "integerDivide",
            IntegerModulus => "integerModulus",
            Truncate => "truncate",
            Round => "round",
            IntegerToFloat => "integerToFloat",
            RoundTo { .. } => "roundTo",
            Min => "min",
            Max => "max",
            Gcd => "gcd",
            Lcm => "lcm",
            MathOperator { .. } => "mathOperator",
        }
    }

    /// Item subset expressions only make sense over a test's items.
    pub fn is_item_subset(&self) -> bool {
        matches!(
            self,
            ExpressionKind::TestVariables { .. }
                | ExpressionKind::NumberCorrect { .. }
                | ExpressionKind::NumberIncorrect { .. }
                | ExpressionKind::NumberPresented { .. }
                | ExpressionKind::NumberResponded { .. }
                | ExpressionKind::NumberSelected { .. }
                | ExpressionKind::OutcomeMaximum { .. }
                | ExpressionKind::OutcomeMinimum { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_expression() {
        let expr: Expression = serde_json::from_value(json!({
            "type": "match",
            "children": [
                {"type": "variable", "identifier": "RESPONSE"},
                {"type": "correct", "identifier": "RESPONSE"}
            ]
        }))
        .unwrap();
        assert_eq!(expr.name(), "match");
        assert_eq!(expr.children.len(), 2);
        assert!(matches!(
            &expr.children[0].kind,
            ExpressionKind::Variable { weight_identifier: None, .. }
        ));
    }

    #[test]
    fn attribute_defaults() {
        let expr: Expression =
            serde_json::from_value(json!({"type": "randomInteger", "max": 10})).unwrap();
        assert_eq!(
            expr.kind,
            ExpressionKind::RandomInteger {
                min: 0,
                max: 10,
                step: 1,
                seed: None
            }
        );
        let eq: Expression = serde_json::from_value(json!({"type": "equal"})).unwrap();
        assert!(matches!(
            eq.kind,
            ExpressionKind::Equal {
                tolerance_mode: ToleranceMode::Exact,
                include_lower_bound: true,
                ..
            }
        ));
    }

    #[test]
    fn duration_comparisons_keep_schema_names() {
        let expr: Expression = serde_json::from_value(json!({"type": "durationGTE"})).unwrap();
        assert_eq!(expr.kind, ExpressionKind::DurationGte);
        assert_eq!(
            serde_json::to_value(&Expression::leaf(ExpressionKind::DurationLt)).unwrap(),
            json!({"type": "durationLT"})
        );
    }

    #[test]
    fn integer_or_variable_attributes() {
        let expr: Expression = serde_json::from_value(json!({
            "type": "roundTo", "roundingMode": "decimalPlaces", "figures": "PLACES"
        }))
        .unwrap();
        match expr.kind {
            ExpressionKind::RoundTo {
                rounding_mode,
                figures: IntegerOrVariable::Variable(id),
            } => {
                assert_eq!(rounding_mode, RoundingMode::DecimalPlaces);
                assert_eq!(id.as_str(), "PLACES");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn subset_filter() {
        let id = |s: &str| Identifier::new(s).unwrap();
        let subset = ItemSubset {
            section_identifier: Some(id("S1")),
            include_category: vec![id("math")],
            exclude_category: vec![id("hard")],
        };
        assert!(subset.accepts(&[id("S1")], &[id("math")]));
        assert!(!subset.accepts(&[id("S2")], &[id("math")]));
        assert!(!subset.accepts(&[id("S1")], &[id("math"), id("hard")]));
        assert!(!subset.accepts(&[id("S1")], &[]));
        assert!(ItemSubset::default().accepts(&[], &[]));
    }
}
