//! Expression tree checks and the static types expressions produce.

use qti_core::model::expression::{
    FloatOrVariable, IntegerOrVariable, MathFunction, ToleranceMode,
};
use qti_core::model::{Expression, ExpressionKind, VariableDeclaration};
use qti_core::{BaseType, Identifier, NodePath};

use super::{Scope, Validator};
use crate::expression::{anchored, figures_problem};
use crate::session::builtin_declaration;
use crate::signature::{arity, child_contract, BaseTypeSet, CardinalitySet, TypeContract};

fn contract_of(declaration: &VariableDeclaration) -> TypeContract {
    TypeContract::new(
        CardinalitySet::of(declaration.cardinality),
        declaration
            .base_type
            .map_or(BaseTypeSet::ALL, BaseTypeSet::of),
    )
}

/// Any declaration of `identifier` visible to the scope's document,
/// readable or not.
fn declared(scope: Scope<'_>, identifier: &Identifier) -> Option<VariableDeclaration> {
    match scope {
        Scope::Item { item, .. } => item
            .declaration(identifier.as_str())
            .map(|(_, d)| d.clone())
            .or_else(|| builtin_declaration(identifier.as_str()).map(|(_, d)| d)),
        Scope::Test(test) => test
            .outcome_declaration(identifier.as_str())
            .map(|d| d.variable.clone()),
    }
}

fn union_of(children: &[TypeContract]) -> BaseTypeSet {
    if children.is_empty() {
        return BaseTypeSet::ALL;
    }
    children
        .iter()
        .fold(BaseTypeSet::NONE, |acc, c| acc.union(c.base_types))
}

/// Integer when every operand is integer, float when some operand can only
/// be float.
fn numeric_result(children: &[TypeContract]) -> BaseTypeSet {
    if children
        .iter()
        .all(|c| c.base_types.intersection(BaseTypeSet::FLOAT).is_empty())
    {
        BaseTypeSet::INTEGER
    } else if children.iter().any(|c| c.base_types == BaseTypeSet::FLOAT) {
        BaseTypeSet::FLOAT
    } else {
        BaseTypeSet::NUMERIC
    }
}

fn first(children: &[TypeContract], index: usize) -> TypeContract {
    children.get(index).copied().unwrap_or(TypeContract::ANY)
}

/// What an expression of `kind` produces, given what its children produce.
pub(crate) fn produced(kind: &ExpressionKind, children: &[TypeContract], scope: Scope<'_>) -> TypeContract {
    use ExpressionKind::*;
    let single = TypeContract::single;
    match kind {
        BaseValue { base_type, .. } => single(BaseTypeSet::of(*base_type)),
        Variable {
            identifier,
            weight_identifier,
        } => match scope.readable(identifier.as_str()) {
            Ok(Some(d)) => {
                let declared = contract_of(&d);
                if weight_identifier.is_some() && d.base_type.is_some_and(BaseType::is_numeric) {
                    TypeContract::new(declared.cardinalities, BaseTypeSet::NUMERIC)
                } else {
                    declared
                }
            }
            _ => TypeContract::ANY,
        },
        Default { identifier } | Correct { identifier } => declared(scope, identifier)
            .map_or(TypeContract::ANY, |d| contract_of(&d)),
        MapResponse { .. } | MapResponsePoint { .. } => single(BaseTypeSet::FLOAT),
        Null => TypeContract::ANY,
        RandomInteger { .. } => single(BaseTypeSet::INTEGER),
        RandomFloat { .. } | MathConstant { .. } => single(BaseTypeSet::FLOAT),

        TestVariables { base_type, .. } => TypeContract::new(
            CardinalitySet::MULTIPLE,
            base_type.map_or(BaseTypeSet::NUMERIC, BaseTypeSet::of),
        ),
        NumberCorrect { .. }
        | NumberIncorrect { .. }
        | NumberPresented { .. }
        | NumberResponded { .. }
        | NumberSelected { .. } => single(BaseTypeSet::INTEGER),
        OutcomeMaximum { .. } | OutcomeMinimum { .. } => {
            TypeContract::new(CardinalitySet::MULTIPLE, BaseTypeSet::FLOAT)
        }

        Multiple => TypeContract::new(CardinalitySet::MULTIPLE, union_of(children)),
        Ordered => TypeContract::new(CardinalitySet::ORDERED, union_of(children)),
        Repeat { .. } => TypeContract::new(CardinalitySet::ORDERED, union_of(children)),
        ContainerSize => single(BaseTypeSet::INTEGER),
        Index { .. } | Random => single(first(children, 0).base_types),
        FieldValue { .. } => TypeContract::single(BaseTypeSet::ALL),
        Delete => {
            let source = first(children, 1);
            let cardinalities = source.cardinalities.intersection(CardinalitySet::LIST);
            TypeContract::new(
                if cardinalities.is_empty() {
                    CardinalitySet::LIST
                } else {
                    cardinalities
                },
                source.base_types,
            )
        }

        IsNull | Member | Contains | Substring { .. } | Not | And | Or | AnyN { .. } | Match
        | StringMatch { .. } | PatternMatch { .. } | Equal { .. } | EqualRounded { .. }
        | Inside { .. } | Lt | Gt | Lte | Gte | DurationLt | DurationGte => {
            single(BaseTypeSet::BOOLEAN)
        }

        Sum | Product | Subtract | Min | Max => single(numeric_result(children)),
        Divide | Power | IntegerToFloat | RoundTo { .. } => single(BaseTypeSet::FLOAT),
        IntegerDivide | IntegerModulus | Truncate | Round | Gcd | Lcm => {
            single(BaseTypeSet::INTEGER)
        }
        MathOperator { name } => match name {
            MathFunction::Floor | MathFunction::Ceil => single(BaseTypeSet::INTEGER),
            _ => single(BaseTypeSet::FLOAT),
        },
    }
}

impl Validator<'_> {
    /// Check `expr` and everything below it. Returns what it produces.
    pub(crate) fn expression(&mut self, expr: &Expression, scope: Scope<'_>, node: &NodePath) -> TypeContract {
        let expected = arity(&expr.kind);
        if !expected.accepts(expr.children.len()) {
            self.error(
                node,
                None,
                format!(
                    "{} takes {} children, found {}",
                    expr.name(),
                    expected,
                    expr.children.len()
                ),
            );
        }
        let mut children = Vec::with_capacity(expr.children.len());
        for (index, child) in expr.children.iter().enumerate() {
            let child_node = node.indexed(child.name(), index);
            let child_produced = self.expression(child, scope, &child_node);
            self.require(child_produced, child_contract(&expr.kind, index), &child_node);
            children.push(child_produced);
        }
        self.attributes(&expr.kind, scope, node);
        produced(&expr.kind, &children, scope)
    }

    /// Report a value that can never satisfy `required`.
    pub(crate) fn require(&mut self, produced: TypeContract, required: TypeContract, node: &NodePath) {
        if produced
            .cardinalities
            .intersection(required.cardinalities)
            .is_empty()
        {
            self.error(
                node,
                None,
                format!(
                    "produces {} cardinality but {} is required",
                    produced.cardinalities, required.cardinalities
                ),
            );
            return;
        }
        if produced.cardinalities == CardinalitySet::RECORD || required.base_types == BaseTypeSet::ALL
        {
            return;
        }
        if produced.base_types.intersection(required.base_types).is_empty() {
            self.error(
                node,
                None,
                format!(
                    "produces base type {} but {} is required",
                    produced.base_types, required.base_types
                ),
            );
        }
    }

    fn attributes(&mut self, kind: &ExpressionKind, scope: Scope<'_>, node: &NodePath) {
        use ExpressionKind::*;
        if kind.is_item_subset() {
            if scope.item().is_some() {
                self.error(
                    node,
                    None,
                    format!("{} is only allowed in outcomeProcessing", kind.name()),
                );
            }
            return;
        }
        match kind {
            Variable {
                identifier,
                weight_identifier,
            } => {
                if let Err(message) = scope.readable(identifier.as_str()) {
                    self.error(node, Some("identifier"), message);
                }
                if weight_identifier.is_some() && scope.item().is_some() {
                    self.warning(
                        node,
                        Some("weightIdentifier"),
                        "weights only apply in outcomeProcessing",
                    );
                }
            }
            Default { identifier } => {
                if declared(scope, identifier).is_none() {
                    self.error(
                        node,
                        Some("identifier"),
                        format!("variable '{}' is not declared", identifier),
                    );
                }
            }
            Correct { identifier } => {
                self.response_reference(scope, identifier, node, |_| None);
            }
            MapResponse { identifier } => {
                self.response_reference(scope, identifier, node, |r| {
                    r.mapping.is_none().then(|| "has no mapping".to_string())
                });
            }
            MapResponsePoint { identifier } => {
                self.response_reference(scope, identifier, node, |r| {
                    if r.area_mapping.is_none() {
                        Some("has no area mapping".to_string())
                    } else if r.variable.base_type != Some(BaseType::Point) {
                        Some("is not a point response".to_string())
                    } else {
                        None
                    }
                });
            }
            RandomInteger { min, max, step, .. } => {
                if *step < 1 {
                    self.error(node, Some("step"), format!("step must be at least 1, found {}", step));
                }
                if max < min {
                    self.warning(
                        node,
                        Some("max"),
                        format!("max {} is less than min {}", max, min),
                    );
                }
            }
            RandomFloat { min, max, .. } => {
                if max < min {
                    self.warning(
                        node,
                        Some("max"),
                        format!("max {} is less than min {}", max, min),
                    );
                }
            }
            Index { n } => {
                if let IntegerOrVariable::Literal(n) = n {
                    if *n < 1 {
                        self.error(node, Some("n"), format!("index must be at least 1, found {}", n));
                    }
                }
                self.integer_attribute(scope, n, "n", node);
            }
            Repeat { number_repeats } => {
                if let IntegerOrVariable::Literal(n) = number_repeats {
                    if *n < 1 {
                        self.warning(
                            node,
                            Some("numberRepeats"),
                            format!("numberRepeats {} yields NULL", n),
                        );
                    }
                }
                self.integer_attribute(scope, number_repeats, "numberRepeats", node);
            }
            AnyN { min, max } => {
                if let (IntegerOrVariable::Literal(lo), IntegerOrVariable::Literal(hi)) = (min, max) {
                    if lo > hi {
                        self.warning(
                            node,
                            Some("min"),
                            format!("min {} is greater than max {}", lo, hi),
                        );
                    }
                }
                self.integer_attribute(scope, min, "min", node);
                self.integer_attribute(scope, max, "max", node);
            }
            PatternMatch { pattern } => {
                if let Err(err) = anchored(pattern) {
                    self.error(node, Some("pattern"), err.to_string());
                }
            }
            Equal {
                tolerance_mode,
                tolerance,
                ..
            } => self.tolerance(scope, *tolerance_mode, tolerance, node),
            EqualRounded {
                rounding_mode,
                figures,
            }
            | RoundTo {
                rounding_mode,
                figures,
            } => {
                if let IntegerOrVariable::Literal(f) = figures {
                    if let Some(problem) = figures_problem(*rounding_mode, *f) {
                        self.error(node, Some("figures"), problem);
                    }
                }
                self.integer_attribute(scope, figures, "figures", node);
            }
            Inside { shape, coords } => {
                for problem in shape.coord_problems(coords) {
                    self.error(node, Some("coords"), problem);
                }
            }
            _ => {}
        }
    }

    fn tolerance(
        &mut self,
        scope: Scope<'_>,
        mode: ToleranceMode,
        tolerance: &[FloatOrVariable],
        node: &NodePath,
    ) {
        if mode == ToleranceMode::Exact {
            return;
        }
        if tolerance.is_empty() || tolerance.len() > 2 {
            self.error(
                node,
                Some("tolerance"),
                format!(
                    "tolerance needs one or two values in {:?} mode, found {}",
                    mode,
                    tolerance.len()
                ),
            );
        }
        for value in tolerance {
            match value {
                FloatOrVariable::Literal(t) if *t < 0.0 => self.error(
                    node,
                    Some("tolerance"),
                    format!("tolerance must not be negative, found {}", t),
                ),
                FloatOrVariable::Literal(_) => {}
                FloatOrVariable::Variable(id) => self.template_reference(scope, id, "tolerance", node),
            }
        }
    }

    fn integer_attribute(
        &mut self,
        scope: Scope<'_>,
        value: &IntegerOrVariable,
        attribute: &str,
        node: &NodePath,
    ) {
        if let IntegerOrVariable::Variable(id) = value {
            self.template_reference(scope, id, attribute, node);
        }
    }

    /// An attribute naming a template variable.
    fn template_reference(&mut self, scope: Scope<'_>, identifier: &Identifier, attribute: &str, node: &NodePath) {
        let Some(item) = scope.item() else {
            self.error(
                node,
                Some(attribute),
                "template variables are not available in outcomeProcessing",
            );
            return;
        };
        if item.template_declaration(identifier.as_str()).is_none() {
            self.error(
                node,
                Some(attribute),
                format!("'{}' is not a declared template variable", identifier),
            );
        }
    }

    fn response_reference(
        &mut self,
        scope: Scope<'_>,
        identifier: &Identifier,
        node: &NodePath,
        problem: impl FnOnce(&qti_core::model::ResponseDeclaration) -> Option<String>,
    ) {
        let Some(item) = scope.item() else {
            self.error(node, Some("identifier"), "only allowed inside an item");
            return;
        };
        match item.response_declaration(identifier.as_str()) {
            None => self.error(
                node,
                Some("identifier"),
                format!("'{}' is not a declared response variable", identifier),
            ),
            Some(response) => {
                if let Some(problem) = problem(response) {
                    self.error(
                        node,
                        Some("identifier"),
                        format!("response '{}' {}", identifier, problem),
                    );
                }
            }
        }
    }
}
