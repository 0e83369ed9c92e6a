//! Static contracts of expression kinds: how many children each kind takes
//! and which cardinalities and base types it accepts from them.
//!
//! What an expression *produces* may depend on declarations and on what its
//! children produce, so that half lives in [`crate::validate`].

use std::fmt;

use qti_core::model::ExpressionKind;
use qti_core::{BaseType, Cardinality};

// ──────────────────────────────────────────────
// Type sets
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardinalitySet(u8);

impl CardinalitySet {
    pub const NONE: CardinalitySet = CardinalitySet(0);
    pub const SINGLE: CardinalitySet = CardinalitySet(1);
    pub const MULTIPLE: CardinalitySet = CardinalitySet(1 << 1);
    pub const ORDERED: CardinalitySet = CardinalitySet(1 << 2);
    pub const RECORD: CardinalitySet = CardinalitySet(1 << 3);
    pub const LIST: CardinalitySet = CardinalitySet(0b0110);
    pub const SINGLE_OR_LIST: CardinalitySet = CardinalitySet(0b0111);
    pub const ALL: CardinalitySet = CardinalitySet(0b1111);

    pub fn of(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Single => Self::SINGLE,
            Cardinality::Multiple => Self::MULTIPLE,
            Cardinality::Ordered => Self::ORDERED,
            Cardinality::Record => Self::RECORD,
        }
    }

    pub const fn union(self, other: Self) -> Self {
        CardinalitySet(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        CardinalitySet(self.0 & other.0)
    }

    pub fn contains(self, cardinality: Cardinality) -> bool {
        self.0 & Self::of(cardinality).0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Cardinality> {
        Cardinality::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl fmt::Display for CardinalitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Cardinality::as_str).collect();
        f.write_str(&names.join("|"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BaseTypeSet(u16);

impl BaseTypeSet {
    pub const NONE: BaseTypeSet = BaseTypeSet(0);
    pub const ALL: BaseTypeSet = BaseTypeSet((1 << 11) - 1);
    pub const NUMERIC: BaseTypeSet = BaseTypeSet(bit(BaseType::Integer) | bit(BaseType::Float));
    pub const INTEGER: BaseTypeSet = BaseTypeSet(bit(BaseType::Integer));
    pub const FLOAT: BaseTypeSet = BaseTypeSet(bit(BaseType::Float));
    pub const BOOLEAN: BaseTypeSet = BaseTypeSet(bit(BaseType::Boolean));
    pub const STRING: BaseTypeSet = BaseTypeSet(bit(BaseType::String));
    pub const POINT: BaseTypeSet = BaseTypeSet(bit(BaseType::Point));
    pub const DURATION: BaseTypeSet = BaseTypeSet(bit(BaseType::Duration));
    /// Everything that supports equality tests in containers.
    pub const COMPARABLE: BaseTypeSet =
        BaseTypeSet(Self::ALL.0 & !bit(BaseType::Duration) & !bit(BaseType::File));

    pub const fn of(base_type: BaseType) -> Self {
        BaseTypeSet(bit(base_type))
    }

    pub const fn union(self, other: Self) -> Self {
        BaseTypeSet(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        BaseTypeSet(self.0 & other.0)
    }

    pub fn contains(self, base_type: BaseType) -> bool {
        self.0 & bit(base_type) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = BaseType> {
        BaseType::ALL.into_iter().filter(move |b| self.contains(*b))
    }

    /// The single member, if there is exactly one.
    pub fn only(self) -> Option<BaseType> {
        let mut members = self.iter();
        match (members.next(), members.next()) {
            (Some(b), None) => Some(b),
            _ => None,
        }
    }
}

const fn bit(base_type: BaseType) -> u16 {
    1 << (base_type as u16)
}

impl fmt::Display for BaseTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("any");
        }
        let names: Vec<&str> = self.iter().map(BaseType::as_str).collect();
        f.write_str(&names.join("|"))
    }
}

/// Cardinalities and base types an expression produces or accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeContract {
    pub cardinalities: CardinalitySet,
    pub base_types: BaseTypeSet,
}

impl TypeContract {
    pub const ANY: TypeContract = TypeContract::new(CardinalitySet::ALL, BaseTypeSet::ALL);

    pub const fn new(cardinalities: CardinalitySet, base_types: BaseTypeSet) -> Self {
        TypeContract {
            cardinalities,
            base_types,
        }
    }

    pub const fn single(base_types: BaseTypeSet) -> Self {
        TypeContract::new(CardinalitySet::SINGLE, base_types)
    }
}

// ──────────────────────────────────────────────
// Per-kind contracts
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    const fn exactly(n: usize) -> Self {
        Arity {
            min: n,
            max: Some(n),
        }
    }

    const fn at_least(n: usize) -> Self {
        Arity { min: n, max: None }
    }

    pub fn accepts(self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {}", max),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

pub fn arity(kind: &ExpressionKind) -> Arity {
    use ExpressionKind::*;
    match kind {
        BaseValue { .. }
        | Variable { .. }
        | Default { .. }
        | Correct { .. }
        | MapResponse { .. }
        | MapResponsePoint { .. }
        | Null
        | RandomInteger { .. }
        | RandomFloat { .. }
        | MathConstant { .. }
        | TestVariables { .. }
        | NumberCorrect { .. }
        | NumberIncorrect { .. }
        | NumberPresented { .. }
        | NumberResponded { .. }
        | NumberSelected { .. }
        | OutcomeMaximum { .. }
        | OutcomeMinimum { .. } => Arity::exactly(0),
        Multiple | Ordered => Arity::at_least(0),
        ContainerSize | IsNull | Index { .. } | FieldValue { .. } | Random | Not
        | PatternMatch { .. } | Inside { .. } | Truncate | Round | IntegerToFloat
        | RoundTo { .. } => Arity::exactly(1),
        Member | Delete | Contains | Substring { .. } | Match | StringMatch { .. }
        | Equal { .. } | EqualRounded { .. } | Lt | Gt | Lte | Gte | DurationLt
        | DurationGte | Subtract | Divide | Power | IntegerDivide | IntegerModulus => {
            Arity::exactly(2)
        }
        Repeat { .. } | And | Or | AnyN { .. } | Sum | Product | Min | Max | Gcd | Lcm => {
            Arity::at_least(1)
        }
        MathOperator { name } => Arity::exactly(name.arity()),
    }
}

/// What child number `index` of `kind` must produce.
pub fn child_contract(kind: &ExpressionKind, index: usize) -> TypeContract {
    use ExpressionKind::*;
    let single = TypeContract::single;
    match kind {
        Multiple => TypeContract::new(
            CardinalitySet::SINGLE.union(CardinalitySet::MULTIPLE),
            BaseTypeSet::ALL,
        ),
        Ordered => TypeContract::new(
            CardinalitySet::SINGLE.union(CardinalitySet::ORDERED),
            BaseTypeSet::ALL,
        ),
        ContainerSize => TypeContract::new(CardinalitySet::LIST, BaseTypeSet::ALL),
        IsNull => TypeContract::ANY,
        Index { .. } => TypeContract::new(CardinalitySet::ORDERED, BaseTypeSet::ALL),
        FieldValue { .. } => TypeContract::new(CardinalitySet::RECORD, BaseTypeSet::ALL),
        Random => TypeContract::new(CardinalitySet::LIST, BaseTypeSet::ALL),
        Member | Delete => {
            if index == 0 {
                single(BaseTypeSet::COMPARABLE)
            } else {
                TypeContract::new(CardinalitySet::LIST, BaseTypeSet::COMPARABLE)
            }
        }
        Contains => TypeContract::new(CardinalitySet::LIST, BaseTypeSet::COMPARABLE),
        Substring { .. } | StringMatch { .. } | PatternMatch { .. } => single(BaseTypeSet::STRING),
        Repeat { .. } => TypeContract::new(
            CardinalitySet::SINGLE.union(CardinalitySet::ORDERED),
            BaseTypeSet::ALL,
        ),
        Not | And | Or | AnyN { .. } => single(BaseTypeSet::BOOLEAN),
        Match => TypeContract::new(
            CardinalitySet::ALL,
            BaseTypeSet::ALL.intersection(BaseTypeSet(!bit(BaseType::Duration))),
        ),
        Equal { .. } | EqualRounded { .. } | Lt | Gt | Lte | Gte => single(BaseTypeSet::NUMERIC),
        Inside { .. } => TypeContract::new(CardinalitySet::SINGLE_OR_LIST, BaseTypeSet::POINT),
        DurationLt | DurationGte => single(BaseTypeSet::DURATION),
        Subtract | Divide | Power | Truncate | Round | RoundTo { .. } | MathOperator { .. } => {
            single(BaseTypeSet::NUMERIC)
        }
        IntegerDivide | IntegerModulus | IntegerToFloat => single(BaseTypeSet::INTEGER),
        Sum | Product | Min | Max => {
            TypeContract::new(CardinalitySet::SINGLE_OR_LIST, BaseTypeSet::NUMERIC)
        }
        Gcd | Lcm => TypeContract::new(CardinalitySet::SINGLE_OR_LIST, BaseTypeSet::INTEGER),
        // leaves take no children
        _ => TypeContract::ANY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_algebra() {
        assert!(CardinalitySet::LIST.contains(Cardinality::Ordered));
        assert!(!CardinalitySet::LIST.contains(Cardinality::Single));
        assert!(CardinalitySet::SINGLE
            .intersection(CardinalitySet::LIST)
            .is_empty());
        assert_eq!(BaseTypeSet::NUMERIC.iter().count(), 2);
        assert_eq!(BaseTypeSet::INTEGER.only(), Some(BaseType::Integer));
        assert_eq!(BaseTypeSet::NUMERIC.only(), None);
        assert!(!BaseTypeSet::COMPARABLE.contains(BaseType::Duration));
        assert!(BaseTypeSet::ALL.contains(BaseType::Uri));
    }

    #[test]
    fn display_lists_members() {
        assert_eq!(CardinalitySet::LIST.to_string(), "multiple|ordered");
        assert_eq!(BaseTypeSet::NUMERIC.to_string(), "integer|float");
        assert_eq!(BaseTypeSet::ALL.to_string(), "any");
    }

    #[test]
    fn arity_of_operators() {
        assert_eq!(arity(&ExpressionKind::Not), Arity::exactly(1));
        assert!(arity(&ExpressionKind::Sum).accepts(5));
        assert!(!arity(&ExpressionKind::Sum).accepts(0));
        assert!(arity(&ExpressionKind::Multiple).accepts(0));
        assert!(!arity(&ExpressionKind::Null).accepts(1));
        assert_eq!(arity(&ExpressionKind::Subtract).to_string(), "exactly 2");
    }
}
