//! TypeScript type model used by the checker, rendered the way `tsc` prints types.

use std::fmt;

/// A parameter of a function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name as it appears in the signature (`__0` for patterns).
    pub name: String,
    /// Parameter type.
    pub ty: Type,
    /// Whether the parameter may be omitted.
    pub optional: bool,
    /// Whether this is a `...rest` parameter.
    pub rest: bool,
}

/// A function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Parameters in declaration order.
    pub params: Vec<Param>,
    /// Return type.
    pub returns: Box<Type>,
}

/// A member of an object literal type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Property name, quoted when it is not a valid identifier.
    pub name: String,
    /// Property type; a [`Type::Function`] when `method` is set.
    pub ty: Type,
    /// `name?: T`
    pub optional: bool,
    /// `readonly name: T`
    pub readonly: bool,
    /// Rendered with method syntax, `name(a: T): R`.
    pub method: bool,
}

/// Represents a TypeScript type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// `any`
    Any,
    /// `unknown`
    Unknown,
    /// `never`
    Never,
    /// `void`
    Void,
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `number`
    Number,
    /// `string`
    String,
    /// `bigint`
    BigInt,
    /// `symbol`
    Symbol,
    /// `true` or `false`
    BooleanLiteral(bool),
    /// Normalized numeric literal, e.g. `16` for `0x10`.
    NumberLiteral(String),
    /// String literal contents, without quotes.
    StringLiteral(String),
    /// Bigint literal including the `n` suffix.
    BigIntLiteral(String),
    /// `T[]`
    Array(Box<Type>),
    /// `[A, B]` or `readonly [A, B]`
    Tuple {
        /// Element types.
        elements: Vec<Type>,
        /// Produced by `as const`.
        readonly: bool,
    },
    /// Object literal shape.
    Object(Vec<Member>),
    /// Function type.
    Function(Signature),
    /// Normalized union, see [`Type::union_of`].
    Union(Vec<Type>),
    /// Reference written in source, or a class instance type.
    Named(String),
    /// Generic reference such as `Promise<number>`.
    Generic {
        /// Type name.
        name: String,
        /// Type arguments.
        args: Vec<Type>,
    },
    /// `typeof C` for a class value.
    TypeOf(String),
}

impl Type {
    /// Maps annotation text onto the model; anything that is not a keyword
    /// type is kept verbatim.
    pub fn from_annotation(text: &str) -> Type {
        match text.trim() {
            "any" => Type::Any,
            "unknown" => Type::Unknown,
            "never" => Type::Never,
            "void" => Type::Void,
            "undefined" => Type::Undefined,
            "null" => Type::Null,
            "boolean" => Type::Boolean,
            "number" => Type::Number,
            "string" => Type::String,
            "bigint" => Type::BigInt,
            "symbol" => Type::Symbol,
            "true" => Type::BooleanLiteral(true),
            "false" => Type::BooleanLiteral(false),
            other => Type::Named(other.to_string()),
        }
    }

    /// `Name<Arg, ...>`
    pub fn generic(name: &str, args: Vec<Type>) -> Type {
        Type::Generic { name: name.to_string(), args }
    }

    /// Whether this is a string, number, boolean or bigint literal type.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Type::BooleanLiteral(_)
                | Type::NumberLiteral(_)
                | Type::StringLiteral(_)
                | Type::BigIntLiteral(_)
        )
    }

    /// Whether every constituent is a string type.
    pub fn is_string_like(&self) -> bool {
        match self {
            Type::String | Type::StringLiteral(_) => true,
            Type::Union(types) => types.iter().all(Type::is_string_like),
            _ => false,
        }
    }

    /// Whether every constituent is a number type.
    pub fn is_number_like(&self) -> bool {
        match self {
            Type::Number | Type::NumberLiteral(_) => true,
            Type::Union(types) => types.iter().all(Type::is_number_like),
            _ => false,
        }
    }

    /// Whether every constituent is a bigint type.
    pub fn is_bigint_like(&self) -> bool {
        match self {
            Type::BigInt | Type::BigIntLiteral(_) => true,
            Type::Union(types) => types.iter().all(Type::is_bigint_like),
            _ => false,
        }
    }

    /// Whether values of this type always coerce to `true`.
    pub fn is_always_truthy(&self) -> bool {
        matches!(
            self,
            Type::Object(_)
                | Type::Array(_)
                | Type::Tuple { .. }
                | Type::Function(_)
                | Type::TypeOf(_)
                | Type::Generic { .. }
        )
    }

    /// Replaces literal types by their primitive base type.
    pub fn widened(&self) -> Type {
        match self {
            Type::BooleanLiteral(_) => Type::Boolean,
            Type::NumberLiteral(_) => Type::Number,
            Type::StringLiteral(_) => Type::String,
            Type::BigIntLiteral(_) => Type::BigInt,
            Type::Union(types) => Type::union_of(types.iter().map(Type::widened).collect()),
            other => other.clone(),
        }
    }

    /// Drops `null` and `undefined` constituents, keeping the type if nothing else remains.
    pub fn without_nullish(&self) -> Type {
        match self {
            Type::Union(types) => {
                let rest: Vec<Type> = types
                    .iter()
                    .filter(|t| !matches!(t, Type::Null | Type::Undefined))
                    .cloned()
                    .collect();
                if rest.is_empty() {
                    self.clone()
                } else {
                    Type::union_of(rest)
                }
            },
            other => other.clone(),
        }
    }

    /// The type `await` produces for a value of this type.
    pub fn awaited(&self) -> Type {
        match self {
            Type::Generic { name, args } if name == "Promise" && args.len() == 1 => {
                args[0].awaited()
            },
            Type::Union(types) => Type::union_of(types.iter().map(Type::awaited).collect()),
            other => other.clone(),
        }
    }

    /// Creates a normalized union.
    ///
    /// Nested unions are flattened, duplicates and `never` removed, literals
    /// absorbed by their base type, `true | false` collapsed to `boolean`,
    /// and `any`/`unknown` absorb everything. Primitives are ordered the way
    /// `tsc` prints them, with `null` and `undefined` last.
    pub fn union_of(types: Vec<Type>) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        for ty in types {
            let parts = match ty {
                Type::Union(nested) => nested,
                Type::Never => continue,
                other => vec![other],
            };
            for part in parts {
                if !flat.contains(&part) {
                    flat.push(part);
                }
            }
        }

        if flat.contains(&Type::Any) {
            return Type::Any;
        }
        if flat.contains(&Type::Unknown) {
            return Type::Unknown;
        }

        let has_true = flat.contains(&Type::BooleanLiteral(true));
        let has_false = flat.contains(&Type::BooleanLiteral(false));
        if has_true && has_false && !flat.contains(&Type::Boolean) {
            let at = flat.iter().position(|t| matches!(t, Type::BooleanLiteral(_))).unwrap_or(0);
            flat.insert(at, Type::Boolean);
        }

        let snapshot = flat.clone();
        flat.retain(|t| match t {
            Type::BooleanLiteral(_) => !snapshot.contains(&Type::Boolean),
            Type::NumberLiteral(_) => !snapshot.contains(&Type::Number),
            Type::StringLiteral(_) => !snapshot.contains(&Type::String),
            Type::BigIntLiteral(_) => !snapshot.contains(&Type::BigInt),
            _ => true,
        });

        flat.sort_by_key(Type::union_rank);

        match flat.len() {
            0 => Type::Never,
            1 => flat.remove(0),
            _ => Type::Union(flat),
        }
    }

    fn union_rank(&self) -> u8 {
        match self {
            Type::String | Type::StringLiteral(_) => 0,
            Type::Number | Type::NumberLiteral(_) => 1,
            Type::BigInt | Type::BigIntLiteral(_) => 2,
            Type::Boolean | Type::BooleanLiteral(_) => 3,
            Type::Symbol => 4,
            Type::Null => 6,
            Type::Undefined => 7,
            _ => 5,
        }
    }

    fn needs_parens_in_union(&self) -> bool {
        matches!(self, Type::Function(_))
    }

    fn needs_parens_in_array(&self) -> bool {
        matches!(self, Type::Function(_) | Type::Union(_) | Type::TypeOf(_))
    }
}

impl Default for Type {
    fn default() -> Self {
        Self::Any
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest {
            write!(f, "...")?;
        }
        write!(f, "{}", self.name)?;
        if self.optional && !self.rest {
            write!(f, "?")?;
        }
        write!(f, ": {}", self.ty)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) => {}", join(&self.params, ", "), self.returns)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.readonly {
            write!(f, "readonly ")?;
        }
        write!(f, "{}", self.name)?;
        if self.optional {
            write!(f, "?")?;
        }
        match &self.ty {
            Type::Function(sig) if self.method => {
                write!(f, "({}): {}", join(&sig.params, ", "), sig.returns)
            },
            ty => write!(f, ": {}", ty),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Unknown => write!(f, "unknown"),
            Type::Never => write!(f, "never"),
            Type::Void => write!(f, "void"),
            Type::Undefined => write!(f, "undefined"),
            Type::Null => write!(f, "null"),
            Type::Boolean => write!(f, "boolean"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::BigInt => write!(f, "bigint"),
            Type::Symbol => write!(f, "symbol"),
            Type::BooleanLiteral(value) => write!(f, "{}", value),
            Type::NumberLiteral(value) | Type::BigIntLiteral(value) => write!(f, "{}", value),
            Type::StringLiteral(value) => write!(f, "\"{}\"", value),
            Type::Array(inner) if inner.needs_parens_in_array() => write!(f, "({})[]", inner),
            Type::Array(inner) => write!(f, "{}[]", inner),
            Type::Tuple { elements, readonly } => {
                if *readonly {
                    write!(f, "readonly ")?;
                }
                write!(f, "[{}]", join(elements, ", "))
            },
            Type::Object(members) if members.is_empty() => write!(f, "{{}}"),
            Type::Object(members) => {
                write!(f, "{{ ")?;
                for member in members {
                    write!(f, "{}; ", member)?;
                }
                write!(f, "}}")
            },
            Type::Function(sig) => write!(f, "{}", sig),
            Type::Union(types) => {
                let parts: Vec<String> = types
                    .iter()
                    .map(|t| {
                        if t.needs_parens_in_union() {
                            format!("({})", t)
                        } else {
                            t.to_string()
                        }
                    })
                    .collect();
                write!(f, "{}", parts.join(" | "))
            },
            Type::Named(name) => write!(f, "{}", name),
            Type::Generic { name, args } => write!(f, "{}<{}>", name, join(args, ", ")),
            Type::TypeOf(name) => write!(f, "typeof {}", name),
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(sep)
}

/// An inferred type together with the text that will be written to the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    /// Semantic type.
    pub ty: Type,
    /// Rendered annotation text.
    pub text: String,
}

impl ResolvedType {
    /// Renders `ty`.
    pub fn new(ty: Type) -> Self {
        let text = ty.to_string();
        Self { ty, text }
    }

    /// The rendered type is exactly `any`.
    pub fn is_any(&self) -> bool {
        self.text == "any"
    }

    /// The type is a string, number, boolean or bigint literal type.
    pub fn is_literal(&self) -> bool {
        self.ty.is_literal()
    }
}
