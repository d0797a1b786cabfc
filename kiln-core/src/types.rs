//! Native type descriptors used by builtin declarations.
//!
//! Only the handful of target types the builtin namespace needs are
//! modelled here; the full type system belongs to the type-inference
//! collaborator.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// Boolean stored in a C int.
    Bint,
    Char,
    Int,
    SizeT,
    /// Signed size (`Py_ssize_t`-like).
    SsizeT,
    /// Generic object reference of the source language.
    Object,
    Ptr(Box<Type>),
    /// Reference to a declared typedef or extension type by cname.
    Named(String),
    Function {
        params: Vec<FuncArg>,
        result: Box<Type>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncArg {
    pub name: String,
    pub ty: Type,
}

impl FuncArg {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        FuncArg {
            name: name.into(),
            ty,
        }
    }
}

impl Type {
    pub fn ptr(target: Type) -> Type {
        Type::Ptr(Box::new(target))
    }

    pub fn function(params: Vec<FuncArg>, result: Type) -> Type {
        Type::Function {
            params,
            result: Box::new(result),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    /// Parse a basic type spelling such as `int`, `char*` or `ssize_t*`.
    ///
    /// Returns `None` for anything that is not a builtin basic type.
    pub fn parse_basic(spelling: &str) -> Option<Type> {
        let spelling = spelling.trim();
        if let Some(inner) = spelling.strip_suffix('*') {
            return Type::parse_basic(inner).map(Type::ptr);
        }
        let ty = match spelling {
            "void" => Type::Void,
            "bint" => Type::Bint,
            "char" => Type::Char,
            "int" => Type::Int,
            "size_t" => Type::SizeT,
            "ssize_t" => Type::SsizeT,
            "object" => Type::Object,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Bint => f.write_str("int"),
            Type::Char => f.write_str("char"),
            Type::Int => f.write_str("int"),
            Type::SizeT => f.write_str("size_t"),
            Type::SsizeT => f.write_str("ssize_t"),
            Type::Object => f.write_str("kiln_object *"),
            Type::Ptr(inner) => write!(f, "{inner} *"),
            Type::Named(cname) => f.write_str(cname),
            Type::Function { params, result } => {
                write!(f, "{result} (")?;
                for (idx, param) in params.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param.ty)?;
                }
                f.write_str(")")
            }
        }
    }
}
