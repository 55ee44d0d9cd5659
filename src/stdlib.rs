//! # Function Signatures
//!
//! Static typing rules for every function an `Apply` node may name: the
//! operators the parser desugars (`_add`, `_eqeq`, `_get`, ...) and the
//! standard library functions usable inside task declarations and commands.
//!
//! Each function has a fixed arity and an [`InferFn`] that receives the
//! already-inferred argument types and returns the result type. Arity is
//! checked by the caller before the rule runs, so rules may index `args`
//! directly.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::{
    ast::{SourcePosition, Type, TypeKind},
    WdlError,
};

/// One argument as seen by a typing rule.
pub struct Arg<'a> {
    pub ty: Type,
    pub pos: &'a SourcePosition,
}

pub type InferFn = fn(&[Arg<'_>], bool) -> Result<Type, WdlError>;

pub struct Function {
    pub arity: usize,
    pub infer: InferFn,
}

// ============================================================================
// REGISTRY
// ============================================================================

static FUNCTIONS: Lazy<HashMap<&'static str, Function>> = Lazy::new(|| {
    let table: [(&'static str, usize, InferFn); 31] = [
        ("_add", 2, FN_ADD),
        ("_sub", 2, FN_ARITHMETIC),
        ("_mul", 2, FN_ARITHMETIC),
        ("_div", 2, FN_ARITHMETIC),
        ("_rem", 2, FN_ARITHMETIC),
        ("_eqeq", 2, FN_EQUALITY),
        ("_neq", 2, FN_EQUALITY),
        ("_lt", 2, FN_COMPARISON),
        ("_lte", 2, FN_COMPARISON),
        ("_gt", 2, FN_COMPARISON),
        ("_gte", 2, FN_COMPARISON),
        ("_land", 2, FN_LOGICAL),
        ("_lor", 2, FN_LOGICAL),
        ("_negate", 1, FN_LOGICAL),
        ("_neg", 1, FN_NEG),
        ("_get", 2, FN_GET),
        ("length", 1, FN_LENGTH),
        ("defined", 1, FN_DEFINED),
        ("select_first", 1, FN_SELECT_FIRST),
        ("basename", 1, FN_BASENAME),
        ("stdout", 0, FN_OUTPUT_FILE),
        ("stderr", 0, FN_OUTPUT_FILE),
        ("read_string", 1, FN_READ_STRING),
        ("read_int", 1, FN_READ_INT),
        ("read_float", 1, FN_READ_FLOAT),
        ("read_boolean", 1, FN_READ_BOOLEAN),
        ("read_lines", 1, FN_READ_LINES),
        ("sub", 3, FN_SUB),
        ("floor", 1, FN_ROUNDING),
        ("ceil", 1, FN_ROUNDING),
        ("round", 1, FN_ROUNDING),
    ];
    table
        .into_iter()
        .map(|(name, arity, infer)| (name, Function { arity, infer }))
        .collect()
});

/// Look up a function by the name used in an `Apply` node.
pub fn lookup(name: &str) -> Option<&'static Function> {
    FUNCTIONS.get(name)
}

// ============================================================================
// HELPERS
// ============================================================================

fn expect(arg: &Arg<'_>, expected: &Type, check_quant: bool) -> Result<(), WdlError> {
    if arg.ty.coerces(expected, check_quant) {
        return Ok(());
    }
    Err(WdlError::type_mismatch(expected, &arg.ty, arg.pos))
}

fn is_int(ty: &Type) -> bool {
    matches!(ty.kind(), TypeKind::Int)
}

/// Array argument, accepting a bare item under relaxed checking.
fn expect_array(arg: &Arg<'_>, check_quant: bool) -> Result<Type, WdlError> {
    match arg.ty.as_array() {
        Some(item) if !(check_quant && arg.ty.optional()) => Ok(item.clone()),
        None if !check_quant && !matches!(arg.ty.kind(), TypeKind::Any) => {
            Ok(arg.ty.clone().with_optional(false))
        }
        _ => Err(WdlError::type_mismatch(
            &Type::array(Type::any()),
            &arg.ty,
            arg.pos,
        )),
    }
}

// ============================================================================
// OPERATORS
// ============================================================================

/// `+`: numeric addition, or concatenation when either side is a String.
pub const FN_ADD: InferFn = |args, check_quant| {
    let stringish = |ty: &Type| matches!(ty.kind(), TypeKind::String);
    if !(stringish(&args[0].ty) || stringish(&args[1].ty)) {
        return FN_ARITHMETIC(args, check_quant);
    }
    for arg in args {
        if !arg.ty.is_numeric() {
            expect(arg, &Type::string(), check_quant)?;
        }
    }
    Ok(Type::string())
};

/// `-`, `*`, `/`, `%`: Int when both operands are Int, Float otherwise.
pub const FN_ARITHMETIC: InferFn = |args, check_quant| {
    for arg in args {
        expect(arg, &Type::float(), check_quant)?;
    }
    if args.iter().all(|arg| is_int(&arg.ty)) {
        return Ok(Type::int());
    }
    Ok(Type::float())
};

/// `==`, `!=`: operands must unify.
pub const FN_EQUALITY: InferFn = |args, check_quant| {
    if Type::unify(&args[0].ty, &args[1].ty, check_quant).is_none() {
        return Err(WdlError::type_mismatch(&args[0].ty, &args[1].ty, args[1].pos));
    }
    Ok(Type::boolean())
};

/// `<`, `<=`, `>`, `>=`: unifying scalar operands.
pub const FN_COMPARISON: InferFn = |args, check_quant| {
    for arg in args {
        if arg.ty.is_array() {
            return Err(WdlError::type_mismatch(&Type::float(), &arg.ty, arg.pos));
        }
    }
    FN_EQUALITY(args, check_quant)
};

/// `&&`, `||`, `!`.
pub const FN_LOGICAL: InferFn = |args, check_quant| {
    for arg in args {
        expect(arg, &Type::boolean(), check_quant)?;
    }
    Ok(Type::boolean())
};

/// Unary minus keeps the operand's numeric type.
pub const FN_NEG: InferFn = |args, check_quant| {
    expect(&args[0], &Type::float(), check_quant)?;
    if is_int(&args[0].ty) {
        return Ok(Type::int());
    }
    Ok(Type::float())
};

/// `a[i]`: item type of an array indexed by an Int.
pub const FN_GET: InferFn = |args, check_quant| {
    let item = match args[0].ty.as_array() {
        Some(item) if !(check_quant && args[0].ty.optional()) => item.clone(),
        _ => {
            return Err(WdlError::type_mismatch(
                &Type::array(Type::any()),
                &args[0].ty,
                args[0].pos,
            ))
        }
    };
    expect(&args[1], &Type::int(), check_quant)?;
    Ok(item)
};

// ============================================================================
// STANDARD LIBRARY
// ============================================================================

pub const FN_LENGTH: InferFn = |args, check_quant| {
    expect_array(&args[0], check_quant)?;
    Ok(Type::int())
};

pub const FN_DEFINED: InferFn = |_args, _check_quant| Ok(Type::boolean());

/// First defined item of an array of optionals.
pub const FN_SELECT_FIRST: InferFn = |args, check_quant| {
    let item = expect_array(&args[0], check_quant)?;
    Ok(item.with_optional(false))
};

pub const FN_BASENAME: InferFn = |args, check_quant| {
    expect(&args[0], &Type::string(), check_quant)?;
    Ok(Type::string())
};

pub const FN_OUTPUT_FILE: InferFn = |_args, _check_quant| Ok(Type::file());

pub const FN_READ_STRING: InferFn = |args, check_quant| {
    expect(&args[0], &Type::file(), check_quant)?;
    Ok(Type::string())
};

pub const FN_READ_INT: InferFn = |args, check_quant| {
    expect(&args[0], &Type::file(), check_quant)?;
    Ok(Type::int())
};

pub const FN_READ_FLOAT: InferFn = |args, check_quant| {
    expect(&args[0], &Type::file(), check_quant)?;
    Ok(Type::float())
};

pub const FN_READ_BOOLEAN: InferFn = |args, check_quant| {
    expect(&args[0], &Type::file(), check_quant)?;
    Ok(Type::boolean())
};

pub const FN_READ_LINES: InferFn = |args, check_quant| {
    expect(&args[0], &Type::file(), check_quant)?;
    Ok(Type::array(Type::string()))
};

/// `sub(input, pattern, replacement)`.
pub const FN_SUB: InferFn = |args, check_quant| {
    for arg in args {
        expect(arg, &Type::string(), check_quant)?;
    }
    Ok(Type::string())
};

/// `floor`, `ceil`, `round`.
pub const FN_ROUNDING: InferFn = |args, check_quant| {
    expect(&args[0], &Type::float(), check_quant)?;
    Ok(Type::int())
};

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SourcePosition {
        SourcePosition::new("test", 1, 1, 1, 2)
    }

    fn infer(name: &str, types: Vec<Type>, check_quant: bool) -> Result<Type, WdlError> {
        let p = pos();
        let args: Vec<Arg<'_>> = types.into_iter().map(|ty| Arg { ty, pos: &p }).collect();
        let f = lookup(name).unwrap();
        assert_eq!(f.arity, args.len());
        (f.infer)(&args, check_quant)
    }

    #[test]
    fn arithmetic_widens_to_float() {
        assert_eq!(infer("_add", vec![Type::int(), Type::int()], true).unwrap(), Type::int());
        assert_eq!(
            infer("_mul", vec![Type::int(), Type::float()], true).unwrap(),
            Type::float()
        );
        assert!(infer("_sub", vec![Type::int(), Type::boolean()], true).is_err());
    }

    #[test]
    fn add_concatenates_strings() {
        assert_eq!(
            infer("_add", vec![Type::string(), Type::int()], true).unwrap(),
            Type::string()
        );
        assert_eq!(
            infer("_add", vec![Type::file(), Type::string()], true).unwrap(),
            Type::string()
        );
        assert!(infer("_add", vec![Type::string(), Type::boolean()], true).is_err());
    }

    #[test]
    fn optional_operand_needs_relaxed_mode() {
        let opt = Type::int().with_optional(true);
        assert!(infer("_add", vec![opt.clone(), Type::int()], true).is_err());
        assert!(infer("_add", vec![opt, Type::int()], false).is_ok());
    }

    #[test]
    fn get_returns_item_type() {
        let arr = Type::array(Type::string());
        assert_eq!(infer("_get", vec![arr, Type::int()], true).unwrap(), Type::string());
        assert!(infer("_get", vec![Type::string(), Type::int()], true).is_err());
    }

    #[test]
    fn select_first_drops_optional() {
        let arr = Type::array(Type::int().with_optional(true));
        assert_eq!(infer("select_first", vec![arr], true).unwrap(), Type::int());
    }

    #[test]
    fn unknown_function() {
        assert!(lookup("frobnicate").is_none());
        assert!(lookup("_add").is_some());
    }
}
