//! Delegate binding policy: decides which candidate method a delegate binds
//! to, and in which shape. The shape determines whether the delegate needs a
//! shuffle thunk.

use bitflags::{bitflags};

use crate::builder::{Adaptation};
use crate::convention::{ArgType, Convention, Signature, ValueClass};
use crate::error::{PolicyError};

bitflags! {
    /// Restrictions on how a delegate may bind to a target method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindingFlags: u32 {
        /// Only static target methods.
        const STATIC_METHOD_ONLY    = 0x01;
        /// Only instance (including virtual) target methods.
        const INSTANCE_METHOD_ONLY  = 0x02;
        /// Only delegates open over the first argument.
        const OPEN_DELEGATE_ONLY    = 0x04;
        /// Only delegates closed over the first argument.
        const CLOSED_DELEGATE_ONLY  = 0x08;
        /// A null target is never bound as the first argument of a static method.
        const NEVER_CLOSE_OVER_NULL = 0x10;
        /// Match method names case-insensitively.
        const CASELESS_MATCHING     = 0x20;
        /// Any object reference type matches any other.
        const RELAXED_SIGNATURE     = 0x40;
    }
}

/** The declared type of a parameter or return value. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    I8,
    I16,
    I32,
    I64,
    IntPtr,
    F32,
    F64,
    /// A reference to an object of the named type.
    Object(String),
    /// A value type passed by value.
    Struct {name: String, size: u16, classes: Vec<ValueClass>},
}

impl ParamType {
    pub fn object(name: &str) -> Self { ParamType::Object(name.into()) }

    pub fn arg_type(&self) -> ArgType {
        match self {
            ParamType::I8 => ArgType::SubWord(1),
            ParamType::I16 => ArgType::SubWord(2),
            ParamType::I32 => ArgType::SubWord(4),
            ParamType::I64 | ParamType::IntPtr | ParamType::Object(_) => ArgType::Word,
            ParamType::F32 => ArgType::F32,
            ParamType::F64 => ArgType::F64,
            ParamType::Struct {size, classes, ..} => ArgType::aggregate(*size, classes),
        }
    }

    fn is_object(&self) -> bool { matches!(self, ParamType::Object(_)) }

    /** Tests whether a value of type `self` can be passed where `other` is expected. */
    fn matches(&self, other: &ParamType, relaxed: bool) -> bool {
        self == other || (relaxed && self.is_object() && other.is_object())
    }
}

fn all_match(a: &[ParamType], b: &[ParamType], relaxed: bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y, relaxed))
}

//-----------------------------------------------------------------------------

/** A method that a delegate can invoke or bind to. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    pub name: String,
    pub declaring_type: String,
    pub is_static: bool,
    pub params: Vec<ParamType>,
    /// `None` means the method returns nothing.
    pub ret: Option<ParamType>,
    /// The method is shared generic code and takes a hidden instantiation argument.
    pub generic_context: bool,
}

impl Method {
    fn new(declaring_type: &str, name: &str, is_static: bool, params: Vec<ParamType>) -> Self {
        Method {
            name: name.into(),
            declaring_type: declaring_type.into(),
            is_static,
            params,
            ret: None,
            generic_context: false,
        }
    }

    pub fn new_static(declaring_type: &str, name: &str, params: impl Into<Vec<ParamType>>) -> Self {
        Self::new(declaring_type, name, true, params.into())
    }

    pub fn new_instance(declaring_type: &str, name: &str, params: impl Into<Vec<ParamType>>) -> Self {
        Self::new(declaring_type, name, false, params.into())
    }

    pub fn returning(mut self, ret: ParamType) -> Self { self.ret = Some(ret); self }

    pub fn with_generic_context(mut self) -> Self { self.generic_context = true; self }

    /** The type of the receiver, for instance methods. */
    pub fn this_type(&self) -> Option<ParamType> {
        if self.is_static { None } else { Some(ParamType::Object(self.declaring_type.clone())) }
    }

    /**
     * The argument list of a call to this method under `convention`. A
     * struct return value too large for registers is returned through a
     * hidden buffer.
     */
    pub fn signature(&self, convention: &Convention) -> Signature {
        let mut signature = Signature::new(self.params.iter().map(ParamType::arg_type).collect::<Vec<_>>());
        signature.receiver = !self.is_static;
        signature.return_buffer = matches!(
            &self.ret,
            Some(ParamType::Struct {size, ..}) if *size > convention.max_register_aggregate
        );
        signature.generic_context = self.generic_context;
        signature
    }
}

/** What a delegate is bound over. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindTarget {
    /// No target: the delegate is open.
    None,
    /// A null reference.
    Null,
    /// A reference to an object of the named type.
    Object(String),
}

/** How a delegate's invoke arguments relate to its target's arguments. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DelegateShape {
    /// A static method with the same parameters as the invoke method.
    OpenStatic,
    /// A static method whose first parameter is the bound target.
    ClosedStatic,
    /// An instance method whose receiver is the invoke method's first argument.
    OpenInstance,
    /// An instance method whose receiver is the bound target.
    ClosedInstance,
}

impl DelegateShape {
    /**
     * The transform from the invoke call to the target call, or `None` if the
     * delegate machinery can call the target directly with the bound target
     * in place of the delegate.
     */
    pub fn adaptation(self) -> Option<Adaptation> {
        match self {
            DelegateShape::OpenStatic | DelegateShape::OpenInstance => Some(Adaptation::RemoveReceiver),
            DelegateShape::ClosedStatic | DelegateShape::ClosedInstance => None,
        }
    }
}

/** The candidate chosen by [`select()`]. */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Binding<'a> {
    pub method: &'a Method,
    pub shape: DelegateShape,
}

/**
 * Decides the shape in which a delegate with invoke method `invoke` can bind
 * to `method` over `target`, if any. Binding an instance method to a null
 * target is an error rather than a mismatch.
 */
pub fn shape(
    invoke: &Method,
    method: &Method,
    flags: BindingFlags,
    target: &BindTarget,
) -> Result<Option<DelegateShape>, PolicyError> {
    let relaxed = flags.contains(BindingFlags::RELAXED_SIGNATURE);
    let rets_match = match (&invoke.ret, &method.ret) {
        (None, None) => true,
        (Some(a), Some(b)) => b.matches(a, relaxed),
        _ => false,
    };
    if !rets_match { return Ok(None); }
    let open_allowed = !flags.contains(BindingFlags::CLOSED_DELEGATE_ONLY);
    let closed_allowed = !flags.contains(BindingFlags::OPEN_DELEGATE_ONLY);
    let params = &invoke.params;
    if let Some(this_type) = method.this_type() {
        if flags.contains(BindingFlags::STATIC_METHOD_ONLY) { return Ok(None); }
        match target {
            BindTarget::None => {
                let ok = open_allowed
                    && params.first().map_or(false, |p| p.matches(&this_type, relaxed))
                    && all_match(&params[1..], &method.params, relaxed);
                Ok(if ok { Some(DelegateShape::OpenInstance) } else { None })
            },
            BindTarget::Null => {
                if closed_allowed && all_match(params, &method.params, relaxed) {
                    return Err(PolicyError::NullTarget {name: method.name.clone()});
                }
                Ok(None)
            },
            BindTarget::Object(name) => {
                let ok = closed_allowed
                    && ParamType::Object(name.clone()).matches(&this_type, relaxed)
                    && all_match(params, &method.params, relaxed);
                Ok(if ok { Some(DelegateShape::ClosedInstance) } else { None })
            },
        }
    } else {
        if flags.contains(BindingFlags::INSTANCE_METHOD_ONLY) { return Ok(None); }
        let first = match target {
            BindTarget::None => {
                let ok = open_allowed && all_match(params, &method.params, relaxed);
                return Ok(if ok { Some(DelegateShape::OpenStatic) } else { None });
            },
            BindTarget::Null => {
                if flags.contains(BindingFlags::NEVER_CLOSE_OVER_NULL) { return Ok(None); }
                method.params.first().map_or(false, ParamType::is_object)
            },
            BindTarget::Object(name) => {
                method.params.first().map_or(false, |p| ParamType::Object(name.clone()).matches(p, relaxed))
            },
        };
        let ok = closed_allowed && first && all_match(params, &method.params[1..], relaxed);
        Ok(if ok { Some(DelegateShape::ClosedStatic) } else { None })
    }
}

/**
 * Chooses the first of `candidates` named `name` that a delegate with invoke
 * method `invoke` can bind to over `target` under `flags`.
 */
pub fn select<'a>(
    invoke: &Method,
    candidates: &'a [Method],
    name: &str,
    flags: BindingFlags,
    target: &BindTarget,
) -> Result<Binding<'a>, PolicyError> {
    let caseless = flags.contains(BindingFlags::CASELESS_MATCHING);
    let named = candidates.iter().filter(|m| {
        if caseless { m.name.to_lowercase() == name.to_lowercase() } else { m.name == name }
    });
    let mut null_target = None;
    for method in named {
        match shape(invoke, method, flags, target) {
            Ok(Some(shape)) => return Ok(Binding {method, shape}),
            Ok(None) => {},
            Err(e) => { null_target.get_or_insert(e); },
        }
    }
    Err(null_target.unwrap_or_else(|| PolicyError::NoMatchingMethod {name: name.into()}))
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ParamType::*;

    fn invoke(params: &[ParamType]) -> Method {
        Method::new_instance("Action", "Invoke", params.to_vec())
    }

    fn candidates() -> Vec<Method> {
        vec![
            Method::new_static("Math", "Add", [I64, I64]),
            Method::new_static("Math", "Scale", [ParamType::object("Vector"), I64]),
            Method::new_instance("Vector", "Scale", [I64]),
            Method::new_instance("Vector", "Dot", [ParamType::object("Vector")]).returning(F64),
        ]
    }

    fn bind(inv: &Method, name: &str, flags: BindingFlags, target: BindTarget) -> Result<(String, DelegateShape), PolicyError> {
        let methods = candidates();
        let b = select(inv, &methods, name, flags, &target)?;
        Ok((b.method.declaring_type.clone(), b.shape))
    }

    #[test]
    fn flags_values() {
        assert_eq!(BindingFlags::STATIC_METHOD_ONLY.bits(), 0x01);
        assert_eq!(BindingFlags::RELAXED_SIGNATURE.bits(), 0x40);
        assert_eq!(BindingFlags::all().bits(), 0x7f);
        let flags = BindingFlags::from_bits_truncate(0x85);
        assert!(flags.contains(BindingFlags::STATIC_METHOD_ONLY | BindingFlags::OPEN_DELEGATE_ONLY));
        assert!(!flags.contains(BindingFlags::INSTANCE_METHOD_ONLY));
    }

    #[test]
    fn four_shapes() {
        let none = BindingFlags::empty();
        assert_eq!(
            bind(&invoke(&[I64, I64]), "Add", none, BindTarget::None),
            Ok(("Math".into(), DelegateShape::OpenStatic)),
        );
        assert_eq!(
            bind(&invoke(&[I64]), "Scale", none, BindTarget::Object("Vector".into())),
            Ok(("Math".into(), DelegateShape::ClosedStatic)),
        );
        assert_eq!(
            bind(&invoke(&[ParamType::object("Vector"), I64]), "Scale", none, BindTarget::None),
            Ok(("Math".into(), DelegateShape::OpenStatic)),
        );
        assert_eq!(
            bind(&invoke(&[ParamType::object("Vector"), I64]), "Scale", BindingFlags::INSTANCE_METHOD_ONLY, BindTarget::None),
            Ok(("Vector".into(), DelegateShape::OpenInstance)),
        );
    }

    #[test]
    fn closed_instance() {
        let inv = invoke(&[I64]);
        // The static overload takes a `Vector` first, so it matches too; the
        // flag selects the instance method.
        assert_eq!(
            bind(&inv, "Scale", BindingFlags::INSTANCE_METHOD_ONLY, BindTarget::Object("Vector".into())),
            Ok(("Vector".into(), DelegateShape::ClosedInstance)),
        );
        assert_eq!(
            bind(&inv, "Scale", BindingFlags::INSTANCE_METHOD_ONLY, BindTarget::Object("Matrix".into())),
            Err(PolicyError::NoMatchingMethod {name: "Scale".into()}),
        );
    }

    #[test]
    fn open_and_closed_only() {
        let inv = invoke(&[I64]);
        let target = BindTarget::Object("Vector".into());
        assert_eq!(
            bind(&inv, "Scale", BindingFlags::OPEN_DELEGATE_ONLY, target.clone()),
            Err(PolicyError::NoMatchingMethod {name: "Scale".into()}),
        );
        let inv = invoke(&[I64, I64]);
        assert_eq!(
            bind(&inv, "Add", BindingFlags::CLOSED_DELEGATE_ONLY, BindTarget::None),
            Err(PolicyError::NoMatchingMethod {name: "Add".into()}),
        );
        assert_eq!(
            bind(&inv, "Add", BindingFlags::INSTANCE_METHOD_ONLY, BindTarget::None),
            Err(PolicyError::NoMatchingMethod {name: "Add".into()}),
        );
    }

    #[test]
    fn null_targets() {
        let inv = invoke(&[I64]);
        // A static method may be closed over null.
        assert_eq!(
            bind(&inv, "Scale", BindingFlags::empty(), BindTarget::Null),
            Ok(("Math".into(), DelegateShape::ClosedStatic)),
        );
        assert_eq!(
            bind(&inv, "Scale", BindingFlags::NEVER_CLOSE_OVER_NULL, BindTarget::Null),
            Err(PolicyError::NullTarget {name: "Scale".into()}),
        );
        assert_eq!(
            bind(&inv, "Scale", BindingFlags::INSTANCE_METHOD_ONLY, BindTarget::Null),
            Err(PolicyError::NullTarget {name: "Scale".into()}),
        );
    }

    #[test]
    fn caseless_matching() {
        let inv = invoke(&[I64, I64]);
        assert_eq!(
            bind(&inv, "add", BindingFlags::empty(), BindTarget::None),
            Err(PolicyError::NoMatchingMethod {name: "add".into()}),
        );
        assert_eq!(
            bind(&inv, "add", BindingFlags::CASELESS_MATCHING, BindTarget::None),
            Ok(("Math".into(), DelegateShape::OpenStatic)),
        );
    }

    #[test]
    fn relaxed_signature() {
        let inv = invoke(&[ParamType::object("Object")]).returning(F64);
        let target = BindTarget::Object("Vector".into());
        assert_eq!(
            bind(&inv, "Dot", BindingFlags::empty(), target.clone()),
            Err(PolicyError::NoMatchingMethod {name: "Dot".into()}),
        );
        assert_eq!(
            bind(&inv, "Dot", BindingFlags::RELAXED_SIGNATURE, target),
            Ok(("Vector".into(), DelegateShape::ClosedInstance)),
        );
        // Return types still have to agree.
        let inv = invoke(&[ParamType::object("Vector")]).returning(F32);
        assert!(bind(&inv, "Dot", BindingFlags::RELAXED_SIGNATURE, BindTarget::Object("Vector".into())).is_err());
    }

    #[test]
    fn signatures() {
        let conv = Convention::SYSV_X86_64;
        let big = Struct {name: "Big".into(), size: 24, classes: vec![ValueClass::Integer; 3]};
        let small = Struct {name: "Pair".into(), size: 16, classes: vec![ValueClass::Integer; 2]};
        let m = Method::new_instance("T", "M", [I8, F32, small.clone()]).returning(big);
        let sig = m.signature(&conv);
        assert!(sig.receiver && sig.return_buffer && !sig.generic_context);
        assert_eq!(sig.params, [
            ArgType::SubWord(1),
            ArgType::F32,
            ArgType::aggregate(16, &[ValueClass::Integer; 2]),
        ]);
        let m = Method::new_static("T", "M", Vec::<ParamType>::new()).returning(small).with_generic_context();
        let sig = m.signature(&conv);
        assert!(!sig.receiver && !sig.return_buffer && sig.generic_context);
        assert_eq!(m.this_type(), None);
    }

    #[test]
    fn shapes_adapt() {
        assert_eq!(DelegateShape::OpenStatic.adaptation(), Some(Adaptation::RemoveReceiver));
        assert_eq!(DelegateShape::OpenInstance.adaptation(), Some(Adaptation::RemoveReceiver));
        assert_eq!(DelegateShape::ClosedStatic.adaptation(), None);
        assert_eq!(DelegateShape::ClosedInstance.adaptation(), None);
    }
}
