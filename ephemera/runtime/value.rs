use alloc::rc::Rc;
use core::fmt;

use super::{
    error::{Exception, WeakRefError},
    gc::{AnyHeapItem, HeapItem, HeapItemKind, HeapPtr},
    Context,
};

/// Pointer to any heap item. Heap items are the only values with identity.
pub type ObjectRef = HeapPtr<AnyHeapItem>;

/// Result of calling a native function.
pub type CallResult = Result<(), Exception>;

/// A callable value. Clones share the same underlying closure and compare equal.
#[derive(Clone)]
pub struct NativeFunction(Rc<dyn Fn(&mut Context, Value) -> CallResult>);

impl NativeFunction {
    pub fn new(f: impl Fn(&mut Context, Value) -> CallResult + 'static) -> NativeFunction {
        NativeFunction(Rc::new(f))
    }

    #[inline]
    pub fn call(&self, cx: &mut Context, argument: Value) -> CallResult {
        (self.0)(cx, argument)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &NativeFunction) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[Function]")
    }
}

/// A mutator value: either a primitive without identity or a reference to a heap item.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Function(NativeFunction),
    Object(ObjectRef),
}

impl Value {
    #[inline]
    pub fn undefined() -> Value {
        Value::Undefined
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(object) => Some(*object),
            _ => None,
        }
    }

    #[inline]
    pub fn as_function(&self) -> Option<&NativeFunction> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// The heap object this value refers to, or `error` applied to this value's type name.
    pub fn to_heap_object(
        &self,
        error: fn(&'static str) -> WeakRefError,
    ) -> Result<ObjectRef, WeakRefError> {
        self.as_object().ok_or_else(|| error(self.type_name()))
    }

    /// Name of this value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Object(object) => match object.kind() {
                HeapItemKind::OrdinaryObject => "object",
                HeapItemKind::WeakRef => "WeakRef",
                HeapItemKind::FinalizationRegistry => "FinalizationRegistry",
            },
        }
    }

    /// Whether two values are the same, comparing heap items and functions by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Format for printing value to console
    pub fn to_console_string(&self) -> alloc::string::String {
        use alloc::string::ToString;

        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.to_string(),
            Value::Function(_) => "[Function]".to_string(),
            Value::Object(object) => match object.kind() {
                HeapItemKind::OrdinaryObject => "[Object]".to_string(),
                HeapItemKind::WeakRef => "[WeakRef]".to_string(),
                HeapItemKind::FinalizationRegistry => "[FinalizationRegistry]".to_string(),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Function(_) => f.write_str("Function"),
            Value::Object(object) => write!(f, "Object({:p})", object.as_ptr()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::String(Rc::from(value))
    }
}

impl From<NativeFunction> for Value {
    fn from(value: NativeFunction) -> Value {
        Value::Function(value)
    }
}

impl<T: HeapItem> From<HeapPtr<T>> for Value {
    fn from(value: HeapPtr<T>) -> Value {
        Value::Object(value.as_any())
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Value {
        Value::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from(1.5), Value::Number(1.5));
        assert_eq!(Value::from("held"), Value::from("held"));
        assert_ne!(Value::from("held"), Value::from("other"));
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Null, Value::Undefined);
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = NativeFunction::new(|_, _| Ok(()));
        let g = NativeFunction::new(|_, _| Ok(()));
        assert_eq!(Value::from(f.clone()), Value::from(f.clone()));
        assert_ne!(Value::from(f), Value::from(g));
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Undefined.type_name(), "undefined");
        assert_eq!(Value::from(true).type_name(), "boolean");
        assert_eq!(Value::from(3.0).type_name(), "number");
        assert_eq!(Value::from("s").type_name(), "string");
        assert_eq!(Value::from(NativeFunction::new(|_, _| Ok(()))).type_name(), "function");
    }

    #[test]
    fn console_strings() {
        assert_eq!(Value::Null.to_console_string(), "null");
        assert_eq!(Value::from(false).to_console_string(), "false");
        assert_eq!(Value::from(2.0).to_console_string(), "2");
        assert_eq!(Value::from("held").to_console_string(), "held");
    }
}
