use crate::types::{Procedure, SchemeSymbol, Value};
use derive_more::Display;
use itertools::Itertools;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Display, Clone, PartialEq)]
#[display(fmt = "unknown identifier: {}", _0)]
pub struct UnknownSymbol(pub SchemeSymbol);

/// Formals and arguments differed in number when building a call frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArityMismatch {
    pub expected: usize,
    pub got: usize,
}

/// One lexical scope. The parent is shared, never owned exclusively: a
/// closure holding a child keeps the whole chain above it alive.
pub struct Frame {
    bindings: RefCell<HashMap<SchemeSymbol, Value>>,
    parent: Option<Rc<Frame>>,
}

impl Frame {
    /// A frame with no parent and no bindings.
    pub fn root() -> Rc<Frame> {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn spawn_from(parent: &Rc<Frame>) -> Rc<Frame> {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    /// Child of `parent` with `formals` bound positionally to `args`.
    pub fn make_child_frame(
        parent: &Rc<Frame>,
        formals: &[SchemeSymbol],
        args: &[Value],
    ) -> Result<Rc<Frame>, ArityMismatch> {
        if formals.len() != args.len() {
            return Err(ArityMismatch {
                expected: formals.len(),
                got: args.len(),
            });
        }
        let child = Self::spawn_from(parent);
        {
            let mut bindings = child.bindings.borrow_mut();
            for (formal, arg) in formals.iter().zip(args) {
                bindings.insert(formal.clone(), arg.clone());
            }
        }
        Ok(child)
    }

    pub fn parent(&self) -> Option<&Rc<Frame>> {
        self.parent.as_ref()
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Bind `key` in this frame, shadowing any binding further up.
    pub fn define<T>(&self, key: T, value: Value) -> Option<Value>
    where
        T: Into<SchemeSymbol>,
    {
        self.bindings.borrow_mut().insert(key.into(), value)
    }

    /// The nearest binding of `key`, walking towards the global frame.
    pub fn get(&self, key: &SchemeSymbol) -> Option<Value> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.bindings.borrow().get(key) {
                return Some(value.clone());
            }
            frame = frame.parent.as_deref()?;
        }
    }

    pub fn lookup(&self, key: &SchemeSymbol) -> Result<Value, UnknownSymbol> {
        self.get(key).ok_or_else(|| UnknownSymbol(key.clone()))
    }

    /// Rebind the nearest existing binding of `key`.
    pub fn set(&self, key: &SchemeSymbol, value: Value) -> Result<(), UnknownSymbol> {
        let mut frame = self;
        loop {
            if let Some(slot) = frame.bindings.borrow_mut().get_mut(key) {
                *slot = value;
                return Ok(());
            }
            frame = match frame.parent.as_deref() {
                Some(parent) => parent,
                None => return Err(UnknownSymbol(key.clone())),
            };
        }
    }
}

impl Drop for Frame {
    // Dynamically scoped tail loops build arbitrarily long parent chains.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(frame) = parent {
            parent = match Rc::try_unwrap(frame) {
                Ok(mut frame) => frame.parent.take(),
                Err(_) => None,
            };
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut frame = self;
        while let Some(parent) = &frame.parent {
            let bindings = frame.bindings.borrow();
            let entries = bindings
                .iter()
                .sorted_by(|(a, _), (b, _)| a.0.cmp(&b.0))
                .map(|(k, v)| format!("{}: {}", k, v))
                .join(", ");
            write!(f, "<{{{}}} -> ", entries)?;
            depth += 1;
            frame = &**parent;
        }
        write!(f, "<Global Frame>")?;
        write!(f, "{}", ">".repeat(depth))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.bindings.borrow().keys().map(|k| k.0.clone()).sorted().join(" ");
        write!(f, "Frame{{bindings: [{}], global: {}}}", names, self.is_global())
    }
}

/// The global frame, holding every builtin procedure.
pub fn global_frame() -> Rc<Frame> {
    let global = Frame::root();
    for (&name, &builtin) in crate::core::CORE.iter() {
        global.define(name, Value::Procedure(Procedure::Builtin(builtin)));
    }
    global
}
