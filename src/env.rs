use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::node::Node;
use crate::value::{Compiled, Value};

/// Immutable name-resolution scope.
///
/// An `Env` is a persistent chain of frames: [`bind`](Env::bind)
/// produces a new environment sharing every existing frame with its
/// parent, which is never touched. Cloning is an `Arc` bump, so
/// environments are freely shared across recursive compilation calls.
///
/// `def` bindings capture the environment active where they are
/// declared; a composite operator therefore resolves free names
/// lexically, independent of its call sites.
#[derive(Clone)]
pub struct Env {
    frame: Option<Arc<Frame>>,
}

struct Frame {
    bindings: HashMap<String, Binding>,
    parent: Env,
}

impl Env {
    /// The empty environment.
    pub fn new() -> Env {
        Env { frame: None }
    }

    /// A new environment with `name` bound, leaving `self` untouched.
    pub fn bind(&self, name: impl Into<String>, binding: Binding) -> Env {
        let mut bindings = HashMap::new();
        bindings.insert(name.into(), binding);
        Env {
            frame: Some(Arc::new(Frame {
                bindings,
                parent: self.clone(),
            })),
        }
    }

    /// A new environment with every pair bound in one frame.
    pub fn bind_many(&self, pairs: impl IntoIterator<Item = (String, Binding)>) -> Env {
        let bindings: HashMap<String, Binding> = pairs.into_iter().collect();
        if bindings.is_empty() {
            return self.clone();
        }
        Env {
            frame: Some(Arc::new(Frame {
                bindings,
                parent: self.clone(),
            })),
        }
    }

    /// Innermost binding for `name`, walking outward through parents.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut current = self;
        while let Some(frame) = &current.frame {
            if let Some(binding) = frame.bindings.get(name) {
                return Some(binding);
            }
            current = &frame.parent;
        }
        None
    }

    /// All visible names, innermost first. Carried on scope errors so
    /// callers can report what was actually in scope.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = self;
        while let Some(frame) = &current.frame {
            for name in frame.bindings.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            current = &frame.parent;
        }
        names.sort();
        names
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env").field("names", &self.names()).finish()
    }
}

/// What a name resolves to.
#[derive(Clone)]
pub enum Binding {
    /// A `let`-bound compiled value
    Let(Compiled),

    /// A `def`-bound composite operator
    Def(DefBinding),

    /// A registered standard-library (or host) row/aggregate function
    Function(StdFunction),

    /// A formal parameter bound at composite-operator invocation
    Arg(Resolved),
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Let(c) => write!(f, "Let({})", c.type_name()),
            Binding::Def(d) => write!(f, "Def(/{} formals)", d.formals.len()),
            Binding::Function(func) => write!(f, "Function({})", func.name),
            Binding::Arg(_) => write!(f, "Arg"),
        }
    }
}

/// A composite operator: formals, uncompiled body, and the environment
/// captured at the point of declaration.
#[derive(Clone)]
pub struct DefBinding {
    pub formals: Vec<String>,
    pub body: Node,
    pub env: Env,
}

/// A fully resolved operator-line argument.
#[derive(Clone, Debug)]
pub enum Resolved {
    /// A literal value
    Value(Value),

    /// A header reference, resolved per row by the relational ops
    Header(String),

    /// A compiled set / headers / relation
    Compiled(Compiled),

    /// A standard-library function
    Function(StdFunction),
}

/// Row-level callback: receives the resolved argument values for one
/// row and returns the function's value for that row.
pub type RowFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Aggregate callback: receives one column of values per input header,
/// collected over a whole partition.
pub type ColFn = Arc<dyn Fn(&[Vec<Value>]) -> Result<Value, String> + Send + Sync>;

/// The operator kind a registered function may be used as. The
/// compiler dispatches on this wherever a non-built-in name appears in
/// a filter/extend/aggregate position.
#[derive(Clone)]
pub enum FunctionKind {
    Filter(RowFn),
    Extend(RowFn),
    Aggregate(ColFn),
}

impl FunctionKind {
    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::Filter(_) => "filter",
            FunctionKind::Extend(_) => "extend",
            FunctionKind::Aggregate(_) => "aggregate",
        }
    }
}

/// A named function registered into an environment. This is the seam
/// through which hosts add row-level functions without touching the
/// compiler.
#[derive(Clone)]
pub struct StdFunction {
    pub name: String,
    pub kind: FunctionKind,
}

impl std::fmt::Debug for StdFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StdFunction({} {})", self.kind.name(), self.name)
    }
}

impl StdFunction {
    pub fn filter(name: &str, callback: RowFn) -> StdFunction {
        StdFunction {
            name: name.to_string(),
            kind: FunctionKind::Filter(callback),
        }
    }

    pub fn extend(name: &str, callback: RowFn) -> StdFunction {
        StdFunction {
            name: name.to_string(),
            kind: FunctionKind::Extend(callback),
        }
    }

    pub fn aggregate(name: &str, callback: ColFn) -> StdFunction {
        StdFunction {
            name: name.to_string(),
            kind: FunctionKind::Aggregate(callback),
        }
    }
}
