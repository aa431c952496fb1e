//! Runtime values, the object heap and heap snapshots.

use std::fmt::Write;
use std::rc::Rc;

use rustc_hash::FxHashSet;

/// Index of an object on the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Unit,
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
    List(ObjectId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::List(_) => "list",
        }
    }
}

const ELIDED: &str = "  ...\n";

/// All lists allocated by a running program.
///
/// Objects are never freed; a program's lifetime is one execution.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Vec<Value>>,
}

impl Heap {
    pub fn alloc(&mut self, items: Vec<Value>) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(items);
        id
    }

    pub fn get(&self, id: ObjectId) -> &[Value] {
        &self.objects[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut Vec<Value> {
        &mut self.objects[id.0 as usize]
    }

    /// Append `value` to `out`, giving up once `out` holds `limit` bytes.
    ///
    /// Top-level strings are written unquoted unless `quote` is set; strings
    /// inside lists are always quoted. Lists are walked with an explicit
    /// stack, so neither nesting depth nor sharing can exhaust the thread's
    /// stack, and shared sublists cost at most `limit` bytes of work.
    pub fn render<'h>(&'h self, out: &mut String, value: &Value, quote: bool, limit: usize) {
        let mut open = FxHashSet::default();
        // Lists being written: id, items still to go, whether none went yet.
        let mut stack: Vec<(ObjectId, std::slice::Iter<'h, Value>, bool)> = Vec::new();
        self.write_value(out, value, quote, &mut open, &mut stack);

        while out.len() < limit {
            let Some((id, items, first)) = stack.last_mut() else {
                return;
            };
            match items.next() {
                Some(item) => {
                    if !std::mem::take(first) {
                        out.push_str(", ");
                    }
                    self.write_value(out, item, true, &mut open, &mut stack);
                }
                None => {
                    let id = *id;
                    stack.pop();
                    out.push(']');
                    open.remove(&id);
                }
            }
        }
    }

    fn write_value<'h>(
        &'h self,
        out: &mut String,
        value: &Value,
        quote: bool,
        open: &mut FxHashSet<ObjectId>,
        stack: &mut Vec<(ObjectId, std::slice::Iter<'h, Value>, bool)>,
    ) {
        match value {
            Value::Unit => out.push_str("()"),
            Value::Int(v) => {
                let _ = write!(out, "{}", v);
            }
            Value::Bool(v) => {
                let _ = write!(out, "{}", v);
            }
            Value::Str(s) if quote => {
                let _ = write!(out, "{:?}", s);
            }
            Value::Str(s) => out.push_str(s),
            Value::List(id) => {
                // A list reachable from itself prints as `[...]` on re-entry.
                if !open.insert(*id) {
                    out.push_str("[...]");
                    return;
                }
                out.push('[');
                stack.push((*id, self.get(*id).iter(), true));
            }
        }
    }

    /// Textual snapshot of named variables and the objects they reach,
    /// elided once it grows past `limit` bytes.
    pub fn snapshot(&self, variables: &[(&str, &Value)], limit: usize) -> String {
        let mut out = String::from("stack:\n");
        if variables.is_empty() {
            out.push_str("  (empty)\n");
        }
        let mut pending = Vec::new();
        for (name, value) in variables {
            if out.len() >= limit {
                out.push_str(ELIDED);
                break;
            }
            let _ = write!(out, "  {} = ", name);
            self.write_shallow(&mut out, value);
            out.push('\n');
            if let Value::List(id) = value {
                pending.push(*id);
            }
        }

        let mut reachable = FxHashSet::default();
        while let Some(id) = pending.pop() {
            if reachable.insert(id) {
                pending.extend(self.get(id).iter().filter_map(|item| match item {
                    Value::List(inner) => Some(*inner),
                    _ => None,
                }));
            }
        }

        out.push_str("heap:\n");
        if reachable.is_empty() {
            out.push_str("  (empty)\n");
        }
        let mut reachable: Vec<ObjectId> = reachable.into_iter().collect();
        reachable.sort_unstable();
        for id in reachable {
            if out.len() >= limit {
                out.push_str(ELIDED);
                break;
            }
            let _ = write!(out, "  list@{} = [", id.0);
            for (i, item) in self.get(id).iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if out.len() >= limit {
                    out.push_str("...");
                    break;
                }
                self.write_shallow(&mut out, item);
            }
            out.push_str("]\n");
        }
        out
    }

    /// Render without following references.
    fn write_shallow(&self, out: &mut String, value: &Value) {
        match value {
            Value::List(id) => {
                let _ = write!(out, "list@{}", id.0);
            }
            other => self.render(out, other, true, usize::MAX),
        }
    }
}
