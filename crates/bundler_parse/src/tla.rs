//! Top-level-await detection (§4.2 "An `await` expression whose nearest
//! enclosing function is the module itself counts. A precise scope walk is
//! required; a textual heuristic is insufficient.").
//!
//! No teacher precedent exists for this (the teacher only ever consumed
//! compiled JS, which never has top-level await in practice) — written as a
//! function-nesting-depth walk over the same `Visit` trait the rest of this
//! crate uses, so entering any function-like scope increments a depth
//! counter and only an `AwaitExpr`/`for await` seen at depth zero counts.

use swc_ecma_ast::{ArrowExpr, AwaitExpr, Constructor, ForOfStmt, Function, Module};
use swc_ecma_visit::{Visit, VisitWith};

struct TlaVisitor {
    function_depth: u32,
    found: bool,
}

impl Visit for TlaVisitor {
    fn visit_function(&mut self, f: &Function) {
        self.function_depth += 1;
        f.visit_children_with(self);
        self.function_depth -= 1;
    }

    fn visit_arrow_expr(&mut self, f: &ArrowExpr) {
        self.function_depth += 1;
        f.visit_children_with(self);
        self.function_depth -= 1;
    }

    fn visit_constructor(&mut self, ctor: &Constructor) {
        self.function_depth += 1;
        ctor.visit_children_with(self);
        self.function_depth -= 1;
    }

    fn visit_await_expr(&mut self, expr: &AwaitExpr) {
        if self.function_depth == 0 {
            self.found = true;
        }
        expr.visit_children_with(self);
    }

    fn visit_for_of_stmt(&mut self, stmt: &ForOfStmt) {
        if stmt.is_await && self.function_depth == 0 {
            self.found = true;
        }
        stmt.visit_children_with(self);
    }
}

pub(crate) fn has_top_level_await(module: &Module) -> bool {
    let mut visitor = TlaVisitor {
        function_depth: 0,
        found: false,
    };
    module.visit_with(&mut visitor);
    visitor.found
}

#[cfg(test)]
mod test {
    use crate::parse;

    #[test]
    fn top_level_await_detected() {
        let out = parse("const m = await import('./x');", "a.js");
        assert!(out.has_top_level_await);
    }

    #[test]
    fn await_inside_async_function_is_not_top_level() {
        let out = parse("async function f() { await g(); }", "a.js");
        assert!(!out.has_top_level_await);
    }

    #[test]
    fn await_inside_arrow_is_not_top_level() {
        let out = parse("const f = async () => { await g(); };", "a.js");
        assert!(!out.has_top_level_await);
    }

    #[test]
    fn for_await_at_top_level_counts() {
        let out = parse("for await (const x of xs) { use(x); }", "a.js");
        assert!(out.has_top_level_await);
    }
}
