//! `define` token substitution (§4.3: "every top-level occurrence of the
//! path that is read... is substituted with the literal... never inside
//! strings or comments, and never on the left side of an assignment").
//!
//! No teacher precedent exists (`good_fences` never rewrote source); this
//! walks the already-parsed AST with `VisitMut` rather than the source
//! text, which gets the "never inside strings or comments" guarantee for
//! free instead of needing a hand-rolled tokenizer.

use ahashmap::AHashMap;
use swc_common::sync::Lrc;
use swc_common::{FileName, SourceMap};
use swc_ecma_ast::{AssignExpr, AssignTarget, Expr, Ident, MemberExpr, MemberProp, SimpleAssignTarget};
use swc_ecma_parser::{lexer::Lexer, Capturing, EsSyntax, Parser, StringInput, Syntax};
use swc_ecma_visit::{VisitMut, VisitMutWith};

pub type DefineMap = AHashMap<String, String>;

pub(crate) fn substitute(module: &mut swc_ecma_ast::Module, define: &DefineMap) {
    let mut visitor = DefineVisitor { define };
    module.visit_mut_with(&mut visitor);
}

struct DefineVisitor<'a> {
    define: &'a DefineMap,
}

impl VisitMut for DefineVisitor<'_> {
    fn visit_mut_assign_expr(&mut self, n: &mut AssignExpr) {
        match &mut n.left {
            AssignTarget::Simple(SimpleAssignTarget::Member(member)) => {
                member.obj.visit_mut_with(self);
                if let MemberProp::Computed(computed) = &mut member.prop {
                    computed.expr.visit_mut_with(self);
                }
            }
            other => other.visit_mut_with(self),
        }
        n.right.visit_mut_with(self);
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Some(path) = dotted_path(expr) {
            if let Some(replacement) = self.define.get(&path) {
                if let Some(literal) = parse_replacement_expr(replacement) {
                    *expr = literal;
                    return;
                }
            }
        }
        expr.visit_mut_children_with(self);
    }
}

/// Renders `expr` as a dotted path (`process.env.NODE_ENV`) when it is a
/// chain of plain identifier member accesses, `None` for anything else
/// (computed access, calls, etc. never match a `define` key).
fn dotted_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(Ident { sym, .. }) => Some(sym.to_string()),
        Expr::Member(MemberExpr { obj, prop, .. }) => {
            let base = dotted_path(obj)?;
            match prop {
                MemberProp::Ident(ident) => Some(format!("{base}.{}", ident.sym)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Parses `source` (the right-hand side of a `define` entry, e.g.
/// `"\"production\""` or `"false"`) as a standalone expression.
fn parse_replacement_expr(source: &str) -> Option<Box<Expr>> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(Lrc::new(FileName::Custom("<define>".to_string())), source.to_string());
    let lexer = Lexer::new(Syntax::Es(EsSyntax::default()), Default::default(), StringInput::from(&*fm), None);
    let capturing = Capturing::new(lexer);
    let mut parser = Parser::new_from(capturing);
    parser.parse_expr().ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use swc_ecma_ast::{Lit, Str};

    #[test]
    fn dotted_path_builds_member_chain() {
        let expr = parse_replacement_expr("process.env.NODE_ENV").unwrap();
        assert_eq!(dotted_path(&expr).as_deref(), Some("process.env.NODE_ENV"));
    }

    #[test]
    fn dotted_path_rejects_computed_access() {
        let expr = parse_replacement_expr("process.env[\"NODE_ENV\"]").unwrap();
        assert_eq!(dotted_path(&expr), None);
    }

    #[test]
    fn parse_replacement_expr_accepts_string_and_boolean_literals() {
        assert!(matches!(
            parse_replacement_expr("\"production\"").unwrap().as_ref(),
            Expr::Lit(Lit::Str(Str { .. }))
        ));
        assert!(matches!(
            parse_replacement_expr("false").unwrap().as_ref(),
            Expr::Lit(Lit::Bool(_))
        ));
    }
}
