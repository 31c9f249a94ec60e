//! The import/export table visitor (§4.2 "Import table" / "Export table").
//!
//! Grounded on `unused_finder::node_visitor::ExportsCollector`: the same
//! declaration-shape matching (`Decl::Class`/`Fn`/`Var`, `ExportDefaultDecl`,
//! `ExportDefaultExpr`, `NamedExport` with/without a `src`, `ExportAll`), the
//! same literal-argument extraction for `import()`/`require()` calls. Adds
//! the `type_only` bookkeeping the teacher never needed (it only ever
//! consumed compiled JS import graphs, never TS `import type` syntax).

use swc_common::{sync::Lrc, SourceMap, Spanned};
use swc_ecma_ast::{
    CallExpr, Callee, Decl, ExportAll, ExportDecl, ExportDefaultDecl, ExportDefaultExpr,
    ExportSpecifier, ImportDecl, ImportSpecifier, Lit, ModuleExportName, NamedExport, Pat, Str,
};
use swc_ecma_visit::{Visit, VisitWith};

/// §4.2 "kind (`static-from`, `static-side-effect`, `dynamic-call`,
/// `require-call`, `re-export`, `re-export-all`)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    StaticFrom,
    StaticSideEffect,
    DynamicCall,
    RequireCall,
    ReExport,
    ReExportAll,
}

/// One row of the import table (§4.2 "Import table").
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub specifier: String,
    pub kind: ImportKind,
    /// Local bindings this statement introduces (names only; type-only
    /// specifiers are excluded since they leave no runtime binding).
    pub local_bindings: Vec<String>,
    pub type_only: bool,
    pub line: usize,
    pub column: usize,
}

/// Which name in the source module a re-export row forwards, per §4.2
/// "whether it is a re-export and, if so, from which specifier with which
/// source name".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReExportSource {
    Named(String),
    Default,
    Namespace,
}

/// §4.2 "Export table": exported name (or `default`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportedName {
    Named(String),
    Default,
}

/// A forwarded re-export's origin (§4.2 "from which specifier with which
/// source name").
#[derive(Debug, Clone)]
pub struct ReExportFrom {
    pub specifier: String,
    pub source: ReExportSource,
}

/// One row of the export table.
#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub name: ExportedName,
    /// Whether the declaration has a local binding (a value) as opposed to
    /// only forwarding another module's binding.
    pub has_local_binding: bool,
    pub re_export_from: Option<ReExportFrom>,
    pub line: usize,
}

pub(crate) struct ImportExportVisitor<'a> {
    cm: &'a Lrc<SourceMap>,
    pub imports: Vec<ImportEntry>,
    pub exports: Vec<ExportEntry>,
    pub has_dynamic_import: bool,
}

impl<'a> ImportExportVisitor<'a> {
    pub(crate) fn new(cm: &'a Lrc<SourceMap>) -> Self {
        Self {
            cm,
            imports: Vec::new(),
            exports: Vec::new(),
            has_dynamic_import: false,
        }
    }

    fn line_col(&self, span: swc_common::Span) -> (usize, usize) {
        let loc = self.cm.lookup_char_pos(span.lo);
        (loc.line, loc.col_display + 1)
    }
}

impl<'a> Visit for ImportExportVisitor<'a> {
    // import foo, { bar as baz } from './x'; import './x'; import type { T } from './x';
    fn visit_import_decl(&mut self, import: &ImportDecl) {
        import.visit_children_with(self);
        let (line, column) = self.line_col(import.span());
        let specifier = import.src.value.to_string();

        if import.specifiers.is_empty() {
            self.imports.push(ImportEntry {
                specifier,
                kind: ImportKind::StaticSideEffect,
                local_bindings: Vec::new(),
                type_only: import.type_only,
                line,
                column,
            });
            return;
        }

        let local_bindings = import
            .specifiers
            .iter()
            .filter_map(|spec| match spec {
                ImportSpecifier::Named(named) if !named.is_type_only => {
                    Some(named.local.sym.to_string())
                }
                ImportSpecifier::Default(default) => Some(default.local.sym.to_string()),
                ImportSpecifier::Namespace(ns) => Some(ns.local.sym.to_string()),
                _ => None,
            })
            .collect();

        self.imports.push(ImportEntry {
            specifier,
            kind: ImportKind::StaticFrom,
            local_bindings,
            type_only: import.type_only,
            line,
            column,
        });
    }

    // import('./x'), require('./x')
    fn visit_call_expr(&mut self, expr: &CallExpr) {
        expr.visit_children_with(self);

        if let Callee::Import(_) = &expr.callee {
            self.has_dynamic_import = true;
            if let Some(specifier) = literal_argument(expr) {
                let (line, column) = self.line_col(expr.span());
                self.imports.push(ImportEntry {
                    specifier,
                    kind: ImportKind::DynamicCall,
                    local_bindings: Vec::new(),
                    type_only: false,
                    line,
                    column,
                });
            }
            return;
        }

        if let Callee::Expr(callee) = &expr.callee {
            if callee.as_ident().map(|i| &*i.sym == "require").unwrap_or(false) {
                if let Some(specifier) = literal_argument(expr) {
                    let (line, column) = self.line_col(expr.span());
                    self.imports.push(ImportEntry {
                        specifier,
                        kind: ImportKind::RequireCall,
                        local_bindings: Vec::new(),
                        type_only: false,
                        line,
                        column,
                    });
                }
            }
        }
    }

    // export default 1; export default function foo() {}
    fn visit_export_default_expr(&mut self, expr: &ExportDefaultExpr) {
        expr.visit_children_with(self);
        let (line, _) = self.line_col(expr.span());
        self.exports.push(ExportEntry {
            name: ExportedName::Default,
            has_local_binding: true,
            re_export_from: None,
            line,
        });
    }

    fn visit_export_default_decl(&mut self, decl: &ExportDefaultDecl) {
        decl.visit_children_with(self);
        let (line, _) = self.line_col(decl.span());
        self.exports.push(ExportEntry {
            name: ExportedName::Default,
            has_local_binding: true,
            re_export_from: None,
            line,
        });
    }

    // export const x = 1; export class Foo {}; export type T = string (dropped)
    fn visit_export_decl(&mut self, export: &ExportDecl) {
        export.visit_children_with(self);
        let (line, _) = self.line_col(export.span());
        let names: Vec<String> = match &export.decl {
            Decl::Class(decl) => vec![decl.ident.sym.to_string()],
            Decl::Fn(decl) => vec![decl.ident.sym.to_string()],
            Decl::Var(decl) => decl
                .decls
                .iter()
                .filter_map(|d| match &d.name {
                    Pat::Ident(ident) => Some(ident.sym.to_string()),
                    _ => None,
                })
                .collect(),
            // Type-only declarations (interface/type alias/enum-as-type) are
            // erased entirely, per §4.2 "a type-only export ... is dropped
            // entirely" and §4.3 "TypeScript syntax is erased".
            Decl::TsInterface(_) | Decl::TsTypeAlias(_) | Decl::TsModule(_) | Decl::Using(_) => {
                Vec::new()
            }
            Decl::TsEnum(decl) => vec![decl.id.sym.to_string()],
        };
        for name in names {
            self.exports.push(ExportEntry {
                name: ExportedName::Named(name),
                has_local_binding: true,
                re_export_from: None,
                line,
            });
        }
    }

    // export { a, b as c }; export { a } from './x'; export type { T } (dropped)
    fn visit_named_export(&mut self, export: &NamedExport) {
        export.visit_children_with(self);
        if export.type_only {
            return;
        }
        let (line, _) = self.line_col(export.span());

        match &export.src {
            Some(src) => self.handle_re_export_from(&export.specifiers, src, line),
            None => self.handle_local_named_export(&export.specifiers, line),
        }
    }

    // export * from './x'; export * as ns from './x'
    fn visit_export_all(&mut self, export: &ExportAll) {
        export.visit_children_with(self);
        if export.type_only {
            return;
        }
        let (line, column) = self.line_col(export.span());
        let specifier = export.src.value.to_string();

        self.imports.push(ImportEntry {
            specifier: specifier.clone(),
            kind: ImportKind::ReExportAll,
            local_bindings: Vec::new(),
            type_only: false,
            line,
            column,
        });
    }
}

impl<'a> ImportExportVisitor<'a> {
    fn handle_re_export_from(&mut self, specs: &[ExportSpecifier], src: &Str, line: usize) {
        let specifier = src.value.to_string();
        for spec in specs {
            let ExportSpecifier::Named(named) = spec else {
                continue;
            };
            if named.is_type_only {
                continue;
            }

            let orig_name = match &named.orig {
                ModuleExportName::Ident(ident) => ident.sym.to_string(),
                ModuleExportName::Str(s) => s.value.to_string(),
            };
            let source = if orig_name == "default" {
                ReExportSource::Default
            } else {
                ReExportSource::Named(orig_name)
            };

            let exported_name = match &named.exported {
                Some(ModuleExportName::Ident(ident)) if &*ident.sym == "default" => {
                    ExportedName::Default
                }
                Some(ModuleExportName::Ident(ident)) => ExportedName::Named(ident.sym.to_string()),
                Some(ModuleExportName::Str(s)) => ExportedName::Named(s.value.to_string()),
                None => match &source {
                    ReExportSource::Default => ExportedName::Default,
                    ReExportSource::Named(n) => ExportedName::Named(n.clone()),
                    ReExportSource::Namespace => continue,
                },
            };

            self.exports.push(ExportEntry {
                name: exported_name,
                has_local_binding: false,
                re_export_from: Some(ReExportFrom {
                    specifier: specifier.clone(),
                    source,
                }),
                line,
            });
        }
    }

    fn handle_local_named_export(&mut self, specs: &[ExportSpecifier], line: usize) {
        for spec in specs {
            let ExportSpecifier::Named(named) = spec else {
                continue;
            };
            if named.is_type_only {
                continue;
            }

            let exported_name = match &named.exported {
                Some(ModuleExportName::Ident(ident)) if &*ident.sym == "default" => {
                    ExportedName::Default
                }
                Some(ModuleExportName::Ident(ident)) => ExportedName::Named(ident.sym.to_string()),
                Some(ModuleExportName::Str(s)) => ExportedName::Named(s.value.to_string()),
                None => match &named.orig {
                    ModuleExportName::Ident(ident) if &*ident.sym == "default" => {
                        ExportedName::Default
                    }
                    ModuleExportName::Ident(ident) => ExportedName::Named(ident.sym.to_string()),
                    ModuleExportName::Str(s) => ExportedName::Named(s.value.to_string()),
                },
            };

            self.exports.push(ExportEntry {
                name: exported_name,
                has_local_binding: true,
                re_export_from: None,
                line,
            });
        }
    }
}

fn literal_argument(expr: &CallExpr) -> Option<String> {
    let arg = expr.args.first()?;
    match arg.expr.as_lit()? {
        Lit::Str(value) => Some(value.value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{parse, ExportedName, ImportKind, ModuleKind};

    #[test]
    fn static_import_collects_local_bindings() {
        let out = parse("import foo, { bar as baz } from './x'", "a.js");
        assert_eq!(out.imports.len(), 1);
        let entry = &out.imports[0];
        assert_eq!(entry.kind, ImportKind::StaticFrom);
        assert_eq!(entry.specifier, "./x");
        assert_eq!(entry.local_bindings, vec!["foo", "baz"]);
    }

    #[test]
    fn side_effect_import_has_no_bindings() {
        let out = parse("import './x'", "a.js");
        assert_eq!(out.imports[0].kind, ImportKind::StaticSideEffect);
        assert!(out.imports[0].local_bindings.is_empty());
    }

    #[test]
    fn dynamic_import_with_literal_argument_records_an_edge() {
        let out = parse("const m = import('./x')", "a.js");
        assert!(out.has_dynamic_import);
        assert_eq!(out.imports[0].kind, ImportKind::DynamicCall);
        assert_eq!(out.imports[0].specifier, "./x");
    }

    #[test]
    fn dynamic_import_with_non_literal_argument_records_no_edge() {
        let out = parse("const m = import(path)", "a.js");
        assert!(out.has_dynamic_import);
        assert!(out.imports.is_empty());
    }

    #[test]
    fn require_call_is_recorded() {
        let out = parse("const x = require('./x')", "a.js");
        assert_eq!(out.imports[0].kind, ImportKind::RequireCall);
    }

    #[test]
    fn export_default_and_named_decl() {
        let out = parse("export default 1; export const x = 2;", "a.js");
        assert_eq!(out.exports.len(), 2);
        assert_eq!(out.exports[0].name, ExportedName::Default);
        assert_eq!(out.exports[1].name, ExportedName::Named("x".to_string()));
    }

    #[test]
    fn type_only_export_is_dropped_entirely() {
        let out = parse("export type T = string; export const x = 1;", "a.ts");
        assert_eq!(out.exports.len(), 1);
        assert_eq!(out.exports[0].name, ExportedName::Named("x".to_string()));
    }

    #[test]
    fn re_export_from_records_source_and_exported_name() {
        let out = parse("export { a, b as c } from './x'", "a.js");
        assert_eq!(out.exports.len(), 2);
        assert!(out.exports.iter().all(|e| e.re_export_from.is_some()));
        assert_eq!(out.exports[1].name, ExportedName::Named("c".to_string()));
    }

    #[test]
    fn export_star_records_a_re_export_all_edge_without_names() {
        let out = parse("export * from './x'", "a.js");
        assert_eq!(out.imports[0].kind, ImportKind::ReExportAll);
        assert!(out.exports.is_empty());
    }

    #[test]
    fn module_kind_is_script_without_import_export() {
        let out = parse("1 + 1;", "a.js");
        assert_eq!(out.kind, Some(ModuleKind::Script));
    }
}
