//! The plugin interface of §6: `onResolve`/`onLoad`/`onTransform`/`onStart`/
//! `onEnd`, dispatched in registration order with first-non-null-wins for
//! `onResolve`/`onLoad` and chained calls for `onTransform` (§6 "Plugin
//! interface").
//!
//! §9's redesign flag — "Plugins rely on duck-typed hook registration.
//! Reformulate as a fixed, enumerated interface... unknown hook names are
//! rejected at registration, not silently ignored" — is satisfied by
//! construction here rather than by a runtime name check: [`PluginRegistrar`]
//! only ever exposes the five methods below, so there is no string-keyed
//! hook name to mistype in the first place. No teacher precedent (none of
//! the teacher's crates expose a plugin surface); the tagged-variant outcome
//! types and registration-order dispatch follow §6 directly.

use std::path::{Path, PathBuf};

use bundler_diag::Diagnostic;
use regex::Regex;

pub type PluginResult<T> = Result<T, Diagnostic>;

/// A compiled `filter` as named in every hook registration call of §6
/// (`onResolve({filter}, cb)` etc.) — matched against a specifier for
/// `onResolve`, or a resolved file path for `onLoad`/`onTransform`.
#[derive(Clone)]
pub struct Filter(Regex);

impl Filter {
    pub fn new(pattern: &str) -> PluginResult<Self> {
        Regex::new(pattern)
            .map(Filter)
            .map_err(|err| Diagnostic::ConfigInvalid { message: format!("invalid plugin filter `{pattern}`: {err}") })
    }

    fn matches(&self, candidate: &str) -> bool {
        self.0.is_match(candidate)
    }
}

pub struct ResolveArgs<'a> {
    pub specifier: &'a str,
    pub importer: &'a Path,
}

/// What an `onResolve` hook decided, or `None` to let the next hook (or the
/// built-in resolver) try (§6 "first non-null return wins").
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Path(PathBuf),
    External(String),
}

pub struct LoadArgs<'a> {
    pub path: &'a Path,
}

/// What kind of source an `onLoad` hook handed back, driving which syntax
/// the transformer parses it as (§6 "returns... a loader kind").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
    Text,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub contents: String,
    pub loader: LoaderKind,
}

pub struct TransformArgs<'a> {
    pub path: &'a Path,
    pub code: &'a str,
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub code: String,
}

/// Passed to every `onEnd` hook, a minimal summary of what the build
/// produced — §6 only names the hook's existence, not its payload, so this
/// carries the smallest useful shape.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub module_count: usize,
    pub chunk_count: usize,
    pub had_errors: bool,
}

type OnResolveFn = dyn Fn(&ResolveArgs) -> PluginResult<Option<ResolveOutcome>> + Send + Sync;
type OnLoadFn = dyn Fn(&LoadArgs) -> PluginResult<Option<LoadOutcome>> + Send + Sync;
type OnTransformFn = dyn Fn(&TransformArgs) -> PluginResult<TransformOutcome> + Send + Sync;
type OnStartFn = dyn Fn() -> PluginResult<()> + Send + Sync;
type OnEndFn = dyn Fn(&BuildSummary) + Send + Sync;

struct Registered<F: ?Sized> {
    plugin_name: String,
    filter: Option<Filter>,
    callback: Box<F>,
}

/// The `build` object a plugin's `setup(build)` callback registers hooks
/// against (§6 "a `setup(build)` callback"). Accumulates hooks across every
/// plugin's setup call, in registration order.
#[derive(Default)]
pub struct PluginRegistrar {
    on_resolve: Vec<Registered<OnResolveFn>>,
    on_load: Vec<Registered<OnLoadFn>>,
    on_transform: Vec<Registered<OnTransformFn>>,
    on_start: Vec<Registered<OnStartFn>>,
    on_end: Vec<Registered<OnEndFn>>,
}

impl PluginRegistrar {
    fn new() -> Self {
        Self::default()
    }

    pub fn on_resolve(
        &mut self,
        plugin_name: &str,
        filter: Option<Filter>,
        callback: impl Fn(&ResolveArgs) -> PluginResult<Option<ResolveOutcome>> + Send + Sync + 'static,
    ) {
        self.on_resolve.push(Registered { plugin_name: plugin_name.to_string(), filter, callback: Box::new(callback) });
    }

    pub fn on_load(
        &mut self,
        plugin_name: &str,
        filter: Option<Filter>,
        callback: impl Fn(&LoadArgs) -> PluginResult<Option<LoadOutcome>> + Send + Sync + 'static,
    ) {
        self.on_load.push(Registered { plugin_name: plugin_name.to_string(), filter, callback: Box::new(callback) });
    }

    pub fn on_transform(
        &mut self,
        plugin_name: &str,
        filter: Option<Filter>,
        callback: impl Fn(&TransformArgs) -> PluginResult<TransformOutcome> + Send + Sync + 'static,
    ) {
        self.on_transform.push(Registered { plugin_name: plugin_name.to_string(), filter, callback: Box::new(callback) });
    }

    pub fn on_start(&mut self, plugin_name: &str, callback: impl Fn() -> PluginResult<()> + Send + Sync + 'static) {
        self.on_start.push(Registered { plugin_name: plugin_name.to_string(), filter: None, callback: Box::new(callback) });
    }

    pub fn on_end(&mut self, plugin_name: &str, callback: impl Fn(&BuildSummary) + Send + Sync + 'static) {
        self.on_end.push(Registered { plugin_name: plugin_name.to_string(), filter: None, callback: Box::new(callback) });
    }
}

/// One plugin: a name plus a `setup` callback run once, at pipeline
/// construction, against a shared [`PluginRegistrar`] (§6 "an object with a
/// name and a `setup(build)` callback").
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn setup(&self, registrar: &mut PluginRegistrar) -> PluginResult<()>;
}

/// The assembled set of hooks from every configured plugin (§6 `plugins`,
/// "Ordered list of plugin objects"), ready to dispatch against.
pub struct PluginPipeline {
    registrar: PluginRegistrar,
}

impl PluginPipeline {
    /// Runs every plugin's `setup` in registration order. A panic inside
    /// `setup` itself is a bug, not an expected error, and is left to
    /// propagate (§9 "exceptions for... bugs... propagate as panics");
    /// hook *invocations* made later are what get wrapped as diagnostics.
    pub fn build(plugins: &[Box<dyn Plugin>]) -> PluginResult<Self> {
        let mut registrar = PluginRegistrar::new();
        for plugin in plugins {
            plugin.setup(&mut registrar).map_err(|err| wrap(plugin.name(), "setup", err))?;
        }
        Ok(Self { registrar })
    }

    /// First matching hook whose callback returns `Some(..)` wins (§6 "first
    /// non-null return wins for `onResolve`/`onLoad`").
    pub fn dispatch_resolve(&self, args: &ResolveArgs) -> PluginResult<Option<ResolveOutcome>> {
        for hook in &self.registrar.on_resolve {
            if !matches_filter(&hook.filter, args.specifier) {
                continue;
            }
            if let Some(outcome) = (hook.callback)(args).map_err(|err| wrap(&hook.plugin_name, "onResolve", err))? {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    pub fn dispatch_load(&self, args: &LoadArgs) -> PluginResult<Option<LoadOutcome>> {
        let path_str = args.path.to_string_lossy();
        for hook in &self.registrar.on_load {
            if !matches_filter(&hook.filter, &path_str) {
                continue;
            }
            if let Some(outcome) = (hook.callback)(args).map_err(|err| wrap(&hook.plugin_name, "onLoad", err))? {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    /// `onTransform` callbacks chain (§6 "`onTransform` callbacks chain"):
    /// every matching hook runs in registration order, each seeing the
    /// previous hook's output.
    pub fn dispatch_transform(&self, path: &Path, mut code: String) -> PluginResult<String> {
        let path_str = path.to_string_lossy();
        for hook in &self.registrar.on_transform {
            if !matches_filter(&hook.filter, &path_str) {
                continue;
            }
            let args = TransformArgs { path, code: &code };
            let outcome = (hook.callback)(&args).map_err(|err| wrap(&hook.plugin_name, "onTransform", err))?;
            code = outcome.code;
        }
        Ok(code)
    }

    pub fn dispatch_start(&self) -> PluginResult<()> {
        for hook in &self.registrar.on_start {
            (hook.callback)().map_err(|err| wrap(&hook.plugin_name, "onStart", err))?;
        }
        Ok(())
    }

    pub fn dispatch_end(&self, summary: &BuildSummary) {
        for hook in &self.registrar.on_end {
            (hook.callback)(summary);
        }
    }

    pub fn has_resolve_hooks(&self) -> bool {
        !self.registrar.on_resolve.is_empty()
    }

    pub fn has_load_hooks(&self) -> bool {
        !self.registrar.on_load.is_empty()
    }
}

fn matches_filter(filter: &Option<Filter>, candidate: &str) -> bool {
    filter.as_ref().map(|f| f.matches(candidate)).unwrap_or(true)
}

/// §7 "Plugin exceptions are caught, wrapped with the plugin name, and
/// surfaced as `Transform.Failure` or `Resolution.NotFound` depending on the
/// hook."
fn wrap(plugin_name: &str, hook: &str, err: Diagnostic) -> Diagnostic {
    match (hook, err) {
        ("onResolve", Diagnostic::ResolutionNotFound { specifier, importer, suggestions }) => {
            Diagnostic::from_plugin_resolve_failure(plugin_name, format!("{specifier} ({suggestions:?})"), importer)
        }
        (hook, Diagnostic::TransformFailure { file, message }) => {
            Diagnostic::from_plugin_failure(plugin_name, hook, file, message)
        }
        (hook, other) => Diagnostic::from_plugin_failure(plugin_name, hook, PathBuf::new(), other.to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingPlugin {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Plugin for RecordingPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn setup(&self, registrar: &mut PluginRegistrar) -> PluginResult<()> {
            let calls = self.calls.clone();
            registrar.on_resolve(self.name, Some(Filter::new("^virtual:").unwrap()), move |args| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(ResolveOutcome::External(args.specifier.to_string())))
            });
            Ok(())
        }
    }

    #[test]
    fn on_resolve_only_runs_for_matching_filters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(RecordingPlugin { name: "virtual-modules", calls: calls.clone() })];
        let pipeline = PluginPipeline::build(&plugins).unwrap();

        let importer = Path::new("/p/main.js");
        let miss = pipeline.dispatch_resolve(&ResolveArgs { specifier: "./a.js", importer }).unwrap();
        assert!(miss.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let hit = pipeline.dispatch_resolve(&ResolveArgs { specifier: "virtual:thing", importer }).unwrap();
        assert!(matches!(hit, Some(ResolveOutcome::External(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_plugin_to_return_some_wins() {
        struct Always(&'static str, &'static str);
        impl Plugin for Always {
            fn name(&self) -> &str {
                self.0
            }
            fn setup(&self, registrar: &mut PluginRegistrar) -> PluginResult<()> {
                let tag = self.1;
                registrar.on_resolve(self.0, None, move |_| Ok(Some(ResolveOutcome::External(tag.to_string()))));
                Ok(())
            }
        }
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Always("first", "a")), Box::new(Always("second", "b"))];
        let pipeline = PluginPipeline::build(&plugins).unwrap();
        let importer = Path::new("/p/main.js");
        let resolved = pipeline.dispatch_resolve(&ResolveArgs { specifier: "x", importer }).unwrap();
        match resolved {
            Some(ResolveOutcome::External(name)) => assert_eq!(name, "a"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn on_transform_hooks_chain_in_registration_order() {
        struct Upper;
        impl Plugin for Upper {
            fn name(&self) -> &str {
                "upper"
            }
            fn setup(&self, registrar: &mut PluginRegistrar) -> PluginResult<()> {
                registrar.on_transform("upper", None, |args| Ok(TransformOutcome { code: args.code.to_uppercase() }));
                Ok(())
            }
        }
        struct Exclaim;
        impl Plugin for Exclaim {
            fn name(&self) -> &str {
                "exclaim"
            }
            fn setup(&self, registrar: &mut PluginRegistrar) -> PluginResult<()> {
                registrar.on_transform("exclaim", None, |args| Ok(TransformOutcome { code: format!("{}!", args.code) }));
                Ok(())
            }
        }
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Upper), Box::new(Exclaim)];
        let pipeline = PluginPipeline::build(&plugins).unwrap();
        let out = pipeline.dispatch_transform(Path::new("a.js"), "hi".to_string()).unwrap();
        assert_eq!(out, "HI!");
    }
}
