//! The runtime preamble (§4.6 Algorithm step 2): a small self-hosted module
//! loader, embedded as a static template rather than assembled ad hoc per
//! build (§9 Design Notes: "emit them as static template data embedded in
//! the emitter, not constructed ad hoc per build").
//!
//! No teacher precedent — `good_fences` never emitted a runtime. The shape
//! (a `modules` registry keyed by id, a memoising `require`, interop
//! helpers for default/namespace imports, a dynamic loader reading a
//! manifest) follows §4.6's contract directly.

use bundler_graph::Target;

/// The loader body shared by every format; only how it is wrapped differs.
///
/// Every chunk embeds this preamble (§4.6 step 2, "Prepend the runtime
/// preamble" is part of the per-chunk algorithm, and §4.6 Contract calls
/// each chunk "self-contained"). A dynamically loaded chunk must still
/// register its modules into the *same* registry the chunk that triggered
/// the load is reading from, so the registry and cache live on a shared
/// global carrier (`globalThis`, present in both browsers and Node) rather
/// than chunk-local `var`s — otherwise a second chunk's copy of this
/// preamble would reset `__modules`/`__cache` and strand every module the
/// first chunk already loaded.
const CORE: &str = r#"var __bundlerHost = typeof globalThis !== "undefined" ? globalThis : this;
var __modules = __bundlerHost.__bundlerModules || (__bundlerHost.__bundlerModules = {});
var __cache = __bundlerHost.__bundlerCache || (__bundlerHost.__bundlerCache = {});
function __define(id, factory) { __modules[id] = factory; }
function __require(id) {
  if (__cache[id]) { return __cache[id].exports; }
  var factory = __modules[id];
  if (!factory) { throw new Error("Unknown module: " + id); }
  var module = { exports: {} };
  __cache[id] = module;
  factory(__require, module.exports, module);
  return module.exports;
}
function __interopDefault(mod) {
  return mod && typeof mod === "object" && "default" in mod ? mod.default : mod;
}
function __interopNamespace(mod) {
  return mod && typeof mod === "object" ? mod : { default: mod };
}
function __exportStar(exports, mod) {
  for (var key in mod) {
    if (key !== "default" && !Object.prototype.hasOwnProperty.call(exports, key)) {
      exports[key] = mod[key];
    }
  }
}
"#;

/// Server targets delegate the dynamic loader to the host's own `require`;
/// browser targets inject a `<script>` (and, if the manifest lists one, a
/// `<link rel=stylesheet>`) and resolve once it has loaded (§4.6 step 2d).
fn dynamic_loader(target: Target) -> &'static str {
    match target {
        Target::Server => {
            r#"function __dynamicImport(chunkId) {
  return Promise.resolve().then(function () {
    var entry = __manifest[chunkId];
    if (!entry) { throw new Error("Unknown chunk: " + chunkId); }
    require(entry.path);
    return __require(chunkId);
  });
}
"#
        }
        Target::Browser => {
            r#"function __dynamicImport(chunkId) {
  return new Promise(function (resolve, reject) {
    var entry = __manifest[chunkId];
    if (!entry) { reject(new Error("Unknown chunk: " + chunkId)); return; }
    if (entry.css) {
      var link = document.createElement("link");
      link.rel = "stylesheet";
      link.href = entry.css;
      document.head.appendChild(link);
    }
    var script = document.createElement("script");
    script.src = entry.path;
    script.onload = function () { resolve(__require(chunkId)); };
    script.onerror = function () { reject(new Error("Failed to load chunk: " + chunkId)); };
    document.head.appendChild(script);
  });
}
"#
        }
    }
}

/// Renders the full preamble, with `manifest` (the code-splitting manifest,
/// §6 "Code-splitting manifest") inlined as `__manifest` so the dynamic
/// loader never needs a network round trip to find a chunk's URL.
pub fn preamble(target: Target, manifest_json: &str) -> String {
    format!(
        "var __manifest = {manifest_json};\n{CORE}{}",
        dynamic_loader(target)
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn server_preamble_uses_host_require_for_dynamic_chunks() {
        let out = preamble(Target::Server, "{}");
        assert!(out.contains("require(entry.path)"));
    }

    #[test]
    fn browser_preamble_injects_a_script_tag() {
        let out = preamble(Target::Browser, "{}");
        assert!(out.contains("document.createElement(\"script\")"));
    }
}
