//! Reference discovery.

use kiln_binder::{bind, BindOptions, Catalog, OutputKind, Symbol};
use kiln_types::{visit, ReferenceSet, SourceFile};
use tracing::{debug, trace};

use crate::host::HostRegistry;

/// The references `source` needs: the host's platform set plus every
/// loaded library (and its loaded dependencies) whose symbols it uses.
///
/// Syntax and binding errors are ignored. Symbols declared by the source
/// itself and symbols of libraries the host has not loaded are dropped.
pub fn discover(source: &SourceFile, catalog: &Catalog, host: &HostRegistry) -> ReferenceSet {
    let parsed = kiln_parser::parse(source);
    let platform = host.platform_references();
    let options = BindOptions {
        ignore_accessibility: true,
        output: OutputKind::Library,
    };
    let bound = bind(&parsed.program, source, catalog, &platform, options);

    let mut refs = platform;
    for node in visit::nodes(&parsed.program) {
        let id = node.id();
        let symbol = bound
            .model
            .symbol_info(id)
            .or_else(|| bound.model.declared_symbol(id));
        let library = match symbol {
            None | Some(Symbol::Namespace { .. }) => continue,
            Some(symbol) => match symbol.containing_library() {
                Some(library) => library,
                None => continue,
            },
        };

        let Some(reference) = host.reference(library) else {
            trace!(library, "symbol from library not loaded on host dropped");
            continue;
        };
        if !refs.insert(reference.clone()) {
            continue;
        }
        debug!(library, location = %reference.location, "reference discovered");
        for dependency in catalog.dependency_closure(library) {
            if let Some(dep) = host.reference(&dependency) {
                refs.insert(dep.clone());
            }
        }
    }

    debug!(
        file = %source.name,
        references = refs.len(),
        "reference discovery complete"
    );
    refs
}

/// [`discover`] against the standard catalog and host registry.
pub fn discover_standard(source: &SourceFile) -> ReferenceSet {
    discover(source, &Catalog::standard(), &HostRegistry::standard())
}
