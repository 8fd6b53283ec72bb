//! Contexts and module loading.
//!
//! A [`Context`] is shared (`Arc`) by every process evaluating against
//! it. Its [`ContextState`] sits behind one read-write lock: evaluation
//! holds a read guard for the whole of a `run`, while module loading and
//! binding take the write guard, so definitions never change under a
//! running thread.
//!
//! Every mutation through [`Context::update`], [`Context::compile`] or
//! [`Context::load_module`] is transactional: on error the state is
//! rolled back to how it was before the call.

mod state;

use std::sync::Arc;

use mu_ir::{FunctionId, Name, SymbolId};
use mu_symbols::{SymbolKind, SymbolTable};
use mu_types::{TypeId, Value};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::function::FunctionBuilder;
use crate::print_handler::{stdout_handler, SharedPrintHandler};
use crate::{BindError, CompiledUnit, EvalLimits, GcConfig, ModuleError, Node, NodeAssembler};

pub use state::{ContextState, GlobalDecl, StateSnapshot};

/// A native module: a named bundle of types and functions installed into
/// its own scope under the global scope.
pub trait NativeModule: Send + Sync {
    fn name(&self) -> &str;

    /// Modules that must be loaded first.
    fn requires(&self) -> &[&str] {
        &[]
    }

    /// Populate the module's scope.
    fn initialize(&self, module: &mut ModuleBuilder<'_>) -> Result<(), BindError>;
}

type ModuleInit = dyn Fn(&mut ModuleBuilder<'_>) -> Result<(), BindError> + Send + Sync;

/// A [`NativeModule`] defined by a closure.
pub struct FnModule {
    name: String,
    requires: Vec<&'static str>,
    init: Box<ModuleInit>,
}

impl FnModule {
    pub fn new<F>(name: &str, init: F) -> Self
    where
        F: Fn(&mut ModuleBuilder<'_>) -> Result<(), BindError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_owned(),
            requires: Vec::new(),
            init: Box::new(init),
        }
    }

    /// Require `module` to be loaded first.
    #[must_use]
    pub fn depends_on(mut self, module: &'static str) -> Self {
        self.requires.push(module);
        self
    }
}

impl NativeModule for FnModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[&str] {
        &self.requires
    }

    fn initialize(&self, module: &mut ModuleBuilder<'_>) -> Result<(), BindError> {
        (self.init)(module)
    }
}

/// Handed to a module initializer; definitions land in the module's scope.
pub struct ModuleBuilder<'s> {
    state: &'s mut ContextState,
    scope: SymbolId,
}

impl<'s> ModuleBuilder<'s> {
    /// The module's scope symbol.
    #[inline]
    pub fn scope(&self) -> SymbolId {
        self.scope
    }

    #[inline]
    pub fn state(&mut self) -> &mut ContextState {
        self.state
    }

    pub fn function(&mut self, builder: FunctionBuilder) -> Result<FunctionId, BindError> {
        self.state.define_function(self.scope, builder)
    }

    /// Define a function whose body is assembled by `body`. The function
    /// is visible inside its own body, so it may recurse.
    pub fn tree_function<F>(&mut self, builder: FunctionBuilder, body: F) -> Result<FunctionId, BindError>
    where
        F: FnOnce(&mut NodeAssembler<'_>) -> Result<Node, BindError>,
    {
        define_tree_function(self.state, self.scope, builder, body)
    }

    pub fn class(&mut self, name: &str, super_class: Option<TypeId>) -> Result<TypeId, BindError> {
        self.state.define_class(self.scope, name, super_class)
    }

    pub fn interface(&mut self, name: &str) -> Result<TypeId, BindError> {
        self.state.define_interface(self.scope, name)
    }

    pub fn global(&mut self, name: &str, ty: TypeId, initial: Value) -> Result<mu_ir::GlobalSlot, BindError> {
        self.state.define_global(self.scope, name, ty, initial)
    }

    /// Resolve a type name as seen from the module.
    pub fn resolve_type(&self, name: &str) -> Result<TypeId, BindError> {
        self.state.resolve_type(self.scope, name)
    }
}

fn define_tree_function<F>(
    state: &mut ContextState,
    scope: SymbolId,
    builder: FunctionBuilder,
    body: F,
) -> Result<FunctionId, BindError>
where
    F: FnOnce(&mut NodeAssembler<'_>) -> Result<Node, BindError>,
{
    let function = state.define_function(scope, builder)?;
    let mut assembler = NodeAssembler::for_function(state, function)?;
    let root = body(&mut assembler)?;
    assembler.finish_function(root)
}

/// Shared runtime context.
pub struct Context {
    name: String,
    separator: String,
    gc: GcConfig,
    limits: EvalLimits,
    print: SharedPrintHandler,
    state: RwLock<ContextState>,
    providers: RwLock<FxHashMap<String, Arc<dyn NativeModule>>>,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Language name, e.g. `"mu"`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Separator joining qualified names.
    #[inline]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    #[inline]
    pub fn gc_config(&self) -> &GcConfig {
        &self.gc
    }

    #[inline]
    pub fn limits(&self) -> EvalLimits {
        self.limits
    }

    #[inline]
    pub fn print_handler(&self) -> &SharedPrintHandler {
        &self.print
    }

    /// Shared access to the definitions. Blocks while a module is loading.
    pub fn read(&self) -> RwLockReadGuard<'_, ContextState> {
        self.state.read()
    }

    /// Exclusive access. Changes made here are not rolled back; prefer
    /// [`Context::update`].
    pub fn write(&self) -> RwLockWriteGuard<'_, ContextState> {
        self.state.write()
    }

    /// Apply `f` under the write lock, rolling back on error.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut ContextState) -> Result<T, BindError>,
    ) -> Result<T, BindError> {
        let mut state = self.state.write();
        let snapshot = state.snapshot();
        let result = f(&mut state);
        match result {
            Ok(_) => state.commit(snapshot),
            Err(_) => state.rollback(snapshot),
        }
        result
    }

    /// Bind a top-level unit whose names resolve from `scope`.
    pub fn compile<F>(&self, scope: SymbolId, f: F) -> Result<CompiledUnit, BindError>
    where
        F: FnOnce(&mut NodeAssembler<'_>) -> Result<Node, BindError>,
    {
        self.update(|state| {
            let mut assembler = NodeAssembler::new(state, scope);
            let root = f(&mut assembler)?;
            assembler.finish(root)
        })
    }

    /// Define a function in `scope` with a body assembled by `body`.
    pub fn define_tree_function<F>(
        &self,
        scope: SymbolId,
        builder: FunctionBuilder,
        body: F,
    ) -> Result<FunctionId, BindError>
    where
        F: FnOnce(&mut NodeAssembler<'_>) -> Result<Node, BindError>,
    {
        self.update(|state| define_tree_function(state, scope, builder, body))
    }

    /// The overload of `name` visible from `scope` that best fits `args`.
    ///
    /// Takes a recursive read lock, so it runs alongside evaluation and may
    /// be called from a native function on a thread that already holds one.
    pub fn resolve_function(
        &self,
        scope: SymbolId,
        name: &str,
        args: &[TypeId],
    ) -> Result<FunctionId, BindError> {
        let state = self.state.read_recursive();
        let candidates = state.symbols.resolve(scope, name);
        let selected =
            state
                .symbols
                .select_overload(&state.types, Name::intern(name), &candidates, args)?;
        Ok(selected.function)
    }

    // === Modules ===

    /// Make a module available to [`Context::load_module`].
    pub fn register_module(&self, module: Arc<dyn NativeModule>) -> Result<(), ModuleError> {
        let mut providers = self.providers.write();
        let name = module.name().to_owned();
        if providers.contains_key(&name) {
            return Err(ModuleError::AlreadyRegistered(name));
        }
        providers.insert(name, module);
        Ok(())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state.read().module(name).is_some()
    }

    /// Load a registered module and, first, everything it requires.
    ///
    /// Loading an already loaded module returns its scope. If any
    /// initializer fails nothing from this call remains in the context.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn load_module(&self, name: &str) -> Result<SymbolId, ModuleError> {
        let providers = self.providers.read().clone();
        let mut state = self.state.write();
        if let Some(scope) = state.module(name) {
            return Ok(scope);
        }

        let snapshot = state.snapshot();
        let mut loading = Vec::new();
        match load_recursive(&mut state, &providers, name, &mut loading) {
            Ok(scope) => {
                state.commit(snapshot);
                Ok(scope)
            }
            Err(err) => {
                tracing::warn!(module = name, error = %err, "module load failed, rolling back");
                state.rollback(snapshot);
                Err(err)
            }
        }
    }
}

fn load_recursive(
    state: &mut ContextState,
    providers: &FxHashMap<String, Arc<dyn NativeModule>>,
    name: &str,
    loading: &mut Vec<String>,
) -> Result<SymbolId, ModuleError> {
    if let Some(scope) = state.module(name) {
        return Ok(scope);
    }
    if let Some(start) = loading.iter().position(|m| m == name) {
        let mut cycle = loading[start..].to_vec();
        cycle.push(name.to_owned());
        return Err(ModuleError::DependencyCycle(cycle));
    }
    let provider = providers
        .get(name)
        .cloned()
        .ok_or_else(|| ModuleError::Unknown(name.to_owned()))?;

    loading.push(name.to_owned());
    let requires: SmallVec<[String; 4]> = provider.requires().iter().map(|&r| r.to_owned()).collect();
    for dependency in &requires {
        load_recursive(state, providers, dependency, loading)?;
    }
    loading.pop();

    let failed = |source: BindError| ModuleError::Initialization {
        module: name.to_owned(),
        source,
    };
    let module = Name::intern(name);
    let scope = state
        .symbols
        .add_scope(SymbolTable::GLOBAL, module, SymbolKind::Module, true)
        .map_err(|err| failed(err.into()))?;
    let mut builder = ModuleBuilder {
        state: &mut *state,
        scope,
    };
    provider.initialize(&mut builder).map_err(failed)?;
    state.modules.insert(module, scope);
    tracing::debug!(module = name, "module loaded");
    Ok(scope)
}

/// Configures and creates a [`Context`].
///
/// ```text
/// let context = Context::builder()
///     .name("mu")
///     .module(MathModule)
///     .load("math")
///     .build()?;
/// ```
pub struct ContextBuilder {
    name: String,
    separator: String,
    gc: GcConfig,
    limits: EvalLimits,
    print: Option<SharedPrintHandler>,
    modules: Vec<Arc<dyn NativeModule>>,
    load: Vec<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            name: "mu".to_owned(),
            separator: ".".to_owned(),
            gc: GcConfig::default(),
            limits: EvalLimits::default(),
            print: None,
            modules: Vec::new(),
            load: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    #[must_use]
    pub fn separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_owned();
        self
    }

    #[must_use]
    pub fn gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: EvalLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Where `print` goes. Defaults to stdout.
    #[must_use]
    pub fn print_handler(mut self, handler: SharedPrintHandler) -> Self {
        self.print = Some(handler);
        self
    }

    /// Register a module provider.
    #[must_use]
    pub fn module(mut self, module: impl NativeModule + 'static) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    /// Load a registered module as part of [`ContextBuilder::build`].
    #[must_use]
    pub fn load(mut self, module: &str) -> Self {
        self.load.push(module.to_owned());
        self
    }

    pub fn build(self) -> Result<Arc<Context>, ModuleError> {
        let mut state = ContextState::new(&self.separator);
        crate::base::install(&mut state).map_err(|source| ModuleError::Initialization {
            module: "base".to_owned(),
            source,
        })?;

        let context = Arc::new(Context {
            name: self.name,
            separator: self.separator,
            gc: self.gc,
            limits: self.limits,
            print: self.print.unwrap_or_else(stdout_handler),
            state: RwLock::new(state),
            providers: RwLock::new(FxHashMap::default()),
        });
        for module in self.modules {
            context.register_module(module)?;
        }
        for module in &self.load {
            context.load_module(module)?;
        }
        tracing::debug!(context = %context.name, "context created");
        Ok(context)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
