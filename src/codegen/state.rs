//! Per-run generation state

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::BindingContext;
use crate::common::config::Config;

use super::accessor::AccessorRegistry;
use super::builder::ClassBuilder;
use super::member_map::MemberMap;
use super::output::ClassFileFactory;
use super::type_mapper::TypeMapper;

/// Everything shared by the generators of one compilation run.
///
/// Generation is strictly sequential: each class generator borrows the state
/// exclusively for as long as it runs, nested generators reborrow it.
pub struct GenerationState {
    pub config: Config,
    bindings: Rc<BindingContext>,
    pub type_mapper: TypeMapper,
    pub member_map: MemberMap,
    pub accessors: AccessorRegistry,
    pub factory: ClassFileFactory,
    /// Source file whose declarations are being generated
    pub current_file: Option<String>,
    anonymous_counters: HashMap<String, usize>,
}

impl GenerationState {
    pub fn new(bindings: BindingContext, config: Config) -> Self {
        let bindings = Rc::new(bindings);
        let type_mapper = TypeMapper::new(Rc::clone(&bindings), config.builtins_mapping);
        let factory = ClassFileFactory::new(config.output_mode, config.emit_debug_info, config.failure_policy);
        Self {
            config,
            bindings,
            type_mapper,
            member_map: MemberMap::new(),
            accessors: AccessorRegistry::new(),
            factory,
            current_file: None,
            anonymous_counters: HashMap::new(),
        }
    }

    /// Shared handle on the binding table, independent of the borrow on `self`
    pub fn bindings(&self) -> Rc<BindingContext> {
        Rc::clone(&self.bindings)
    }

    pub fn new_builder(&self) -> ClassBuilder {
        self.factory.new_builder()
    }

    /// Next `Outer$<n>` name for a literal class declared inside `outer`
    pub fn next_anonymous_name(&mut self, outer: &str) -> String {
        let counter = self.anonymous_counters.entry(outer.to_string()).or_insert(0);
        *counter += 1;
        format!("{}${}", outer, counter)
    }

    pub fn into_factory(self) -> ClassFileFactory {
        self.factory
    }
}
