//! The pre-populated `kiln` builtin namespace.
//!
//! This module declares the compiler-synthesized names that user code can
//! reach as `kiln.X` or `kiln.view.X`: a type tag plus type-check helper,
//! the six axis-mode constants, the owning `array` type and the
//! `memoryview` wrapper. Every declaration that needs backing code names a
//! template in [`TEMPLATES`]; nothing is emitted until a module actually
//! references the declaration (see [`crate::utility`]).

use crate::buffer::AxisMode;
use crate::diagnostic::Diagnostics;
use crate::error::{InternalError, ScopeError};
use crate::scope::{ClassType, Entry, EntryKind, Scope};
use crate::span::Span;
use crate::types::{FuncArg, Type};
use crate::utility::{Generator, UtilityId, UtilityRegistry, UtilityTemplate};

/// Name user code uses to reach the namespace.
pub const BUILTIN_MODULE: &str = "kiln";

/// Name of the nested axis-mode namespace.
pub const VIEW_MODULE: &str = "view";

/// Static description of one backing template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateDescriptor {
    /// Unique template name, also used to resolve `requires`.
    pub name: &'static str,
    pub prefix: &'static str,
    pub requires: &'static [&'static str],
    pub generate: Generator,
}

pub const TESTSCOPE_TEMPLATE: &str = "kiln testscope";
pub const VIEW_TESTSCOPE_TEMPLATE: &str = "kiln.view testscope";
pub const AXIS_TEMPLATE: &str = "axis modes";
pub const ARRAY_TEMPLATE: &str = "array";
pub const MEMORYVIEW_TEMPLATE: &str = "memoryview";

/// Every template the builtin namespace can emit, in registration order.
///
/// A template's requirements must appear before it.
pub const TEMPLATES: &[TemplateDescriptor] = &[
    TemplateDescriptor {
        name: TESTSCOPE_TEMPLATE,
        prefix: "kiln_builtin_",
        requires: &[],
        generate: testscope_code,
    },
    TemplateDescriptor {
        name: VIEW_TESTSCOPE_TEMPLATE,
        prefix: "kiln_view_",
        requires: &[],
        generate: view_testscope_code,
    },
    TemplateDescriptor {
        name: AXIS_TEMPLATE,
        prefix: "kiln_viewaxis_",
        requires: &[],
        generate: axis_code,
    },
    TemplateDescriptor {
        name: ARRAY_TEMPLATE,
        prefix: "kiln_array_",
        requires: &[],
        generate: array_code,
    },
    TemplateDescriptor {
        name: MEMORYVIEW_TEMPLATE,
        prefix: "kiln_memview_",
        requires: &[ARRAY_TEMPLATE, AXIS_TEMPLATE],
        generate: memoryview_code,
    },
];

/// Fields of the builtin `array` type, in layout order.
pub const ARRAY_FIELDS: &[(&str, &str)] = &[
    ("data", "char*"),
    ("len", "size_t"),
    ("format", "char*"),
    ("ndim", "int"),
    ("shape", "ssize_t*"),
    ("strides", "ssize_t*"),
    ("itemsize", "ssize_t"),
    ("mode", "char*"),
];

/// Fields of the builtin `memoryview` type, in layout order.
pub const MEMORYVIEW_FIELDS: &[(&str, &str)] = &[
    ("obj", "object"),
    ("ndim", "int"),
    ("shape", "ssize_t*"),
    ("strides", "ssize_t*"),
    ("suboffsets", "ssize_t*"),
    ("itemsize", "ssize_t"),
];

/// The builtin namespace plus the templates backing it.
#[derive(Debug, Default)]
pub struct BuiltinScope {
    scope: Scope,
    utilities: UtilityRegistry,
    populated: bool,
}

impl BuiltinScope {
    /// An empty, unpopulated namespace.
    pub fn new() -> Self {
        BuiltinScope {
            scope: Scope::new(BUILTIN_MODULE),
            utilities: UtilityRegistry::new(),
            populated: false,
        }
    }

    /// A namespace with every builtin declared.
    pub fn create() -> Result<Self, InternalError> {
        let mut builtins = BuiltinScope::new();
        builtins.populate()?;
        Ok(builtins)
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn view_scope(&self) -> Option<&Scope> {
        self.scope.lookup(VIEW_MODULE).and_then(Entry::as_module)
    }

    pub fn utilities(&self) -> &UtilityRegistry {
        &self.utilities
    }

    pub fn utility(&self, template: &str) -> Option<UtilityId> {
        self.utilities.find(template)
    }

    pub fn lookup(&self, name: &str) -> Option<&Entry> {
        self.scope.lookup(name)
    }

    /// Basic native types are reachable by spelling (`kiln.int`,
    /// `kiln.ssize_t` ...) without being scope entries.
    pub fn lookup_type(&self, name: &str) -> Option<Type> {
        if let Some(ty) = Type::parse_basic(name) {
            return Some(ty);
        }
        match self.scope.lookup(name) {
            Some(entry) if entry.is_type() => Some(Type::Named(entry.cname.clone())),
            _ => None,
        }
    }

    /// Importing a module out of the builtin namespace is never allowed.
    ///
    /// Always reports "kiln.NAME is not available" at `span`.
    pub fn find_module(&self, name: &str, span: Span, diag: &mut Diagnostics) -> Option<&Scope> {
        let err = not_available(BUILTIN_MODULE, name, span);
        diag.error(Some(span), err.to_string());
        None
    }

    /// Nested scope `name`, if it is one of the pre-populated modules.
    pub fn find_submodule(&self, name: &str) -> Result<&Scope, ScopeError> {
        self.scope
            .lookup(name)
            .and_then(Entry::as_module)
            .ok_or_else(|| not_available(BUILTIN_MODULE, name, Span::builtin()))
    }

    /// Resolve a dotted path below the namespace, e.g. `["view", "contig"]`.
    pub fn resolve_path(&self, path: &[&str], span: Span) -> Result<&Entry, ScopeError> {
        let mut scope = &self.scope;
        let mut module = BUILTIN_MODULE.to_string();
        let Some((last, parents)) = path.split_last() else {
            return Err(not_available(BUILTIN_MODULE, "", span));
        };
        for part in parents {
            scope = scope
                .lookup(part)
                .and_then(Entry::as_module)
                .ok_or_else(|| not_available(&module, part, span))?;
            module.push('.');
            module.push_str(part);
        }
        scope
            .lookup(last)
            .ok_or_else(|| not_available(&module, last, span))
    }

    /// Install every builtin declaration. Calling this again is a no-op.
    pub fn populate(&mut self) -> Result<(), InternalError> {
        if self.populated {
            return Ok(());
        }

        for descriptor in TEMPLATES {
            let requires = descriptor
                .requires
                .iter()
                .map(|name| {
                    self.utilities.find(name).ok_or_else(|| {
                        InternalError::new(format!(
                            "template '{}' requires unregistered '{name}'",
                            descriptor.name
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            self.utilities.register(UtilityTemplate {
                name: descriptor.name,
                prefix: descriptor.prefix,
                requires,
                generate: descriptor.generate,
            });
        }

        let testscope = self.template(TESTSCOPE_TEMPLATE)?;
        let view_testscope = self.template(VIEW_TESTSCOPE_TEMPLATE)?;
        let axis = self.template(AXIS_TEMPLATE)?;
        let array = self.template(ARRAY_TEMPLATE)?;
        let memoryview = self.template(MEMORYVIEW_TEMPLATE)?;

        // Type tag and type check, used to optimize isinstance-style tests.
        self.scope.declare(Entry::new(
            "TypeObject",
            "kiln_TypeObject",
            EntryKind::Typedef { base: Type::Void },
        ))?;
        self.scope.declare(Entry::new(
            "type_check",
            "kiln_TypeCheck",
            EntryKind::Function {
                ty: Type::function(
                    vec![
                        FuncArg::new("o", Type::Object),
                        FuncArg::new("t", Type::ptr(Type::Named("kiln_TypeObject".into()))),
                    ],
                    Type::Bint,
                ),
            },
        ))?;
        self.scope
            .declare(testscope_entry("kiln_builtin__testscope").with_utility(testscope))?;

        let mut view = Scope::new(VIEW_MODULE);
        view.declare(testscope_entry("kiln_view__testscope").with_utility(view_testscope))?;
        for mode in AxisMode::ALL {
            view.declare(
                Entry::new(
                    mode.name(),
                    format!("kiln_viewaxis_{}", mode.name()),
                    EntryKind::Variable {
                        ty: Type::Object,
                        readonly: true,
                    },
                )
                .with_utility(axis),
            )?;
        }
        self.scope.declare(Entry::new(
            VIEW_MODULE,
            VIEW_MODULE,
            EntryKind::Module(view),
        ))?;

        let mut array_members = field_scope("array", ARRAY_FIELDS)?;
        let array_ptr = Type::ptr(Type::Named("kiln_obj_array".into()));
        array_members.declare(Entry::new(
            "expose",
            "kiln_array_expose",
            EntryKind::Function {
                ty: Type::function(
                    vec![
                        FuncArg::new("self", array_ptr.clone()),
                        FuncArg::new("flags", Type::Int),
                    ],
                    Type::Int,
                ),
            },
        ))?;
        array_members.declare(Entry::new(
            "release",
            "kiln_array_release",
            EntryKind::Function {
                ty: Type::function(vec![FuncArg::new("self", array_ptr)], Type::Void),
            },
        ))?;
        self.scope
            .declare(class_entry("array", array_members).with_utility(array))?;

        let memview_members = field_scope("memoryview", MEMORYVIEW_FIELDS)?;
        self.scope
            .declare(class_entry("memoryview", memview_members).with_utility(memoryview))?;

        self.populated = true;
        tracing::debug!(
            entries = self.scope.len(),
            templates = self.utilities.len(),
            "populated builtin namespace"
        );
        Ok(())
    }

    fn template(&self, name: &str) -> Result<UtilityId, InternalError> {
        self.utilities
            .find(name)
            .ok_or_else(|| InternalError::new(format!("template '{name}' is not registered")))
    }
}

fn not_available(module: &str, name: &str, span: Span) -> ScopeError {
    ScopeError::NotAvailable {
        module: module.to_string(),
        name: name.to_string(),
        span,
    }
}

fn testscope_entry(cname: &str) -> Entry {
    Entry::new(
        "_testscope",
        cname,
        EntryKind::Function {
            ty: Type::function(vec![FuncArg::new("value", Type::Int)], Type::Object),
        },
    )
}

// `array` has its typeptr cname tied to the type name; codegen relies on it.
fn class_entry(name: &str, members: Scope) -> Entry {
    Entry::new(
        name,
        format!("kiln_obj_{name}"),
        EntryKind::Class(ClassType {
            objstruct_cname: format!("kiln_obj_{name}"),
            typeobj_cname: format!("kiln_tobj_{name}"),
            typeptr_cname: format!("kiln_ptype_{name}"),
            members,
        }),
    )
}

fn field_scope(class: &str, fields: &[(&str, &str)]) -> Result<Scope, InternalError> {
    let mut scope = Scope::new(class);
    for (name, spelling) in fields {
        let ty = Type::parse_basic(spelling).ok_or_else(|| {
            InternalError::new(format!("field {class}.{name} has unknown type '{spelling}'"))
        })?;
        scope.declare(Entry::new(
            *name,
            *name,
            EntryKind::Variable {
                ty,
                readonly: false,
            },
        ))?;
    }
    Ok(scope)
}

// ---------------------------------------------------------------------
// Template bodies
// ---------------------------------------------------------------------

fn testscope_code(prefix: &str) -> String {
    format!(
        "static kiln_object *{prefix}_testscope(int value) {{\n    \
         return kiln_format(\"hello from kiln scope, value=%d\", value);\n}}\n"
    )
}

fn view_testscope_code(prefix: &str) -> String {
    format!(
        "static kiln_object *{prefix}_testscope(int value) {{\n    \
         return kiln_format(\"hello from kiln.view scope, value=%d\", value);\n}}\n"
    )
}

fn axis_code(prefix: &str) -> String {
    let mut code = format!("typedef struct {{ const char *name; }} {prefix}Enum;\n");
    for mode in AxisMode::ALL {
        code.push_str(&format!(
            "static {prefix}Enum {prefix}{} = {{ \"{mode}\" }};\n",
            mode.name()
        ));
    }
    code
}

fn array_code(prefix: &str) -> String {
    let mut code = String::from("struct kiln_obj_array {\n    KILN_OBJECT_HEAD\n");
    for (name, spelling) in ARRAY_FIELDS {
        let ty = Type::parse_basic(spelling).unwrap_or(Type::Object);
        code.push_str(&format!("    {ty} {name};\n"));
    }
    code.push_str("};\n\n");
    code.push_str(&format!(
        "static int {prefix}expose(struct kiln_obj_array *self, kiln_buffer *info, int flags) {{\n    \
         int mode = self->mode[0] == 'c'\n        \
         ? (KILN_BUF_C_CONTIGUOUS | KILN_BUF_ANY_CONTIGUOUS)\n        \
         : (KILN_BUF_F_CONTIGUOUS | KILN_BUF_ANY_CONTIGUOUS);\n    \
         if (!(flags & mode)) {{\n        \
         kiln_raise_value_error(\"can only create a buffer that is contiguous in memory\");\n        \
         return -1;\n    }}\n    \
         info->buf = self->data;\n    \
         info->ndim = self->ndim;\n    \
         info->shape = self->shape;\n    \
         info->strides = self->strides;\n    \
         info->suboffsets = NULL;\n    \
         info->itemsize = self->itemsize;\n    \
         info->format = self->format;\n    \
         info->obj = NULL;\n    \
         return 0;\n}}\n\n\
         static void {prefix}release(struct kiln_obj_array *self) {{\n    \
         (void)self;\n}}\n"
    ));
    code
}

fn memoryview_code(prefix: &str) -> String {
    let mut code = String::from(
        "typedef struct {\n    ssize_t shape;\n    ssize_t stride;\n    ssize_t suboffset;\n} kiln_slice_dim;\n\n",
    );
    code.push_str("struct kiln_obj_memoryview {\n    KILN_OBJECT_HEAD\n");
    for (name, spelling) in MEMORYVIEW_FIELDS {
        let ty = Type::parse_basic(spelling).unwrap_or(Type::Object);
        code.push_str(&format!("    {ty} {name};\n"));
    }
    code.push_str("    kiln_slice_dim *dims;\n};\n\n");
    code.push_str(&format!(
        "static int {prefix}acquire(struct kiln_obj_memoryview *self, kiln_object *obj, int flags);\n\
         static void {prefix}release(struct kiln_obj_memoryview *self);\n"
    ));
    code
}
