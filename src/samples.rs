//! Bundled resolved programs
//!
//! Each sample is the output a Jet front end would hand over for a small
//! source program: the syntax tree plus its binding table. The CLI compiles
//! them and the integration tests use them as fixtures.

use crate::ast::*;

/// A resolved program ready for code generation
#[derive(Debug, Clone)]
pub struct Program {
    pub files: Vec<JetFile>,
    pub bindings: BindingContext,
}

pub struct Sample {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Program,
}

impl Sample {
    pub fn program(&self) -> Program {
        (self.build)()
    }
}

static SAMPLES: &[Sample] = &[
    Sample {
        name: "greeter",
        description: "top-level property, string templates, default arguments and an extension function",
        build: greeter,
    },
    Sample {
        name: "counter",
        description: "function literal capturing a shared var and a plain val inside a loop",
        build: counter,
    },
    Sample {
        name: "shapes",
        description: "trait with a default body, constructor properties, inheritance and a private member reached from a closure",
        build: shapes,
    },
    Sample {
        name: "objects",
        description: "object declaration with its instance field and an object literal capturing a parameter",
        build: objects,
    },
];

pub fn all() -> &'static [Sample] {
    SAMPLES
}

pub fn find(name: &str) -> Option<&'static Sample> {
    SAMPLES.iter().find(|s| s.name == name)
}

/// Declares descriptors the way a front end would while resolving a file
pub struct ProgramBuilder {
    pub bindings: BindingContext,
    namespace: DescriptorId,
}

impl ProgramBuilder {
    pub fn new(namespace: &str) -> Self {
        let mut bindings = BindingContext::new();
        let namespace = bindings.add_namespace(namespace);
        Self { bindings, namespace }
    }

    pub fn namespace(&self) -> DescriptorId {
        self.namespace
    }

    /// Public final function without receiver or type parameters
    pub fn function(&mut self, container: DescriptorId, name: &str, return_type: SemanticType) -> DescriptorId {
        self.bindings.add_function(FunctionDescriptor {
            name: name.to_string(),
            container,
            kind: FunctionKind::Function,
            visibility: Visibility::Public,
            modality: Modality::Final,
            receiver: None,
            type_parameters: Vec::new(),
            value_parameters: Vec::new(),
            return_type,
        })
    }

    pub fn add_function(&mut self, function: FunctionDescriptor) -> DescriptorId {
        self.bindings.add_function(function)
    }

    /// Body of a function literal declared inside `container`
    pub fn literal(&mut self, container: DescriptorId, return_type: SemanticType) -> DescriptorId {
        self.bindings.add_function(FunctionDescriptor {
            name: "<anonymous>".to_string(),
            container,
            kind: FunctionKind::Literal,
            visibility: Visibility::Public,
            modality: Modality::Final,
            receiver: None,
            type_parameters: Vec::new(),
            value_parameters: Vec::new(),
            return_type,
        })
    }

    pub fn constructor(&mut self, class: DescriptorId) -> DescriptorId {
        self.bindings.add_function(FunctionDescriptor {
            name: "<init>".to_string(),
            container: class,
            kind: FunctionKind::Constructor,
            visibility: Visibility::Public,
            modality: Modality::Final,
            receiver: None,
            type_parameters: Vec::new(),
            value_parameters: Vec::new(),
            return_type: SemanticType::class(class),
        })
    }

    fn next_parameter_index(&self, function: DescriptorId) -> usize {
        self.bindings.function(function).map_or(0, |f| f.value_parameters.len())
    }

    pub fn parameter(&mut self, function: DescriptorId, name: &str, ty: SemanticType) -> DescriptorId {
        self.add_parameter(function, name, ty, false, None)
    }

    pub fn parameter_with_default(&mut self, function: DescriptorId, name: &str, ty: SemanticType) -> DescriptorId {
        self.add_parameter(function, name, ty, true, None)
    }

    /// Constructor parameter that also declares `property`
    pub fn property_parameter(&mut self, constructor: DescriptorId, name: &str, ty: SemanticType, property: DescriptorId) -> DescriptorId {
        self.add_parameter(constructor, name, ty, false, Some(property))
    }

    fn add_parameter(
        &mut self,
        function: DescriptorId,
        name: &str,
        ty: SemanticType,
        declares_default: bool,
        property: Option<DescriptorId>,
    ) -> DescriptorId {
        let index = self.next_parameter_index(function);
        self.bindings.add_value_parameter(ValueParameterDescriptor {
            name: name.to_string(),
            container: function,
            index,
            ty,
            declares_default,
            vararg_element: None,
            property,
        })
    }

    pub fn local(&mut self, container: DescriptorId, name: &str, ty: SemanticType, mutable: bool) -> DescriptorId {
        self.bindings.add_variable(VariableDescriptor { name: name.to_string(), container, ty, mutable })
    }

    pub fn class(&mut self, container: DescriptorId, name: &str, kind: ClassKind, modality: Modality) -> DescriptorId {
        self.bindings.add_class(ClassDescriptor {
            name: name.to_string(),
            container,
            kind,
            visibility: Visibility::Public,
            modality,
            superclass: None,
            traits: Vec::new(),
            type_parameters: Vec::new(),
            primary_constructor: None,
            members: Vec::new(),
        })
    }

    pub fn add_class(&mut self, class: ClassDescriptor) -> DescriptorId {
        self.bindings.add_class(class)
    }

    /// Public property with a backing field and default accessors
    pub fn property(&mut self, container: DescriptorId, name: &str, ty: SemanticType, mutable: bool) -> DescriptorId {
        self.bindings.add_property(PropertyDescriptor {
            name: name.to_string(),
            container,
            visibility: Visibility::Public,
            modality: Modality::Final,
            ty,
            mutable,
            has_backing_field: true,
            custom_accessors: false,
        })
    }

    pub fn add_property(&mut self, property: PropertyDescriptor) -> DescriptorId {
        self.bindings.add_property(property)
    }

    pub fn file(&self, name: &str, declarations: Vec<Declaration>) -> JetFile {
        JetFile { name: name.to_string(), namespace: self.namespace, declarations }
    }

    pub fn finish(self, files: Vec<JetFile>) -> Program {
        Program { files, bindings: self.bindings }
    }
}

fn at(file: &str, line: u32) -> SourceLocation {
    SourceLocation::new(file, line, 1)
}

pub fn function_decl(descriptor: DescriptorId, parameters: Vec<ParameterDecl>, body: FunctionBody) -> FunctionDecl {
    FunctionDecl { descriptor, location: SourceLocation::default(), annotations: Vec::new(), parameters, body: Some(body) }
}

pub fn property_decl(descriptor: DescriptorId, initializer: Option<Expr>) -> PropertyDecl {
    PropertyDecl {
        descriptor,
        location: SourceLocation::default(),
        annotations: Vec::new(),
        initializer,
        getter: None,
        setter: None,
    }
}

pub fn class_decl(descriptor: DescriptorId, declarations: Vec<Declaration>) -> ClassDecl {
    ClassDecl {
        descriptor,
        location: SourceLocation::default(),
        annotations: Vec::new(),
        primary_constructor: None,
        super_call: None,
        initializers: Vec::new(),
        declarations,
    }
}

pub fn property_ref(property: DescriptorId, ty: SemanticType) -> Expr {
    Expr::new(ExprKind::Property { receiver: None, property }, ty)
}

pub fn this(ty: SemanticType) -> Expr {
    Expr::new(ExprKind::This { class: None }, ty)
}

/// ```text
/// package demo.greeter
///
/// val greeting = "Hello"
/// fun greet(name: String = "world", punctuation: String = "!") = "$greeting, $name$punctuation"
/// fun Int.twice(): Int = this * 2
/// fun main(): String = greet(punctuation = "?")
/// ```
fn greeter() -> Program {
    const FILE: &str = "greeter.jet";
    let mut p = ProgramBuilder::new("demo.greeter");
    let ns = p.namespace();
    let string = SemanticType::string();

    let greeting = p.property(ns, "greeting", string.clone(), false);

    let greet = p.function(ns, "greet", string.clone());
    let name = p.parameter_with_default(greet, "name", string.clone());
    let punctuation = p.parameter_with_default(greet, "punctuation", string.clone());

    let twice = p.add_function(FunctionDescriptor {
        name: "twice".to_string(),
        container: ns,
        kind: FunctionKind::Function,
        visibility: Visibility::Public,
        modality: Modality::Final,
        receiver: Some(SemanticType::int()),
        type_parameters: Vec::new(),
        value_parameters: Vec::new(),
        return_type: SemanticType::int(),
    });

    let main = p.function(ns, "main", string.clone());

    let template = Expr::new(
        ExprKind::StringTemplate(vec![
            TemplateEntry::Expr(property_ref(greeting, string.clone())),
            TemplateEntry::Literal(", ".to_string()),
            TemplateEntry::Expr(Expr::variable(name, string.clone())),
            TemplateEntry::Expr(Expr::variable(punctuation, string.clone())),
        ]),
        string.clone(),
    )
    .at(at(FILE, 4));

    let declarations = vec![
        Declaration::Property(PropertyDecl {
            location: at(FILE, 3),
            ..property_decl(greeting, Some(Expr::string("Hello")))
        }),
        Declaration::Function(FunctionDecl {
            location: at(FILE, 4),
            ..function_decl(
                greet,
                vec![
                    ParameterDecl::with_default(name, Expr::string("world")),
                    ParameterDecl::with_default(punctuation, Expr::string("!")),
                ],
                FunctionBody::Expression(template),
            )
        }),
        Declaration::Function(FunctionDecl {
            location: at(FILE, 5),
            ..function_decl(
                twice,
                Vec::new(),
                FunctionBody::Expression(Expr::binary(
                    BinaryOp::Mul,
                    this(SemanticType::int()),
                    Expr::int(2),
                    SemanticType::int(),
                )),
            )
        }),
        Declaration::Function(FunctionDecl {
            location: at(FILE, 6),
            ..function_decl(
                main,
                Vec::new(),
                FunctionBody::Expression(Expr::call(
                    Call::new(
                        greet,
                        vec![ResolvedArgument::Default, ResolvedArgument::Expression(Expr::string("?"))],
                    ),
                    string,
                )),
            )
        }),
    ];
    let file = p.file(FILE, declarations);
    p.finish(vec![file])
}

/// ```text
/// package demo.counter
///
/// fun count(times: Int): Int {
///     var n = 0
///     val step = 2
///     val add = { by: Int -> n += by + step; n }
///     var i = 0
///     while (i < times) {
///         add(i)
///         i++
///     }
///     return n
/// }
/// ```
fn counter() -> Program {
    const FILE: &str = "counter.jet";
    let mut p = ProgramBuilder::new("demo.counter");
    let ns = p.namespace();
    let int = SemanticType::int();
    let function_type = SemanticType::Function { parameters: vec![int.clone()], return_type: Box::new(int.clone()) };

    let count = p.function(ns, "count", int.clone());
    let times = p.parameter(count, "times", int.clone());
    let n = p.local(count, "n", int.clone(), true);
    let step = p.local(count, "step", int.clone(), false);
    let add = p.local(count, "add", function_type.clone(), false);
    let i = p.local(count, "i", int.clone(), true);

    let literal = p.literal(count, int.clone());
    let by = p.parameter(literal, "by", int.clone());

    let literal_body = vec![
        Stmt::Expr(Expr::new(
            ExprKind::CompoundAssign {
                op: BinaryOp::Add,
                target: Box::new(Expr::variable(n, int.clone())),
                value: Box::new(Expr::binary(
                    BinaryOp::Add,
                    Expr::variable(by, int.clone()),
                    Expr::variable(step, int.clone()),
                    int.clone(),
                )),
            },
            SemanticType::Unit,
        )),
        Stmt::Expr(Expr::variable(n, int.clone())),
    ];
    let literal = Expr::new(
        ExprKind::FunctionLiteral(Box::new(FunctionLiteral {
            descriptor: literal,
            parameters: vec![ParameterDecl::new(by)],
            body: literal_body,
        })),
        function_type.clone(),
    );

    let body = vec![
        Stmt::local(n, Expr::int(0)),
        Stmt::local(step, Expr::int(2)),
        Stmt::local(add, literal),
        Stmt::local(i, Expr::int(0)),
        Stmt::While {
            condition: Expr::binary(
                BinaryOp::Lt,
                Expr::variable(i, int.clone()),
                Expr::variable(times, int.clone()),
                SemanticType::boolean(),
            ),
            body: vec![
                Stmt::Expr(Expr::new(
                    ExprKind::Invoke {
                        callee: Box::new(Expr::variable(add, function_type)),
                        arguments: vec![Expr::variable(i, int.clone())],
                    },
                    SemanticType::any().make_nullable(),
                )),
                Stmt::Expr(Expr::new(
                    ExprKind::IncDec { op: IncDecOp::PostIncrement, target: Box::new(Expr::variable(i, int.clone())) },
                    int.clone(),
                )),
            ],
        },
        Stmt::ret(Some(Expr::variable(n, int))),
    ];

    let declarations = vec![Declaration::Function(FunctionDecl {
        location: at(FILE, 3),
        ..function_decl(count, vec![ParameterDecl::new(times)], FunctionBody::Block(body))
    })];
    let file = p.file(FILE, declarations);
    p.finish(vec![file])
}

/// ```text
/// package demo.shapes
///
/// trait Shape {
///     fun area(): Int
///     fun describe(): String = "area ${area()}"
/// }
///
/// open class Rect(val width: Int, val height: Int) : Shape {
///     override fun area(): Int = width * height
/// }
///
/// class Square(side: Int) : Rect(side, side) {
///     var label: String = "square"
///     private fun secret(): Int = 42
///     fun reveal(): Int {
///         val f = { secret() + width }
///         return f() as Int
///     }
/// }
/// ```
fn shapes() -> Program {
    const FILE: &str = "shapes.jet";
    let mut p = ProgramBuilder::new("demo.shapes");
    let ns = p.namespace();
    let int = SemanticType::int();
    let string = SemanticType::string();

    let shape = p.class(ns, "Shape", ClassKind::Trait, Modality::Abstract);
    let area = p.add_function(FunctionDescriptor {
        name: "area".to_string(),
        container: shape,
        kind: FunctionKind::Function,
        visibility: Visibility::Public,
        modality: Modality::Abstract,
        receiver: None,
        type_parameters: Vec::new(),
        value_parameters: Vec::new(),
        return_type: int.clone(),
    });
    let describe = p.add_function(FunctionDescriptor {
        name: "describe".to_string(),
        container: shape,
        kind: FunctionKind::Function,
        visibility: Visibility::Public,
        modality: Modality::Open,
        receiver: None,
        type_parameters: Vec::new(),
        value_parameters: Vec::new(),
        return_type: string.clone(),
    });

    let rect = p.add_class(ClassDescriptor {
        name: "Rect".to_string(),
        container: ns,
        kind: ClassKind::Class,
        visibility: Visibility::Public,
        modality: Modality::Open,
        superclass: None,
        traits: vec![SemanticType::class(shape)],
        type_parameters: Vec::new(),
        primary_constructor: None,
        members: Vec::new(),
    });
    let rect_ctor = p.constructor(rect);
    let width = p.property(rect, "width", int.clone(), false);
    let height = p.property(rect, "height", int.clone(), false);
    let width_param = p.property_parameter(rect_ctor, "width", int.clone(), width);
    let height_param = p.property_parameter(rect_ctor, "height", int.clone(), height);
    let rect_area = p.add_function(FunctionDescriptor {
        name: "area".to_string(),
        container: rect,
        kind: FunctionKind::Function,
        visibility: Visibility::Public,
        modality: Modality::Open,
        receiver: None,
        type_parameters: Vec::new(),
        value_parameters: Vec::new(),
        return_type: int.clone(),
    });

    let square = p.add_class(ClassDescriptor {
        name: "Square".to_string(),
        container: ns,
        kind: ClassKind::Class,
        visibility: Visibility::Public,
        modality: Modality::Final,
        superclass: Some(SemanticType::class(rect)),
        traits: Vec::new(),
        type_parameters: Vec::new(),
        primary_constructor: None,
        members: Vec::new(),
    });
    let square_ctor = p.constructor(square);
    let side = p.parameter(square_ctor, "side", int.clone());
    let label = p.property(square, "label", string.clone(), true);
    let secret = p.add_function(FunctionDescriptor {
        name: "secret".to_string(),
        container: square,
        kind: FunctionKind::Function,
        visibility: Visibility::Private,
        modality: Modality::Final,
        receiver: None,
        type_parameters: Vec::new(),
        value_parameters: Vec::new(),
        return_type: int.clone(),
    });
    let reveal = p.function(square, "reveal", int.clone());
    let f_type = SemanticType::Function { parameters: Vec::new(), return_type: Box::new(int.clone()) };
    let f = p.local(reveal, "f", f_type.clone(), false);
    let literal = p.literal(reveal, int.clone());

    let shape_decl = ClassDecl {
        location: at(FILE, 3),
        ..class_decl(
            shape,
            vec![
                Declaration::Function(FunctionDecl {
                    descriptor: area,
                    location: at(FILE, 4),
                    annotations: Vec::new(),
                    parameters: Vec::new(),
                    body: None,
                }),
                Declaration::Function(FunctionDecl {
                    location: at(FILE, 5),
                    ..function_decl(
                        describe,
                        Vec::new(),
                        FunctionBody::Expression(Expr::new(
                            ExprKind::StringTemplate(vec![
                                TemplateEntry::Literal("area ".to_string()),
                                TemplateEntry::Expr(Expr::call(Call::new(area, Vec::new()), int.clone())),
                            ]),
                            string.clone(),
                        )),
                    )
                }),
            ],
        )
    };

    let rect_decl = ClassDecl {
        location: at(FILE, 8),
        primary_constructor: Some(ConstructorDecl {
            descriptor: rect_ctor,
            parameters: vec![ParameterDecl::new(width_param), ParameterDecl::new(height_param)],
        }),
        ..class_decl(
            rect,
            vec![Declaration::Function(FunctionDecl {
                location: at(FILE, 9),
                ..function_decl(
                    rect_area,
                    Vec::new(),
                    FunctionBody::Expression(Expr::binary(
                        BinaryOp::Mul,
                        property_ref(width, int.clone()),
                        property_ref(height, int.clone()),
                        int.clone(),
                    )),
                )
            })],
        )
    };

    let literal_expr = Expr::new(
        ExprKind::FunctionLiteral(Box::new(FunctionLiteral {
            descriptor: literal,
            parameters: Vec::new(),
            body: vec![Stmt::Expr(Expr::binary(
                BinaryOp::Add,
                Expr::call(Call::new(secret, Vec::new()), int.clone()),
                property_ref(width, int.clone()),
                int.clone(),
            ))],
        })),
        f_type.clone(),
    );
    let reveal_body = vec![
        Stmt::local(f, literal_expr),
        Stmt::ret(Some(Expr::new(
            ExprKind::Cast {
                expr: Box::new(Expr::new(
                    ExprKind::Invoke { callee: Box::new(Expr::variable(f, f_type)), arguments: Vec::new() },
                    SemanticType::any().make_nullable(),
                )),
                ty: int.clone(),
            },
            int.clone(),
        ))),
    ];

    let square_decl = ClassDecl {
        location: at(FILE, 12),
        primary_constructor: Some(ConstructorDecl { descriptor: square_ctor, parameters: vec![ParameterDecl::new(side)] }),
        super_call: Some(Call::new(
            rect_ctor,
            vec![
                ResolvedArgument::Expression(Expr::variable(side, int.clone())),
                ResolvedArgument::Expression(Expr::variable(side, int.clone())),
            ],
        )),
        ..class_decl(
            square,
            vec![
                Declaration::Property(PropertyDecl {
                    location: at(FILE, 13),
                    ..property_decl(label, Some(Expr::string("square")))
                }),
                Declaration::Function(FunctionDecl {
                    location: at(FILE, 14),
                    ..function_decl(secret, Vec::new(), FunctionBody::Expression(Expr::int(42)))
                }),
                Declaration::Function(FunctionDecl {
                    location: at(FILE, 15),
                    ..function_decl(reveal, Vec::new(), FunctionBody::Block(reveal_body))
                }),
            ],
        )
    };

    let file = p.file(
        FILE,
        vec![Declaration::Class(shape_decl), Declaration::Class(rect_decl), Declaration::Class(square_decl)],
    );
    p.finish(vec![file])
}

/// ```text
/// package demo.objects
///
/// object Counter {
///     var total = 0
///     fun next(): Int { total++; return total }
/// }
///
/// fun twice(): Int { Counter.next(); return Counter.next() }
///
/// fun offset(base: Int): Any = object {
///     fun value(): Int = base + 1
/// }
/// ```
fn objects() -> Program {
    const FILE: &str = "objects.jet";
    let mut p = ProgramBuilder::new("demo.objects");
    let ns = p.namespace();
    let int = SemanticType::int();

    let counter = p.class(ns, "Counter", ClassKind::Object, Modality::Final);
    let total = p.property(counter, "total", int.clone(), true);
    let next = p.function(counter, "next", int.clone());
    let twice = p.function(ns, "twice", int.clone());
    let offset = p.function(ns, "offset", SemanticType::any());
    let base = p.parameter(offset, "base", int.clone());
    let anonymous = p.class(offset, "<no name provided>", ClassKind::AnonymousObject, Modality::Final);
    let value = p.function(anonymous, "value", int.clone());

    let counter_ref = || Expr::new(ExprKind::This { class: Some(counter) }, SemanticType::class(counter));
    let call_next = || Expr::call(Call::new(next, Vec::new()).with_receiver(counter_ref()), SemanticType::int());

    let counter_decl = ClassDecl {
        location: at(FILE, 3),
        ..class_decl(
            counter,
            vec![
                Declaration::Property(PropertyDecl {
                    location: at(FILE, 4),
                    ..property_decl(total, Some(Expr::int(0)))
                }),
                Declaration::Function(FunctionDecl {
                    location: at(FILE, 5),
                    ..function_decl(
                        next,
                        Vec::new(),
                        FunctionBody::Block(vec![
                            Stmt::Expr(Expr::new(
                                ExprKind::IncDec {
                                    op: IncDecOp::PostIncrement,
                                    target: Box::new(property_ref(total, int.clone())),
                                },
                                int.clone(),
                            )),
                            Stmt::ret(Some(property_ref(total, int.clone()))),
                        ]),
                    )
                }),
            ],
        )
    };

    let object_literal = ClassDecl {
        location: at(FILE, 10),
        ..class_decl(
            anonymous,
            vec![Declaration::Function(FunctionDecl {
                location: at(FILE, 11),
                ..function_decl(
                    value,
                    Vec::new(),
                    FunctionBody::Expression(Expr::binary(
                        BinaryOp::Add,
                        Expr::variable(base, int.clone()),
                        Expr::int(1),
                        int.clone(),
                    )),
                )
            })],
        )
    };

    let declarations = vec![
        Declaration::Class(counter_decl),
        Declaration::Function(FunctionDecl {
            location: at(FILE, 8),
            ..function_decl(
                twice,
                Vec::new(),
                FunctionBody::Block(vec![Stmt::Expr(call_next()), Stmt::ret(Some(call_next()))]),
            )
        }),
        Declaration::Function(FunctionDecl {
            location: at(FILE, 10),
            ..function_decl(
                offset,
                vec![ParameterDecl::new(base)],
                FunctionBody::Expression(Expr::new(
                    ExprKind::ObjectLiteral(Box::new(object_literal)),
                    SemanticType::class(anonymous),
                )),
            )
        }),
    ];
    let file = p.file(FILE, declarations);
    p.finish(vec![file])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_names_are_unique() {
        let mut names: Vec<&str> = all().iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn test_find_builds_program() {
        let sample = find("counter").expect("counter sample");
        let program = sample.program();
        assert_eq!(program.files.len(), 1);
        assert_eq!(program.files[0].name, "counter.jet");
        assert!(find("missing").is_none());
    }

    #[test]
    fn test_parameters_are_indexed_in_order() {
        let program = find("greeter").expect("greeter sample").program();
        let greet = program
            .files[0]
            .declarations
            .iter()
            .find_map(|d| match d {
                Declaration::Function(f) if program.bindings.function(f.descriptor).map(|f| f.name == "greet").unwrap_or(false) => {
                    Some(f.descriptor)
                }
                _ => None,
            })
            .expect("greet declared");
        let function = program.bindings.function(greet).expect("function");
        let indices: Vec<usize> = function
            .value_parameters
            .iter()
            .map(|p| program.bindings.value_parameter(*p).map(|p| p.index).unwrap_or(usize::MAX))
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
