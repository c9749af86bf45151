use super::{DescriptorId, SemanticType, SourceLocation};

/// One source file after resolution
#[derive(Debug, Clone)]
pub struct JetFile {
    pub name: String,
    pub namespace: DescriptorId,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Class(ClassDecl),
    Function(FunctionDecl),
    Property(PropertyDecl),
}

impl Declaration {
    pub fn descriptor(&self) -> DescriptorId {
        match self {
            Declaration::Class(c) => c.descriptor,
            Declaration::Function(f) => f.descriptor,
            Declaration::Property(p) => p.descriptor,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            Declaration::Class(c) => &c.location,
            Declaration::Function(f) => &f.location,
            Declaration::Property(p) => &p.location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnotationEntry {
    /// Internal name of the annotation class
    pub class: String,
    pub arguments: Vec<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub descriptor: DescriptorId,
    pub location: SourceLocation,
    pub annotations: Vec<AnnotationEntry>,
    pub primary_constructor: Option<ConstructorDecl>,
    /// Explicit superclass constructor call from the delegation list
    pub super_call: Option<Call>,
    pub initializers: Vec<Vec<Stmt>>,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone)]
pub struct ConstructorDecl {
    pub descriptor: DescriptorId,
    pub parameters: Vec<ParameterDecl>,
}

#[derive(Debug, Clone)]
pub struct ParameterDecl {
    pub descriptor: DescriptorId,
    pub default_value: Option<Expr>,
}

impl ParameterDecl {
    pub fn new(descriptor: DescriptorId) -> Self {
        Self { descriptor, default_value: None }
    }

    pub fn with_default(descriptor: DescriptorId, value: Expr) -> Self {
        Self { descriptor, default_value: Some(value) }
    }
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expression(Expr),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub descriptor: DescriptorId,
    pub location: SourceLocation,
    pub annotations: Vec<AnnotationEntry>,
    pub parameters: Vec<ParameterDecl>,
    pub body: Option<FunctionBody>,
}

#[derive(Debug, Clone)]
pub struct SetterDecl {
    pub parameter: DescriptorId,
    pub body: FunctionBody,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub descriptor: DescriptorId,
    pub location: SourceLocation,
    pub annotations: Vec<AnnotationEntry>,
    pub initializer: Option<Expr>,
    pub getter: Option<FunctionBody>,
    pub setter: Option<SetterDecl>,
}

#[derive(Debug, Clone)]
pub struct FunctionLiteral {
    pub descriptor: DescriptorId,
    pub parameters: Vec<ParameterDecl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Boolean(bool),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Identity,
    NotIdentity,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Identity
                | BinaryOp::NotIdentity
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl IncDecOp {
    pub fn delta(self) -> i32 {
        match self {
            IncDecOp::PreIncrement | IncDecOp::PostIncrement => 1,
            IncDecOp::PreDecrement | IncDecOp::PostDecrement => -1,
        }
    }

    pub fn is_prefix(self) -> bool {
        matches!(self, IncDecOp::PreIncrement | IncDecOp::PreDecrement)
    }
}

#[derive(Debug, Clone)]
pub enum TemplateEntry {
    Literal(String),
    Expr(Expr),
}

/// A resolved call: which overload and how each parameter receives its value
#[derive(Debug, Clone)]
pub struct Call {
    pub callee: DescriptorId,
    pub receiver: Option<Box<Expr>>,
    /// One entry per value parameter of the callee, in parameter order
    pub arguments: Vec<ResolvedArgument>,
    pub super_call: bool,
}

impl Call {
    pub fn new(callee: DescriptorId, arguments: Vec<ResolvedArgument>) -> Self {
        Self { callee, receiver: None, arguments, super_call: false }
    }

    pub fn with_receiver(mut self, receiver: Expr) -> Self {
        self.receiver = Some(Box::new(receiver));
        self
    }
}

#[derive(Debug, Clone)]
pub enum ResolvedArgument {
    Expression(Expr),
    Default,
    Vararg(Vec<Expr>),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Constant(Constant),
    StringTemplate(Vec<TemplateEntry>),
    /// Local variable or value parameter
    Variable(DescriptorId),
    /// Property access; `None` receiver means implicit `this` or a top-level property
    Property { receiver: Option<Box<Expr>>, property: DescriptorId },
    /// `$field` inside a property accessor
    BackingField(DescriptorId),
    This { class: Option<DescriptorId> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    IncDec { op: IncDecOp, target: Box<Expr> },
    Assign { target: Box<Expr>, value: Box<Expr> },
    CompoundAssign { op: BinaryOp, target: Box<Expr>, value: Box<Expr> },
    Call(Call),
    /// Invocation of a function-typed value
    Invoke { callee: Box<Expr>, arguments: Vec<Expr> },
    Index { array: Box<Expr>, index: Box<Expr> },
    If { condition: Box<Expr>, then_branch: Box<Expr>, else_branch: Option<Box<Expr>> },
    Block(Vec<Stmt>),
    FunctionLiteral(Box<FunctionLiteral>),
    ObjectLiteral(Box<ClassDecl>),
    Is { expr: Box<Expr>, ty: SemanticType, negated: bool },
    Cast { expr: Box<Expr>, ty: SemanticType },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: SemanticType,
    pub location: SourceLocation,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: SemanticType) -> Self {
        Self { kind, ty, location: SourceLocation::default() }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn int(value: i32) -> Self {
        Self::new(ExprKind::Constant(Constant::Int(value)), SemanticType::int())
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::Constant(Constant::Boolean(value)), SemanticType::boolean())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Constant(Constant::String(value.into())), SemanticType::string())
    }

    pub fn variable(descriptor: DescriptorId, ty: SemanticType) -> Self {
        Self::new(ExprKind::Variable(descriptor), ty)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, ty: SemanticType) -> Self {
        Self::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, ty)
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::new(ExprKind::Assign { target: Box::new(target), value: Box::new(value) }, SemanticType::Unit)
    }

    pub fn call(call: Call, ty: SemanticType) -> Self {
        Self::new(ExprKind::Call(call), ty)
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Local { descriptor: DescriptorId, initializer: Option<Expr>, location: SourceLocation },
    Return { value: Option<Expr>, location: SourceLocation },
    While { condition: Expr, body: Vec<Stmt> },
    DoWhile { body: Vec<Stmt>, condition: Expr },
    Break { location: SourceLocation },
    Continue { location: SourceLocation },
}

impl Stmt {
    pub fn local(descriptor: DescriptorId, initializer: Expr) -> Self {
        Stmt::Local { descriptor, initializer: Some(initializer), location: SourceLocation::default() }
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Stmt::Return { value, location: SourceLocation::default() }
    }
}
