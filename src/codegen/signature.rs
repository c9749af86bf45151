//! Generic `Signature` attribute strings and the compact type strings stored in
//! `JetMethod`/`JetValueParameter` records.

use crate::ast::{SemanticType, TypeParameterDescriptor};

/// Accumulates a JVM generic signature
#[derive(Debug, Default)]
pub struct SignatureWriter {
    buffer: String,
    generic: bool,
}

impl SignatureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<T:Ljava/lang/Object;U:...>`
    pub fn type_parameters(&mut self, parameters: &[TypeParameterDescriptor], bounds: &[String]) {
        if parameters.is_empty() {
            return;
        }
        self.generic = true;
        self.buffer.push('<');
        for (parameter, bound) in parameters.iter().zip(bounds) {
            self.buffer.push_str(&parameter.name);
            self.buffer.push(':');
            self.buffer.push_str(bound);
        }
        self.buffer.push('>');
    }

    pub fn raw(&mut self, fragment: &str, generic: bool) {
        self.generic |= generic;
        self.buffer.push_str(fragment);
    }

    pub fn open_parameters(&mut self) {
        self.buffer.push('(');
    }

    pub fn close_parameters(&mut self) {
        self.buffer.push(')');
    }

    /// The signature, or `None` when it carries nothing beyond the descriptor
    pub fn finish(self) -> Option<String> {
        if self.generic {
            Some(self.buffer)
        } else {
            None
        }
    }
}

/// Whether a type mentions type parameters or type arguments
pub fn is_generic(ty: &SemanticType) -> bool {
    match ty {
        SemanticType::TypeParameter { .. } => true,
        SemanticType::Class { arguments, .. } => !arguments.is_empty(),
        SemanticType::Array { element, .. } => is_generic(element),
        SemanticType::Function { .. } => true,
        _ => false,
    }
}

/// Compact source-level rendering such as `Int?`, `Array<T>` or `(Int) -> Unit`.
///
/// `class_name` resolves class descriptors to dotted names.
pub fn type_string(ty: &SemanticType, class_name: &dyn Fn(&SemanticType) -> String) -> String {
    let nullable = if ty.is_nullable() { "?" } else { "" };
    match ty {
        SemanticType::Class { arguments, .. } => {
            let mut out = class_name(ty);
            if !arguments.is_empty() {
                let args: Vec<String> = arguments.iter().map(|a| type_string(a, class_name)).collect();
                out.push('<');
                out.push_str(&args.join(", "));
                out.push('>');
            }
            out.push_str(nullable);
            out
        }
        SemanticType::Array { element, .. } => {
            format!("Array<{}>{}", type_string(element, class_name), nullable)
        }
        SemanticType::Function { parameters, return_type } => {
            let params: Vec<String> = parameters.iter().map(|p| type_string(p, class_name)).collect();
            format!("({}) -> {}", params.join(", "), type_string(return_type, class_name))
        }
        other => other.to_string(),
    }
}

/// `<T : Any?, U : Int>` rendering of declared type parameters
pub fn type_parameters_string(
    parameters: &[TypeParameterDescriptor],
    class_name: &dyn Fn(&SemanticType) -> String,
) -> String {
    if parameters.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = parameters
        .iter()
        .map(|p| format!("{} : {}", p.name, type_string(&p.upper_bound, class_name)))
        .collect();
    format!("<{}>", rendered.join(", "))
}
