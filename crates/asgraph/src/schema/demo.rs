//! A small JavaScript-like schema.
//!
//! Used by the test suite and benchmarks, and handy as a template for real
//! language models. It exercises every schema feature: a diamond of shared
//! capabilities, owning single and multi edges, association edges, a set-valued
//! edge and a special node kind.

use super::{AttrId, AttrType, Cardinality, EdgeKind, NodeKind, Ownership, Schema, SchemaBuilder};
use crate::error::Result;
use std::sync::Arc;

/// The demo schema together with the ids of everything it declares.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct JavaScript {
    pub schema: Arc<Schema>,

    pub base: NodeKind,
    pub positioned: NodeKind,
    pub commentable: NodeKind,
    pub named: NodeKind,
    pub statement: NodeKind,
    pub expression: NodeKind,
    pub program: NodeKind,
    pub identifier: NodeKind,
    pub literal: NodeKind,
    pub binary_expression: NodeKind,
    pub return_statement: NodeKind,
    pub variable_declaration: NodeKind,
    pub function: NodeKind,
    pub comment: NodeKind,

    pub name: AttrId,
    pub source_type: AttrId,
    pub raw: AttrId,
    pub literal_kind: AttrId,
    pub value: AttrId,
    pub operator: AttrId,
    pub is_const: AttrId,
    pub is_async: AttrId,
    pub is_generator: AttrId,
    pub param_count: AttrId,
    pub text: AttrId,

    pub commentable_comments: EdgeKind,
    pub program_body: EdgeKind,
    pub identifier_refers_to: EdgeKind,
    pub binary_expression_left: EdgeKind,
    pub binary_expression_right: EdgeKind,
    pub return_statement_expression: EdgeKind,
    pub variable_declaration_init: EdgeKind,
    pub function_params: EdgeKind,
    pub function_body: EdgeKind,
    pub function_captures: EdgeKind,
}

/// Build the demo schema.
///
/// # Errors
///
/// Never fails in practice; the result type mirrors [`SchemaBuilder::build`].
pub fn javascript() -> Result<JavaScript> {
    let mut b = SchemaBuilder::new("JavaScriptLanguage", "1.0.2", "1.0");

    let base = b.abstract_kind("Base", &[]);
    let positioned = b.abstract_kind("Positioned", &[base]);
    let commentable = b.abstract_kind("Commentable", &[base]);
    let named = b.abstract_kind("Named", &[base]);
    let statement = b.abstract_kind("Statement", &[positioned, commentable]);
    let expression = b.abstract_kind("Expression", &[positioned, commentable]);
    let program = b.kind("Program", &[positioned]);
    let identifier = b.kind("Identifier", &[expression, named]);
    let literal = b.kind("Literal", &[expression]);
    let binary_expression = b.kind("BinaryExpression", &[expression]);
    let return_statement = b.kind("ReturnStatement", &[statement]);
    let variable_declaration = b.kind("VariableDeclaration", &[statement, named]);
    let function = b.kind("Function", &[statement, named]);
    let comment = b.kind("Comment", &[positioned]);
    b.special(comment).root(program);

    let name = b.attr(named, "name", AttrType::Str);
    let source_type = b.attr(program, "sourceType", AttrType::Enum);
    let raw = b.attr(literal, "raw", AttrType::Str);
    let literal_kind = b.attr(literal, "kind", AttrType::Enum);
    let value = b.attr(literal, "value", AttrType::Float);
    let operator = b.attr(binary_expression, "operator", AttrType::Enum);
    let is_const = b.attr(variable_declaration, "isConst", AttrType::Bool);
    let is_async = b.attr(function, "isAsync", AttrType::Bool);
    let is_generator = b.attr(function, "isGenerator", AttrType::Bool);
    let param_count = b.attr(function, "paramCount", AttrType::Int);
    let text = b.attr(comment, "text", AttrType::Str);

    let commentable_comments = b.edge(
        commentable,
        "Comments",
        comment,
        Cardinality::Multi,
        Ownership::Association,
    );
    let program_body = b.edge(program, "Body", statement, Cardinality::Multi, Ownership::Owning);
    let identifier_refers_to = b.edge(
        identifier,
        "RefersTo",
        named,
        Cardinality::Single,
        Ownership::Association,
    );
    let binary_expression_left = b.edge(
        binary_expression,
        "Left",
        expression,
        Cardinality::Single,
        Ownership::Owning,
    );
    let binary_expression_right = b.edge(
        binary_expression,
        "Right",
        expression,
        Cardinality::Single,
        Ownership::Owning,
    );
    let return_statement_expression = b.edge(
        return_statement,
        "Expression",
        expression,
        Cardinality::Single,
        Ownership::Owning,
    );
    let variable_declaration_init = b.edge(
        variable_declaration,
        "Init",
        expression,
        Cardinality::Single,
        Ownership::Owning,
    );
    let function_params = b.edge(function, "Params", identifier, Cardinality::Multi, Ownership::Owning);
    let function_body = b.edge(function, "Body", statement, Cardinality::Multi, Ownership::Owning);
    let function_captures = b.edge(
        function,
        "Captures",
        variable_declaration,
        Cardinality::MultiSet,
        Ownership::Association,
    );

    let schema = Arc::new(b.build()?);

    Ok(JavaScript {
        schema,
        base,
        positioned,
        commentable,
        named,
        statement,
        expression,
        program,
        identifier,
        literal,
        binary_expression,
        return_statement,
        variable_declaration,
        function,
        comment,
        name,
        source_type,
        raw,
        literal_kind,
        value,
        operator,
        is_const,
        is_async,
        is_generator,
        param_count,
        text,
        commentable_comments,
        program_body,
        identifier_refers_to,
        binary_expression_left,
        binary_expression_right,
        return_statement_expression,
        variable_declaration_init,
        function_params,
        function_body,
        function_captures,
    })
}
