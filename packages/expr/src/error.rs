use thiserror::Error;

pub type ExprResult<T> = Result<T, ExprError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Parse error at offset {offset}: {message}")]
    Parse { message: String, offset: usize },

    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Cannot access property '{property}' on {on}")]
    NotAnObject { property: String, on: String },

    #[error("Cannot index {on}")]
    NotIndexable { on: String },

    #[error("Value is not callable: {0}")]
    NotCallable(String),

    #[error("Invalid operands for operator {operator}: {details}")]
    InvalidOperands { operator: String, details: String },

    #[error("Division by zero")]
    DivisionByZero,
}
