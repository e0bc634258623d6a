//! Shape guards for the built-in classifications.
//!
//! The guard reports a single type mismatch and skips the nested checks,
//! so a wrong shape never cascades into secondary facet violations.
use crate::context::Context;
use crate::ir::{Stmt, Test};
use crate::model::{Builtin, TypeId};

use super::fragment::{self, Message};

pub fn wrap(body: Vec<Stmt>, builtin: TypeId, ctx: &mut Context<'_>) -> Vec<Stmt> {
    let (test, message) = match ctx.graph().classification(builtin) {
        // unions are checked by their branches
        Builtin::Any | Builtin::Union => return body,
        Builtin::Nil => (Test::NotNull, Message::TypeNotNull),
        Builtin::Boolean => (Test::NotBoolean, Message::TypeNotBoolean),
        Builtin::Number => (Test::NotNumber, Message::TypeNotNumber),
        Builtin::Integer => (Test::NotInteger, Message::TypeNotInteger),
        Builtin::String => (Test::NotString, Message::TypeNotString),
        Builtin::DateTime => (Test::NotDateTime, Message::TypeNotDateTime),
        Builtin::Object => (Test::NotObject, Message::TypeNotObject),
        Builtin::Array => (Test::NotArray, Message::TypeNotArray),
    };
    vec![fragment::guard(ctx, test, message, body)]
}
