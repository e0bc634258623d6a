//! Elementary check-and-report fragments and the error message catalog.
use serde_json::Value;

use crate::context::{Context, ERROR_MESSAGES};
use crate::ir::{ConstRef, Params, Stmt, Test};

/// Keys of the `ERROR_MESSAGES` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    TypeNotNull,
    TypeNotNumber,
    TypeNotInteger,
    TypeNotBoolean,
    TypeNotString,
    TypeNotDateTime,
    TypeNotObject,
    TypeNotArray,
    NumberMax,
    NumberMin,
    NumberType,
    NumberMultipleOf,
    StringPattern,
    LengthMin,
    LengthMax,
    ItemsMin,
    ItemsMax,
    ItemsUnique,
    PropsMin,
    PropsMax,
    Enum,
    PropMissing,
    PropMissingMatching,
    PropAdditional,
}

impl Message {
    pub fn key(self) -> &'static str {
        match self {
            Message::TypeNotNull => "TYPE_NOT_NULL",
            Message::TypeNotNumber => "TYPE_NOT_NUMBER",
            Message::TypeNotInteger => "TYPE_NOT_INTEGER",
            Message::TypeNotBoolean => "TYPE_NOT_BOOLEAN",
            Message::TypeNotString => "TYPE_NOT_STRING",
            Message::TypeNotDateTime => "TYPE_NOT_DATETIME",
            Message::TypeNotObject => "TYPE_NOT_OBJECT",
            Message::TypeNotArray => "TYPE_NOT_ARRAY",
            Message::NumberMax => "NUMBER_MAX",
            Message::NumberMin => "NUMBER_MIN",
            Message::NumberType => "NUMBER_TYPE",
            Message::NumberMultipleOf => "NUMBER_MULTIPLEOF",
            Message::StringPattern => "STRING_PATTERN",
            Message::LengthMin => "LENGTH_MIN",
            Message::LengthMax => "LENGTH_MAX",
            Message::ItemsMin => "ITEMS_MIN",
            Message::ItemsMax => "ITEMS_MAX",
            Message::ItemsUnique => "ITEMS_UNIQUE",
            Message::PropsMin => "PROPS_MIN",
            Message::PropsMax => "PROPS_MAX",
            Message::Enum => "ENUM",
            Message::PropMissing => "PROP_MISSING",
            Message::PropMissingMatching => "PROP_MISSING_MATCHING",
            Message::PropAdditional => "PROP_ADDITIONAL_PROPS",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            Message::TypeNotNull => "Expecting null",
            Message::TypeNotNumber => "Expecting a number",
            Message::TypeNotInteger => "Expecting an integer number",
            Message::TypeNotBoolean => "Expecting a boolean value",
            Message::TypeNotString => "Expecting a string",
            Message::TypeNotDateTime => "Expecting a date/time string",
            Message::TypeNotObject => "Expecting an object",
            Message::TypeNotArray => "Expecting an array",
            Message::NumberMax => "Must be smaller than or equal to {value}",
            Message::NumberMin => "Must be bigger than or equal to {value}",
            Message::NumberType => "Must be of type `{value}`",
            Message::NumberMultipleOf => "Must be multiple of {value}",
            Message::StringPattern => "Must match the pattern \"{pattern}\"",
            Message::LengthMin => "Must be at least {value} characters long",
            Message::LengthMax => "Must be at most {value} characters long",
            Message::ItemsMin => "Must contain at least {value} items in the array",
            Message::ItemsMax => "Must contain at most {value} items in the array",
            Message::ItemsUnique => "Must contain only unique items",
            Message::PropsMin => "Must contain at least {value} properties in the object",
            Message::PropsMax => "Must contain at most {value} properties in the object",
            Message::Enum => "Must be one of {values}",
            Message::PropMissing => "Missing property `{name}`",
            Message::PropMissingMatching => "Missing a property that matches `{name}`",
            Message::PropAdditional => "Unexpected extraneous property `{name}`",
        }
    }
}

pub fn message(ctx: &mut Context<'_>, message: Message) -> ConstRef {
    ctx.constant_string(ERROR_MESSAGES, message.key(), message.template())
}

/// Report `message` (with `params`) when `test` holds.
pub fn test_and_push(ctx: &mut Context<'_>, test: Test, msg: Message, params: Params) -> Stmt {
    Stmt::Check { test, message: message(ctx, msg), params }
}

/// Report `message` when `test` holds, otherwise run `body`.
pub fn guard(ctx: &mut Context<'_>, test: Test, msg: Message, body: Vec<Stmt>) -> Stmt {
    Stmt::Guard { test, message: message(ctx, msg), body }
}

pub fn params<const N: usize>(pairs: [(&str, Value); N]) -> Params {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
