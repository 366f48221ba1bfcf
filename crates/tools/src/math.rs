//! Integer arithmetic tools — add, subtract, multiply, divide.

use clawloop_core::tool::{FnTool, ToolInput, ToolMetadata, object_schema};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NumArgs {
    pub a: i64,
    pub b: i64,
}

impl ToolInput for NumArgs {
    fn schema() -> Value {
        object_schema(
            &[
                ("a", "integer", "Left operand"),
                ("b", "integer", "Right operand"),
            ],
            &[],
        )
    }
}

fn arithmetic(
    name: &'static str,
    description: &'static str,
    example: &'static str,
    op: fn(i64, i64) -> Result<i64, &'static str>,
) -> FnTool {
    FnTool::from_fn(name, description, move |args: NumArgs| op(args.a, args.b))
        .with_example(example)
        .with_metadata(ToolMetadata::category("math").with_version("0.1"))
}

pub fn add() -> FnTool {
    arithmetic("add", "Returns the sum of a and b.", r#"{"a":3, "b":4}"#, |a, b| {
        a.checked_add(b).ok_or("integer overflow")
    })
}

pub fn subtract() -> FnTool {
    arithmetic(
        "subtract",
        "Returns the difference of a and b.",
        r#"{"a":7, "b":2}"#,
        |a, b| a.checked_sub(b).ok_or("integer overflow"),
    )
}

pub fn multiply() -> FnTool {
    arithmetic(
        "multiply",
        "Returns the product of a and b.",
        r#"{"a":3, "b":5}"#,
        |a, b| a.checked_mul(b).ok_or("integer overflow"),
    )
}

pub fn divide() -> FnTool {
    arithmetic(
        "divide",
        "Returns the integer division of a by b.",
        r#"{"a":14, "b":2}"#,
        |a, b| {
            if b == 0 {
                return Err("division by zero");
            }
            a.checked_div(b).ok_or("integer overflow")
        },
    )
}
