//! Text tools — uppercase, concatenate, reverse, palindrome.

use clawloop_core::tool::{FnTool, ToolInput, ToolMetadata, object_schema};
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;

fn text_metadata() -> ToolMetadata {
    ToolMetadata::category("text").with_version("0.1")
}

#[derive(Debug, Deserialize)]
pub struct TextArgs {
    pub text: String,
}

impl ToolInput for TextArgs {
    fn schema() -> Value {
        object_schema(&[("text", "string", "The input text")], &[])
    }
}

#[derive(Debug, Deserialize)]
pub struct ConcatArgs {
    #[serde(default)]
    pub a: String,
    #[serde(default)]
    pub b: String,
}

impl ToolInput for ConcatArgs {
    fn schema() -> Value {
        object_schema(
            &[],
            &[
                ("a", "string", "Leading string"),
                ("b", "string", "Trailing string"),
            ],
        )
    }
}

pub fn uppercase() -> FnTool {
    FnTool::from_fn("uppercase", "Converts a string to uppercase.", |args: TextArgs| {
        Ok::<_, Infallible>(args.text.to_uppercase())
    })
    .with_example(r#"{"text":"hello world"}"#)
    .with_metadata(text_metadata())
}

pub fn concatenate() -> FnTool {
    FnTool::from_fn("concatenate", "Joins two strings together.", |args: ConcatArgs| {
        Ok::<_, Infallible>(args.a + &args.b)
    })
    .with_example(r#"{"a":"hello", "b":" world"}"#)
    .with_metadata(text_metadata())
}

pub fn reverse() -> FnTool {
    FnTool::from_fn("reverse", "Reverses a string.", |args: TextArgs| {
        Ok::<_, Infallible>(args.text.chars().rev().collect::<String>())
    })
    .with_example(r#"{"text":"foo"}"#)
    .with_metadata(text_metadata())
}

/// Whether `text` reads the same forwards and backwards, by character.
pub fn is_palindrome(text: &str) -> bool {
    text.chars().eq(text.chars().rev())
}

pub fn palindrome() -> FnTool {
    FnTool::from_fn(
        "palindrome",
        "Checks if the given string is a palindrome (reads the same forwards and backwards).",
        |args: TextArgs| Ok::<_, Infallible>(is_palindrome(&args.text)),
    )
    .with_example(r#"{"text":"racecar"}"#)
    .with_metadata(text_metadata())
}
