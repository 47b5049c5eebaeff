//! Small arithmetic tools. Their arguments live under a nested `input`
//! mapping (`input.a`, `input.int_list`), so they double as a check that
//! dotted call keys reach tools intact.

use async_trait::async_trait;
use cartwise_core::error::ToolError;
use cartwise_core::tool::{Tool, ToolResponse};
use serde_json::{Map, Value, json};

/// The nested `input` mapping, or the top level when absent.
fn input(arguments: &Map<String, Value>) -> &Map<String, Value> {
    arguments
        .get("input")
        .and_then(Value::as_object)
        .unwrap_or(arguments)
}

fn number(value: Option<&Value>, name: &str) -> Result<Value, ToolError> {
    match value {
        Some(v @ Value::Number(_)) => Ok(v.clone()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| s.trim().parse::<f64>().map(Value::from))
            .map_err(|_| ToolError::InvalidArguments(format!("'{name}' is not a number: {s}"))),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "'{name}' is not a number: {other}"
        ))),
        None => Err(ToolError::InvalidArguments(format!("Missing '{name}' argument"))),
    }
}

/// Sum numbers, staying integral while every operand is.
fn sum(values: &[Value]) -> Result<Value, ToolError> {
    if values.iter().all(|v| v.as_i64().is_some()) {
        let mut total: i64 = 0;
        for v in values {
            total = total
                .checked_add(v.as_i64().unwrap_or_default())
                .ok_or_else(|| ToolError::InvalidArguments("integer overflow".into()))?;
        }
        return Ok(Value::from(total));
    }
    Ok(Value::from(
        values.iter().filter_map(Value::as_f64).sum::<f64>(),
    ))
}

pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers: input.a + input.b"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "object",
                    "properties": {
                        "a": { "type": "number" },
                        "b": { "type": "number" }
                    },
                    "required": ["a", "b"]
                }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolResponse, ToolError> {
        let input = input(&arguments);
        let a = number(input.get("a"), "a")?;
        let b = number(input.get("b"), "b")?;
        Ok(ToolResponse::text(sum(&[a, b])?.to_string()))
    }
}

pub struct SumListTool;

#[async_trait]
impl Tool for SumListTool {
    fn name(&self) -> &str {
        "sum_list"
    }

    fn description(&self) -> &str {
        "Sum a list of integers: input.int_list"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "object",
                    "properties": {
                        "int_list": { "type": "array", "items": { "type": "integer" } }
                    },
                    "required": ["int_list"]
                }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolResponse, ToolError> {
        let items = input(&arguments)
            .get("int_list")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::InvalidArguments("'int_list' must be a list".into()))?;
        let values = items
            .iter()
            .enumerate()
            .map(|(i, v)| number(Some(v), &format!("int_list[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ToolResponse::text(sum(&values)?.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartwise_protocol::decode;

    async fn run(tool: &dyn Tool, line: &str) -> Result<String, ToolError> {
        let (_, args) = decode(line).unwrap();
        Ok(tool.execute(args).await?.content[0].to_text())
    }

    #[tokio::test]
    async fn add_reads_nested_keys() {
        assert_eq!(run(&AddTool, "FUNCTION_CALL: add|input.a=2|input.b=3").await.unwrap(), "5");
    }

    #[tokio::test]
    async fn add_mixes_floats() {
        assert_eq!(run(&AddTool, "FUNCTION_CALL: add|input.a=1.5|input.b=2").await.unwrap(), "3.5");
    }

    #[tokio::test]
    async fn add_accepts_top_level_keys() {
        assert_eq!(run(&AddTool, "FUNCTION_CALL: add|a=-4|b=10").await.unwrap(), "6");
    }

    #[tokio::test]
    async fn sum_list_from_literal() {
        assert_eq!(
            run(&SumListTool, "FUNCTION_CALL: sum_list|input.int_list=[73, 78, 68, 73, 65]")
                .await
                .unwrap(),
            "357"
        );
    }

    #[tokio::test]
    async fn empty_list_sums_to_zero() {
        assert_eq!(run(&SumListTool, "FUNCTION_CALL: sum_list|input.int_list=[]").await.unwrap(), "0");
    }

    #[tokio::test]
    async fn missing_or_bad_arguments() {
        assert!(matches!(
            run(&AddTool, "FUNCTION_CALL: add|input.a=1").await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            run(&SumListTool, "FUNCTION_CALL: sum_list|input.int_list=['x']").await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn overflow_is_reported() {
        let line = format!("FUNCTION_CALL: add|input.a={}|input.b=1", i64::MAX);
        assert!(run(&AddTool, &line).await.is_err());
    }
}
