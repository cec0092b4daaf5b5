use evalexpr::ContextWithMutableVariables;
use futures::future::BoxFuture;
use serde_json::json;

use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::traits::Tool;
use plansmith_core::types::{ToolContext, ToolResult};

/// Arithmetic expression evaluator backed by `evalexpr`.
///
/// Integer literals are evaluated as floats so `123/11` is `11.18...`, not `11`.
pub struct CalculatorTool;

/// Function names rewritten into evalexpr's `math::` namespace.
const MATH_FUNCTIONS: &[(&str, &str)] = &[
    ("sqrt", "math::sqrt"),
    ("cbrt", "math::cbrt"),
    ("sin", "math::sin"),
    ("cos", "math::cos"),
    ("tan", "math::tan"),
    ("asin", "math::asin"),
    ("acos", "math::acos"),
    ("atan", "math::atan"),
    ("arcsin", "math::asin"),
    ("arccos", "math::acos"),
    ("arctan", "math::atan"),
    ("atan2", "math::atan2"),
    ("sinh", "math::sinh"),
    ("cosh", "math::cosh"),
    ("tanh", "math::tanh"),
    ("ln", "math::ln"),
    ("log", "math::log10"),
    ("log10", "math::log10"),
    ("log2", "math::log2"),
    ("exp", "math::exp"),
    ("abs", "math::abs"),
    ("hypot", "math::hypot"),
    ("pow", "math::pow"),
];

/// Evaluate an expression and format the result.
pub fn evaluate(expression: &str) -> std::result::Result<String, String> {
    let prepared = prepare_expression(expression)?;

    let mut context: evalexpr::HashMapContext = evalexpr::HashMapContext::new();
    let _ = context.set_value("pi".to_string(), evalexpr::Value::Float(std::f64::consts::PI));
    let _ = context.set_value("e".to_string(), evalexpr::Value::Float(std::f64::consts::E));

    let value = evalexpr::eval_with_context(&prepared, &context)
        .map_err(|e| format!("Evaluation error: {}", e))?;
    let number = value
        .as_number()
        .map_err(|_| "Result is not a number".to_string())?;

    if !number.is_finite() {
        return Err(format!("Result is not finite: {}", number));
    }
    Ok(format_number(number))
}

/// Rewrite an expression for evalexpr: float literals, `math::` functions,
/// `**` as power and a few unicode operators.
fn prepare_expression(expr: &str) -> std::result::Result<String, String> {
    let expr = expr
        .trim()
        .replace("**", "^")
        .replace('×', "*")
        .replace('÷', "/")
        .replace('−', "-");
    if expr.is_empty() {
        return Err("Expression is empty".to_string());
    }

    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == ':') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();

            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let is_call = chars.get(j) == Some(&'(');

            match MATH_FUNCTIONS.iter().find(|(name, _)| is_call && name.eq_ignore_ascii_case(&ident)) {
                Some((_, mapped)) => out.push_str(mapped),
                None => out.push_str(&ident.to_ascii_lowercase()),
            }
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // Exponent part: 1e5, 2.5E-3
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if chars.get(j).is_some_and(|n| n.is_ascii_digit()) {
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value: f64 = literal
                .parse()
                .map_err(|_| format!("Invalid number: {}", literal))?;
            out.push_str(&format!("{:?}", value));
        } else {
            out.push(c);
            i += 1;
        }
    }

    Ok(out)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports + - * / % ^, parentheses, \
         pi, e and functions such as sqrt, sin, cos, tan, ln, log, exp and abs."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The mathematical expression to evaluate, e.g. 123/11*412"
                }
            },
            "required": ["expression"]
        })
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let expression = input["expression"].as_str().ok_or_else(|| {
                PlansmithError::ToolValidation("'expression' must be a string".into())
            })?;

            Ok(match evaluate(expression) {
                Ok(value) => ToolResult::success(value),
                Err(message) => ToolResult::error(message),
            })
        })
    }

    fn timeout_secs(&self) -> u64 {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_f64(expr: &str) -> f64 {
        evaluate(expr).unwrap().parse().unwrap()
    }

    #[test]
    fn test_float_division() {
        let got = eval_f64("123/11*412");
        let expected = 123.0 / 11.0 * 412.0;
        assert!((got - expected).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn test_integer_result_formatting() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), "14");
        assert_eq!(evaluate("2 ** 10").unwrap(), "1024");
        assert_eq!(evaluate("7 % 4").unwrap(), "3");
    }

    #[test]
    fn test_functions_and_constants() {
        assert!((eval_f64("sqrt(16) + log(100)") - 6.0).abs() < 1e-9);
        assert!((eval_f64("sin(pi / 2)") - 1.0).abs() < 1e-9);
        assert!((eval_f64("ln(e)") - 1.0).abs() < 1e-9);
        assert!((eval_f64("log2(8)") - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_exponent_literal() {
        assert!((eval_f64("1.5e3 / 3") - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_identifiers_with_digits_untouched() {
        assert_eq!(prepare_expression("log2(8)").unwrap(), "math::log2(8.0)");
        assert_eq!(prepare_expression("10 / 4").unwrap(), "10.0 / 4.0");
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("").is_err());
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("\"text\"").is_err());
    }

    #[tokio::test]
    async fn test_tool_reports_evaluation_error_as_result() {
        let result = CalculatorTool
            .execute(json!({"expression": "1 +"}), ToolContext::default())
            .await
            .unwrap();
        assert!(result.is_error);

        let err = CalculatorTool
            .execute(json!({"expr": "1"}), ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlansmithError::ToolValidation(_)));
    }
}
