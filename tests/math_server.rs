//! Integration tests for the math_server demo.
//!
//! Each test pipes JSON-RPC messages into the demo and checks the lines it
//! writes to stdout.

mod common;

mod tests {
    use assert_cmd::Command;
    use serde_json::{Value, json};

    use super::common::get_demo_path;

    fn run(input: &str) -> Vec<Value> {
        let binary_path = get_demo_path("math_server").expect("math_server should build");

        let output = Command::new(&binary_path)
            .env("RUST_LOG", "debug")
            .write_stdin(input)
            .output()
            .expect("Failed to execute math_server");

        eprintln!("Server Logs:\n{}", String::from_utf8_lossy(&output.stderr));
        assert!(output.status.success());

        String::from_utf8(output.stdout)
            .expect("Response is not valid UTF-8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("Response line is not JSON"))
            .collect()
    }

    fn by_id(responses: &[Value], id: i64) -> &Value {
        responses
            .iter()
            .find(|r| r["id"] == json!(id))
            .unwrap_or_else(|| panic!("no response for id {}", id))
    }

    #[test]
    fn sum_success() {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sum",
            "params": {"a": 3, "b": 7}
        });
        let responses = run(&request.to_string());
        assert_eq!(responses, vec![json!({"jsonrpc": "2.0", "id": 1, "result": 10})]);
    }

    #[test]
    fn division_by_zero() {
        let request = r#"{"jsonrpc":"2.0","id":2,"method":"divide","params":{"a":1,"b":0}}"#;
        assert_eq!(
            run(request),
            vec![json!({
                "jsonrpc": "2.0",
                "id": 2,
                "error": {"code": -32603, "message": "Division by zero"}
            })]
        );
    }

    #[test]
    fn default_parameter() {
        let request = r#"{"jsonrpc":"2.0","id":3,"method":"power","params":{"base":3}}"#;
        assert_eq!(run(request)[0]["result"], json!(9.0));
    }

    #[test]
    fn pipelined_and_pretty_printed() {
        let pretty = serde_json::to_string_pretty(&json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "multiply",
            "params": {"a": 6, "b": 7}
        }))
        .unwrap();
        let input = format!(
            "{}{}\n{}",
            r#"{"jsonrpc":"2.0","id":4,"method":"sum","params":{"a":1,"b":2}}"#,
            r#"{"jsonrpc":"2.0","id":5,"method":"difference","params":{"a":1,"b":2}}"#,
            pretty
        );

        let responses = run(&input);
        assert_eq!(responses.len(), 3);
        assert_eq!(by_id(&responses, 4)["result"], json!(3));
        assert_eq!(by_id(&responses, 5)["result"], json!(-1));
        assert_eq!(by_id(&responses, 6)["result"], json!(42));
    }

    #[test]
    fn notification_has_no_response() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"log","params":{"message":"hello"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":7,"method":"sum","params":{"a":0,"b":0}}"#
        );
        let responses = run(input);
        assert_eq!(responses, vec![json!({"jsonrpc": "2.0", "id": 7, "result": 0})]);
    }

    #[test]
    fn missing_jsonrpc_is_invalid_request() {
        let responses = run(r#"{"id":8,"method":"sum","params":{"a":1,"b":2}}"#);
        assert_eq!(
            responses,
            vec![json!({
                "jsonrpc": "2.0",
                "id": 8,
                "error": {
                    "code": -32600,
                    "message": "Invalid request",
                    "data": {
                        "code": 1,
                        "message": "Missing field \"jsonrpc\"",
                        "data": {"name": "jsonrpc"}
                    }
                }
            })]
        );
    }

    #[test]
    fn wrong_parameter_type_is_invalid_params() {
        let responses = run(r#"{"jsonrpc":"2.0","id":9,"method":"sum","params":{"a":"1","b":2}}"#);
        let error = &responses[0]["error"];
        assert_eq!(error["code"], json!(-32602));
        assert_eq!(
            error["data"],
            json!({
                "code": 11,
                "message": "Parameter \"a\" is of type \"string\", expected \"number\"",
                "data": {"name": "a", "actual": "string", "expected": "number"}
            })
        );
    }

    #[test]
    fn unknown_method() {
        let responses = run(r#"{"jsonrpc":"2.0","id":10,"method":"modulo","params":{}}"#);
        assert_eq!(responses[0]["error"]["code"], json!(-32601));
        assert_eq!(responses[0]["error"]["message"], json!("Method \"modulo\" not found"));
    }

    #[test]
    fn parse_error_malformed_json() {
        let responses = run("invalid json");
        assert_eq!(
            responses,
            vec![json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": -32700, "message": "Parse error"}
            })]
        );
    }

    #[test]
    fn parse_error_truncated_json() {
        let responses = run(r#"{"jsonrpc":"2.0","id":11,"method":"sum""#);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], json!(-32700));
    }

    #[test]
    fn batch() {
        let input = json!([
            {"jsonrpc": "2.0", "id": 12, "method": "sum", "params": {"a": 1, "b": 1}},
            {"jsonrpc": "2.0", "method": "log", "params": {"message": "in batch"}},
            {"jsonrpc": "2.0", "id": 13, "method": "multiply", "params": {"a": 2, "b": 5}}
        ]);
        let responses = run(&input.to_string());
        assert_eq!(
            responses,
            vec![json!([
                {"jsonrpc": "2.0", "id": 12, "result": 2},
                {"jsonrpc": "2.0", "id": 13, "result": 10}
            ])]
        );
    }
}
