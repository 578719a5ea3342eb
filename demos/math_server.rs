//! A JSON-RPC 2.0 calculator over stdin/stdout.
//!
//! ## Methods
//!
//! - `sum(a, b)`, `difference(a, b)`, `multiply(a, b)` on integers
//! - `divide(a, b)` on numbers, fails with "Division by zero" when `b` is 0
//! - `power(base, exponent = 2)` with a default exponent
//! - `log(message)` notification, written to stderr
//!
//! Usage:
//!
//! ```bash
//! echo '{"jsonrpc":"2.0","id":1,"method":"sum","params":{"a":3,"b":7}}' | cargo run --example math_server
//! ```
//!
//! Expected response:
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"result":10}
//! ```
//!
//! Requests may be pipelined or pretty printed; every response is written on
//! its own line. Set `RUST_LOG=debug` to trace dispatch on stderr.

use std::sync::Arc;

use anyhow::Result;
use json_rpc_bind::{Connection, Error, Module, Parameter};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn integers() -> (Parameter<i64>, Parameter<i64>) {
    (Parameter::required("a"), Parameter::required("b"))
}

fn module() -> Module<i64> {
    Module::new()
        .procedure("sum", integers(), |(a, b)| {
            a.checked_add(b).ok_or_else(|| Error::failed("Integer overflow"))
        })
        .procedure("difference", integers(), |(a, b)| {
            a.checked_sub(b).ok_or_else(|| Error::failed("Integer overflow"))
        })
        .procedure("multiply", integers(), |(a, b)| {
            a.checked_mul(b).ok_or_else(|| Error::failed("Integer overflow"))
        })
        .procedure(
            "divide",
            (Parameter::<f64>::required("a"), Parameter::<f64>::required("b")),
            |(a, b)| {
                if b == 0.0 {
                    return Err(Error::failed("Division by zero"));
                }
                Ok(a / b)
            },
        )
        .procedure(
            "power",
            (Parameter::<f64>::required("base"), Parameter::optional("exponent", 2_i32)),
            |(base, exponent)| Ok(base.powi(exponent)),
        )
        .notification("log", (Parameter::<String>::required("message"),), |(message,)| {
            info!("log: {}", message);
            Ok(())
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    info!("Math server started. Send JSON-RPC messages via stdin.");
    Connection::new(Arc::new(module()))
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await?;
    info!("Math server finished");

    Ok(())
}
